use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use lector_core::hf_hub::hf_download;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

pub const MODEL_FILE: &str = "model.onnx";
pub const CONFIG_FILE: &str = "config.json";

/// On-disk location of one pretrained model.
#[derive(Debug, Clone)]
pub struct ModelFiles {
    pub model: PathBuf,
    pub config: Option<PathBuf>,
}

impl ModelFiles {
    /// Looks for `<name>.onnx` (and `<name>.json`) in `model_dir` first, then
    /// falls back to the Hub repository.
    pub async fn resolve(name: &str, repo: &str, model_dir: Option<&Path>) -> Result<Self> {
        if let Some(files) = model_dir.and_then(|dir| Self::local(dir, name)) {
            debug!(model = %files.model.display(), "using local model");
            return Ok(files);
        }

        let model = hf_download(repo, MODEL_FILE).await?;
        let config = match hf_download(repo, CONFIG_FILE).await {
            Ok(path) => Some(path),
            Err(err) => {
                warn!("{name}: no model config, using built-in defaults: {err:#}");
                None
            }
        };

        Ok(Self { model, config })
    }

    pub fn local(dir: &Path, name: &str) -> Option<Self> {
        let model = dir.join(format!("{name}.onnx"));
        if !model.is_file() {
            return None;
        }

        let config = dir.join(format!("{name}.json"));
        Some(Self {
            model,
            config: config.is_file().then_some(config),
        })
    }
}

/// Preprocessing and vocabulary settings shipped next to the weights.
///
/// Every field is optional; missing ones fall back to the architecture
/// defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelConfig {
    pub mean: Option<[f32; 3]>,
    pub std: Option<[f32; 3]>,
    /// (channels, height, width)
    pub input_shape: Option<[u32; 3]>,
    pub vocab: Option<String>,
}

impl ModelConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let config: Self = read_json(path)?;
        if let Some((height, width)) = config.input_size()
            && (height == 0 || width == 0)
        {
            bail!(
                "{}: input_shape must have a non-zero height and width",
                path.display()
            );
        }
        Ok(config)
    }

    /// (height, width) of the model input, if declared.
    pub fn input_size(&self) -> Option<(u32, u32)> {
        self.input_shape.map(|[_, h, w]| (h, w))
    }
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(parsed)
}
