//! Optional TOML configuration.
//!
//! Values are merged with the command line: a flag wins over the file, and
//! the file wins over the built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lector_ml::{DEFAULT_DET_ARCH, DEFAULT_RECO_ARCH, PredictorOptions};
use serde::Deserialize;

use crate::cli::Cli;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub models: ModelsConfig,
    pub predictor: PredictorConfig,
}

/// Model selection and storage
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelsConfig {
    pub det_arch: Option<String>,
    pub reco_arch: Option<String>,
    /// Directory searched for `<arch>.onnx` before the Hub
    pub model_dir: Option<PathBuf>,
    /// Download cache
    pub cache_dir: Option<PathBuf>,
    /// Hugging Face endpoint or mirror
    pub hf_endpoint: Option<String>,
}

/// Inference and layout tuning
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PredictorConfig {
    pub threads: Option<usize>,
    pub resolve_blocks: Option<bool>,
    pub paragraph_break: Option<f32>,
    pub det_batch_size: Option<usize>,
    pub reco_batch_size: Option<usize>,
    pub bin_thresh: Option<f32>,
    pub box_thresh: Option<f32>,
    pub preserve_aspect_ratio: Option<bool>,
    pub symmetric_pad: Option<bool>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// `<config dir>/lector/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("lector").join("config.toml"))
    }

    /// Loads the explicit file if given, else the default file if present.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        match Self::default_path().filter(|path| path.is_file()) {
            Some(path) => {
                tracing::debug!(config = %path.display(), "using default config");
                Self::load(&path)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Effective settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub det_arch: String,
    pub reco_arch: String,
    pub cache_dir: Option<PathBuf>,
    pub hf_endpoint: Option<String>,
    pub options: PredictorOptions,
}

impl Settings {
    pub fn resolve(cli: &Cli, config: Config) -> Self {
        let Config { models, predictor } = config;
        let defaults = PredictorOptions::default();

        let options = PredictorOptions {
            model_dir: cli.model_dir.clone().or(models.model_dir),
            threads: cli.threads.or(predictor.threads).unwrap_or(defaults.threads),
            det_batch_size: predictor.det_batch_size.unwrap_or(defaults.det_batch_size),
            reco_batch_size: predictor
                .reco_batch_size
                .unwrap_or(defaults.reco_batch_size),
            preserve_aspect_ratio: predictor
                .preserve_aspect_ratio
                .unwrap_or(defaults.preserve_aspect_ratio),
            symmetric_pad: predictor.symmetric_pad.unwrap_or(defaults.symmetric_pad),
            bin_thresh: predictor.bin_thresh.or(defaults.bin_thresh),
            box_thresh: predictor.box_thresh.or(defaults.box_thresh),
            resolve_blocks: cli.resolve_blocks
                || predictor.resolve_blocks.unwrap_or(defaults.resolve_blocks),
            paragraph_break: predictor
                .paragraph_break
                .unwrap_or(defaults.paragraph_break),
        };

        Self {
            det_arch: cli
                .det_arch
                .clone()
                .or(models.det_arch)
                .unwrap_or_else(|| DEFAULT_DET_ARCH.to_string()),
            reco_arch: cli
                .reco_arch
                .clone()
                .or(models.reco_arch)
                .unwrap_or_else(|| DEFAULT_RECO_ARCH.to_string()),
            cache_dir: cli.cache_dir.clone().or(models.cache_dir),
            hf_endpoint: models.hf_endpoint,
            options,
        }
    }
}
