use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array4, ArrayD};
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::Tensor;
use tracing::debug;

/// A CPU ONNX Runtime session with a single image input.
pub struct OnnxSession {
    session: Session,
    input_name: String,
}

impl OnnxSession {
    pub fn load(model_path: &Path, threads: usize) -> Result<Self> {
        let session = Session::builder()
            .context("failed to create session builder")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("failed to set optimization level")?
            .with_intra_threads(threads.max(1))
            .context("failed to set intra threads")?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load model from {}", model_path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .context("model declares no inputs")?;

        debug!(
            model = %model_path.display(),
            input = %input_name,
            outputs = session.outputs.len(),
            "model loaded"
        );

        Ok(Self {
            session,
            input_name,
        })
    }

    /// Runs one batch and copies the first output out of the runtime.
    pub fn run(&mut self, input: Array4<f32>) -> Result<ArrayD<f32>> {
        let input = Tensor::from_array(input).context("failed to create input tensor")?;
        let outputs = self
            .session
            .run(ort::inputs![&self.input_name => input])
            .context("inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("failed to extract output tensor")?
            .to_owned();

        Ok(output)
    }
}
