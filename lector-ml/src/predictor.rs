use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use tracing::{info, instrument};

use crate::{
    arch::{DetectionArch, RecognitionArch},
    builder::DocumentBuilder,
    detection::{DetectedBox, DetectionPredictor},
    document::{Document, Word},
    hub::ModelFiles,
    recognition::RecognitionPredictor,
};

#[derive(Debug, Clone)]
pub struct PredictorOptions {
    /// Directory searched for `<arch>.onnx` before the Hub.
    pub model_dir: Option<PathBuf>,
    pub threads: usize,
    pub det_batch_size: usize,
    pub reco_batch_size: usize,
    pub preserve_aspect_ratio: bool,
    pub symmetric_pad: bool,
    pub bin_thresh: Option<f32>,
    pub box_thresh: Option<f32>,
    pub resolve_blocks: bool,
    pub paragraph_break: f32,
}

impl Default for PredictorOptions {
    fn default() -> Self {
        let builder = DocumentBuilder::default();
        Self {
            model_dir: None,
            threads: num_cpus::get_physical(),
            det_batch_size: 2,
            reco_batch_size: 128,
            preserve_aspect_ratio: true,
            symmetric_pad: true,
            bin_thresh: None,
            box_thresh: None,
            resolve_blocks: builder.resolve_blocks,
            paragraph_break: builder.paragraph_break,
        }
    }
}

/// Two-stage OCR: word detection followed by word recognition.
pub struct OcrPredictor {
    detector: DetectionPredictor,
    recognizer: RecognitionPredictor,
    builder: DocumentBuilder,
}

impl OcrPredictor {
    /// Resolves both models, downloading them if needed. Unknown
    /// architecture names fail before anything is fetched.
    pub async fn load(det_arch: &str, reco_arch: &str, options: PredictorOptions) -> Result<Self> {
        let det_arch = DetectionArch::from_name(det_arch)?;
        let reco_arch = RecognitionArch::from_name(reco_arch)?;
        let model_dir = options.model_dir.as_deref();

        let det_files =
            ModelFiles::resolve(&det_arch.to_string(), det_arch.spec().repo, model_dir).await?;
        let reco_files =
            ModelFiles::resolve(&reco_arch.to_string(), reco_arch.spec().repo, model_dir).await?;

        let detector = DetectionPredictor::load(det_arch, &det_files, &options)
            .with_context(|| format!("failed to load detection model {det_arch}"))?;
        let recognizer = RecognitionPredictor::load(reco_arch, &reco_files, &options)
            .with_context(|| format!("failed to load recognition model {reco_arch}"))?;

        info!(%det_arch, %reco_arch, threads = options.threads, "predictor ready");

        Ok(Self {
            detector,
            recognizer,
            builder: DocumentBuilder {
                resolve_blocks: options.resolve_blocks,
                paragraph_break: options.paragraph_break,
            },
        })
    }

    #[instrument(level = "info", skip_all, fields(pages = pages.len()))]
    pub fn predict(&mut self, pages: &[DynamicImage]) -> Result<Document> {
        let boxes = self.detector.predict(pages)?;

        let crops: Vec<DynamicImage> = pages
            .iter()
            .zip(&boxes)
            .flat_map(|(page, boxes)| boxes.iter().map(move |b| crop(page, b)))
            .collect();
        let mut texts = self.recognizer.predict(&crops)?.into_iter();

        let pages = pages
            .iter()
            .zip(&boxes)
            .map(|(page, boxes)| {
                let (width, height) = page.dimensions();
                let words = boxes
                    .iter()
                    .zip(&mut texts)
                    .map(|(b, (value, confidence))| Word::new(value, confidence, b.geometry(), b.score))
                    .collect();
                ((height, width), words)
            })
            .collect();

        Ok(self.builder.build(pages))
    }
}

/// Shorthand for [`OcrPredictor::load`].
pub async fn ocr_predictor(
    det_arch: &str,
    reco_arch: &str,
    options: PredictorOptions,
) -> Result<OcrPredictor> {
    OcrPredictor::load(det_arch, reco_arch, options).await
}

/// Cuts a detected box out of the page, at least one pixel on each side.
fn crop(page: &DynamicImage, b: &DetectedBox) -> DynamicImage {
    let (width, height) = page.dimensions();
    let start = |v: f32, size: u32| ((v * size as f32).round() as u32).min(size.saturating_sub(1));
    let end = |v: f32, size: u32| ((v * size as f32).round() as u32).min(size);

    let x0 = start(b.xmin, width);
    let y0 = start(b.ymin, height);
    let x1 = end(b.xmax, width).max(x0 + 1);
    let y1 = end(b.ymax, height).max(y0 + 1);

    page.crop_imm(x0, y0, x1 - x0, y1 - y0)
}

/// Loads documents from disk, one page per image.
pub struct DocumentFile;

impl DocumentFile {
    pub fn from_images<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<DynamicImage>> {
        paths
            .iter()
            .map(|path| {
                let path = path.as_ref();
                image::open(path).with_context(|| format!("failed to open image {}", path.display()))
            })
            .collect()
    }
}
