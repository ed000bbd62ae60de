mod session;

pub mod arch;
pub mod builder;
pub mod detection;
pub mod document;
pub mod hub;
pub mod predictor;
pub mod preprocess;
pub mod recognition;

pub use arch::{DetectionArch, RecognitionArch};
pub use document::{Block, Document, Geometry, Line, Page, Word};
pub use lector_core::hf_hub::{set_cache_dir, set_endpoint};
pub use predictor::{DocumentFile, OcrPredictor, PredictorOptions, ocr_predictor};

pub const DEFAULT_DET_ARCH: &str = "db_resnet50";
pub const DEFAULT_RECO_ARCH: &str = "crnn_vgg16_bn";
