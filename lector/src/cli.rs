use std::path::PathBuf;

use clap::{
    ArgAction, Parser,
    builder::{OsStringValueParser, TypedValueParser},
};

#[derive(Debug, Parser)]
#[command(
    name = "lector",
    version,
    about = "Run OCR on an image path (relative or absolute). Prints text, optional JSON export."
)]
pub struct Cli {
    #[arg(
        value_name = "IMAGE_PATH",
        value_parser = OsStringValueParser::new().map(PathBuf::from),
        help = "Path to an image file (relative or absolute)"
    )]
    pub image_path: PathBuf,

    #[arg(
        long,
        value_name = "PATH",
        value_parser = OsStringValueParser::new().map(PathBuf::from),
        help = "Write the exported OCR result as JSON to this path (empty for none)"
    )]
    pub json_out: Option<PathBuf>,

    #[arg(
        long,
        value_name = "NAME",
        help = "Detection architecture [default: db_resnet50]"
    )]
    pub det_arch: Option<String>,

    #[arg(
        long,
        value_name = "NAME",
        help = "Recognition architecture [default: crnn_vgg16_bn]"
    )]
    pub reco_arch: Option<String>,

    #[arg(
        long,
        help = "Do not print extracted text; useful if you only want JSON",
        default_value_t = false
    )]
    pub no_text: bool,

    #[arg(
        long,
        value_name = "FILE",
        env = "LECTOR_CONFIG",
        help = "Configuration file (TOML)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        env = "LECTOR_MODEL_DIR",
        help = "Directory holding <arch>.onnx models, searched before downloading"
    )]
    pub model_dir: Option<PathBuf>,

    #[arg(
        long,
        value_name = "DIR",
        env = "LECTOR_CACHE_DIR",
        help = "Where downloaded models are cached"
    )]
    pub cache_dir: Option<PathBuf>,

    #[arg(long, value_name = "N", help = "Inference threads [default: physical cores]")]
    pub threads: Option<usize>,

    #[arg(
        long,
        help = "Split lines into blocks on large vertical gaps",
        default_value_t = false
    )]
    pub resolve_blocks: bool,

    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity (-v info, -vv debug)"
    )]
    pub verbose: u8,
}
