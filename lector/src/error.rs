use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Not a file: {}", .0.display())]
    NotAFile(PathBuf),

    #[error("OCR failed: {0:#}")]
    Ocr(#[from] anyhow::Error),
}

impl AppError {
    /// Invalid input paths exit with 2, every other failure with 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::FileNotFound(_) | AppError::NotAFile(_) => 2,
            AppError::Ocr(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
