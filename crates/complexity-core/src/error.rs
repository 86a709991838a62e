//! Error types for complexity computation

use complexity_common::{ImageError, ProcessingError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComplexityError {
    #[error("No matching complexity metric for {0:?} (expected jpeg_<quality>, variance or meaningful)")]
    UnknownMetric(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Patch size {size} exceeds image dimensions {height}x{width}")]
    PatchTooLarge {
        size: usize,
        height: usize,
        width: usize,
    },

    #[error("JPEG encoding failed: {0}")]
    Encode(String),

    #[error("Complexity estimator failed: {0}")]
    Estimator(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Data loader error: {0}")]
    Loader(String),

    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ComplexityError>;
