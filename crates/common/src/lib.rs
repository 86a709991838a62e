//! Common types and utilities for image complexity processing

pub mod dataset;
pub mod image_io;

use ndarray::Array3;
use thiserror::Error;

pub use dataset::{ImageDataset, IMAGE_EXTENSIONS};
pub use image_io::{load_tensor, tensor_to_u8, ImageError};

/// Decoded image in `(channels, height, width)` layout with values in `[0, 1]`
pub type ImageTensor = Array3<f32>;

/// Processing errors
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Not an image file or directory: {0}")]
    NotFound(String),

    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    #[error("Index {index} out of range for dataset of {len} images")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    ImageError(String),
}

impl From<image::ImageError> for ProcessingError {
    fn from(err: image::ImageError) -> Self {
        ProcessingError::ImageError(err.to_string())
    }
}

impl From<ImageError> for ProcessingError {
    fn from(err: ImageError) -> Self {
        ProcessingError::ImageError(err.to_string())
    }
}

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_error_conversion() {
        let err: ProcessingError = ImageError::DecodeError("bad header".to_string()).into();
        assert!(err.to_string().contains("bad header"));
    }
}
