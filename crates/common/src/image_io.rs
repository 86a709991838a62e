//! Image loading and tensor conversion
//!
//! Decoding goes through the `image` crate; every image is normalized to RGB and
//! stored as a `(3, height, width)` `f32` tensor in `[0, 1]`, matching the layout
//! the complexity metrics consume.

use crate::ImageTensor;
use image::RgbImage;
use ndarray::{Array3, ArrayView3};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during image I/O operations
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Failed to read image file: {0}")]
    ReadError(String),

    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Unsupported tensor shape: {0}")]
    UnsupportedShape(String),
}

/// Load an image from a file path into an RGB tensor
///
/// The format is sniffed from the file contents, falling back to the extension.
///
/// # Example
/// ```no_run
/// use complexity_common::image_io::load_tensor;
/// let tensor = load_tensor("photo.png")?;
/// assert_eq!(tensor.dim().0, 3);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn load_tensor<P: AsRef<Path>>(path: P) -> Result<ImageTensor, ImageError> {
    let rgb = load_rgb(path)?;
    Ok(rgb_to_tensor(&rgb))
}

/// Load an image from a file path as 8-bit RGB
pub fn load_rgb<P: AsRef<Path>>(path: P) -> Result<RgbImage, ImageError> {
    let path = path.as_ref();

    let data = fs::read(path)
        .map_err(|e| ImageError::ReadError(format!("{}: {e}", path.display())))?;

    let img = match image::guess_format(&data) {
        Ok(format) => image::load_from_memory_with_format(&data, format),
        Err(_) => image::open(path),
    }
    .map_err(|e| ImageError::DecodeError(format!("{}: {e}", path.display())))?;

    Ok(img.to_rgb8())
}

/// Convert an RGB image into a CHW tensor in `[0, 1]`
#[must_use]
pub fn rgb_to_tensor(image: &RgbImage) -> ImageTensor {
    let (width, height) = image.dimensions();
    let mut tensor = Array3::<f32>::zeros((3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[c, y as usize, x as usize]] = f32::from(pixel[c]) / 255.0;
        }
    }

    tensor
}

/// Convert a CHW float tensor into interleaved 8-bit samples
///
/// Scaling uses `255.999` with truncation so that `1.0` maps to 255 and every
/// 8-bit bucket has equal width.
pub fn tensor_to_u8(tensor: ArrayView3<f32>) -> Result<Vec<u8>, ImageError> {
    let (channels, height, width) = tensor.dim();
    if channels != 1 && channels != 3 {
        return Err(ImageError::UnsupportedShape(format!(
            "expected 1 or 3 channels, got {channels}"
        )));
    }

    let mut out = Vec::with_capacity(channels * height * width);
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                let v = tensor[[c, y, x]] * 255.999;
                out.push(v.clamp(0.0, 255.0) as u8);
            }
        }
    }

    Ok(out)
}
