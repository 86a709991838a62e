//! JPEG-size complexity
//!
//! JPEG spends more bits on busy regions, so the encoded size of a patch at a
//! fixed quality is a cheap complexity proxy. Encoding uses mozjpeg.

use crate::error::{ComplexityError, Result};
use crate::metric::ComplexityMetric;
use crate::patches::PatchConfig;
use complexity_common::tensor_to_u8;
use ndarray::ArrayView3;
use serde::{Deserialize, Serialize};

/// Default JPEG quality
pub const DEFAULT_QUALITY: u8 = 50;

/// Parameters that determine JPEG scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JpegParams {
    /// Encoder quality (1-100)
    pub quality: u8,
}

impl Default for JpegParams {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JpegComplexity {
    pub params: JpegParams,
    pub patching: Option<PatchConfig>,
    pub num_workers: usize,
}

impl JpegComplexity {
    pub fn new(quality: u8, patching: Option<PatchConfig>, num_workers: usize) -> Result<Self> {
        if !(1..=100).contains(&quality) {
            return Err(ComplexityError::InvalidConfig(format!(
                "JPEG quality must be within 1-100, got {quality}"
            )));
        }
        Ok(Self {
            params: JpegParams { quality },
            patching,
            num_workers,
        })
    }

    pub fn quality(&self) -> u8 {
        self.params.quality
    }
}

impl ComplexityMetric for JpegComplexity {
    fn name(&self) -> String {
        format!("jpeg_{}", self.params.quality)
    }

    fn patching(&self) -> Option<PatchConfig> {
        self.patching
    }

    fn num_workers(&self) -> usize {
        self.num_workers
    }

    fn cache_params(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self.params)?)
    }

    fn raw_score(&self, patch: ArrayView3<f32>) -> Result<f64> {
        Ok(encoded_size(patch, self.params.quality)? as f64)
    }
}

/// Number of bytes mozjpeg produces for `patch` at `quality`
pub fn encoded_size(patch: ArrayView3<f32>, quality: u8) -> Result<usize> {
    Ok(encode_jpeg(patch, quality)?.len())
}

/// Encode a 1- or 3-channel CHW patch as JPEG
pub fn encode_jpeg(patch: ArrayView3<f32>, quality: u8) -> Result<Vec<u8>> {
    let (channels, height, width) = patch.dim();
    let color_space = match channels {
        1 => mozjpeg::ColorSpace::JCS_GRAYSCALE,
        3 => mozjpeg::ColorSpace::JCS_RGB,
        other => {
            return Err(ComplexityError::Encode(format!(
                "cannot encode {other}-channel patch"
            )))
        }
    };
    let pixels = tensor_to_u8(patch)?;

    let mut comp = mozjpeg::Compress::new(color_space);
    comp.set_size(width, height);
    comp.set_quality(f32::from(quality.clamp(1, 100)));

    let mut started = comp
        .start_compress(Vec::new())
        .map_err(|e| ComplexityError::Encode(format!("failed to start compression: {e}")))?;

    started
        .write_scanlines(&pixels)
        .map_err(|e| ComplexityError::Encode(format!("failed to write scanlines: {e}")))?;

    started
        .finish()
        .map_err(|e| ComplexityError::Encode(format!("failed to finish compression: {e}")))
}
