//! Local-variance complexity
//!
//! The patch is converted to grayscale and a local variance map is computed as
//! `E[X²] - E[X]²` with a box filter of `neighborhood_size`. The map's sum is the
//! raw score, so the area-normalized score is the mean local variance.
//!
//! The box filter follows the `convolve` convention for even sizes: a window of
//! size `n` covers offsets `-(n - 1) / 2 ..= n / 2`. Borders use half-sample
//! symmetric reflection (`d c b a | a b c d | d c b a`).

use crate::error::Result;
use crate::metric::ComplexityMetric;
use crate::patches::PatchConfig;
use ndarray::{Array2, ArrayView3};
use serde::{Deserialize, Serialize};

/// Default box-filter neighborhood
pub const DEFAULT_NEIGHBORHOOD: usize = 8;

/// BT.601 luma weights for R, G, B
const LUMA: [f64; 3] = [0.299, 0.587, 0.114];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceParams {
    pub neighborhood_size: usize,
}

impl Default for VarianceParams {
    fn default() -> Self {
        Self {
            neighborhood_size: DEFAULT_NEIGHBORHOOD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VarianceComplexity {
    pub params: VarianceParams,
    pub patching: Option<PatchConfig>,
    pub num_workers: usize,
}

impl VarianceComplexity {
    pub fn new(neighborhood_size: usize, patching: Option<PatchConfig>, num_workers: usize) -> Self {
        Self {
            params: VarianceParams { neighborhood_size },
            patching,
            num_workers,
        }
    }
}

impl ComplexityMetric for VarianceComplexity {
    fn name(&self) -> String {
        "variance".to_string()
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
        let gray = to_grayscale(patch);
        let map = local_variance(&gray, self.params.neighborhood_size);
        Ok(map.sum())
    }
}

/// Grayscale plane of a CHW patch; single-channel input is used as-is
pub fn to_grayscale(patch: ArrayView3<f32>) -> Array2<f64> {
    let (channels, height, width) = patch.dim();
    Array2::from_shape_fn((height, width), |(y, x)| {
        if channels >= 3 {
            (0..3).map(|c| LUMA[c] * f64::from(patch[[c, y, x]])).sum()
        } else {
            f64::from(patch[[0, y, x]])
        }
    })
}

/// Local variance map of a grayscale plane
///
/// Samples are shifted by the first value before squaring, which leaves the
/// variance unchanged and makes a uniform plane produce exact zeros. Negative
/// round-off is clamped to zero. A neighborhood of zero is treated as one.
pub fn local_variance(gray: &Array2<f64>, neighborhood_size: usize) -> Array2<f64> {
    let size = neighborhood_size.max(1);
    let Some(&reference) = gray.iter().next() else {
        return gray.clone();
    };

    let shifted = gray.mapv(|v| v - reference);
    let squared = shifted.mapv(|v| v * v);

    let mean = box_filter(&shifted, size);
    let mean_sq = box_filter(&squared, size);

    let mut variance = mean_sq - mean.mapv(|m| m * m);
    variance.mapv_inplace(|v| v.max(0.0));
    variance
}

/// Separable box mean with reflective borders
fn box_filter(input: &Array2<f64>, size: usize) -> Array2<f64> {
    let (height, width) = input.dim();
    let lo = (size as isize - 1) / 2;
    let hi = size as isize / 2;
    let norm = size as f64;

    let mut rows = Array2::<f64>::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for dx in -lo..=hi {
                acc += input[[y, reflect(x as isize + dx, width)]];
            }
            rows[[y, x]] = acc / norm;
        }
    }

    let mut out = Array2::<f64>::zeros((height, width));
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for dy in -lo..=hi {
                acc += rows[[reflect(y as isize + dy, height), x]];
            }
            out[[y, x]] = acc / norm;
        }
    }

    out
}

/// Half-sample symmetric index reflection
fn reflect(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let m = index.rem_euclid(period);
    if m < len {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}
