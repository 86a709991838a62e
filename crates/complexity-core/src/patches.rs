//! Sliding-window patch extraction
//!
//! Windows of `size × size` are placed every `stride` pixels along both spatial
//! axes, row-major. Windows that would cross the right or bottom border are
//! dropped, so an axis of length `n` yields `(n - size) / stride + 1` positions.

use crate::error::{ComplexityError, Result};
use ndarray::{s, ArrayView3, ArrayView4, Axis};
use serde::{Deserialize, Serialize};

/// Patch geometry shared by all metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchConfig {
    /// Side length of the square window
    pub size: usize,
    /// Step between neighboring windows
    pub stride: usize,
}

impl PatchConfig {
    /// Create a patch configuration, rejecting zero sizes or strides
    pub fn new(size: usize, stride: usize) -> Result<Self> {
        if size == 0 {
            return Err(ComplexityError::InvalidConfig(
                "patch size must be positive".to_string(),
            ));
        }
        if stride == 0 {
            return Err(ComplexityError::InvalidConfig(
                "patch stride must be positive".to_string(),
            ));
        }
        Ok(Self { size, stride })
    }

    /// Build from optional CLI-style arguments; stride defaults to size
    pub fn from_options(size: Option<usize>, stride: Option<usize>) -> Result<Option<Self>> {
        match (size, stride) {
            (Some(size), stride) => Self::new(size, stride.unwrap_or(size)).map(Some),
            (None, Some(_)) => Err(ComplexityError::InvalidConfig(
                "patch stride given without a patch size".to_string(),
            )),
            (None, None) => Ok(None),
        }
    }

    /// Number of windows along an axis of the given length
    #[must_use]
    pub fn count_along(&self, len: usize) -> usize {
        if len < self.size {
            0
        } else {
            (len - self.size) / self.stride + 1
        }
    }

    /// Number of windows for an image of `height × width`
    #[must_use]
    pub fn count(&self, height: usize, width: usize) -> usize {
        self.count_along(height) * self.count_along(width)
    }
}

/// Extract the patches of a single `(C, H, W)` image
///
/// Returned views borrow from `image`.
pub fn extract_image_patches<'a>(
    image: ArrayView3<'a, f32>,
    config: PatchConfig,
) -> Result<Vec<ArrayView3<'a, f32>>> {
    let (_, height, width) = image.dim();
    if config.size > height.min(width) {
        return Err(ComplexityError::PatchTooLarge {
            size: config.size,
            height,
            width,
        });
    }

    let rows = config.count_along(height);
    let cols = config.count_along(width);
    let mut patches = Vec::with_capacity(rows * cols);

    for r in 0..rows {
        let y = r * config.stride;
        for c in 0..cols {
            let x = c * config.stride;
            patches.push(image.slice_move(s![.., y..y + config.size, x..x + config.size]));
        }
    }

    Ok(patches)
}

/// Extract patches for every image of an `(N, C, H, W)` batch
pub fn extract_patches<'a>(
    batch: ArrayView4<'a, f32>,
    config: PatchConfig,
) -> Result<Vec<Vec<ArrayView3<'a, f32>>>> {
    (0..batch.len_of(Axis(0)))
        .map(|i| extract_image_patches(batch.index_axis_move(Axis(0), i), config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, Array4};
    use proptest::prelude::*;

    #[test]
    fn test_non_overlapping_grid() {
        let image = Array3::<f32>::zeros((3, 64, 64));
        let patches = extract_image_patches(image.view(), PatchConfig::new(32, 32).unwrap()).unwrap();

        assert_eq!(patches.len(), 4);
        assert!(patches.iter().all(|p| p.dim() == (3, 32, 32)));
    }

    #[test]
    fn test_border_windows_dropped() {
        let image = Array3::<f32>::zeros((1, 10, 7));
        let patches = extract_image_patches(image.view(), PatchConfig::new(4, 3).unwrap()).unwrap();

        // rows: 0,3,6 ; cols: 0,3
        assert_eq!(patches.len(), 3 * 2);
    }

    #[test]
    fn test_row_major_order() {
        let image = Array3::from_shape_fn((1, 4, 4), |(_, y, x)| (y * 4 + x) as f32);
        let patches = extract_image_patches(image.view(), PatchConfig::new(2, 2).unwrap()).unwrap();

        let corners: Vec<f32> = patches.iter().map(|p| p[[0, 0, 0]]).collect();
        assert_eq!(corners, vec![0.0, 2.0, 8.0, 10.0]);
    }

    #[test]
    fn test_overlapping_stride() {
        let image = Array3::<f32>::zeros((3, 8, 8));
        let patches = extract_image_patches(image.view(), PatchConfig::new(4, 2).unwrap()).unwrap();
        assert_eq!(patches.len(), 9);
    }

    #[test]
    fn test_patch_too_large() {
        let image = Array3::<f32>::zeros((3, 16, 64));
        let err = extract_image_patches(image.view(), PatchConfig::new(32, 32).unwrap()).unwrap_err();
        assert!(matches!(
            err,
            ComplexityError::PatchTooLarge {
                size: 32,
                height: 16,
                width: 64
            }
        ));
    }

    #[test]
    fn test_zero_parameters_rejected() {
        assert!(PatchConfig::new(0, 1).is_err());
        assert!(PatchConfig::new(4, 0).is_err());
        assert!(PatchConfig::from_options(None, Some(4)).is_err());
        assert_eq!(
            PatchConfig::from_options(Some(16), None).unwrap(),
            Some(PatchConfig { size: 16, stride: 16 })
        );
    }

    #[test]
    fn test_batched_extraction() {
        let batch = Array4::from_shape_fn((2, 3, 32, 32), |(n, _, _, _)| n as f32);
        let patches = extract_patches(batch.view(), PatchConfig::new(16, 8).unwrap()).unwrap();

        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].len(), 9);
        assert_eq!(patches[1].len(), 9);
        // Each image's patches view that image
        assert!(patches[0].iter().all(|p| p.iter().all(|&v| v == 0.0)));
        assert!(patches[1].iter().all(|p| p.iter().all(|&v| v == 1.0)));
    }

    proptest! {
        #[test]
        fn proptest_patch_count_matches_formula(
            height in 1usize..40,
            width in 1usize..40,
            size in 1usize..12,
            stride in 1usize..6,
        ) {
            prop_assume!(size <= height.min(width));
            let image = Array3::<f32>::zeros((1, height, width));
            let config = PatchConfig::new(size, stride).unwrap();
            let patches = extract_image_patches(image.view(), config).unwrap();

            prop_assert_eq!(patches.len(), config.count(height, width));
            prop_assert!(patches.iter().all(|p| p.dim() == (1, size, size)));
        }
    }
}
