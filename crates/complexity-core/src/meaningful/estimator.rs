//! Multi-scale MDL clustering estimator
//!
//! At every scale the patch's pixels are clustered in a low-dimensional colour
//! space and the number of clusters is chosen by minimum description length:
//!
//! ```text
//! bits(k) = model bits (k Gaussians) + label bits (which pixel is in which cluster)
//!         + residual bits (pixel values given their cluster)
//! ```
//!
//! The complexity of a scale is the label cost of the winning clustering,
//! extrapolated from the subsample to all pixels. A single cluster costs nothing
//! to label, so structureless input scores zero.

use super::cluster::{fit, log_gaussian, ClusterModel, Clustering};
use crate::error::{ComplexityError, Result};
use ndarray::{Array2, Array3, ArrayView3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Quantization step of pixel values (8-bit input)
const PIXEL_PRECISION: f64 = 1.0 / 256.0;

/// Power-iteration steps per principal component
const POWER_ITERATIONS: usize = 100;

/// Opaque complexity estimator consulted for non-uniform patches
pub trait ComplexityEstimator: Send + Sync {
    /// Stable identifier, part of the cache key
    fn id(&self) -> String;

    /// Parameters that determine the output, part of the cache key
    fn params(&self) -> Result<serde_json::Value>;

    /// Complexity of a `(C, H, W)` patch, one value per scale
    fn estimate(&self, patch: ArrayView3<f32>) -> Result<Vec<f64>>;
}

/// Estimator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeaningfulParams {
    /// Largest cluster count tried per scale
    pub ncs_to_check: usize,
    /// K-means restarts per cluster count
    pub n_cluster_inits: usize,
    /// Feature dimensions kept after PCA
    pub nz: usize,
    /// Number of scales (each halves the resolution)
    pub num_levels: usize,
    pub cluster_model: ClusterModel,
    /// Fraction of pixels used for clustering
    pub info_subsample: f64,
    /// Seed for subsampling and cluster initialization
    pub seed: u64,
}

impl Default for MeaningfulParams {
    fn default() -> Self {
        Self {
            ncs_to_check: 8,
            n_cluster_inits: 1,
            nz: 2,
            num_levels: 4,
            cluster_model: ClusterModel::Gmm,
            info_subsample: 0.3,
            seed: 0,
        }
    }
}

impl MeaningfulParams {
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(ComplexityError::InvalidConfig(msg.to_string()));

        if self.ncs_to_check == 0 {
            return fail("ncs_to_check must be at least 1");
        }
        if self.nz == 0 {
            return fail("nz must be at least 1");
        }
        if self.num_levels == 0 {
            return fail("num_levels must be at least 1");
        }
        if !(self.info_subsample > 0.0 && self.info_subsample <= 1.0) {
            return fail("info_subsample must be in (0, 1]");
        }
        Ok(())
    }
}

/// Default estimator: multi-scale clustering with MDL model selection
#[derive(Debug, Clone)]
pub struct MdlClusterEstimator {
    params: MeaningfulParams,
}

impl MdlClusterEstimator {
    pub fn new(params: MeaningfulParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn settings(&self) -> &MeaningfulParams {
        &self.params
    }

    /// Label bits of the MDL-optimal clustering of one scale
    fn level_complexity(&self, image: &Array3<f64>, rng: &mut StdRng) -> f64 {
        let features = pixel_features(image);
        let total = features.len();
        if total < 2 {
            return 0.0;
        }

        let Some(projected) = project(&features, self.params.nz) else {
            return 0.0;
        };

        let sample_size = ((total as f64 * self.params.info_subsample).ceil() as usize).clamp(2, total);
        let points: Vec<Vec<f64>> = if sample_size < total {
            let mut idx = rand::seq::index::sample(rng, total, sample_size).into_vec();
            idx.sort_unstable();
            idx.into_iter().map(|i| projected[i].clone()).collect()
        } else {
            projected
        };

        let mut best: Option<(f64, f64, usize)> = None;
        for k in 1..=self.params.ncs_to_check.min(points.len()) {
            let clustering = fit(
                &points,
                k,
                self.params.cluster_model,
                self.params.n_cluster_inits,
                rng,
            );
            let (label_bits, total_bits) = description_length(&points, &clustering);
            trace!("k={} label_bits={:.1} total_bits={:.1}", k, label_bits, total_bits);

            if best.map_or(true, |(_, bits, _)| total_bits < bits) {
                best = Some((label_bits, total_bits, k));
            }
        }

        best.map_or(0.0, |(label_bits, _, _)| {
            label_bits * total as f64 / points.len() as f64
        })
    }
}

impl ComplexityEstimator for MdlClusterEstimator {
    fn id(&self) -> String {
        "mdl-cluster".to_string()
    }

    fn params(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(&self.params)?)
    }

    fn estimate(&self, patch: ArrayView3<f32>) -> Result<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let mut image = patch.mapv(f64::from);
        let mut levels = Vec::with_capacity(self.params.num_levels);

        for level in 0..self.params.num_levels {
            if level > 0 {
                let (_, height, width) = image.dim();
                if height < 2 || width < 2 {
                    break;
                }
                image = average_pool(&image);
            }
            levels.push(self.level_complexity(&image, &mut rng));
        }

        Ok(levels)
    }
}

/// Returns `(label bits, total bits)` for a clustering of `points`
fn description_length(points: &[Vec<f64>], clustering: &Clustering) -> (f64, f64) {
    let n = points.len() as f64;
    let dim = points.first().map_or(0, Vec::len) as f64;
    let occupied = clustering.occupied() as f64;

    // Each mean, variance and weight costs half a log2(n) bits
    let model_bits = occupied * (2.0 * dim + 1.0) * 0.5 * n.log2();

    let label_bits: f64 = clustering
        .counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let c = c as f64;
            c * (n / c).log2()
        })
        .sum();

    let precision_bits = -PIXEL_PRECISION.log2() * dim;
    let residual_bits: f64 = points
        .iter()
        .zip(&clustering.labels)
        .map(|(p, &label)| {
            let log_density = log_gaussian(p, &clustering.means[label], &clustering.variances[label]);
            (-log_density / std::f64::consts::LN_2 + precision_bits).max(0.0)
        })
        .sum();

    (label_bits, model_bits + label_bits + residual_bits)
}

/// One feature vector (channel values) per pixel, row-major
fn pixel_features(image: &Array3<f64>) -> Vec<Vec<f64>> {
    let (channels, height, width) = image.dim();
    let mut features = Vec::with_capacity(height * width);
    for y in 0..height {
        for x in 0..width {
            features.push((0..channels).map(|c| image[[c, y, x]]).collect());
        }
    }
    features
}

/// 2×2 average pooling, odd trailing rows/columns dropped
fn average_pool(image: &Array3<f64>) -> Array3<f64> {
    let (channels, height, width) = image.dim();
    Array3::from_shape_fn((channels, height / 2, width / 2), |(c, y, x)| {
        let (y0, x0) = (2 * y, 2 * x);
        (image[[c, y0, x0]] + image[[c, y0 + 1, x0]] + image[[c, y0, x0 + 1]] + image[[c, y0 + 1, x0 + 1]])
            / 4.0
    })
}

/// Center features and project onto the top `nz` principal components
///
/// Returns `None` when the features have no variance at all.
fn project(features: &[Vec<f64>], nz: usize) -> Option<Vec<Vec<f64>>> {
    let n = features.len() as f64;
    let dim = features.first()?.len();

    let mut mean = vec![0.0; dim];
    for f in features {
        for (m, &v) in mean.iter_mut().zip(f) {
            *m += v / n;
        }
    }

    let mut cov = Array2::<f64>::zeros((dim, dim));
    for f in features {
        for i in 0..dim {
            for j in 0..dim {
                cov[[i, j]] += (f[i] - mean[i]) * (f[j] - mean[j]) / n;
            }
        }
    }

    let components = principal_components(cov, nz.min(dim));
    if components.is_empty() {
        return None;
    }

    Some(
        features
            .iter()
            .map(|f| {
                components
                    .iter()
                    .map(|axis| axis.iter().zip(f).zip(&mean).map(|((a, v), m)| a * (v - m)).sum())
                    .collect()
            })
            .collect(),
    )
}

/// Top eigenvectors of a symmetric PSD matrix by power iteration with deflation
fn principal_components(mut cov: Array2<f64>, count: usize) -> Vec<Vec<f64>> {
    let dim = cov.nrows();
    let mut components = Vec::with_capacity(count);

    for _ in 0..count {
        // Start from the column with the largest norm
        let start = (0..dim)
            .map(|j| (j, cov.column(j).iter().map(|v| v * v).sum::<f64>()))
            .fold((0, 0.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if start.1 <= f64::EPSILON {
            break;
        }

        let mut v: Vec<f64> = cov.column(start.0).to_vec();
        normalize(&mut v);
        for _ in 0..POWER_ITERATIONS {
            let mut next: Vec<f64> = (0..dim)
                .map(|i| (0..dim).map(|j| cov[[i, j]] * v[j]).sum())
                .collect();
            if normalize(&mut next) <= f64::EPSILON {
                break;
            }
            v = next;
        }

        let lambda: f64 = (0..dim)
            .map(|i| v[i] * (0..dim).map(|j| cov[[i, j]] * v[j]).sum::<f64>())
            .sum();
        if lambda <= f64::EPSILON {
            break;
        }

        for i in 0..dim {
            for j in 0..dim {
                cov[[i, j]] -= lambda * v[i] * v[j];
            }
        }
        components.push(v);
    }

    components
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    norm
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> MdlClusterEstimator {
        MdlClusterEstimator::new(MeaningfulParams::default()).unwrap()
    }

    fn halves(size: usize) -> Array3<f32> {
        Array3::from_shape_fn((3, size, size), |(c, _, x)| {
            if x < size / 2 {
                0.1 * c as f32
            } else {
                0.9
            }
        })
    }

    #[test]
    fn test_default_params_match_reference_configuration() {
        let params = MeaningfulParams::default();
        assert_eq!(params.ncs_to_check, 8);
        assert_eq!(params.n_cluster_inits, 1);
        assert_eq!(params.nz, 2);
        assert_eq!(params.num_levels, 4);
        assert_eq!(params.cluster_model, ClusterModel::Gmm);
        assert_eq!(params.info_subsample, 0.3);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let bad = MeaningfulParams {
            info_subsample: 0.0,
            ..MeaningfulParams::default()
        };
        assert!(MdlClusterEstimator::new(bad).is_err());

        let bad = MeaningfulParams {
            ncs_to_check: 0,
            ..MeaningfulParams::default()
        };
        assert!(MdlClusterEstimator::new(bad).is_err());
    }

    #[test]
    fn test_two_region_patch_has_structure() {
        let levels = estimator().estimate(halves(32).view()).unwrap();

        assert_eq!(levels.len(), 4);
        assert!(levels[0] > 0.0);
        assert!(levels.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let patch = Array3::from_shape_fn((3, 24, 24), |(c, y, x)| ((x * 7 + y * 3 + c) % 11) as f32 / 11.0);
        let a = estimator().estimate(patch.view()).unwrap();
        let b = estimator().estimate(patch.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_tiny_patch_stops_early() {
        let patch = Array3::from_shape_fn((3, 3, 3), |(_, y, x)| (x + y) as f32 / 4.0);
        let levels = estimator().estimate(patch.view()).unwrap();
        assert_eq!(levels.len(), 2);
    }

    #[test]
    fn test_single_cluster_label_bits_are_positive_zero() {
        let points: Vec<Vec<f64>> = (0..32).map(|i| vec![(i % 4) as f64 * 0.01]).collect();
        let clustering = fit(&points, 1, ClusterModel::KMeans, 1, &mut StdRng::seed_from_u64(0));
        let (label_bits, total_bits) = description_length(&points, &clustering);

        assert_eq!(label_bits, 0.0);
        assert!(label_bits.is_sign_positive());
        assert!(total_bits > 0.0);
    }

    #[test]
    fn test_label_bits_for_even_split() {
        let points: Vec<Vec<f64>> = (0..16).map(|i| vec![if i < 8 { 0.0 } else { 1.0 }]).collect();
        let clustering = fit(&points, 2, ClusterModel::KMeans, 1, &mut StdRng::seed_from_u64(0));
        let (label_bits, _) = description_length(&points, &clustering);

        // One bit per point
        assert!((label_bits - 16.0).abs() < 1e-9);
    }

    #[test]
    fn test_average_pool() {
        let image = Array3::from_shape_fn((1, 4, 5), |(_, y, x)| (y * 5 + x) as f64);
        let pooled = average_pool(&image);

        assert_eq!(pooled.dim(), (1, 2, 2));
        assert_eq!(pooled[[0, 0, 0]], (0.0 + 1.0 + 5.0 + 6.0) / 4.0);
    }

    #[test]
    fn test_principal_component_direction() {
        // Points spread along (1, 1)
        let features: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, i as f64]).collect();
        let projected = project(&features, 1).unwrap();

        assert_eq!(projected[0].len(), 1);
        let spread = projected[9][0] - projected[0][0];
        assert!((spread.abs() - 9.0 * 2f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_constant_features_have_no_projection() {
        let features = vec![vec![0.5, 0.5, 0.5]; 16];
        assert!(project(&features, 2).is_none());
    }
}
