//! Metric dispatch and the cached compute entry point

use crate::cache::{dataset_fingerprint, CacheKey, ResultCache};
use crate::error::{ComplexityError, Result};
use crate::jpeg::JpegComplexity;
use crate::meaningful::{MeaningfulComplexity, MeaningfulParams};
use crate::metric::{score_dataset, ComplexityMetric, ComplexityResult};
use crate::patches::PatchConfig;
use crate::variance::{VarianceComplexity, DEFAULT_NEIGHBORHOOD};
use complexity_common::ImageDataset;
use ndarray::ArrayView3;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Everything besides the metric name that shapes a metric
#[derive(Debug, Clone)]
pub struct MetricOptions {
    pub patching: Option<PatchConfig>,
    pub num_workers: usize,
    pub neighborhood_size: usize,
    pub meaningful: MeaningfulParams,
}

impl Default for MetricOptions {
    fn default() -> Self {
        Self {
            patching: None,
            num_workers: 0,
            neighborhood_size: DEFAULT_NEIGHBORHOOD,
            meaningful: MeaningfulParams::default(),
        }
    }
}

/// One of the supported complexity backends
#[derive(Debug, Clone)]
pub enum Complexity {
    Jpeg(JpegComplexity),
    Variance(VarianceComplexity),
    Meaningful(MeaningfulComplexity),
}

/// Semantic parameters hashed into the cache key
#[derive(Serialize)]
struct KeyParams<'a> {
    metric: &'a str,
    patching: Option<PatchConfig>,
    params: serde_json::Value,
}

impl Complexity {
    /// Build a metric from its configuration string
    ///
    /// Accepts `jpeg_<quality>`, `variance` and `meaningful`.
    pub fn from_name(config: &str, options: &MetricOptions) -> Result<Self> {
        if let Some(quality) = config.strip_prefix("jpeg_") {
            let quality: u8 = quality.parse().map_err(|_| {
                ComplexityError::InvalidConfig(format!("invalid JPEG quality in {config:?}"))
            })?;
            return Ok(Self::Jpeg(JpegComplexity::new(
                quality,
                options.patching,
                options.num_workers,
            )?));
        }

        match config {
            "variance" => Ok(Self::Variance(VarianceComplexity::new(
                options.neighborhood_size,
                options.patching,
                options.num_workers,
            ))),
            "meaningful" => Ok(Self::Meaningful(MeaningfulComplexity::new(
                options.meaningful.clone(),
                options.patching,
                options.num_workers,
            )?)),
            other => Err(ComplexityError::UnknownMetric(other.to_string())),
        }
    }

    fn inner(&self) -> &dyn ComplexityMetric {
        match self {
            Self::Jpeg(m) => m,
            Self::Variance(m) => m,
            Self::Meaningful(m) => m,
        }
    }

    /// Score `dataset`, reusing a cached table when one exists for the same
    /// dataset contents and parameters
    pub fn compute(&self, dataset: &ImageDataset, cache: &ResultCache) -> Result<ComplexityResult> {
        let name = self.name();

        let fingerprint = if cache.root().is_some() {
            dataset_fingerprint(dataset)?
        } else {
            String::new()
        };
        let key = CacheKey::new(
            name.clone(),
            fingerprint,
            &KeyParams {
                metric: &name,
                patching: self.patching(),
                params: self.cache_params()?,
            },
        )?;

        let table = cache.get_or_compute(&key, || score_dataset(self, dataset))?;
        info!("{}: {} images scored", name, table.num_rows());

        Ok(ComplexityResult {
            scores: BTreeMap::from([(name, table)]),
            files: dataset.file_names(),
        })
    }
}

impl ComplexityMetric for Complexity {
    fn name(&self) -> String {
        self.inner().name()
    }

    fn patching(&self) -> Option<PatchConfig> {
        self.inner().patching()
    }

    fn num_workers(&self) -> usize {
        self.inner().num_workers()
    }

    fn cache_params(&self) -> Result<serde_json::Value> {
        self.inner().cache_params()
    }

    fn raw_score(&self, patch: ArrayView3<f32>) -> Result<f64> {
        self.inner().raw_score(patch)
    }
}

/// Build a metric from a configuration string and the shared patch/worker settings
///
/// `patch_stride` defaults to `patch_size`. Metric-specific parameters take
/// their defaults; use [`Complexity::from_name`] to override them.
pub fn complexity_from_config(
    config: &str,
    patch_size: Option<usize>,
    patch_stride: Option<usize>,
    num_workers: usize,
) -> Result<Complexity> {
    let options = MetricOptions {
        patching: PatchConfig::from_options(patch_size, patch_stride)?,
        num_workers,
        ..MetricOptions::default()
    };
    Complexity::from_name(config, &options)
}

/// Compute several metrics over one dataset and merge their tables
pub fn compute_all(
    metrics: &[Complexity],
    dataset: &ImageDataset,
    cache: &ResultCache,
) -> Result<ComplexityResult> {
    let mut result = ComplexityResult::default();
    for metric in metrics {
        result.merge(metric.compute(dataset, cache)?);
    }
    if result.files.is_empty() {
        result.files = dataset.file_names();
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_jpeg_quality() {
        let metric = complexity_from_config("jpeg_75", Some(32), None, 0).unwrap();
        match &metric {
            Complexity::Jpeg(jpeg) => assert_eq!(jpeg.quality(), 75),
            other => panic!("expected JPEG metric, got {other:?}"),
        }
        assert_eq!(metric.name(), "jpeg_75");
        assert_eq!(metric.patching(), Some(PatchConfig { size: 32, stride: 32 }));
    }

    #[test]
    fn test_dispatch_variance_and_meaningful() {
        let variance = complexity_from_config("variance", None, None, 2).unwrap();
        assert!(matches!(variance, Complexity::Variance(_)));
        assert_eq!(variance.num_workers(), 2);

        let meaningful = complexity_from_config("meaningful", Some(16), Some(8), 0).unwrap();
        assert!(matches!(meaningful, Complexity::Meaningful(_)));
        assert_eq!(meaningful.patching(), Some(PatchConfig { size: 16, stride: 8 }));
    }

    #[test]
    fn test_dispatch_unknown() {
        let err = complexity_from_config("unknown", None, None, 0).unwrap_err();
        assert!(matches!(err, ComplexityError::UnknownMetric(ref name) if name == "unknown"));
        assert!(err.to_string().contains("unknown"));
    }

    #[test]
    fn test_dispatch_bad_quality() {
        assert!(matches!(
            complexity_from_config("jpeg_high", None, None, 0),
            Err(ComplexityError::InvalidConfig(_))
        ));
        assert!(matches!(
            complexity_from_config("jpeg_0", None, None, 0),
            Err(ComplexityError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_options_reach_metric() {
        let options = MetricOptions {
            neighborhood_size: 3,
            ..MetricOptions::default()
        };
        match Complexity::from_name("variance", &options).unwrap() {
            Complexity::Variance(v) => assert_eq!(v.params.neighborhood_size, 3),
            other => panic!("expected variance metric, got {other:?}"),
        }
    }
}
