//! "Meaningful complexity" metric
//!
//! Pixel-uniform patches score exactly zero without consulting the estimator.
//! Everything else is delegated to a [`ComplexityEstimator`]; the raw score is
//! the sum of the estimator's per-level output.

mod cluster;
mod estimator;

pub use cluster::{ClusterModel, Clustering};
pub use estimator::{ComplexityEstimator, MdlClusterEstimator, MeaningfulParams};

use crate::error::Result;
use crate::metric::ComplexityMetric;
use crate::patches::PatchConfig;
use ndarray::ArrayView3;
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct MeaningfulComplexity {
    estimator: Arc<dyn ComplexityEstimator>,
    pub patching: Option<PatchConfig>,
    pub num_workers: usize,
}

impl std::fmt::Debug for MeaningfulComplexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeaningfulComplexity")
            .field("estimator", &self.estimator.id())
            .field("patching", &self.patching)
            .field("num_workers", &self.num_workers)
            .finish()
    }
}

#[derive(Serialize)]
struct CacheParams<'a> {
    estimator: &'a str,
    params: serde_json::Value,
}

impl MeaningfulComplexity {
    /// Metric backed by the built-in MDL clustering estimator
    pub fn new(params: MeaningfulParams, patching: Option<PatchConfig>, num_workers: usize) -> Result<Self> {
        let estimator = MdlClusterEstimator::new(params)?;
        Ok(Self::with_estimator(Arc::new(estimator), patching, num_workers))
    }

    /// Metric backed by a caller-supplied estimator
    pub fn with_estimator(
        estimator: Arc<dyn ComplexityEstimator>,
        patching: Option<PatchConfig>,
        num_workers: usize,
    ) -> Self {
        Self {
            estimator,
            patching,
            num_workers,
        }
    }

    pub fn estimator(&self) -> &dyn ComplexityEstimator {
        self.estimator.as_ref()
    }
}

impl ComplexityMetric for MeaningfulComplexity {
    fn name(&self) -> String {
        "meaningful".to_string()
    }

    fn patching(&self) -> Option<PatchConfig> {
        self.patching
    }

    fn num_workers(&self) -> usize {
        self.num_workers
    }

    fn cache_params(&self) -> Result<serde_json::Value> {
        let id = self.estimator.id();
        Ok(serde_json::to_value(CacheParams {
            estimator: &id,
            params: self.estimator.params()?,
        })?)
    }

    fn raw_score(&self, patch: ArrayView3<f32>) -> Result<f64> {
        if is_uniform(patch) {
            return Ok(0.0);
        }
        let levels = self.estimator.estimate(patch)?;
        Ok(levels.iter().sum())
    }
}

/// Whether every sample of the patch has the same value
pub fn is_uniform(patch: ArrayView3<f32>) -> bool {
    let mut values = patch.iter();
    match values.next() {
        Some(&first) => values.all(|&v| v == first),
        None => true,
    }
}
