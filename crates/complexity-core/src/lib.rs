//! Complexity Core - patch-wise image complexity metrics
//!
//! Three backends score every patch of every image in a dataset:
//! - `jpeg_<q>`: size of the patch encoded as JPEG at quality `q`
//! - `variance`: mean local grayscale variance
//! - `meaningful`: multi-scale clustering estimate of structural complexity
//!
//! Raw scores are divided by the patch's pixel area. Results are memoized in a
//! content-addressed on-disk cache.

pub mod cache;
pub mod complexity;
pub mod config;
pub mod error;
pub mod jpeg;
pub mod loader;
pub mod meaningful;
pub mod metric;
pub mod patches;
pub mod variance;

pub use cache::{dataset_fingerprint, CacheKey, CacheStats, ResultCache};
pub use complexity::{complexity_from_config, compute_all, Complexity, MetricOptions};
pub use config::RunConfig;
pub use error::{ComplexityError, Result};
pub use jpeg::JpegComplexity;
pub use loader::DataLoader;
pub use meaningful::{
    ClusterModel, ComplexityEstimator, MdlClusterEstimator, MeaningfulComplexity, MeaningfulParams,
};
pub use metric::{score_dataset, ComplexityMetric, ComplexityResult, ScoreTable};
pub use patches::{extract_image_patches, extract_patches, PatchConfig};
pub use variance::VarianceComplexity;
