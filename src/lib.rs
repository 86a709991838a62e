//! Image Complexity - patch-wise complexity metrics for image datasets
//!
//! This crate re-exports the workspace libraries:
//! - [`common`]: dataset and image decoding
//! - [`core`]: metrics, dispatch, caching and run configuration
//! - [`prep`]: dataset preparation from URL lists

pub use complexity_common as common;
pub use complexity_core as core;
pub use dataset_prep as prep;

pub use complexity_common::{ImageDataset, ProcessingError};
pub use complexity_core::{
    complexity_from_config, compute_all, Complexity, ComplexityError, ComplexityMetric,
    ComplexityResult, PatchConfig, ResultCache, RunConfig, ScoreTable,
};
