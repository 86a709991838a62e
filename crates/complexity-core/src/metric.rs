//! Shared metric interface and the per-dataset scoring loop

use crate::error::Result;
use crate::loader::DataLoader;
use crate::patches::{extract_image_patches, PatchConfig};
use complexity_common::ImageDataset;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::{Array2, ArrayView3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Per-image, per-patch normalized scores
///
/// Rows follow dataset order and columns follow patch extraction order. Rows have
/// different lengths when images differ in size.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreTable {
    rows: Vec<Vec<f32>>,
}

impl ScoreTable {
    pub fn new(rows: Vec<Vec<f32>>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Whether every row has the same number of patches
    pub fn is_rectangular(&self) -> bool {
        self.rows.windows(2).all(|w| w[0].len() == w[1].len())
    }

    /// Dense `(images, patches)` matrix, if the table is rectangular
    pub fn to_array2(&self) -> Option<Array2<f32>> {
        if !self.is_rectangular() {
            return None;
        }
        let cols = self.rows.first().map_or(0, Vec::len);
        let flat: Vec<f32> = self.rows.iter().flatten().copied().collect();
        Array2::from_shape_vec((self.rows.len(), cols), flat).ok()
    }

    /// Mean score of each image
    pub fn row_means(&self) -> Vec<f32> {
        self.rows
            .iter()
            .map(|row| {
                if row.is_empty() {
                    0.0
                } else {
                    row.iter().sum::<f32>() / row.len() as f32
                }
            })
            .collect()
    }
}

/// Output of a complexity computation: scores by metric name plus file names
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComplexityResult {
    pub scores: BTreeMap<String, ScoreTable>,
    pub files: Vec<String>,
}

impl ComplexityResult {
    /// Merge another result computed over the same dataset
    pub fn merge(&mut self, other: ComplexityResult) {
        if self.files.is_empty() {
            self.files = other.files;
        }
        self.scores.extend(other.scores);
    }
}

/// A complexity backend that scores one patch at a time
pub trait ComplexityMetric {
    /// Name used as the result key, e.g. `jpeg_50`
    fn name(&self) -> String;

    /// Patch geometry; `None` scores whole images
    fn patching(&self) -> Option<PatchConfig>;

    /// Loader worker count (never part of the cache key)
    fn num_workers(&self) -> usize;

    /// Parameters that fully determine the output, for cache keying
    fn cache_params(&self) -> Result<serde_json::Value>;

    /// Un-normalized score of a single `(C, H, W)` patch
    fn raw_score(&self, patch: ArrayView3<f32>) -> Result<f64>;
}

/// Score every image of `dataset` with `metric`
///
/// Each patch's raw score is divided by that patch's own pixel area. Any error
/// aborts the whole run.
pub fn score_dataset<M: ComplexityMetric + ?Sized>(
    metric: &M,
    dataset: &ImageDataset,
) -> Result<ScoreTable> {
    let name = metric.name();
    let loader = DataLoader::new(dataset.clone(), metric.num_workers());
    info!(
        "Computing {} complexity for {} images (workers: {})",
        name,
        loader.len(),
        metric.num_workers()
    );

    let progress = progress_bar(loader.len() as u64, &name);
    let mut rows = Vec::with_capacity(loader.len());

    for item in loader.iter() {
        let (index, tensor) = item?;
        let patches = match metric.patching() {
            Some(config) => extract_image_patches(tensor.view(), config)?,
            None => vec![tensor.view()],
        };

        let mut row = Vec::with_capacity(patches.len());
        for patch in &patches {
            let (_, height, width) = patch.dim();
            let raw = metric.raw_score(patch.view())?;
            row.push((raw / (height * width) as f64) as f32);
        }

        debug!("{}: image {} -> {} patches", name, index, row.len());
        rows.push(row);
        progress.inc(1);
    }

    progress.finish_and_clear();
    Ok(ScoreTable::new(rows))
}

fn progress_bar(len: u64, name: &str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(format!("Computing {name} complexity"));
    pb
}
