//! Run configuration loaded from YAML
//!
//! ```yaml
//! metrics: [jpeg_50, variance, meaningful]
//! patch_size: 32
//! num_workers: 4
//! cache_dir: cache
//! meaningful:
//!   ncs_to_check: 6
//!   cluster_model: kmeans
//! ```
//!
//! Every field is optional. Command-line flags override file values.

use crate::complexity::{Complexity, MetricOptions};
use crate::error::{ComplexityError, Result};
use crate::meaningful::MeaningfulParams;
use crate::patches::PatchConfig;
use crate::variance::DEFAULT_NEIGHBORHOOD;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Metric configuration strings, e.g. `jpeg_50`
    pub metrics: Vec<String>,
    pub patch_size: Option<usize>,
    /// Defaults to `patch_size`
    pub patch_stride: Option<usize>,
    pub num_workers: usize,
    /// `None` disables caching
    pub cache_dir: Option<PathBuf>,
    pub neighborhood_size: usize,
    pub meaningful: MeaningfulParams,
    /// Only score the first `amount` images
    pub amount: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            metrics: vec!["jpeg_50".to_string()],
            patch_size: None,
            patch_stride: None,
            num_workers: 0,
            cache_dir: Some(PathBuf::from("cache")),
            neighborhood_size: DEFAULT_NEIGHBORHOOD,
            meaningful: MeaningfulParams::default(),
            amount: None,
        }
    }
}

impl RunConfig {
    /// Parse a configuration from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn from_yaml(yaml_path: impl AsRef<Path>) -> Result<Self> {
        let path = yaml_path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        debug!("Loaded run configuration from {}", path.display());
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            return Err(ComplexityError::InvalidConfig(
                "at least one metric is required".to_string(),
            ));
        }
        PatchConfig::from_options(self.patch_size, self.patch_stride)?;
        self.meaningful.validate()
    }

    /// Options shared by every metric of this run
    pub fn metric_options(&self) -> Result<MetricOptions> {
        Ok(MetricOptions {
            patching: PatchConfig::from_options(self.patch_size, self.patch_stride)?,
            num_workers: self.num_workers,
            neighborhood_size: self.neighborhood_size,
            meaningful: self.meaningful.clone(),
        })
    }

    /// Construct every configured metric, failing on the first bad name
    pub fn build_metrics(&self) -> Result<Vec<Complexity>> {
        let options = self.metric_options()?;
        self.metrics
            .iter()
            .map(|name| Complexity::from_name(name, &options))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meaningful::ClusterModel;
    use crate::metric::ComplexityMetric;

    #[test]
    fn test_defaults() {
        let config = RunConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, RunConfig::default());
        assert_eq!(config.cache_dir.as_deref(), Some(Path::new("cache")));
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
metrics: [jpeg_30, variance, meaningful]
patch_size: 32
patch_stride: 16
num_workers: 4
cache_dir: /tmp/scores
neighborhood_size: 5
meaningful:
  ncs_to_check: 4
  cluster_model: KMeans
amount: 10
"#;
        let config = RunConfig::from_yaml_str(yaml).unwrap();

        assert_eq!(config.metrics.len(), 3);
        assert_eq!(config.meaningful.ncs_to_check, 4);
        assert_eq!(config.meaningful.cluster_model, ClusterModel::KMeans);
        assert_eq!(config.meaningful.nz, 2);
        assert_eq!(config.amount, Some(10));

        let metrics = config.build_metrics().unwrap();
        let names: Vec<String> = metrics.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["jpeg_30", "variance", "meaningful"]);
        assert!(metrics
            .iter()
            .all(|m| m.patching() == Some(PatchConfig { size: 32, stride: 16 })));
    }

    #[test]
    fn test_unknown_metric_fails_build() {
        let config = RunConfig::from_yaml_str("metrics: [variance, sharpness]").unwrap();
        assert!(matches!(
            config.build_metrics(),
            Err(ComplexityError::UnknownMetric(_))
        ));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(RunConfig::from_yaml_str("metrics: []").is_err());
        assert!(RunConfig::from_yaml_str("patch_stride: 8").is_err());
        assert!(RunConfig::from_yaml_str("meaningful: {info_subsample: 1.5}").is_err());
        assert!(RunConfig::from_yaml_str("bogus_field: 1").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.yaml");
        std::fs::write(&path, "metrics: [variance]\nnum_workers: 2\n").unwrap();

        let config = RunConfig::from_yaml(&path).unwrap();
        assert_eq!(config.metrics, vec!["variance"]);
        assert_eq!(config.num_workers, 2);
    }
}
