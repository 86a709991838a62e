//! Compute command - score a dataset with one or more metrics

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use complexity_common::ImageDataset;
use complexity_core::{compute_all, ComplexityResult, ResultCache, RunConfig};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One `file,metric,patch,score` row per patch
    Csv,
    /// Full result object
    Json,
}

#[derive(Args)]
pub struct ComputeCommand {
    /// Image files or directories
    #[arg(value_name = "INPUTS", required = true)]
    inputs: Vec<PathBuf>,

    /// Metrics to compute: jpeg_<quality>, variance, meaningful
    #[arg(short, long, value_delimiter = ',')]
    metrics: Vec<String>,

    /// Side of square patches (whole images when omitted)
    #[arg(long)]
    patch_size: Option<usize>,

    /// Step between patches (defaults to the patch size)
    #[arg(long)]
    patch_stride: Option<usize>,

    /// Decoder threads (0 decodes on the main thread)
    #[arg(long)]
    num_workers: Option<usize>,

    /// Cache directory
    #[arg(long, conflicts_with = "no_cache")]
    cache_dir: Option<PathBuf>,

    /// Always recompute, never read or write the cache
    #[arg(long)]
    no_cache: bool,

    /// YAML run configuration; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only score the first N images
    #[arg(long)]
    amount: Option<usize>,

    /// Output format
    #[arg(long, value_enum, default_value = "csv")]
    format: OutputFormat,

    /// Output file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl ComputeCommand {
    pub fn execute(self) -> Result<()> {
        let config = self.run_config()?;
        let metrics = config
            .build_metrics()
            .context("Failed to configure metrics")?;

        let mut dataset =
            ImageDataset::from_inputs(&self.inputs).context("Failed to open image dataset")?;
        if let Some(amount) = config.amount {
            dataset = dataset.take(amount);
        }
        info!(
            "Scoring {} images with {}",
            dataset.len(),
            config.metrics.join(", ")
        );

        let cache = match &config.cache_dir {
            Some(dir) => ResultCache::new(dir),
            None => ResultCache::disabled(),
        };

        let start = Instant::now();
        let result = compute_all(&metrics, &dataset, &cache).context("Complexity computation failed")?;
        let stats = cache.stats();
        info!(
            "Done in {:.2}s (cache hits: {}, misses: {})",
            start.elapsed().as_secs_f64(),
            stats.hits,
            stats.misses
        );

        let writer: Box<dyn Write> = match &self.output {
            Some(path) => Box::new(BufWriter::new(
                File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?,
            )),
            None => Box::new(io::stdout().lock()),
        };
        write_result(&result, self.format, writer)?;

        if let Some(path) = &self.output {
            info!("Scores written to {}", path.display());
        }
        Ok(())
    }

    /// File configuration (or defaults) with command-line overrides applied
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_yaml(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => RunConfig::default(),
        };

        if !self.metrics.is_empty() {
            config.metrics = self.metrics.iter().map(|m| m.trim().to_string()).collect();
        }
        if self.patch_size.is_some() {
            config.patch_size = self.patch_size;
            config.patch_stride = self.patch_stride;
        } else if self.patch_stride.is_some() {
            config.patch_stride = self.patch_stride;
        }
        if let Some(workers) = self.num_workers {
            config.num_workers = workers;
        }
        if self.no_cache {
            config.cache_dir = None;
        } else if let Some(dir) = &self.cache_dir {
            config.cache_dir = Some(dir.clone());
        }
        if self.amount.is_some() {
            config.amount = self.amount;
        }

        config.validate().context("Invalid run configuration")?;
        Ok(config)
    }
}

fn write_result(result: &ComplexityResult, format: OutputFormat, writer: impl Write) -> Result<()> {
    match format {
        OutputFormat::Csv => write_csv(result, writer),
        OutputFormat::Json => {
            let mut writer = writer;
            serde_json::to_writer_pretty(&mut writer, result).context("Failed to write JSON")?;
            writeln!(writer)?;
            writer.flush()?;
            Ok(())
        }
    }
}

fn write_csv(result: &ComplexityResult, writer: impl Write) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["file", "metric", "patch", "score"])?;

    for (metric, table) in &result.scores {
        for (file, row) in result.files.iter().zip(table.rows()) {
            for (patch, score) in row.iter().enumerate() {
                let patch = patch.to_string();
                let score = score.to_string();
                csv.write_record([file.as_str(), metric.as_str(), patch.as_str(), score.as_str()])?;
            }
        }
    }

    csv.flush().context("Failed to write CSV")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use complexity_core::ScoreTable;
    use std::collections::BTreeMap;

    fn sample_result() -> ComplexityResult {
        ComplexityResult {
            scores: BTreeMap::from([
                ("jpeg_50".to_string(), ScoreTable::new(vec![vec![0.5], vec![0.25]])),
                ("variance".to_string(), ScoreTable::new(vec![vec![0.0, 1.5], vec![2.0]])),
            ]),
            files: vec!["a.png".to_string(), "b.png".to_string()],
        }
    }

    #[test]
    fn test_csv_output() {
        let mut buf = Vec::new();
        write_result(&sample_result(), OutputFormat::Csv, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "file,metric,patch,score");
        assert_eq!(lines[1], "a.png,jpeg_50,0,0.5");
        assert_eq!(lines[3], "a.png,variance,0,0");
        assert_eq!(lines[4], "a.png,variance,1,1.5");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_json_output() {
        let mut buf = Vec::new();
        write_result(&sample_result(), OutputFormat::Json, &mut buf).unwrap();

        let parsed: ComplexityResult = serde_json::from_slice(&buf).unwrap();
        assert_eq!(parsed, sample_result());
    }
}
