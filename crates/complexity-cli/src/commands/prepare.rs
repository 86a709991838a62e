//! Prepare command - build a dataset from a CSV of image URLs

use anyhow::{Context as _, Result};
use clap::Args;
use dataset_prep::{convert_and_filter_images, download_images, ConvertConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct PrepareCommand {
    /// CSV file with a header row
    #[arg(long)]
    csv_file: PathBuf,

    /// Column holding the image URLs
    #[arg(long)]
    column: String,

    /// Directory for the converted PNG files
    #[arg(long)]
    output_dir: PathBuf,

    /// Directory for the raw downloads (defaults to <OUTPUT_DIR>/download)
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// PNG compression level (0-9)
    #[arg(long, default_value = "6", value_parser = clap::value_parser!(u8).range(0..=9))]
    compression: u8,

    /// Skip images whose smaller side is below this
    #[arg(long)]
    min_side: Option<u32>,

    /// Skip images with more pixels than this
    #[arg(long)]
    max_pixels: Option<u64>,

    /// Side of the square center crop
    #[arg(long, default_value = "512")]
    image_size: u32,
}

impl PrepareCommand {
    pub fn execute(self) -> Result<()> {
        let download_dir = self
            .download_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("download"));

        let downloaded = download_images(&self.csv_file, &self.column, &download_dir)
            .with_context(|| format!("Failed to download images from {}", self.csv_file.display()))?;

        let config = ConvertConfig {
            compression: self.compression,
            min_side: self.min_side,
            max_pixels: self.max_pixels,
            image_size: self.image_size,
        };
        let written = convert_and_filter_images(&downloaded, &self.output_dir, &config)
            .context("Failed to convert images")?;

        info!(
            "Prepared {} images in {}",
            written.len(),
            self.output_dir.display()
        );
        Ok(())
    }
}
