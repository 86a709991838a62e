//! Dataset preparation
//!
//! Turns a CSV of image URLs into a directory of square PNG crops ready to be
//! scored:
//! 1. [`download_images`] fetches every URL of one CSV column
//! 2. [`convert_and_filter_images`] filters by size, center-crops and re-encodes
//!
//! Individual failures are logged and skipped; only setup errors (unreadable CSV,
//! missing column, unwritable output directory) abort a batch.

pub mod convert;
pub mod download;

pub use convert::{convert_and_filter_images, convert_image, ConvertConfig};
pub use download::{download_images, file_name_from_url, read_urls};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Column {column:?} not found in {file}")]
    MissingColumn { column: String, file: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Cannot derive a file name from URL {0:?}")]
    InvalidUrl(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PrepareError>;

pub(crate) fn progress_bar(len: u64, message: &str) -> indicatif::ProgressBar {
    let pb = indicatif::ProgressBar::new(len);
    let style = indicatif::ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
    )
    .map(|s| s.progress_chars("#>-"))
    .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}
