//! Bulk image download from a CSV column of URLs

use crate::{progress_bar, PrepareError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read every non-empty value of `column` from a CSV file with a header row
pub fn read_urls(csv_file: impl AsRef<Path>, column: &str) -> Result<Vec<String>> {
    let csv_file = csv_file.as_ref();
    let mut reader = csv::Reader::from_path(csv_file)?;

    let index = reader
        .headers()?
        .iter()
        .position(|h| h.trim() == column)
        .ok_or_else(|| PrepareError::MissingColumn {
            column: column.to_string(),
            file: csv_file.display().to_string(),
        })?;

    let mut urls = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(url) = record.get(index).map(str::trim).filter(|u| !u.is_empty()) {
            urls.push(url.to_string());
        }
    }
    Ok(urls)
}

/// Last path segment of a URL, without query string or fragment
pub fn file_name_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    // The first segment after the scheme is the host
    let (_, path) = path.split_once('/')?;
    let name = path.rsplit('/').next()?;

    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

/// Download the images listed in `column` of `csv_file` into `download_dir`
///
/// Returns the files that were written. URLs that fail are logged and skipped.
pub fn download_images(
    csv_file: impl AsRef<Path>,
    column: &str,
    download_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let download_dir = download_dir.as_ref();
    let urls = read_urls(csv_file, column)?;
    fs::create_dir_all(download_dir)?;

    info!("Downloading {} images to {}", urls.len(), download_dir.display());

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .build()?;

    let pb = progress_bar(urls.len() as u64, "Downloading");
    let mut written = Vec::with_capacity(urls.len());

    for url in &urls {
        match download_one(&client, url, download_dir) {
            Ok(path) => {
                debug!("Downloaded {} -> {}", url, path.display());
                written.push(path);
            }
            Err(e) => warn!("Skipping {}: {}", url, e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!("Downloaded {}/{} images", written.len(), urls.len());
    Ok(written)
}

fn download_one(client: &reqwest::blocking::Client, url: &str, dir: &Path) -> Result<PathBuf> {
    let name = file_name_from_url(url).ok_or_else(|| PrepareError::InvalidUrl(url.to_string()))?;

    let response = client.get(url).send()?.error_for_status()?;
    let bytes = response.bytes()?;

    let path = dir.join(name);
    fs::write(&path, &bytes)?;
    Ok(path)
}
