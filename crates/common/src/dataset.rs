//! Directory- or file-list-backed image dataset
//!
//! The dataset is an ordered, read-only list of image paths. Directories are
//! expanded to their image files sorted by path so that row order is stable
//! across runs and platforms.

use crate::image_io::load_tensor;
use crate::{ImageTensor, ProcessingError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// File extensions recognized as images when scanning a directory
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "gif", "tif", "tiff"];

/// Ordered collection of image files
///
/// Cloning is cheap; the path list is shared so loader workers can hold their
/// own handle.
#[derive(Debug, Clone)]
pub struct ImageDataset {
    paths: Arc<Vec<PathBuf>>,
}

impl ImageDataset {
    /// Build a dataset from all images in a directory (non-recursive)
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let paths = scan_dir(dir)?;
        if paths.is_empty() {
            return Err(ProcessingError::EmptyDataset(dir.display().to_string()));
        }
        Ok(Self::from_paths(paths))
    }

    /// Build a dataset from explicit file paths, kept in the given order
    pub fn from_paths(paths: Vec<PathBuf>) -> Self {
        Self {
            paths: Arc::new(paths),
        }
    }

    /// Build a dataset from a mix of files and directories
    ///
    /// Directories are expanded in place; files are kept as given.
    pub fn from_inputs<P: AsRef<Path>>(inputs: &[P]) -> Result<Self> {
        let mut paths = Vec::new();

        for input in inputs {
            let input = input.as_ref();
            if input.is_dir() {
                paths.extend(scan_dir(input)?);
            } else if input.is_file() {
                paths.push(input.to_path_buf());
            } else {
                return Err(ProcessingError::NotFound(input.display().to_string()));
            }
        }

        if paths.is_empty() {
            return Err(ProcessingError::EmptyDataset(format!(
                "{} input(s) contained no images",
                inputs.len()
            )));
        }

        Ok(Self::from_paths(paths))
    }

    /// Keep only the first `amount` images
    #[must_use]
    pub fn take(self, amount: usize) -> Self {
        if amount >= self.len() {
            return self;
        }
        Self::from_paths(self.paths[..amount].to_vec())
    }

    /// Number of images
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the dataset has no images
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// All image paths in dataset order
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// File names (no directory) in dataset order
    #[must_use]
    pub fn file_names(&self) -> Vec<String> {
        self.paths
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.display().to_string())
            })
            .collect()
    }

    /// Decode the image at `index`
    pub fn get(&self, index: usize) -> Result<ImageTensor> {
        let path = self.paths.get(index).ok_or(ProcessingError::IndexOutOfRange {
            index,
            len: self.paths.len(),
        })?;

        debug!("Decoding image {} ({})", index, path.display());
        Ok(load_tensor(path)?)
    }
}

fn scan_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();

    paths.sort();
    Ok(paths)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str, size: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(size, size, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_from_dir_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "b.png", 8);
        write_png(dir.path(), "a.png", 8);
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let ds = ImageDataset::from_dir(dir.path()).unwrap();

        assert_eq!(ds.len(), 2);
        assert_eq!(ds.file_names(), vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_empty_dir_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageDataset::from_dir(dir.path()),
            Err(ProcessingError::EmptyDataset(_))
        ));
    }

    #[test]
    fn test_from_inputs_mixes_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        write_png(&sub, "x.png", 4);
        let single = write_png(dir.path(), "single.png", 4);

        let ds = ImageDataset::from_inputs(&[single, sub]).unwrap();
        assert_eq!(ds.file_names(), vec!["single.png", "x.png"]);
    }

    #[test]
    fn test_take_and_get() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "a.png", 4);
        write_png(dir.path(), "b.png", 6);

        let ds = ImageDataset::from_dir(dir.path()).unwrap().take(1);
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.get(0).unwrap().dim(), (3, 4, 4));
        assert!(matches!(
            ds.get(1),
            Err(ProcessingError::IndexOutOfRange { index: 1, len: 1 })
        ));
    }
}
