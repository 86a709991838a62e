//! Size filtering, center cropping and PNG re-encoding

use crate::{progress_bar, PrepareError, Result};
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, GenericImageView};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertConfig {
    /// PNG compression level, 0 (fastest) to 9 (smallest)
    pub compression: u8,
    /// Skip images whose smaller side is below this
    pub min_side: Option<u32>,
    /// Skip images with more pixels than this
    pub max_pixels: Option<u64>,
    /// Side of the square center crop (capped at the smaller side)
    pub image_size: u32,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            compression: 6,
            min_side: None,
            max_pixels: None,
            image_size: 512,
        }
    }
}

impl ConvertConfig {
    pub fn validate(&self) -> Result<()> {
        if self.compression > 9 {
            return Err(PrepareError::InvalidConfig(format!(
                "compression level must be 0-9, got {}",
                self.compression
            )));
        }
        if self.image_size == 0 {
            return Err(PrepareError::InvalidConfig(
                "image size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn compression_type(&self) -> CompressionType {
        match self.compression {
            0..=3 => CompressionType::Fast,
            4..=6 => CompressionType::Default,
            _ => CompressionType::Best,
        }
    }

    /// Reason to skip an image of the given size, if any
    fn rejects(&self, width: u32, height: u32) -> Option<String> {
        if let Some(min_side) = self.min_side {
            if width.min(height) < min_side {
                return Some(format!("smaller side {} < {}", width.min(height), min_side));
            }
        }
        if let Some(max_pixels) = self.max_pixels {
            let pixels = u64::from(width) * u64::from(height);
            if pixels > max_pixels {
                return Some(format!("{pixels} pixels > {max_pixels}"));
            }
        }
        None
    }
}

/// Convert one image into `output_dir`
///
/// Returns `Ok(None)` when the image is filtered out by size.
pub fn convert_image(
    path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ConvertConfig,
) -> Result<Option<PathBuf>> {
    let path = path.as_ref();
    let img = image::open(path)?;
    let (width, height) = img.dimensions();

    if let Some(reason) = config.rejects(width, height) {
        warn!("Skipping {}: {}", path.display(), reason);
        return Ok(None);
    }

    let cropped = center_crop(&img, config.image_size);

    let stem = path
        .file_stem()
        .ok_or_else(|| PrepareError::InvalidConfig(format!("no file name in {}", path.display())))?;
    let out_path = output_dir
        .as_ref()
        .join(format!("{}.png", stem.to_string_lossy()));

    let writer = BufWriter::new(File::create(&out_path)?);
    let encoder = PngEncoder::new_with_quality(writer, config.compression_type(), FilterType::Adaptive);
    cropped.write_with_encoder(encoder)?;

    Ok(Some(out_path))
}

/// Convert a batch of images, logging and skipping the ones that fail
pub fn convert_and_filter_images(
    files: &[PathBuf],
    output_dir: impl AsRef<Path>,
    config: &ConvertConfig,
) -> Result<Vec<PathBuf>> {
    config.validate()?;
    let output_dir = output_dir.as_ref();
    fs::create_dir_all(output_dir)?;

    let pb = progress_bar(files.len() as u64, "Converting");
    let mut written = Vec::with_capacity(files.len());
    let mut filtered = 0usize;

    for file in files {
        match convert_image(file, output_dir, config) {
            Ok(Some(path)) => written.push(path),
            Ok(None) => filtered += 1,
            Err(e) => warn!("Skipping {}: {}", file.display(), e),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        "Converted {}/{} images ({} filtered by size)",
        written.len(),
        files.len(),
        filtered
    );
    Ok(written)
}

/// Largest centered square of side at most `size`
fn center_crop(img: &DynamicImage, size: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let side = size.min(width).min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    img.crop_imm(x, y, side, side)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::Level;

    /// Log sink shared between the subscriber and the test
    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 7]));
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn test_center_crop_geometry() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(100, 60, |x, _| Rgb([x as u8, 0, 0])));

        let cropped = center_crop(&img, 512);
        assert_eq!(cropped.dimensions(), (60, 60));
        // Crop starts at x = 20
        assert_eq!(cropped.to_rgb8().get_pixel(0, 0)[0], 20);

        assert_eq!(center_crop(&img, 32).dimensions(), (32, 32));
    }

    #[test]
    fn test_convert_writes_png_crop() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_image(dir.path(), "photo.jpg", 80, 50);
        let out = dir.path().join("out");

        let config = ConvertConfig {
            image_size: 40,
            ..ConvertConfig::default()
        };
        let written = convert_and_filter_images(&[src], &out, &config).unwrap();

        assert_eq!(written, vec![out.join("photo.png")]);
        let img = image::open(&written[0]).unwrap();
        assert_eq!(img.dimensions(), (40, 40));
    }

    #[test]
    fn test_size_filters() {
        let dir = tempfile::tempdir().unwrap();
        let small = write_image(dir.path(), "small.png", 20, 30);
        let large = write_image(dir.path(), "large.png", 64, 64);
        let out = dir.path().join("out");

        let config = ConvertConfig {
            min_side: Some(24),
            ..ConvertConfig::default()
        };
        let written = convert_and_filter_images(&[small.clone(), large.clone()], &out, &config).unwrap();
        assert_eq!(written, vec![out.join("large.png")]);

        let config = ConvertConfig {
            max_pixels: Some(1000),
            ..ConvertConfig::default()
        };
        let written = convert_and_filter_images(&[small, large], &out, &config).unwrap();
        assert_eq!(written, vec![out.join("small.png")]);
    }

    #[test]
    fn test_size_filtered_images_logged_as_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let small = write_image(dir.path(), "tiny.png", 8, 8);

        let logs = CapturedLogs::default();
        let sink = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::WARN)
            .with_ansi(false)
            .with_writer(move || sink.clone())
            .finish();

        let config = ConvertConfig {
            min_side: Some(16),
            ..ConvertConfig::default()
        };
        let written = tracing::subscriber::with_default(subscriber, || {
            convert_and_filter_images(&[small], dir.path().join("out"), &config).unwrap()
        });

        assert!(written.is_empty());
        let text = logs.text();
        assert!(text.contains("WARN"), "{text}");
        assert!(text.contains("tiny.png"), "{text}");
        assert!(text.contains("smaller side 8 < 16"), "{text}");
    }

    #[test]
    fn test_unreadable_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.png");
        fs::write(&broken, b"not an image").unwrap();
        let good = write_image(dir.path(), "good.png", 16, 16);

        let written =
            convert_and_filter_images(&[broken, good], dir.path().join("out"), &ConvertConfig::default())
                .unwrap();
        assert_eq!(written.len(), 1);
    }

    #[test]
    fn test_invalid_compression() {
        let config = ConvertConfig {
            compression: 12,
            ..ConvertConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
