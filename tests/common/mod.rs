//! Shared fixtures for integration tests

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

/// Deterministic pseudo-random byte for pixel `(x, y)` and channel `c`
pub fn noise(x: u32, y: u32, c: u32) -> u8 {
    let mut h = x.wrapping_mul(0x9E37_79B1) ^ y.wrapping_mul(0x85EB_CA77) ^ c.wrapping_mul(0xC2B2_AE3D);
    h ^= h >> 15;
    h = h.wrapping_mul(0x2C1B_3C6D);
    h ^= h >> 12;
    (h & 0xFF) as u8
}

pub fn noise_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| Rgb([noise(x, y, 0), noise(x, y, 1), noise(x, y, 2)]))
}

pub fn gradient_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
    })
}

/// Vertical stripes of two colors, `width` pixels each
pub fn stripes_image(width: u32, height: u32, stripe: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        if (x / stripe) % 2 == 0 {
            Rgb([230, 40, 40])
        } else {
            Rgb([20, 60, 220])
        }
    })
}

pub fn uniform_image(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb([90, 140, 200]))
}

/// Nearest-neighbor upscale by an integer factor
pub fn upscale(img: &RgbImage, factor: u32) -> RgbImage {
    RgbImage::from_fn(img.width() * factor, img.height() * factor, |x, y| {
        *img.get_pixel(x / factor, y / factor)
    })
}

pub fn save(img: &RgbImage, dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).expect("failed to write fixture image");
    path
}
