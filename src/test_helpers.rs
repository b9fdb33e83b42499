//! Shared test utilities for the blog-img test suite.
//!
//! Synthetic images are built with the `image` crate so tests never depend
//! on fixture files checked into the repository.

use image::{ImageEncoder, RgbImage};
use std::path::Path;

/// Create a small valid JPEG file with the given dimensions.
///
/// The pixel pattern is a gradient so different sizes produce different bytes.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write placeholder bytes at `path`, creating parent directories.
///
/// For tests running against the mock backend, which never decodes.
pub fn create_dummy_source(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

/// Names of all regular files directly inside `dir`, sorted.
pub fn list_files(dir: &Path) -> Vec<String> {
    if !dir.exists() {
        return Vec::new();
    }
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
