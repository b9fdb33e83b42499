//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Resize | `image::DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Placeholder blur | `image::DynamicImage::blur` |
//!
//! Variants are encoded into a temp file next to the target and renamed into
//! place, so an interrupted build never leaves a truncated variant that a
//! later run would mistake for a finished one.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::scaled_height;
use super::params::{OutputFormat, PlaceholderParams, Quality, ResizeParams};
use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::LazyLock;

const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
///
/// The format is sniffed from the content, since downloaded files may carry
/// no usable extension.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Encode `img` in `format` to `writer`.
fn encode(
    img: &DynamicImage,
    format: OutputFormat,
    quality: Quality,
    writer: impl Write,
) -> Result<(), BackendError> {
    let q = quality.value() as u8;
    let result = match format {
        // JPEG has no alpha channel
        OutputFormat::Jpeg => DynamicImage::ImageRgb8(img.to_rgb8())
            .write_with_encoder(JpegEncoder::new_with_quality(writer, q)),
        OutputFormat::Webp => {
            let pixels = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            pixels.write_with_encoder(WebPEncoder::new_lossless(writer))
        }
        OutputFormat::Avif => {
            img.write_with_encoder(AvifEncoder::new_with_speed_quality(writer, 6, q))
        }
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(writer)),
    };
    result.map_err(|e| BackendError::ProcessingFailed(format!("{} encode failed: {}", format, e)))
}

/// Encode into a temp file in the output directory, then rename over `output`.
fn save_atomically(
    img: &DynamicImage,
    output: &Path,
    format: OutputFormat,
    quality: Quality,
) -> Result<(), BackendError> {
    let dir = output.parent().ok_or_else(|| {
        BackendError::ProcessingFailed(format!("Output has no parent: {}", output.display()))
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        encode(img, format, quality, &mut writer)?;
        writer.flush()?;
    }
    tmp.persist(output).map_err(|e| BackendError::Io(e.error))?;
    Ok(())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| {
                BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
            })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        save_atomically(&resized, &params.output, params.format, params.quality)
    }

    fn placeholder(
        &self,
        source: &Path,
        params: &PlaceholderParams,
    ) -> Result<Vec<u8>, BackendError> {
        let img = load_image(source)?;
        let width = params.width.min(img.width()).max(1);
        let height = scaled_height((img.width(), img.height()), width);

        let small = img.resize_exact(width, height, FilterType::Triangle);
        let blurred = small.blur(params.blur_sigma);

        let mut bytes = Vec::new();
        encode(
            &blurred,
            OutputFormat::Jpeg,
            params.quality,
            std::io::Cursor::new(&mut bytes),
        )?;
        Ok(bytes)
    }
}
