//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the high-level [`operations`](super::operations) module
//! (which decides which variants an image needs) and the
//! [`backend`](super::backend) (which does the actual pixel work). Keeping the
//! two apart lets tests swap in a recording mock without touching the
//! variant policy.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100). Clamped on construction.
//! - [`OutputFormat`]: The encodings a variant can be written in.
//! - [`WidthPolicy`]: Responsive width ladder vs. a single capped width.
//! - [`ResizeParams`]: One variant: source, output path, target dimensions, format, quality.
//! - [`PlaceholderParams`]: The inline blur preview: target width, blur sigma, quality.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

/// Encoding of a derived image file.
///
/// AVIF and WebP are the "modern" formats that get their own `<source>`
/// element; JPEG and PNG serve as the `<img>` fallback every browser reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Avif,
    Webp,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension used for derived artifacts.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Avif => "avif",
            Self::Webp => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Avif => "image/avif",
            Self::Webp => "image/webp",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// Whether the format needs a `<source type=…>` to be picked only by
    /// browsers that understand it.
    pub fn is_modern(self) -> bool {
        matches!(self, Self::Avif | Self::Webp)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Which widths an image is rendered at.
///
/// `Responsive` walks the configured width ladder; `Fixed` renders a single
/// width capped at the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidthPolicy {
    Responsive,
    Fixed,
}

impl WidthPolicy {
    pub fn from_flag(responsive: bool) -> Self {
        if responsive {
            Self::Responsive
        } else {
            Self::Fixed
        }
    }
}

/// Parameters for writing one resized variant.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}

/// Parameters for the inline placeholder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaceholderParams {
    /// Target width; never upscaled past the source width.
    pub width: u32,
    /// Gaussian blur sigma applied after the downscale.
    pub blur_sigma: f32,
    pub quality: Quality,
}

impl Default for PlaceholderParams {
    fn default() -> Self {
        Self {
            width: 64,
            blur_sigma: 2.0,
            quality: Quality::new(50),
        }
    }
}
