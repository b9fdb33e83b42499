//! Shared types describing a materialized image.
//!
//! A [`RenderSet`] is what the cache stores per content key: every derived
//! file, grouped by format, plus the responsive descriptors and the inline
//! placeholder. Markup is assembled from it on each request, since alt text
//! and CSS class vary between uses of the same image.

use crate::cache::ContentKey;
use crate::imaging::OutputFormat;
use serde::Serialize;

/// Whether a variant was found on disk or written by this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantStatus {
    Existing,
    Encoded,
}

/// One generated file: `<key>-<width>.<ext>` in the output directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedArtifact {
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub filename: String,
    /// Public URL under the configured prefix.
    pub url: String,
    pub status: VariantStatus,
}

/// All widths of one format, ascending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatSet {
    pub format: OutputFormat,
    pub artifacts: Vec<DerivedArtifact>,
    pub srcset: String,
}

impl FormatSet {
    pub fn widest(&self) -> Option<&DerivedArtifact> {
        self.artifacts.last()
    }
}

/// Blurred preview inlined as a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placeholder {
    pub data_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSet {
    pub key: ContentKey,
    pub source_dimensions: (u32, u32),
    /// In configured format order.
    pub formats: Vec<FormatSet>,
    pub sizes: String,
    pub placeholder: Placeholder,
}

impl RenderSet {
    /// The format served by the `<img>` element.
    ///
    /// First non-modern format (JPEG/PNG); if every configured format is
    /// modern, the last one listed.
    pub fn fallback(&self) -> Option<&FormatSet> {
        self.formats
            .iter()
            .find(|f| !f.format.is_modern())
            .or_else(|| self.formats.last())
    }

    /// Formats that get a `<source>` element: every modern format except the
    /// fallback.
    pub fn sources(&self) -> impl Iterator<Item = &FormatSet> {
        let fallback = self.fallback().map(|f| f.format);
        self.formats
            .iter()
            .filter(move |f| f.format.is_modern() && Some(f.format) != fallback)
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &DerivedArtifact> {
        self.formats.iter().flat_map(|f| f.artifacts.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format_set(format: OutputFormat) -> FormatSet {
        FormatSet {
            format,
            artifacts: vec![],
            srcset: String::new(),
        }
    }

    fn render_set(formats: &[OutputFormat]) -> RenderSet {
        RenderSet {
            key: ContentKey::from_bytes(b"x"),
            source_dimensions: (100, 100),
            formats: formats.iter().copied().map(format_set).collect(),
            sizes: String::new(),
            placeholder: Placeholder {
                data_url: String::new(),
            },
        }
    }

    #[test]
    fn fallback_prefers_first_legacy_format() {
        let set = render_set(&[OutputFormat::Avif, OutputFormat::Webp, OutputFormat::Jpeg]);
        assert_eq!(set.fallback().unwrap().format, OutputFormat::Jpeg);
        let sources: Vec<_> = set.sources().map(|f| f.format).collect();
        assert_eq!(sources, vec![OutputFormat::Avif, OutputFormat::Webp]);
    }

    #[test]
    fn fallback_uses_last_when_all_modern() {
        let set = render_set(&[OutputFormat::Avif, OutputFormat::Webp]);
        assert_eq!(set.fallback().unwrap().format, OutputFormat::Webp);
        let sources: Vec<_> = set.sources().map(|f| f.format).collect();
        assert_eq!(sources, vec![OutputFormat::Avif]);
    }

    #[test]
    fn legacy_formats_never_become_sources() {
        let set = render_set(&[OutputFormat::Jpeg, OutputFormat::Png]);
        assert_eq!(set.fallback().unwrap().format, OutputFormat::Jpeg);
        assert_eq!(set.sources().count(), 0);
    }
}
