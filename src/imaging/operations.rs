//! High-level image operations.
//!
//! These functions combine calculations with backend execution.
//! They take configuration, compute parameters, and call the backend.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{calculate_widths, scaled_height, sizes_attribute, srcset_attribute};
use super::params::{OutputFormat, PlaceholderParams, Quality, ResizeParams, WidthPolicy};
use crate::types::{DerivedArtifact, FormatSet, Placeholder, VariantStatus};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rayon::prelude::*;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<Dimensions> {
    backend.identify(path)
}

/// Configuration for responsive variant generation.
#[derive(Debug, Clone)]
pub struct ResponsiveConfig {
    /// Ascending widths for responsive images.
    pub ladder: Vec<u32>,
    /// Width cap for fixed (non-responsive) images.
    pub max_fixed: u32,
    /// Pixels subtracted from each breakpoint in the `sizes` attribute.
    pub sizes_gutter: u32,
    pub formats: Vec<OutputFormat>,
    pub quality: Quality,
    /// Public URL prefix mirroring the output directory.
    pub url_path: String,
}

impl Default for ResponsiveConfig {
    fn default() -> Self {
        Self {
            ladder: vec![320, 480, 800, 1024, 1280],
            max_fixed: 1280,
            sizes_gutter: 40,
            formats: vec![OutputFormat::Webp, OutputFormat::Jpeg],
            quality: Quality::default(),
            url_path: "/images".to_string(),
        }
    }
}

/// One planned variant: what to write and where it will be served from.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantPlan {
    pub params: ResizeParams,
    pub filename: String,
    pub url: String,
}

/// Plan every `(width, format)` variant of an image without executing it.
///
/// Ordered by format (configured order), then ascending width. Files are
/// named `<stem>-<width>.<ext>`.
pub fn plan_variants(
    source: &Path,
    output_dir: &Path,
    stem: &str,
    original: Dimensions,
    policy: WidthPolicy,
    config: &ResponsiveConfig,
) -> Vec<VariantPlan> {
    let widths = calculate_widths(original.width, policy, &config.ladder, config.max_fixed);
    let url_prefix = config.url_path.trim_end_matches('/');

    config
        .formats
        .iter()
        .flat_map(|&format| {
            widths.iter().map(move |&width| {
                let filename = format!("{}-{}.{}", stem, width, format.extension());
                VariantPlan {
                    params: ResizeParams {
                        source: source.to_path_buf(),
                        output: output_dir.join(&filename),
                        width,
                        height: scaled_height((original.width, original.height), width),
                        format,
                        quality: config.quality,
                    },
                    url: format!("{}/{}", url_prefix, filename),
                    filename,
                }
            })
        })
        .collect()
}

/// All variants of one image, grouped by format, plus the shared `sizes`.
#[derive(Debug, Clone)]
pub struct GeneratedVariants {
    pub formats: Vec<FormatSet>,
    pub sizes: String,
}

impl GeneratedVariants {
    pub fn count(&self, status: VariantStatus) -> u32 {
        self.formats
            .iter()
            .flat_map(|f| &f.artifacts)
            .filter(|a| a.status == status)
            .count() as u32
    }
}

/// Write a variant unless a file with its name already exists.
fn ensure_variant(backend: &impl ImageBackend, plan: &VariantPlan) -> Result<VariantStatus> {
    if plan.params.output.exists() {
        return Ok(VariantStatus::Existing);
    }
    backend.resize(&plan.params)?;
    Ok(VariantStatus::Encoded)
}

/// Make sure every variant of an image exists in `output_dir`.
///
/// Variants are independent, so they are written in parallel. Any failure
/// fails the whole image; variants already written stay on disk and are
/// reused by the next run.
pub fn create_responsive_images(
    backend: &impl ImageBackend,
    source: &Path,
    output_dir: &Path,
    stem: &str,
    original: Dimensions,
    policy: WidthPolicy,
    config: &ResponsiveConfig,
) -> Result<GeneratedVariants> {
    let plans = plan_variants(source, output_dir, stem, original, policy, config);

    let statuses = plans
        .par_iter()
        .map(|plan| ensure_variant(backend, plan))
        .collect::<Result<Vec<_>>>()?;

    let mut formats: Vec<FormatSet> = config
        .formats
        .iter()
        .map(|&format| FormatSet {
            format,
            artifacts: Vec::new(),
            srcset: String::new(),
        })
        .collect();

    for (plan, status) in plans.into_iter().zip(statuses) {
        if let Some(set) = formats.iter_mut().find(|f| f.format == plan.params.format) {
            set.artifacts.push(DerivedArtifact {
                format: plan.params.format,
                width: plan.params.width,
                height: plan.params.height,
                filename: plan.filename,
                url: plan.url,
                status,
            });
        }
    }

    for set in &mut formats {
        set.srcset = srcset_attribute(set.artifacts.iter().map(|a| (a.url.as_str(), a.width)));
    }

    let widths: Vec<u32> = formats
        .first()
        .map(|f| f.artifacts.iter().map(|a| a.width).collect())
        .unwrap_or_default();

    Ok(GeneratedVariants {
        formats,
        sizes: sizes_attribute(&widths, config.sizes_gutter),
    })
}

/// Create the inline blur placeholder as a `data:` URL.
pub fn create_placeholder(
    backend: &impl ImageBackend,
    source: &Path,
    params: &PlaceholderParams,
) -> Result<Placeholder> {
    let bytes = backend.placeholder(source, params)?;
    Ok(Placeholder {
        data_url: format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)),
    })
}
