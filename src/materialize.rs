//! The materializer: from an image reference to `<picture>` markup.
//!
//! ```text
//! reference ──► resolve (local path / staged download)
//!           ──► content key (SHA-256 of the bytes)
//!           ──► memory cache ──hit──────────────────────────┐
//!                    │ miss                                  │
//!                    ▼                                       ▼
//!           variants + placeholder ──► RenderSet ──► markup (per alt/class)
//! ```
//!
//! A [`Materializer`] owns its cache, its output directory and its counters.
//! It is `Send + Sync`; callers that want to process many images at once
//! share one instance across threads (see the CLI's `warm` command).
//!
//! Variants of one image are encoded on the rayon pool while the image's
//! cache slot is held. Rayon tasks must therefore not request the same
//! image concurrently: a worker waiting on its own slot can steal the
//! duplicate and deadlock. `warm` deduplicates by content key first.

use crate::cache::{CacheKey, CacheOutcome, ContentKey, ImageCache, MaterializeStats, StatsSnapshot};
use crate::config::{MaterializerConfig, Mode};
use crate::imaging::{
    ImageBackend, RustBackend, WidthPolicy, create_placeholder, create_responsive_images,
    get_dimensions,
};
use crate::markup;
use crate::resolve::{Fetcher, ImageReference, ResolveError};
use crate::types::{RenderSet, VariantStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure to materialize one image. Every variant names the reference the
/// caller passed in.
#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("image {reference:?} has no alt text")]
    MissingAltText { reference: String },
    #[error("image {reference:?} is unavailable: {reason}")]
    SourceUnavailable { reference: String, reason: String },
    #[error("image {reference:?} could not be encoded: {reason}")]
    EncodingFailure { reference: String, reason: String },
}

impl MaterializeError {
    pub fn reference(&self) -> &str {
        match self {
            Self::MissingAltText { reference }
            | Self::SourceUnavailable { reference, .. }
            | Self::EncodingFailure { reference, .. } => reference,
        }
    }

    fn unavailable(reference: &str, reason: impl ToString) -> Self {
        Self::SourceUnavailable {
            reference: reference.to_string(),
            reason: reason.to_string(),
        }
    }

    fn encoding(reference: &str, reason: impl ToString) -> Self {
        Self::EncodingFailure {
            reference: reference.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// One shortcode invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub src: String,
    pub alt: String,
    pub class: String,
    pub policy: WidthPolicy,
}

impl ImageRequest {
    /// Fixed-width request with no CSS class.
    pub fn new(src: impl Into<String>, alt: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            alt: alt.into(),
            class: String::new(),
            policy: WidthPolicy::Fixed,
        }
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = class.into();
        self
    }

    pub fn responsive(mut self, responsive: bool) -> Self {
        self.policy = WidthPolicy::from_flag(responsive);
        self
    }
}

pub struct Materializer<B: ImageBackend = RustBackend> {
    config: MaterializerConfig,
    mode: Mode,
    backend: B,
    fetcher: Fetcher,
    cache: ImageCache,
    stats: MaterializeStats,
}

impl Materializer<RustBackend> {
    pub fn new(config: MaterializerConfig, mode: Mode) -> Result<Self, ResolveError> {
        Self::with_backend(config, mode, RustBackend::new())
    }
}

impl<B: ImageBackend> Materializer<B> {
    pub fn with_backend(
        config: MaterializerConfig,
        mode: Mode,
        backend: B,
    ) -> Result<Self, ResolveError> {
        let fetcher = Fetcher::new(
            config.download_dir.clone(),
            config.fetch.timeout_secs.map(Duration::from_secs),
            &config.fetch.user_agent,
        )?;
        Ok(Self {
            config,
            mode,
            backend,
            fetcher,
            cache: ImageCache::new(),
            stats: MaterializeStats::default(),
        })
    }

    pub fn config(&self) -> &MaterializerConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The `image` shortcode: one width, `min(source width, max_fixed)`.
    pub fn image(&self, src: &str, alt: &str, class: &str) -> Result<String, MaterializeError> {
        self.render(&ImageRequest::new(src, alt).class(class))
    }

    /// The `responsive_image` shortcode: the full width ladder.
    pub fn responsive_image(
        &self,
        src: &str,
        alt: &str,
        class: &str,
    ) -> Result<String, MaterializeError> {
        self.render(&ImageRequest::new(src, alt).class(class).responsive(true))
    }

    /// Markup for one request.
    ///
    /// Alt text is required even for an empty source and is checked before
    /// any I/O. An empty source yields an empty fragment. Outside
    /// production the original reference is emitted unchanged.
    pub fn render(&self, request: &ImageRequest) -> Result<String, MaterializeError> {
        if request.alt.trim().is_empty() {
            let err = MaterializeError::MissingAltText {
                reference: request.src.clone(),
            };
            tracing::error!(reference = %request.src, "{err}");
            return Err(err);
        }

        let src = request.src.trim();
        if src.is_empty() {
            return Ok(String::new());
        }

        if !self.mode.is_production() {
            return Ok(markup::development(&request.src, &request.alt, &request.class).into_string());
        }

        let set = self.materialize(src, request.policy)?;
        Ok(markup::production(&set, &request.alt, &request.class).into_string())
    }

    /// Make sure every derived file of `reference` exists and return the
    /// artifact set. Runs regardless of [`Mode`].
    pub fn materialize(
        &self,
        reference: &str,
        policy: WidthPolicy,
    ) -> Result<Arc<RenderSet>, MaterializeError> {
        self.try_materialize(reference, policy).inspect_err(|err| {
            tracing::error!(reference, "{err}");
        })
    }

    fn try_materialize(
        &self,
        reference: &str,
        policy: WidthPolicy,
    ) -> Result<Arc<RenderSet>, MaterializeError> {
        let parsed = ImageReference::parse(reference, &self.config.source_root);
        let (path, fetched) = self
            .fetcher
            .resolve(&parsed)
            .map_err(|e| MaterializeError::unavailable(reference, e))?;
        if fetched {
            self.stats.fetched();
        }

        let key = ContentKey::from_file(&path).map_err(|e| MaterializeError::unavailable(reference, e))?;
        tracing::debug!(reference, key = %key, "hashed source");

        let cache_key = CacheKey {
            content: key.clone(),
            policy,
        };
        let (set, outcome) = self
            .cache
            .get_or_try_insert_with(cache_key, || self.build(reference, &path, key, policy))?;

        if outcome == CacheOutcome::Hit {
            self.stats.memory_hit();
            tracing::debug!(reference, key = %set.key, "memory cache hit");
        }
        Ok(set)
    }

    fn build(
        &self,
        reference: &str,
        path: &Path,
        key: ContentKey,
        policy: WidthPolicy,
    ) -> Result<RenderSet, MaterializeError> {
        let output_dir = &self.config.output_dir;
        std::fs::create_dir_all(output_dir).map_err(|e| MaterializeError::encoding(reference, e))?;

        let original =
            get_dimensions(&self.backend, path).map_err(|e| MaterializeError::encoding(reference, e))?;

        let variants = create_responsive_images(
            &self.backend,
            path,
            output_dir,
            key.as_str(),
            original,
            policy,
            &self.config.responsive_config(),
        )
        .map_err(|e| MaterializeError::encoding(reference, e))?;

        let encoded = variants.count(VariantStatus::Encoded);
        let existing = variants.count(VariantStatus::Existing);
        self.stats.encoded(encoded);
        self.stats.existing(existing);

        let placeholder = create_placeholder(&self.backend, path, &self.config.placeholder_params())
            .map_err(|e| MaterializeError::encoding(reference, e))?;
        self.stats.placeholder();

        tracing::info!(
            reference,
            key = %key,
            width = original.width,
            height = original.height,
            encoded,
            existing,
            "materialized image"
        );

        Ok(RenderSet {
            key,
            source_dimensions: (original.width, original.height),
            formats: variants.formats,
            sizes: variants.sizes,
            placeholder,
        })
    }
}
