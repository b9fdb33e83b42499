//! # blog-img
//!
//! Responsive image materializer for a static blog build. Page templates
//! call an image shortcode with `(source, alt, class, responsive)`; this
//! crate turns that into a `<picture>` fragment backed by resized variants
//! in several formats and an inline blurred placeholder.
//!
//! # Pipeline
//!
//! ```text
//! 1. Resolve   reference  →  local file     (source root, or download once)
//! 2. Address   file bytes →  content key    (SHA-256, 20 hex chars)
//! 3. Generate  key        →  <key>-<w>.ext  (skip files already on disk)
//! 4. Assemble  variants   →  <picture>      (lazy-loading markup via Maud)
//! ```
//!
//! Steps 2–3 are memoized per `(key, width policy)` for the lifetime of a
//! [`Materializer`], so an image used on twenty pages is processed once.
//! Because derived files are content addressed, a rebuild against a kept
//! output directory encodes nothing.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`materialize`] | The [`Materializer`]: request validation, mode switch, orchestration |
//! | [`resolve`] | Local path resolution and remote download staging |
//! | [`cache`] | Content keys, the per-key in-memory cache, work counters |
//! | [`imaging`] | Pure-Rust image operations: identify, resize, encode, placeholder |
//! | [`markup`] | `<picture>` fragments for production and development |
//! | [`config`] | `blog-img.toml` loading, merging, validation; build [`Mode`](config::Mode) |
//! | [`types`] | Artifact sets shared between generation, markup and reports |
//! | [`output`] | CLI output formatting |
//!
//! # Development Mode
//!
//! Encoding every image on every save is slow, so outside production
//! (`SITE_ENV` not `production`) the materializer emits the original
//! reference in a bare `<picture>` and touches no files. Alt text is still
//! enforced, so a missing alt fails the dev build too.
//!
//! # Usage
//!
//! ```no_run
//! use blog_img::config::{MaterializerConfig, Mode};
//! use blog_img::Materializer;
//!
//! let materializer = Materializer::new(MaterializerConfig::default(), Mode::from_env())?;
//! let html = materializer.responsive_image("posts/hero.jpg", "Harbour at dusk", "wide")?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod cache;
pub mod config;
pub mod imaging;
pub mod markup;
pub mod materialize;
pub mod output;
pub mod resolve;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use materialize::{ImageRequest, MaterializeError, Materializer};
