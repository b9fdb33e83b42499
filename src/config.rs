//! Materializer configuration.
//!
//! Handles loading, validating, and merging the `blog-img.toml` file. User
//! values are layered over stock defaults, so a config file only needs the
//! keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! source_root = "src/static"        # Local image references resolve here
//! output_dir = "_output/images"     # Derived variants are written here
//! url_path = "/images"              # Public URL prefix of output_dir
//! download_dir = ".cache/remote-images"  # Staging area for remote images
//!
//! [widths]
//! ladder = [320, 480, 800, 1024, 1280]  # Responsive widths (ascending)
//! max_fixed = 1280          # Cap for non-responsive images
//! sizes_gutter = 40         # px subtracted per breakpoint in `sizes`
//!
//! [formats]
//! list = ["webp", "jpeg"]   # Encodings written per width
//! quality = 80              # Lossy encoding quality (1-100)
//!
//! [placeholder]
//! width = 64                # Blur preview width
//! blur_sigma = 2.0
//! quality = 50
//!
//! [fetch]
//! # timeout_secs = 30       # Omit for no timeout
//! user_agent = "blog-img"
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Mode
//!
//! Whether images are optimized at all is not a config-file setting. The
//! `SITE_ENV` environment variable selects it: `production` runs the full
//! pipeline, anything else passes sources through untouched. See [`Mode`].
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{OutputFormat, PlaceholderParams, Quality, ResponsiveConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable selecting [`Mode`].
pub const MODE_ENV: &str = "SITE_ENV";

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "blog-img.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Build mode, chosen by the `SITE_ENV` environment variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Pass-through markup, no hashing, no files written.
    Development,
    /// Full generation.
    Production,
}

impl Mode {
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(MODE_ENV).ok().as_deref())
    }

    /// `production` (any case) selects [`Mode::Production`]; everything
    /// else, including unset, is development.
    pub fn from_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

/// Materializer configuration loaded from `blog-img.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MaterializerConfig {
    /// Root that local image references are resolved against.
    pub source_root: PathBuf,
    /// Directory derived variants are written to.
    pub output_dir: PathBuf,
    /// Public URL prefix mirroring `output_dir`.
    pub url_path: String,
    /// Staging directory for downloaded remote images.
    pub download_dir: PathBuf,
    pub widths: WidthsConfig,
    pub formats: FormatsConfig,
    pub placeholder: PlaceholderConfig,
    pub fetch: FetchConfig,
    pub processing: ProcessingConfig,
}

impl Default for MaterializerConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("src/static"),
            output_dir: PathBuf::from("_output/images"),
            url_path: "/images".to_string(),
            download_dir: PathBuf::from(".cache/remote-images"),
            widths: WidthsConfig::default(),
            formats: FormatsConfig::default(),
            placeholder: PlaceholderConfig::default(),
            fetch: FetchConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl MaterializerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ladder = &self.widths.ladder;
        if ladder.is_empty() {
            return Err(ConfigError::Validation(
                "widths.ladder must not be empty".into(),
            ));
        }
        if ladder.contains(&0) || self.widths.max_fixed == 0 {
            return Err(ConfigError::Validation("widths must be non-zero".into()));
        }
        if ladder.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ConfigError::Validation(
                "widths.ladder must be strictly ascending".into(),
            ));
        }
        if self.formats.list.is_empty() {
            return Err(ConfigError::Validation(
                "formats.list must not be empty".into(),
            ));
        }
        let unique: HashSet<_> = self.formats.list.iter().collect();
        if unique.len() != self.formats.list.len() {
            return Err(ConfigError::Validation(
                "formats.list must not repeat a format".into(),
            ));
        }
        if !(1..=100).contains(&self.formats.quality) {
            return Err(ConfigError::Validation(
                "formats.quality must be 1-100".into(),
            ));
        }
        if self.placeholder.width == 0 {
            return Err(ConfigError::Validation(
                "placeholder.width must be non-zero".into(),
            ));
        }
        if !(1..=100).contains(&self.placeholder.quality) {
            return Err(ConfigError::Validation(
                "placeholder.quality must be 1-100".into(),
            ));
        }
        if !self.placeholder.blur_sigma.is_finite() || self.placeholder.blur_sigma < 0.0 {
            return Err(ConfigError::Validation(
                "placeholder.blur_sigma must be a non-negative number".into(),
            ));
        }
        Ok(())
    }

    /// Variant settings for the imaging layer.
    pub fn responsive_config(&self) -> ResponsiveConfig {
        ResponsiveConfig {
            ladder: self.widths.ladder.clone(),
            max_fixed: self.widths.max_fixed,
            sizes_gutter: self.widths.sizes_gutter,
            formats: self.formats.list.clone(),
            quality: Quality::new(self.formats.quality),
            url_path: self.url_path.clone(),
        }
    }

    pub fn placeholder_params(&self) -> PlaceholderParams {
        PlaceholderParams {
            width: self.placeholder.width,
            blur_sigma: self.placeholder.blur_sigma,
            quality: Quality::new(self.placeholder.quality),
        }
    }
}

/// Width ladder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WidthsConfig {
    /// Widths generated for responsive images, ascending.
    pub ladder: Vec<u32>,
    /// Cap for the single width of a non-responsive image.
    pub max_fixed: u32,
    /// Pixels subtracted from each breakpoint in the generated `sizes`.
    pub sizes_gutter: u32,
}

impl Default for WidthsConfig {
    fn default() -> Self {
        Self {
            ladder: vec![320, 480, 800, 1024, 1280],
            max_fixed: 1280,
            sizes_gutter: 40,
        }
    }
}

/// Output encodings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormatsConfig {
    /// Formats written for every width. Modern formats (avif, webp) become
    /// `<source>` elements; the first of jpeg/png is the `<img>` fallback.
    pub list: Vec<OutputFormat>,
    /// Lossy encoding quality (1 = worst, 100 = best).
    pub quality: u32,
}

impl Default for FormatsConfig {
    fn default() -> Self {
        Self {
            list: vec![OutputFormat::Webp, OutputFormat::Jpeg],
            quality: 80,
        }
    }
}

/// Inline blur placeholder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderConfig {
    pub width: u32,
    pub blur_sigma: f32,
    pub quality: u32,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        let params = PlaceholderParams::default();
        Self {
            width: params.width,
            blur_sigma: params.blur_sigma,
            quality: params.quality.value(),
        }
    }
}

/// Remote image download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Request timeout in seconds. Absent means wait indefinitely.
    pub timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            user_agent: concat!("blog-img/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// The base layer that user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(MaterializerConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Read a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<MaterializerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: MaterializerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// A missing file yields the stock defaults. Relative paths inside the file
/// are kept as written (relative to the working directory).
pub fn load_config(path: &Path) -> Result<MaterializerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock config with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# blog-img configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.
#
# Optimization only runs when SITE_ENV=production. In any other mode the
# original source is emitted as-is and nothing is written.

# Local image references (e.g. "posts/hero.jpg") resolve against this root.
source_root = "src/static"

# Derived variants are written here as <content-key>-<width>.<ext>.
output_dir = "_output/images"

# Public URL prefix under which output_dir is served.
url_path = "/images"

# Remote images are downloaded here once and reused on later builds.
download_dir = ".cache/remote-images"

# ---------------------------------------------------------------------------
# Widths
# ---------------------------------------------------------------------------
[widths]
# Widths generated for responsive images, strictly ascending.
# Widths larger than the source are replaced by the source width.
ladder = [320, 480, 800, 1024, 1280]

# Non-responsive images are rendered once at min(source width, max_fixed).
max_fixed = 1280

# Pixels subtracted from each breakpoint in the generated `sizes` attribute.
sizes_gutter = 40

# ---------------------------------------------------------------------------
# Formats
# ---------------------------------------------------------------------------
[formats]
# Encodings written for every width: avif, webp, jpeg, png.
# avif/webp become <source> elements; the first jpeg/png is the <img> fallback.
list = ["webp", "jpeg"]

# Lossy encoding quality (1 = worst, 100 = best).
quality = 80

# ---------------------------------------------------------------------------
# Blur placeholder (inlined as a data: URL)
# ---------------------------------------------------------------------------
[placeholder]
width = 64
blur_sigma = 2.0
quality = 50

# ---------------------------------------------------------------------------
# Remote images
# ---------------------------------------------------------------------------
[fetch]
# Request timeout in seconds. Omit to wait indefinitely.
# timeout_secs = 30
user_agent = "blog-img"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = MaterializerConfig::default();
        assert_eq!(config.source_root, PathBuf::from("src/static"));
        assert_eq!(config.output_dir, PathBuf::from("_output/images"));
        assert_eq!(config.url_path, "/images");
        assert_eq!(config.widths.ladder, vec![320, 480, 800, 1024, 1280]);
        assert_eq!(config.widths.max_fixed, 1280);
        assert_eq!(
            config.formats.list,
            vec![OutputFormat::Webp, OutputFormat::Jpeg]
        );
        assert_eq!(config.placeholder.width, 64);
        assert!(config.fetch.timeout_secs.is_none());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
url_path = "/assets/img"

[formats]
list = ["avif", "webp", "jpeg"]
"#;
        let config: MaterializerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.url_path, "/assets/img");
        assert_eq!(config.formats.list.len(), 3);
        // Defaults preserved
        assert_eq!(config.formats.quality, 80);
        assert_eq!(config.widths.ladder, vec![320, 480, 800, 1024, 1280]);
    }

    #[test]
    fn responsive_config_mirrors_values() {
        let mut config = MaterializerConfig::default();
        config.formats.quality = 70;
        config.widths.sizes_gutter = 0;

        let rc = config.responsive_config();
        assert_eq!(rc.quality.value(), 70);
        assert_eq!(rc.sizes_gutter, 0);
        assert_eq!(rc.url_path, "/images");
        assert_eq!(rc.ladder, config.widths.ladder);
    }

    #[test]
    fn placeholder_params_mirror_values() {
        let params = MaterializerConfig::default().placeholder_params();
        assert_eq!(params, PlaceholderParams::default());
    }

    // =========================================================================
    // Mode
    // =========================================================================

    #[test]
    fn mode_production_is_case_insensitive() {
        assert_eq!(Mode::from_value(Some("production")), Mode::Production);
        assert_eq!(Mode::from_value(Some(" Production ")), Mode::Production);
    }

    #[test]
    fn mode_defaults_to_development() {
        assert_eq!(Mode::from_value(None), Mode::Development);
        assert_eq!(Mode::from_value(Some("")), Mode::Development);
        assert_eq!(Mode::from_value(Some("staging")), Mode::Development);
        assert!(!Mode::Development.is_production());
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("blog-img.toml")).unwrap();
        assert_eq!(config.url_path, "/images");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blog-img.toml");
        fs::write(
            &path,
            r#"
output_dir = "public/img"

[widths]
ladder = [400, 800]
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.output_dir, PathBuf::from("public/img"));
        assert_eq!(config.widths.ladder, vec![400, 800]);
        // Unspecified values should be defaults
        assert_eq!(config.widths.max_fixed, 1280);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blog-img.toml");
        fs::write(&path, "this is not [valid toml").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blog-img.toml");
        fs::write(&path, "[widths]\nladdr = [100]\n").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_format_rejected() {
        let toml = r#"
[formats]
list = ["gif"]
"#;
        let result: Result<MaterializerConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("blog-img.toml");
        fs::write(&path, "[formats]\nquality = 0\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(MaterializerConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_empty_ladder() {
        let mut config = MaterializerConfig::default();
        config.widths.ladder.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_unsorted_ladder() {
        let mut config = MaterializerConfig::default();
        config.widths.ladder = vec![800, 320];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_width() {
        let mut config = MaterializerConfig::default();
        config.widths.ladder = vec![0, 320];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_duplicate_format() {
        let mut config = MaterializerConfig::default();
        config.formats.list = vec![OutputFormat::Jpeg, OutputFormat::Jpeg];
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_formats() {
        let mut config = MaterializerConfig::default();
        config.formats.list.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_quality_boundaries() {
        let mut config = MaterializerConfig::default();
        config.formats.quality = 100;
        assert!(config.validate().is_ok());
        config.formats.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_negative_blur() {
        let mut config = MaterializerConfig::default();
        config.placeholder.blur_sigma = -1.0;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // Processing
    // =========================================================================

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        assert_eq!(effective_threads(&config), cores);
    }

    // =========================================================================
    // merge_toml
    // =========================================================================

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[widths]\nladder = [1]\nmax_fixed = 5\n").unwrap();
        let overlay: toml::Value = toml::from_str("[widths]\nmax_fixed = 9\n").unwrap();
        let merged = merge_toml(base, overlay);

        assert_eq!(merged["widths"]["max_fixed"].as_integer(), Some(9));
        assert_eq!(merged["widths"]["ladder"][0].as_integer(), Some(1));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("list = [\"webp\", \"jpeg\"]").unwrap();
        let overlay: toml::Value = toml::from_str("list = [\"avif\"]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["list"].as_array().unwrap().len(), 1);
    }

    // =========================================================================
    // stock config
    // =========================================================================

    #[test]
    fn stock_defaults_value_is_table() {
        assert!(stock_defaults_value().unwrap().is_table());
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: MaterializerConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = MaterializerConfig::default();
        assert_eq!(config.source_root, defaults.source_root);
        assert_eq!(config.output_dir, defaults.output_dir);
        assert_eq!(config.url_path, defaults.url_path);
        assert_eq!(config.widths.ladder, defaults.widths.ladder);
        assert_eq!(config.formats.list, defaults.formats.list);
        assert_eq!(config.placeholder.blur_sigma, defaults.placeholder.blur_sigma);
        assert_eq!(config.processing.max_processes, None);
        config.validate().unwrap();
    }
}
