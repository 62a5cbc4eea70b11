//! Configuration module.
//!
//! Handles loading, validating, and merging `shutterprep.toml`. Stock
//! defaults are overridden by the user file; command-line flags override
//! both (that last layer lives in `main.rs`).
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [capture]
//! quality = 75                      # JPEG quality (0-100)
//! width = 1024                      # Target width, -1 = unconstrained
//! height = 1024                     # Target height, -1 = unconstrained
//! cache_dir = ".shutterprep-cache"  # Where raw captures and tokens live
//!
//! [processing]
//! filter = "triangle"               # nearest | triangle | catmull-rom | gaussian | lanczos3
//! max_alloc_mb = 512                # Largest rotation buffer before giving up on rotating
//! max_processes = 4                 # Batch workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::capture::{CaptureRequest, DEFAULT_EDGE, DEFAULT_QUALITY};
use crate::imaging::RustBackend;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the config directory.
pub const CONFIG_FILE: &str = "shutterprep.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `shutterprep.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Default capture parameters.
    pub capture: CaptureConfig,
    /// Resampling and resource settings.
    pub processing: ProcessingConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0..=100).contains(&self.capture.quality) {
            return Err(ConfigError::Validation(
                "capture.quality must be 0-100".into(),
            ));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(ConfigError::Validation(
                "capture.width and capture.height must be positive, or -1 for unconstrained"
                    .into(),
            ));
        }
        if self.processing.max_alloc_mb == 0 {
            return Err(ConfigError::Validation(
                "processing.max_alloc_mb must be non-zero".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Default capture parameters, in the plugin's wire form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
    pub quality: i64,
    /// Target width; any negative value means unconstrained.
    pub width: i64,
    /// Target height; any negative value means unconstrained.
    pub height: i64,
    /// Directory for raw captures and continuation tokens.
    pub cache_dir: PathBuf,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            width: DEFAULT_EDGE,
            height: DEFAULT_EDGE,
            cache_dir: PathBuf::from(".shutterprep-cache"),
        }
    }
}

impl CaptureConfig {
    pub fn request(&self) -> CaptureRequest {
        CaptureRequest::from_raw(self.quality, self.width, self.height)
    }
}

/// Resampling filter names accepted in config and on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Filter {
    Nearest,
    /// Bilinear.
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl Filter {
    pub fn to_filter_type(self) -> FilterType {
        match self {
            Filter::Nearest => FilterType::Nearest,
            Filter::Triangle => FilterType::Triangle,
            Filter::CatmullRom => FilterType::CatmullRom,
            Filter::Gaussian => FilterType::Gaussian,
            Filter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Resampling, memory and parallelism settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    pub filter: Filter,
    /// Largest buffer, in MiB, a rotation may allocate.
    pub max_alloc_mb: u64,
    /// Maximum number of parallel batch workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            filter: Filter::default(),
            max_alloc_mb: 512,
            max_processes: None,
        }
    }
}

impl ProcessingConfig {
    /// Backend configured with this section's filter and allocation limit.
    pub fn backend(&self) -> RustBackend {
        RustBackend::new()
            .with_filter(self.filter.to_filter_type())
            .with_max_alloc(self.max_alloc_mb.saturating_mul(1024 * 1024))
    }
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(Config::default()).expect("default config must serialize")
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

/// Load `shutterprep.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from `shutterprep.toml` in the given directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(dir: &Path) -> Result<Config, ConfigError> {
    let merged = match load_raw_config(dir)? {
        Some(overlay) => merge_toml(stock_defaults_value(), overlay),
        None => stock_defaults_value(),
    };
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `shutterprep.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# shutterprep configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Capture defaults
# ---------------------------------------------------------------------------
[capture]
# JPEG quality of the normalized photo (0 = worst, 100 = best).
quality = 75

# Target size. The photo keeps its aspect ratio: with both set it is shrunk
# to fit inside width x height, with one set the other follows the ratio.
# Use -1 to leave a side unconstrained; -1 for both keeps the native size.
width = 1024
height = 1024

# Where raw captures and pending-capture tokens are kept.
cache_dir = ".shutterprep-cache"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Resampling filter for the final scale step:
# nearest | triangle | catmull-rom | gaussian | lanczos3
filter = "triangle"

# Largest buffer (MiB) a rotation may allocate. Above this the photo is
# written unrotated instead of failing.
max_alloc_mb = 512

# Maximum parallel workers for `batch`.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
