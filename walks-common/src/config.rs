//! Bootstrap configuration loading and config file resolution
//!
//! The TOML file carries bootstrap settings only: where the database lives,
//! where the lookup services are, logging, and the fallback area settings.
//! Every field has a built-in default so a missing file is never fatal.
//!
//! # Config file priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. Platform config directory (`~/.config/walks/geocode.toml` on Linux)
//! 4. Built-in defaults (no file)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "WALKS_CONFIG";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    /// Path to the SQLite database holding the walk documents
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// External lookup service endpoints
    #[serde(default)]
    pub services: ServicesConfig,

    /// Area used for disambiguation and plausibility checks
    #[serde(default)]
    pub area: AreaConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            logging: LoggingConfig::default(),
            services: ServicesConfig::default(),
            area: AreaConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Lookup service endpoints and client tuning
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesConfig {
    /// Reverse geocode by coordinate endpoint (`?lat=..&lng=..`)
    #[serde(default = "default_reverse_geocode_url")]
    pub reverse_geocode_url: String,

    /// Nominatim-compatible free text search endpoint
    #[serde(default = "default_place_search_url")]
    pub place_search_url: String,

    /// User-Agent sent to both services (Nominatim rejects anonymous clients)
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of place search results requested per query
    #[serde(default = "default_place_search_limit")]
    pub place_search_limit: u32,

    /// Minimum delay between place search calls
    #[serde(default = "default_place_search_delay_ms")]
    pub place_search_delay_ms: u64,

    /// Per-request timeout
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            reverse_geocode_url: default_reverse_geocode_url(),
            place_search_url: default_place_search_url(),
            user_agent: default_user_agent(),
            place_search_limit: default_place_search_limit(),
            place_search_delay_ms: default_place_search_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Area settings
///
/// `preferred_county` and `center` are fallbacks; the database settings
/// table and environment take priority over them.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaConfig {
    /// County or area name preferred when disambiguating place searches
    #[serde(default)]
    pub preferred_county: Option<String>,

    /// Area center as `[lat, lng]`
    #[serde(default)]
    pub center: Option<[f64; 2]>,

    /// Grid reference matches further than this from the center are rejected
    #[serde(default = "default_plausibility_threshold_miles")]
    pub plausibility_threshold_miles: f64,

    /// Two-letter grid prefixes never trusted as valid
    #[serde(default = "default_unreliable_grid_prefixes")]
    pub unreliable_grid_prefixes: Vec<String>,
}

impl Default for AreaConfig {
    fn default() -> Self {
        Self {
            preferred_county: None,
            center: None,
            plausibility_threshold_miles: default_plausibility_threshold_miles(),
            unreliable_grid_prefixes: default_unreliable_grid_prefixes(),
        }
    }
}

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("walks").join("walks.db"))
        .unwrap_or_else(|| PathBuf::from("./walks_data/walks.db"))
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_reverse_geocode_url() -> String {
    "http://localhost:5001/api/addresses/reverse-geocode".to_string()
}

fn default_place_search_url() -> String {
    "https://nominatim.openstreetmap.org/search".to_string()
}

fn default_user_agent() -> String {
    format!("walks-geocode/{}", env!("CARGO_PKG_VERSION"))
}

fn default_place_search_limit() -> u32 {
    5
}

fn default_place_search_delay_ms() -> u64 {
    1100 // Nominatim usage policy: at most 1 request per second
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_plausibility_threshold_miles() -> f64 {
    50.0
}

fn default_unreliable_grid_prefixes() -> Vec<String> {
    vec!["SV".to_string()]
}

/// Resolve which config file to read, if any
///
/// Returns `None` when no explicit path was given and no platform file exists.
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir()
        .map(|d| d.join("walks").join("geocode.toml"))
        .filter(|p| p.exists())
}

/// Parse TOML content into a config
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Where the bootstrap config came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from this file
    File(PathBuf),
    /// Named explicitly but absent, built-in defaults used
    MissingFile(PathBuf),
    /// No file named and none at the platform path
    Defaults,
}

impl ConfigSource {
    /// Report the source; call once logging is initialized
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded config from {}", path.display()),
            ConfigSource::MissingFile(path) => {
                warn!("Config file {} not found, using built-in defaults", path.display())
            }
            ConfigSource::Defaults => info!("No config file found, using built-in defaults"),
        }
    }
}

/// Load bootstrap config
///
/// A missing file falls back to built-in defaults; a file that exists but
/// does not parse is an error. Nothing is logged here because the log level
/// itself comes from this file, so the caller reports the returned source.
pub fn load_toml_config(cli_arg: Option<&Path>) -> Result<(TomlConfig, ConfigSource)> {
    let Some(path) = resolve_config_path(cli_arg) else {
        return Ok((TomlConfig::default(), ConfigSource::Defaults));
    };

    if !path.exists() {
        return Ok((TomlConfig::default(), ConfigSource::MissingFile(path)));
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config = parse_toml_config(&content)?;
    Ok((config, ConfigSource::File(path)))
}
