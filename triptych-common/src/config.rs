//! Configuration loading and root folder resolution
//!
//! Bootstrap configuration comes from a TOML file. A missing file is not an
//! error: the service starts on built-in defaults with a warning.
//!
//! Root folder priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "TRIPTYCH_ROOT_FOLDER";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "TRIPTYCH_CONFIG";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "triptych.db";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Root folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Content generation service
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Catalog, archive and search endpoints
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Curation tuning
    #[serde(default)]
    pub curation: CurationConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
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

/// Content generation service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Lowest-priority source for the API key (database and env win)
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: default_generation_endpoint(),
            model: default_generation_model(),
            max_tokens: default_max_tokens(),
            api_key: None,
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

/// External catalog endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_musicbrainz_url")]
    pub musicbrainz_url: String,
    #[serde(default = "default_image_archive_url")]
    pub image_archive_url: String,
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default)]
    pub search_api_key: Option<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            musicbrainz_url: default_musicbrainz_url(),
            image_archive_url: default_image_archive_url(),
            search_url: default_search_url(),
            search_api_key: None,
        }
    }
}

/// Curation tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CurationConfig {
    /// Trailing exposure window used for deduplication
    #[serde(default = "default_exposure_window_days")]
    pub exposure_window_days: u32,
    /// Target length of newly created arcs
    #[serde(default = "default_arc_target_days")]
    pub arc_target_days: u32,
}

/// Longest accepted exposure window (ten years)
pub const MAX_EXPOSURE_WINDOW_DAYS: u32 = 3650;

impl CurationConfig {
    /// Reject windows and arc lengths the pipeline cannot use
    pub fn validate(&self) -> Result<()> {
        check_exposure_window_days(self.exposure_window_days)?;
        if self.arc_target_days == 0 {
            return Err(Error::Config(
                "curation.arc_target_days must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Exposure window must lie in `1..=MAX_EXPOSURE_WINDOW_DAYS`
pub fn check_exposure_window_days(days: u32) -> Result<u32> {
    if (1..=MAX_EXPOSURE_WINDOW_DAYS).contains(&days) {
        Ok(days)
    } else {
        Err(Error::Config(format!(
            "exposure_window_days must be between 1 and {}, got {}",
            MAX_EXPOSURE_WINDOW_DAYS, days
        )))
    }
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            exposure_window_days: default_exposure_window_days(),
            arc_target_days: default_arc_target_days(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_generation_endpoint() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_generation_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_generation_timeout_secs() -> u64 {
    120
}

fn default_musicbrainz_url() -> String {
    "https://musicbrainz.org/ws/2".to_string()
}

fn default_image_archive_url() -> String {
    "https://api.artic.edu/api/v1".to_string()
}

fn default_search_url() -> String {
    "https://api.search.brave.com/res/v1/web/search".to_string()
}

fn default_exposure_window_days() -> u32 {
    14
}

fn default_arc_target_days() -> u32 {
    7
}

/// Load the TOML bootstrap config
///
/// Priority for the file location: explicit path → `TRIPTYCH_CONFIG` →
/// `<config_dir>/triptych/config.toml`. A missing file yields defaults; a file
/// that exists but does not parse is a configuration error.
pub fn load_toml_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => std::env::var(CONFIG_PATH_ENV)
            .ok()
            .map(PathBuf::from)
            .or_else(default_config_path),
    };

    let Some(path) = path else {
        warn!("No config directory available, using built-in defaults");
        return Ok(TomlConfig::default());
    };

    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using built-in defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.curation.validate()?;

    info!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Default config file location for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("triptych").join("config.toml"))
}

/// Resolve the root folder (CLI → env → TOML → OS default)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml_config.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("triptych"))
        .unwrap_or_else(|| PathBuf::from("./triptych_data"))
}

/// Create the root folder if missing and return the database path inside it
pub fn prepare_root_folder(root: &Path) -> Result<PathBuf> {
    if !root.exists() {
        std::fs::create_dir_all(root)?;
        info!(root = %root.display(), "Created root folder");
    }
    Ok(root.join(DATABASE_FILE))
}
