//! Configuration resolution for triptych-curator
//!
//! Secrets resolve with Database → ENV → TOML priority.

use sqlx::{Pool, Sqlite};
use tracing::{info, warn};
use triptych_common::config::TomlConfig;
use triptych_common::{Error, Result};

/// Environment variable holding the generation service API key
pub const GENERATION_API_KEY_ENV: &str = "TRIPTYCH_GENERATION_API_KEY";

/// Resolve the generation service API key from 3-tier configuration
///
/// **Priority:** Database → ENV → TOML
pub async fn resolve_generation_api_key(
    db: &Pool<Sqlite>,
    toml_config: &TomlConfig,
) -> Result<String> {
    let db_key = crate::db::settings::get_generation_api_key(db)
        .await?
        .filter(|k| is_valid_key(k));
    let env_key = std::env::var(GENERATION_API_KEY_ENV)
        .ok()
        .filter(|k| is_valid_key(k));
    let toml_key = toml_config
        .generation
        .api_key
        .clone()
        .filter(|k| is_valid_key(k));

    let sources: Vec<&str> = [
        db_key.as_ref().map(|_| "database"),
        env_key.as_ref().map(|_| "environment"),
        toml_key.as_ref().map(|_| "TOML"),
    ]
    .into_iter()
    .flatten()
    .collect();

    // Multiple sources usually means a stale copy somewhere
    if sources.len() > 1 {
        warn!(
            "Generation API key found in multiple sources: {}. Using {} (highest priority).",
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        info!("Generation API key loaded from database");
        return Ok(key);
    }

    if let Some(key) = env_key {
        info!("Generation API key loaded from environment variable");
        return Ok(key);
    }

    if let Some(key) = toml_key {
        info!("Generation API key loaded from TOML config");
        return Ok(key);
    }

    Err(Error::Config(format!(
        "Generation API key not configured. Configure using one of:\n\
         1. Database: settings.generation_api_key\n\
         2. Environment: {}=your-key-here\n\
         3. TOML config: [generation] api_key = \"your-key\"",
        GENERATION_API_KEY_ENV
    )))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
