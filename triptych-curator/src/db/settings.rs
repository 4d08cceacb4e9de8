//! Settings database operations
//!
//! Key-value accessors over the `settings` table. The database is the
//! highest-priority source for secrets (see `config::resolve_generation_api_key`).

use sqlx::{Pool, Sqlite};
use triptych_common::config::check_exposure_window_days;
use triptych_common::{Error, Result};

const GENERATION_API_KEY: &str = "generation_api_key";

/// Get the generation service API key from the database
pub async fn get_generation_api_key(db: &Pool<Sqlite>) -> Result<Option<String>> {
    get_setting::<String>(db, GENERATION_API_KEY).await
}

/// Store the generation service API key
pub async fn set_generation_api_key(db: &Pool<Sqlite>, key: String) -> Result<()> {
    set_setting(db, GENERATION_API_KEY, key).await
}

/// Get exposure window override (days)
///
/// Falls back to `default` when unset. Values outside
/// `1..=MAX_EXPOSURE_WINDOW_DAYS` are a configuration error.
pub async fn get_exposure_window_days(db: &Pool<Sqlite>, default: u32) -> Result<u32> {
    let days = get_setting(db, "exposure_window_days")
        .await?
        .unwrap_or(default);
    check_exposure_window_days(days)
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(Option<String>,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((Some(value),)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting {} failed: {}", key, e)))?;
            Ok(Some(parsed))
        }
        _ => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        triptych_common::db::create_settings_table(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_api_key_round_trip() {
        let pool = setup_test_db().await;
        assert!(get_generation_api_key(&pool).await.unwrap().is_none());

        set_generation_api_key(&pool, "first".to_string()).await.unwrap();
        set_generation_api_key(&pool, "second".to_string()).await.unwrap();

        assert_eq!(get_generation_api_key(&pool).await.unwrap().as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_window_days_default_and_parse_error() {
        let pool = setup_test_db().await;
        assert_eq!(get_exposure_window_days(&pool, 14).await.unwrap(), 14);

        set_setting(&pool, "exposure_window_days", "21").await.unwrap();
        assert_eq!(get_exposure_window_days(&pool, 14).await.unwrap(), 21);

        set_setting(&pool, "exposure_window_days", "three weeks").await.unwrap();
        assert!(matches!(get_exposure_window_days(&pool, 14).await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_window_days_out_of_range_rejected() {
        let pool = setup_test_db().await;

        set_setting(&pool, "exposure_window_days", "0").await.unwrap();
        assert!(matches!(get_exposure_window_days(&pool, 14).await, Err(Error::Config(_))));

        set_setting(&pool, "exposure_window_days", "200000000").await.unwrap();
        assert!(matches!(get_exposure_window_days(&pool, 14).await, Err(Error::Config(_))));
    }
}
