//! Database initialization
//!
//! Opens (or creates) the SQLite database and brings the schema up to date.
//! Every statement is `IF NOT EXISTS`, so initialization is safe to repeat.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Connection options apply to every pooled connection, not just the first
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        // WAL lets the HTTP handlers read while a curation run writes
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all Triptych tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_arcs_table(pool).await?;
    create_bundles_table(pool).await?;
    create_exposures_table(pool).await?;
    create_insights_table(pool).await?;
    Ok(())
}

pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_arcs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS arcs (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            theme TEXT NOT NULL,
            description TEXT NOT NULL,
            short_description TEXT NOT NULL,
            start_date TEXT NOT NULL,
            target_duration_days INTEGER NOT NULL CHECK (target_duration_days > 0),
            current_phase TEXT NOT NULL CHECK (current_phase IN ('early', 'middle', 'late')),
            completed_date TEXT,
            completion_summary TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one active (uncompleted) arc per user
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_arcs_one_active_per_user
        ON arcs(user_id) WHERE completed_date IS NULL
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn create_bundles_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bundles (
            user_id TEXT NOT NULL,
            date TEXT NOT NULL,
            arc_id TEXT NOT NULL REFERENCES arcs(id),
            day_in_arc INTEGER NOT NULL,
            music TEXT NOT NULL,
            image TEXT NOT NULL,
            text TEXT NOT NULL,
            framing TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('draft', 'delivered')),
            warnings TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            delivered_at TEXT,
            PRIMARY KEY (user_id, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_bundles_arc ON bundles(arc_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_exposures_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS exposures (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            artifact_type TEXT NOT NULL CHECK (artifact_type IN ('music', 'image', 'text')),
            canonical_id TEXT NOT NULL,
            creator_id TEXT NOT NULL,
            arc_id TEXT NOT NULL,
            shown_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_exposures_user_time ON exposures(user_id, shown_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_exposures_arc ON exposures(arc_id)")
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn create_insights_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS insights (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
