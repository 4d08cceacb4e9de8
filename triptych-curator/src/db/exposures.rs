//! Exposure ledger
//!
//! Append-only: entries are inserted and read, never updated or deleted.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use triptych_common::db::ExposureEntry;
use triptych_common::time::{parse_db_timestamp, to_db_timestamp, window_start};
use triptych_common::{Error, Result};
use uuid::Uuid;

const INSERT_EXPOSURE: &str = r#"
    INSERT INTO exposures (user_id, artifact_type, canonical_id, creator_id, arc_id, shown_at)
    VALUES (?, ?, ?, ?, ?, ?)
"#;

/// Append one entry
pub async fn record(pool: &SqlitePool, entry: &ExposureEntry) -> Result<()> {
    let mut conn = pool.acquire().await?;
    record_on(&mut *conn, entry).await
}

/// Append one entry on an open connection or transaction
pub async fn record_on(conn: &mut SqliteConnection, entry: &ExposureEntry) -> Result<()> {
    sqlx::query(INSERT_EXPOSURE)
        .bind(&entry.user_id)
        .bind(entry.artifact_type.as_str())
        .bind(&entry.canonical_id)
        .bind(&entry.creator_id)
        .bind(entry.arc_id.to_string())
        .bind(to_db_timestamp(entry.shown_at))
        .execute(conn)
        .await?;

    Ok(())
}

/// Entries shown to the user within the trailing `days`
pub async fn recent_window(pool: &SqlitePool, user_id: &str, days: u32) -> Result<Vec<ExposureEntry>> {
    recent_window_at(pool, user_id, days, Utc::now()).await
}

/// [`recent_window`] relative to an explicit instant
pub async fn recent_window_at(
    pool: &SqlitePool,
    user_id: &str,
    days: u32,
    at: DateTime<Utc>,
) -> Result<Vec<ExposureEntry>> {
    let since = to_db_timestamp(window_start(at, days)?);

    let rows = sqlx::query(
        r#"
        SELECT user_id, artifact_type, canonical_id, creator_id, arc_id, shown_at
        FROM exposures
        WHERE user_id = ? AND shown_at >= ?
        ORDER BY shown_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_all(pool)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

/// Entries recorded for an arc
pub async fn for_arc(pool: &SqlitePool, arc_id: Uuid) -> Result<Vec<ExposureEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT user_id, artifact_type, canonical_id, creator_id, arc_id, shown_at
        FROM exposures
        WHERE arc_id = ?
        ORDER BY id
        "#,
    )
    .bind(arc_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(entry_from_row).collect()
}

fn entry_from_row(row: &SqliteRow) -> Result<ExposureEntry> {
    let artifact_type: String = row.get("artifact_type");
    let arc_id: String = row.get("arc_id");
    let shown_at: String = row.get("shown_at");

    Ok(ExposureEntry {
        user_id: row.get("user_id"),
        artifact_type: artifact_type.parse()?,
        canonical_id: row.get("canonical_id"),
        creator_id: row.get("creator_id"),
        arc_id: Uuid::parse_str(&arc_id)
            .map_err(|e| Error::Internal(format!("Invalid arc id '{}': {}", arc_id, e)))?,
        shown_at: parse_db_timestamp(&shown_at)?,
    })
}
