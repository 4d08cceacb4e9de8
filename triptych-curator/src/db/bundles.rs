//! Daily bundle persistence
//!
//! Bundles are keyed by `(user_id, date)`. Both writes are compare-and-set:
//! insertion only succeeds when no bundle exists for the key, and delivery
//! only succeeds on a draft. Concurrent invocations for the same day
//! therefore cannot produce two bundles or append exposures twice.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use triptych_common::db::{BundleStatus, ExposureEntry};
use triptych_common::time::{date_key, parse_date_key, parse_db_timestamp, to_db_timestamp};
use triptych_common::{Error, Result};
use uuid::Uuid;

use crate::db::exposures;
use crate::models::DailyBundle;
use crate::utils::{db_retry::DEFAULT_MAX_LOCK_WAIT_MS, retry_on_lock};

/// Insert a bundle unless one already exists for its `(user_id, date)`
///
/// Returns `true` when this call wrote the row.
pub async fn insert_if_absent(pool: &SqlitePool, bundle: &DailyBundle) -> Result<bool> {
    let music = to_json(&bundle.music)?;
    let image = to_json(&bundle.image)?;
    let text = to_json(&bundle.text)?;
    let warnings = to_json(&bundle.warnings)?;
    let date = date_key(bundle.date);
    let arc_id = bundle.arc_id.to_string();
    let created_at = to_db_timestamp(bundle.created_at);
    let delivered_at = bundle.delivered_at.map(to_db_timestamp);

    retry_on_lock("insert_bundle", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let result = sqlx::query(
            r#"
            INSERT INTO bundles (
                user_id, date, arc_id, day_in_arc, music, image, text,
                framing, status, warnings, created_at, delivered_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, date) DO NOTHING
            "#,
        )
        .bind(&bundle.user_id)
        .bind(&date)
        .bind(&arc_id)
        .bind(i64::from(bundle.day_in_arc))
        .bind(&music)
        .bind(&image)
        .bind(&text)
        .bind(&bundle.framing)
        .bind(bundle.status.as_str())
        .bind(&warnings)
        .bind(&created_at)
        .bind(&delivered_at)
        .execute(pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() == 1)
    })
    .await
}

/// Load the bundle for a user's calendar date
pub async fn load_bundle(
    pool: &SqlitePool,
    user_id: &str,
    date: NaiveDate,
) -> Result<Option<DailyBundle>> {
    let row = sqlx::query(
        r#"
        SELECT user_id, date, arc_id, day_in_arc, music, image, text,
               framing, status, warnings, created_at, delivered_at
        FROM bundles
        WHERE user_id = ? AND date = ?
        "#,
    )
    .bind(user_id)
    .bind(date_key(date))
    .fetch_optional(pool)
    .await?;

    row.map(|r| bundle_from_row(&r)).transpose()
}

/// Transition a draft bundle to delivered and append its exposures
///
/// Status change and ledger writes share one transaction. Returns `true`
/// only for the call that performed the transition; later calls write
/// nothing.
pub async fn deliver(
    pool: &SqlitePool,
    user_id: &str,
    date: NaiveDate,
    at: DateTime<Utc>,
    entries: &[ExposureEntry],
) -> Result<bool> {
    let date = date_key(date);
    let delivered_at = to_db_timestamp(at);

    retry_on_lock("deliver_bundle", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let mut tx = pool.begin().await.map_err(Error::Database)?;

        let result = sqlx::query(
            r#"
            UPDATE bundles SET status = 'delivered', delivered_at = ?
            WHERE user_id = ? AND date = ? AND status = 'draft'
            "#,
        )
        .bind(&delivered_at)
        .bind(user_id)
        .bind(&date)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() != 1 {
            tx.rollback().await.map_err(Error::Database)?;
            return Ok(false);
        }

        for entry in entries {
            exposures::record_on(&mut *tx, entry).await?;
        }

        tx.commit().await.map_err(Error::Database)?;
        Ok(true)
    })
    .await
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize bundle field: {}", e)))
}

fn from_json<T: serde::de::DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.get(column);
    serde_json::from_str(&raw)
        .map_err(|e| Error::Internal(format!("Failed to deserialize bundle {}: {}", column, e)))
}

fn bundle_from_row(row: &SqliteRow) -> Result<DailyBundle> {
    let date: String = row.get("date");
    let arc_id: String = row.get("arc_id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let delivered_at: Option<String> = row.get("delivered_at");

    Ok(DailyBundle {
        id: date.clone(),
        user_id: row.get("user_id"),
        date: parse_date_key(&date)?,
        arc_id: Uuid::parse_str(&arc_id)
            .map_err(|e| Error::Internal(format!("Invalid arc id '{}': {}", arc_id, e)))?,
        day_in_arc: row.get::<i64, _>("day_in_arc") as u32,
        music: from_json(row, "music")?,
        image: from_json(row, "image")?,
        text: from_json(row, "text")?,
        framing: row.get("framing"),
        status: status.parse::<BundleStatus>()?,
        warnings: from_json(row, "warnings")?,
        created_at: parse_db_timestamp(&created_at)?,
        delivered_at: delivered_at.as_deref().map(parse_db_timestamp).transpose()?,
    })
}
