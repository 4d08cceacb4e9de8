//! Arc store
//!
//! The active arc is always read from the database; nothing caches it.

use chrono::NaiveDate;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use triptych_common::db::{Arc, ArcPhase};
use triptych_common::time::{parse_date_key, parse_db_timestamp, to_db_timestamp, date_key};
use triptych_common::{Error, Result};
use uuid::Uuid;

use crate::utils::{db_retry::DEFAULT_MAX_LOCK_WAIT_MS, retry_on_lock};

/// Partial update applied by [`update`]
#[derive(Debug, Clone, Default)]
pub struct ArcPatch {
    pub current_phase: Option<ArcPhase>,
    pub completed_date: Option<NaiveDate>,
    pub completion_summary: Option<String>,
}

const ARC_COLUMNS: &str = "id, user_id, theme, description, short_description, start_date, \
     target_duration_days, current_phase, completed_date, completion_summary, created_at";

/// The user's arc without a completion date, if any
pub async fn active_arc(pool: &SqlitePool, user_id: &str) -> Result<Option<Arc>> {
    let query = format!(
        "SELECT {} FROM arcs WHERE user_id = ? AND completed_date IS NULL",
        ARC_COLUMNS
    );
    let row = sqlx::query(&query)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| arc_from_row(&r)).transpose()
}

/// Load an arc by id
pub async fn load_arc(pool: &SqlitePool, arc_id: Uuid) -> Result<Option<Arc>> {
    let query = format!("SELECT {} FROM arcs WHERE id = ?", ARC_COLUMNS);
    let row = sqlx::query(&query)
        .bind(arc_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| arc_from_row(&r)).transpose()
}

/// Insert a new arc
///
/// Fails if the arc is active and the user already has an active arc; the
/// partial unique index on `arcs(user_id)` enforces this.
pub async fn create(pool: &SqlitePool, arc: &Arc) -> Result<()> {
    retry_on_lock("create_arc", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let mut conn = pool.acquire().await.map_err(Error::Database)?;
        create_on(&mut *conn, arc).await
    })
    .await?;

    tracing::info!(
        arc_id = %arc.id,
        user_id = %arc.user_id,
        theme = %arc.theme,
        "Arc created"
    );

    Ok(())
}

/// Insert a new arc on an open connection or transaction
pub async fn create_on(conn: &mut SqliteConnection, arc: &Arc) -> Result<()> {
    if arc.target_duration_days == 0 {
        return Err(Error::InvalidInput(format!(
            "Arc {} must target at least one day",
            arc.id
        )));
    }

    sqlx::query(
        r#"
        INSERT INTO arcs (
            id, user_id, theme, description, short_description, start_date,
            target_duration_days, current_phase, completed_date, completion_summary, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(arc.id.to_string())
    .bind(&arc.user_id)
    .bind(&arc.theme)
    .bind(&arc.description)
    .bind(&arc.short_description)
    .bind(date_key(arc.start_date))
    .bind(i64::from(arc.target_duration_days))
    .bind(arc.current_phase.as_str())
    .bind(arc.completed_date.map(date_key))
    .bind(&arc.completion_summary)
    .bind(to_db_timestamp(arc.created_at))
    .execute(conn)
    .await?;

    Ok(())
}

/// Apply a partial update
///
/// Completion is one-way: a completed arc keeps its original completion
/// date even if patched again.
pub async fn update(pool: &SqlitePool, arc_id: Uuid, patch: &ArcPatch) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE arcs SET
            current_phase = COALESCE(?, current_phase),
            completed_date = COALESCE(completed_date, ?),
            completion_summary = COALESCE(?, completion_summary)
        WHERE id = ?
        "#,
    )
    .bind(patch.current_phase.map(|p| p.as_str()))
    .bind(patch.completed_date.map(date_key))
    .bind(&patch.completion_summary)
    .bind(arc_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("Arc {}", arc_id)));
    }

    Ok(())
}

/// Number of bundles persisted for an arc
pub async fn bundle_count_for_arc(pool: &SqlitePool, arc_id: Uuid) -> Result<u32> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bundles WHERE arc_id = ?")
        .bind(arc_id.to_string())
        .fetch_one(pool)
        .await?;

    Ok(count as u32)
}

/// Number of delivered bundles for an arc
pub async fn delivered_count_for_arc(pool: &SqlitePool, arc_id: Uuid) -> Result<u32> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM bundles WHERE arc_id = ? AND status = 'delivered'",
    )
    .bind(arc_id.to_string())
    .fetch_one(pool)
    .await?;

    Ok(count as u32)
}

/// Complete an arc and insert its successor in one transaction
///
/// The completion is a compare-and-set on `completed_date IS NULL`; it
/// returns `false` (writing nothing) when the arc was already completed, so
/// two concurrent session ends cannot both roll over. If the successor
/// cannot be inserted the completion is rolled back and the arc stays
/// active.
pub async fn roll_over(
    pool: &SqlitePool,
    arc_id: Uuid,
    completed_date: NaiveDate,
    summary: &str,
    next: &Arc,
) -> Result<bool> {
    let completed = date_key(completed_date);
    let arc_id = arc_id.to_string();

    retry_on_lock("roll_over_arc", DEFAULT_MAX_LOCK_WAIT_MS, || async {
        let mut tx = pool.begin().await.map_err(Error::Database)?;

        let result = sqlx::query(
            r#"
            UPDATE arcs SET completed_date = ?, completion_summary = ?
            WHERE id = ? AND completed_date IS NULL
            "#,
        )
        .bind(&completed)
        .bind(summary)
        .bind(&arc_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if result.rows_affected() != 1 {
            tx.rollback().await.map_err(Error::Database)?;
            return Ok(false);
        }

        create_on(&mut *tx, next).await?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(true)
    })
    .await
}

/// Arcs of a user, most recent first
pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Arc>> {
    let query = format!(
        "SELECT {} FROM arcs WHERE user_id = ? ORDER BY created_at DESC",
        ARC_COLUMNS
    );
    let rows = sqlx::query(&query).bind(user_id).fetch_all(pool).await?;

    rows.iter().map(arc_from_row).collect()
}

fn arc_from_row(row: &SqliteRow) -> Result<Arc> {
    let id: String = row.get("id");
    let id = Uuid::parse_str(&id)
        .map_err(|e| Error::Internal(format!("Invalid arc id '{}': {}", id, e)))?;

    let phase: String = row.get("current_phase");
    let start_date: String = row.get("start_date");
    let completed_date: Option<String> = row.get("completed_date");
    let created_at: String = row.get("created_at");

    Ok(Arc {
        id,
        user_id: row.get("user_id"),
        theme: row.get("theme"),
        description: row.get("description"),
        short_description: row.get("short_description"),
        start_date: parse_date_key(&start_date)?,
        target_duration_days: row.get::<i64, _>("target_duration_days") as u32,
        current_phase: phase.parse()?,
        completed_date: completed_date.as_deref().map(parse_date_key).transpose()?,
        completion_summary: row.get("completion_summary"),
        created_at: parse_db_timestamp(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        triptych_common::db::create_schema(&pool).await.unwrap();
        pool
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch_active() {
        let pool = setup_test_db().await;
        let arc = Arc::new("u1", "Tides", "Water and return", "Water", start(), 7);
        create(&pool, &arc).await.unwrap();

        let active = active_arc(&pool, "u1").await.unwrap().unwrap();
        assert_eq!(active, arc_with_db_precision(&arc));
        assert!(active_arc(&pool, "someone-else").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_completion_is_one_way() {
        let pool = setup_test_db().await;
        let arc = Arc::new("u1", "Tides", "Water and return", "Water", start(), 7);
        create(&pool, &arc).await.unwrap();

        let first = NaiveDate::from_ymd_opt(2024, 4, 7).unwrap();
        let later = NaiveDate::from_ymd_opt(2024, 4, 9).unwrap();
        update(&pool, arc.id, &ArcPatch { completed_date: Some(first), ..Default::default() })
            .await
            .unwrap();
        update(&pool, arc.id, &ArcPatch { completed_date: Some(later), ..Default::default() })
            .await
            .unwrap();

        let stored = load_arc(&pool, arc.id).await.unwrap().unwrap();
        assert_eq!(stored.completed_date, Some(first));
        assert!(active_arc(&pool, "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_second_active_arc_rejected() {
        let pool = setup_test_db().await;
        create(&pool, &Arc::new("u1", "A", "a", "a", start(), 7)).await.unwrap();

        let result = create(&pool, &Arc::new("u1", "B", "b", "b", start(), 7)).await;
        assert!(matches!(result, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_update_missing_arc_is_not_found() {
        let pool = setup_test_db().await;
        let result = update(&pool, Uuid::new_v4(), &ArcPatch::default()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_bundle_count_starts_at_zero() {
        let pool = setup_test_db().await;
        let arc = Arc::new("u1", "Tides", "Water", "Water", start(), 7);
        create(&pool, &arc).await.unwrap();
        assert_eq!(bundle_count_for_arc(&pool, arc.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_roll_over_succeeds_once() {
        let pool = setup_test_db().await;
        let arc = Arc::new("u1", "Tides", "Water", "Water", start(), 7);
        create(&pool, &arc).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 4, 7).unwrap();
        let next = Arc::new("u1", "Embers", "Fire", "Fire", day, 7);
        let rival = Arc::new("u1", "Frost", "Ice", "Ice", day, 7);
        assert!(roll_over(&pool, arc.id, day, "first", &next).await.unwrap());
        assert!(!roll_over(&pool, arc.id, day, "second", &rival).await.unwrap());

        let stored = load_arc(&pool, arc.id).await.unwrap().unwrap();
        assert_eq!(stored.completion_summary.as_deref(), Some("first"));
        assert_eq!(active_arc(&pool, "u1").await.unwrap().unwrap().id, next.id);
        assert!(load_arc(&pool, rival.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_roll_over_rolls_back_when_successor_invalid() {
        let pool = setup_test_db().await;
        let arc = Arc::new("u1", "Tides", "Water", "Water", start(), 7);
        create(&pool, &arc).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 4, 7).unwrap();
        let broken = Arc::new("u1", "Embers", "Fire", "Fire", day, 0);
        let result = roll_over(&pool, arc.id, day, "summary", &broken).await;

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        let stored = load_arc(&pool, arc.id).await.unwrap().unwrap();
        assert!(stored.is_active());
        assert!(stored.completion_summary.is_none());
    }

    #[tokio::test]
    async fn test_zero_target_rejected_on_create() {
        let pool = setup_test_db().await;
        let result = create(&pool, &Arc::new("u1", "A", "a", "a", start(), 0)).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(active_arc(&pool, "u1").await.unwrap().is_none());
    }

    /// Timestamps round-trip at microsecond precision
    fn arc_with_db_precision(arc: &Arc) -> Arc {
        let mut arc = arc.clone();
        arc.created_at = parse_db_timestamp(&to_db_timestamp(arc.created_at)).unwrap();
        arc
    }
}
