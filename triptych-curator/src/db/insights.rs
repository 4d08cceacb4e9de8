//! Session insights
//!
//! Free-text notes produced by the conversational layer. They are opaque
//! here: stored verbatim, sanitized only when echoed into a prompt.

use sqlx::SqlitePool;
use triptych_common::time::{now, to_db_timestamp};
use triptych_common::Result;

/// Store an insight for a user
pub async fn record_insight(pool: &SqlitePool, user_id: &str, content: &str) -> Result<()> {
    sqlx::query("INSERT INTO insights (user_id, content, created_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(content)
        .bind(to_db_timestamp(now()))
        .execute(pool)
        .await?;

    Ok(())
}

/// Most recent insights, newest first
pub async fn recent_insights(pool: &SqlitePool, user_id: &str, limit: u32) -> Result<Vec<String>> {
    let rows: Vec<String> = sqlx::query_scalar(
        "SELECT content FROM insights WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ?",
    )
    .bind(user_id)
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
