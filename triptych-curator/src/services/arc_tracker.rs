//! Arc lifecycle tracker
//!
//! Computes day-in-arc and phase, persists phase changes, and rolls an arc
//! over at session end once enough days have been delivered. Completing the
//! current arc and creating the next one share a single transaction, so there
//! is never a moment with two active arcs or with none.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use triptych_common::db::{Arc as CurationArc, ArcPhase};
use triptych_common::{Error, Result};
use uuid::Uuid;

use crate::db::arcs::{self, ArcPatch};
use crate::db::exposures;
use crate::error::CurationError;
use crate::services::generation_client::{
    generate_structured, ContentGenerator, GenerationRequest, GenerationRole,
};

/// Progress at or below which an arc is early
const EARLY_THRESHOLD: f64 = 0.33;
/// Progress at or below which an arc is middle
const MIDDLE_THRESHOLD: f64 = 0.66;

const COMPLETION_INSTRUCTIONS: &str = "You are closing a multi-day themed sequence of daily \
cultural artifacts (music, visual art, literature). Write a short retrospective of the \
sequence and propose the theme of the next one, which must differ from the finished theme. \
Respond with JSON only: {\"summary\": string, \"next_arc\": {\"theme\": string, \
\"description\": string, \"short_description\": string}}";

/// Phase for a 1-based day within an arc of `target` days
///
/// Progress is the fraction of the arc already behind the user,
/// `(day - 1) / target`. A target of 0 is treated as 1.
pub fn phase_for(day: u32, target: u32) -> ArcPhase {
    let target = target.max(1);
    let progress = f64::from(day.saturating_sub(1)) / f64::from(target);

    if progress <= EARLY_THRESHOLD {
        ArcPhase::Early
    } else if progress <= MIDDLE_THRESHOLD {
        ArcPhase::Middle
    } else {
        ArcPhase::Late
    }
}

/// Day number the next bundle for `arc` will carry
pub async fn day_in_arc(pool: &SqlitePool, arc: &CurationArc) -> Result<u32> {
    Ok(arcs::bundle_count_for_arc(pool, arc.id).await? + 1)
}

/// Persist the phase for `day` if it differs from the stored one
pub async fn advance_phase(pool: &SqlitePool, arc: &CurationArc, day: u32) -> Result<ArcPhase> {
    let phase = phase_for(day, arc.target_duration_days);

    if phase != arc.current_phase {
        arcs::update(
            pool,
            arc.id,
            &ArcPatch {
                current_phase: Some(phase),
                ..Default::default()
            },
        )
        .await?;

        tracing::info!(
            arc_id = %arc.id,
            day = day,
            from = %arc.current_phase,
            to = %phase,
            "Arc phase advanced"
        );
    }

    Ok(phase)
}

/// Generation response for a finished arc
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArcCompletion {
    pub summary: String,
    pub next_arc: NextArcProposal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextArcProposal {
    pub theme: String,
    pub description: String,
    pub short_description: String,
}

/// Result of a session-end check
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionEndOutcome {
    /// Arc still has days left
    Continuing {
        arc_id: Uuid,
        delivered_days: u32,
        target_days: u32,
    },
    /// Arc completed and the next one created
    RolledOver {
        completed_arc_id: Uuid,
        summary: String,
        next_arc: CurationArc,
    },
    /// A concurrent session end completed the arc first
    AlreadyRolledOver { completed_arc_id: Uuid },
}

/// Session-end hook: roll the active arc over once its target is reached
///
/// The completion summary is generated before anything is written, so a
/// generation failure leaves the arc untouched.
pub async fn end_session(
    pool: &SqlitePool,
    generator: &dyn ContentGenerator,
    user_id: &str,
    today: NaiveDate,
    next_target_days: u32,
) -> std::result::Result<SessionEndOutcome, CurationError> {
    let arc = arcs::active_arc(pool, user_id)
        .await?
        .ok_or_else(|| CurationError::NoActiveArc(user_id.to_string()))?;

    let delivered_days = arcs::delivered_count_for_arc(pool, arc.id).await?;
    if delivered_days < arc.target_duration_days {
        tracing::debug!(
            user_id = %user_id,
            arc_id = %arc.id,
            delivered_days,
            target = arc.target_duration_days,
            "Arc continues"
        );
        return Ok(SessionEndOutcome::Continuing {
            arc_id: arc.id,
            delivered_days,
            target_days: arc.target_duration_days,
        });
    }

    if next_target_days == 0 {
        return Err(CurationError::Store(Error::Config(
            "arc_target_days must be at least 1".to_string(),
        )));
    }

    let completion = request_completion(pool, generator, &arc, delivered_days).await?;

    let start = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let next = CurationArc::new(
        user_id,
        completion.next_arc.theme,
        completion.next_arc.description,
        completion.next_arc.short_description,
        start,
        next_target_days,
    );

    if !arcs::roll_over(pool, arc.id, today, &completion.summary, &next).await? {
        tracing::debug!(arc_id = %arc.id, "Arc already completed");
        return Ok(SessionEndOutcome::AlreadyRolledOver {
            completed_arc_id: arc.id,
        });
    }

    tracing::info!(
        user_id = %user_id,
        completed_arc_id = %arc.id,
        next_arc_id = %next.id,
        theme = %next.theme,
        "Arc rolled over"
    );

    Ok(SessionEndOutcome::RolledOver {
        completed_arc_id: arc.id,
        summary: completion.summary,
        next_arc: next,
    })
}

async fn request_completion(
    pool: &SqlitePool,
    generator: &dyn ContentGenerator,
    arc: &CurationArc,
    delivered_days: u32,
) -> std::result::Result<ArcCompletion, CurationError> {
    let shown: Vec<_> = exposures::for_arc(pool, arc.id)
        .await?
        .into_iter()
        .map(|e| json!({ "type": e.artifact_type, "artifact": e.canonical_id }))
        .collect();

    let request = GenerationRequest::new(
        GenerationRole::CompleteArc,
        COMPLETION_INSTRUCTIONS,
        json!({
            "theme": arc.theme,
            "description": arc.description,
            "days_delivered": delivered_days,
            "artifacts_shown": shown,
        }),
    );

    Ok(generate_structured(generator, request).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    #[test]
    fn test_phase_reference_points() {
        assert_eq!(phase_for(1, 7), ArcPhase::Early);
        assert_eq!(phase_for(5, 7), ArcPhase::Middle);
        assert_eq!(phase_for(7, 7), ArcPhase::Late);
    }

    #[test]
    fn test_phase_monotonic() {
        for target in 0..=30 {
            let mut previous = ArcPhase::Early;
            for day in 0..=40 {
                let phase = phase_for(day, target);
                assert!(phase >= previous, "phase regressed at day {} of {}", day, target);
                previous = phase;
            }
        }
    }

    #[test]
    fn test_zero_target_treated_as_one() {
        assert_eq!(phase_for(1, 0), phase_for(1, 1));
        assert_eq!(phase_for(2, 0), ArcPhase::Late);
    }

    #[test]
    fn test_days_past_target_stay_late() {
        assert_eq!(phase_for(12, 7), ArcPhase::Late);
    }

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        triptych_common::db::create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_advance_phase_persists_change_only() {
        let pool = setup_test_db().await;
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let arc = CurationArc::new("u1", "Thresholds", "Doors", "Doors", start, 7);
        arcs::create(&pool, &arc).await.unwrap();

        assert_eq!(advance_phase(&pool, &arc, 1).await.unwrap(), ArcPhase::Early);
        assert_eq!(
            arcs::load_arc(&pool, arc.id).await.unwrap().unwrap().current_phase,
            ArcPhase::Early
        );

        assert_eq!(advance_phase(&pool, &arc, 5).await.unwrap(), ArcPhase::Middle);
        assert_eq!(
            arcs::load_arc(&pool, arc.id).await.unwrap().unwrap().current_phase,
            ArcPhase::Middle
        );
    }

    #[tokio::test]
    async fn test_day_in_arc_starts_at_one() {
        let pool = setup_test_db().await;
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let arc = CurationArc::new("u1", "Thresholds", "Doors", "Doors", start, 7);
        arcs::create(&pool, &arc).await.unwrap();

        assert_eq!(day_in_arc(&pool, &arc).await.unwrap(), 1);
    }
}
