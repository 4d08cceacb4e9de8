//! Database Test Utilities

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use sqlx::SqlitePool;
use tempfile::TempDir;
use triptych_common::db::{Arc as CurationArc, ArtifactKind, BundleStatus, ExposureEntry};
use triptych_common::time::{date_key, now};
use triptych_curator::db::{arcs, bundles, exposures};
use triptych_curator::models::{
    Curated, DailyBundle, ImageProposal, MusicProposal, ResolvedReference, TextProposal,
};

/// Create temporary test database with the schema applied
///
/// Returns (TempDir, SqlitePool) - TempDir must be kept alive for duration of test
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test_triptych.db");
    let pool = triptych_curator::db::init_database_pool(&db_path).await?;
    Ok((temp_dir, pool))
}

/// Create an active arc for `user_id`
pub async fn seed_arc(pool: &SqlitePool, user_id: &str, target_days: u32) -> CurationArc {
    let start = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
    let arc = CurationArc::new(
        user_id,
        "Night Journeys",
        "Works about travelling through darkness toward morning",
        "Night journeys",
        start,
        target_days,
    );
    arcs::create(pool, &arc).await.unwrap();
    arc
}

/// A draft bundle with fixed artifacts
pub fn sample_bundle(user_id: &str, arc_id: uuid::Uuid, date: NaiveDate, day: u32) -> DailyBundle {
    DailyBundle {
        id: date_key(date),
        user_id: user_id.to_string(),
        date,
        arc_id,
        day_in_arc: day,
        music: Curated {
            proposal: MusicProposal {
                title: format!("Nocturne No. {}", day),
                artist: "Frédéric Chopin".to_string(),
                composer: None,
                performer: None,
                album: None,
                search_hint: String::new(),
            },
            reference: Some(ResolvedReference::new("https://musicbrainz.org/recording/x")),
        },
        image: Curated {
            proposal: ImageProposal {
                title: format!("Nocturne {}", day),
                artist: "James McNeill Whistler".to_string(),
                year: None,
                search_hint: String::new(),
            },
            reference: None,
        },
        text: Curated {
            proposal: TextProposal {
                title: "Acquainted with the Night".to_string(),
                author: "Robert Frost".to_string(),
                excerpt: "I have been one acquainted with the night.".to_string(),
                search_hint: String::new(),
            },
            reference: None,
        },
        framing: "Night, three ways.".to_string(),
        status: BundleStatus::Draft,
        warnings: Vec::new(),
        created_at: now(),
        delivered_at: None,
    }
}

/// Persist and deliver `count` bundles for `arc`, one per day from its start
pub async fn seed_delivered_bundles(pool: &SqlitePool, arc: &CurationArc, count: u32) {
    for day in 1..=count {
        let date = arc.start_date + Duration::days(i64::from(day) - 1);
        let bundle = sample_bundle(&arc.user_id, arc.id, date, day);
        assert!(bundles::insert_if_absent(pool, &bundle).await.unwrap());
        assert!(bundles::deliver(pool, &arc.user_id, date, now(), &[]).await.unwrap());
    }
}

/// Record one exposure shown a day ago
pub async fn seed_exposure(
    pool: &SqlitePool,
    user_id: &str,
    arc_id: uuid::Uuid,
    kind: ArtifactKind,
    canonical_id: &str,
    creator_id: &str,
) {
    exposures::record(
        pool,
        &ExposureEntry {
            user_id: user_id.to_string(),
            artifact_type: kind,
            canonical_id: canonical_id.to_string(),
            creator_id: creator_id.to_string(),
            arc_id,
            shown_at: Utc::now() - Duration::days(1),
        },
    )
    .await
    .unwrap();
}
