//! Curation orchestrator
//!
//! Sequences one daily curation run:
//!
//! 1. Return the persisted bundle if the day already has one
//! 2. Require an active arc; compute day-in-arc and advance the phase
//! 3. Aggregate context (exposure window, insights)
//! 4. Propose the triple, then validate coherence and repair image/text
//! 5. Resolve the three artifacts concurrently, each with its own budget
//! 6. Write framing over the final artifacts
//! 7. Persist as draft (compare-and-set on `(user_id, date)`)
//!
//! Any generation failure aborts the run before step 7, so a partial bundle
//! is never persisted. Exposures are recorded on delivery, not here.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use std::sync::Arc;
use triptych_common::config::CurationConfig;
use triptych_common::db::{Arc as CurationArc, BundleStatus};
use triptych_common::time::{date_key, now};

use crate::db::{arcs, bundles, settings};
use crate::error::CurationError;
use crate::models::{
    Curated, DailyBundle, ImageProposal, MusicProposal, ProposalTriple, TextProposal,
};
use crate::services::arc_tracker::{self, SessionEndOutcome};
use crate::services::coherence_validator;
use crate::services::context_aggregator::{aggregate_context, CurationContext};
use crate::services::generation_client::{
    generate_structured, ContentGenerator, GenerationError, GenerationRequest, GenerationRole,
};
use crate::services::link_resolution::resolve_with_retry;
use crate::services::prompts;
use crate::types::ArtifactResolver;

#[derive(Debug, Deserialize)]
struct FramingResponse {
    framing: String,
}

/// Result of a delivery request
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub bundle: DailyBundle,
    /// `true` only for the request that performed the transition
    pub newly_delivered: bool,
}

/// Root of the curation pipeline
pub struct CurationOrchestrator {
    db: SqlitePool,
    generator: Arc<dyn ContentGenerator>,
    music_resolver: Arc<dyn ArtifactResolver<MusicProposal>>,
    image_resolver: Arc<dyn ArtifactResolver<ImageProposal>>,
    settings: CurationConfig,
}

impl CurationOrchestrator {
    pub fn new(
        db: SqlitePool,
        generator: Arc<dyn ContentGenerator>,
        music_resolver: Arc<dyn ArtifactResolver<MusicProposal>>,
        image_resolver: Arc<dyn ArtifactResolver<ImageProposal>>,
        settings: CurationConfig,
    ) -> Self {
        Self {
            db,
            generator,
            music_resolver,
            image_resolver,
            settings,
        }
    }

    /// Generate (or return the existing) bundle for `user_id` on `date`
    pub async fn generate_daily_bundle(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<DailyBundle, CurationError> {
        if let Some(existing) = bundles::load_bundle(&self.db, user_id, date).await? {
            tracing::debug!(user_id = %user_id, date = %date, "Bundle already exists");
            return Ok(existing);
        }

        let arc = arcs::active_arc(&self.db, user_id)
            .await?
            .ok_or_else(|| CurationError::NoActiveArc(user_id.to_string()))?;

        let day = arc_tracker::day_in_arc(&self.db, &arc).await?;
        let phase = arc_tracker::advance_phase(&self.db, &arc, day).await?;
        let window_days =
            settings::get_exposure_window_days(&self.db, self.settings.exposure_window_days).await?;

        tracing::info!(
            user_id = %user_id,
            date = %date,
            arc_id = %arc.id,
            day,
            phase = %phase,
            "Curation run started"
        );

        let context = aggregate_context(&self.db, arc, day, phase, window_days).await?;
        let generator = self.generator.as_ref();

        let triple = propose_triple(generator, &context).await?;
        let triple = coherence_validator::validate_and_repair(generator, &context, triple).await?;

        let (music, image, text) = tokio::try_join!(
            resolve_with_retry(
                triple.music,
                Some(self.music_resolver.as_ref()),
                generator,
                &context
            ),
            resolve_with_retry(
                triple.image,
                Some(self.image_resolver.as_ref()),
                generator,
                &context
            ),
            resolve_with_retry::<TextProposal>(triple.text, None, generator, &context),
        )?;

        let warnings: Vec<String> = [music.warning, image.warning, text.warning]
            .into_iter()
            .flatten()
            .collect();

        let framing =
            write_framing(generator, &context, &music.curated, &image.curated, &text.curated)
                .await?;

        let bundle = DailyBundle {
            id: date_key(date),
            user_id: user_id.to_string(),
            date,
            arc_id: context.arc.id,
            day_in_arc: day,
            music: music.curated,
            image: image.curated,
            text: text.curated,
            framing,
            status: BundleStatus::Draft,
            warnings,
            created_at: now(),
            delivered_at: None,
        };

        if bundles::insert_if_absent(&self.db, &bundle).await? {
            tracing::info!(
                user_id = %user_id,
                date = %date,
                warnings = bundle.warnings.len(),
                "Bundle persisted"
            );
            return Ok(bundle);
        }

        // Lost the race to a concurrent run for the same day
        tracing::info!(user_id = %user_id, date = %date, "Concurrent run won; returning its bundle");
        bundles::load_bundle(&self.db, user_id, date)
            .await?
            .ok_or_else(|| {
                CurationError::Store(triptych_common::Error::Internal(format!(
                    "Bundle for {} on {} vanished after conflict",
                    user_id, date
                )))
            })
    }

    /// Mark the day's bundle delivered and record its exposures exactly once
    pub async fn deliver_bundle(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<DeliveryOutcome, CurationError> {
        let bundle = self.load_existing(user_id, date).await?;

        if bundle.status == BundleStatus::Delivered {
            return Ok(DeliveryOutcome {
                bundle,
                newly_delivered: false,
            });
        }

        let delivered_at = now();
        let entries = bundle.exposure_entries(delivered_at);
        let newly_delivered =
            bundles::deliver(&self.db, user_id, date, delivered_at, &entries).await?;

        if newly_delivered {
            tracing::info!(user_id = %user_id, date = %date, "Bundle delivered; exposures recorded");
        }

        let bundle = self.load_existing(user_id, date).await?;
        Ok(DeliveryOutcome {
            bundle,
            newly_delivered,
        })
    }

    /// Session-end hook (arc completion check)
    pub async fn end_session(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<SessionEndOutcome, CurationError> {
        arc_tracker::end_session(
            &self.db,
            self.generator.as_ref(),
            user_id,
            today,
            self.settings.arc_target_days,
        )
        .await
    }

    /// Seed a user's first (or next) arc by hand
    pub async fn start_arc(
        &self,
        user_id: &str,
        theme: &str,
        description: &str,
        short_description: &str,
        start_date: NaiveDate,
        target_days: Option<u32>,
    ) -> Result<CurationArc, CurationError> {
        if let Some(active) = arcs::active_arc(&self.db, user_id).await? {
            return Err(CurationError::ArcAlreadyActive(active.id));
        }

        let arc = CurationArc::new(
            user_id,
            theme,
            description,
            short_description,
            start_date,
            target_days.unwrap_or(self.settings.arc_target_days),
        );
        arcs::create(&self.db, &arc).await?;
        Ok(arc)
    }

    async fn load_existing(&self, user_id: &str, date: NaiveDate) -> Result<DailyBundle, CurationError> {
        bundles::load_bundle(&self.db, user_id, date)
            .await?
            .ok_or_else(|| {
                CurationError::Store(triptych_common::Error::NotFound(format!(
                    "Bundle for {} on {}",
                    user_id, date
                )))
            })
    }
}

async fn propose_triple(
    generator: &dyn ContentGenerator,
    context: &CurationContext,
) -> Result<ProposalTriple, GenerationError> {
    let request = GenerationRequest::new(
        GenerationRole::ProposeTriple,
        prompts::propose_triple(),
        json!({
            "arc": context.arc_json(),
            "constraints": context.constraints_json(),
            "insights": context.insights,
        }),
    );

    generate_structured(generator, request).await
}

async fn write_framing(
    generator: &dyn ContentGenerator,
    context: &CurationContext,
    music: &Curated<MusicProposal>,
    image: &Curated<ImageProposal>,
    text: &Curated<TextProposal>,
) -> Result<String, GenerationError> {
    let request = GenerationRequest::new(
        GenerationRole::WriteFraming,
        prompts::WRITE_FRAMING,
        json!({
            "arc": context.arc_json(),
            "music": music,
            "image": image,
            "text": text,
        }),
    );

    let response: FramingResponse = generate_structured(generator, request).await?;
    Ok(response.framing)
}
