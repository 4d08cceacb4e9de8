//! Curation services
//!
//! External clients (generation, music catalog, image archive, web search)
//! and the pipeline stages built on them.

pub mod arc_tracker;
pub mod coherence_validator;
pub mod context_aggregator;
pub mod curation_orchestrator;
pub mod generation_client;
pub mod image_archive_client;
pub mod link_resolution;
pub mod musicbrainz_client;
pub mod prompts;
pub mod reading_search_client;

pub use arc_tracker::{phase_for, SessionEndOutcome};
pub use coherence_validator::{CoherenceIssue, CoherenceVerdict};
pub use context_aggregator::{sanitize_insight, CurationContext, RecentExposures};
pub use curation_orchestrator::{CurationOrchestrator, DeliveryOutcome};
pub use generation_client::{
    ContentGenerator, GenerationError, GenerationRequest, GenerationRole, HttpContentGenerator,
};
pub use image_archive_client::ImageArchiveClient;
pub use link_resolution::{ResolutionOutcome, MAX_IMAGE_ATTEMPTS, MAX_MUSIC_ATTEMPTS, MAX_TEXT_ATTEMPTS};
pub use musicbrainz_client::MusicBrainzClient;
pub use reading_search_client::ReadingSearchClient;
