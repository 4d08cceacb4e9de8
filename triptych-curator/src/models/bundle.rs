//! Daily bundle model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use triptych_common::db::{BundleStatus, ExposureEntry};
use triptych_common::{canonical_creator, canonical_identifier};
use uuid::Uuid;

use super::artifact::{Curated, ImageProposal, MusicProposal, Proposal, TextProposal};

/// One day's three curated artifacts plus framing prose
///
/// `framing` is written only after all three artifacts are final, so it
/// never describes an artifact that was later replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBundle {
    /// Calendar date key (`YYYY-MM-DD`)
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    pub arc_id: Uuid,
    pub day_in_arc: u32,
    pub music: Curated<MusicProposal>,
    pub image: Curated<ImageProposal>,
    pub text: Curated<TextProposal>,
    pub framing: String,
    pub status: BundleStatus,
    /// Soft warnings from degraded resolutions
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl DailyBundle {
    /// Ledger entries recording this bundle's artifacts as shown
    pub fn exposure_entries(&self, shown_at: DateTime<Utc>) -> Vec<ExposureEntry> {
        vec![
            entry_for(&self.user_id, self.arc_id, &self.music.proposal, shown_at),
            entry_for(&self.user_id, self.arc_id, &self.image.proposal, shown_at),
            entry_for(&self.user_id, self.arc_id, &self.text.proposal, shown_at),
        ]
    }
}

fn entry_for<P: Proposal>(
    user_id: &str,
    arc_id: Uuid,
    proposal: &P,
    shown_at: DateTime<Utc>,
) -> ExposureEntry {
    ExposureEntry {
        user_id: user_id.to_string(),
        artifact_type: P::KIND,
        canonical_id: canonical_identifier(proposal.title(), proposal.creator()),
        creator_id: canonical_creator(proposal.creator()),
        arc_id,
        shown_at,
    }
}
