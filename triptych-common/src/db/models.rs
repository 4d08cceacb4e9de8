//! Database models shared across Triptych services

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// The three artifact slots of a daily bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Music,
    Image,
    Text,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 3] = [ArtifactKind::Music, ArtifactKind::Image, ArtifactKind::Text];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Music => "music",
            ArtifactKind::Image => "image",
            ArtifactKind::Text => "text",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "music" => Ok(ArtifactKind::Music),
            "image" => Ok(ArtifactKind::Image),
            "text" => Ok(ArtifactKind::Text),
            other => Err(Error::InvalidInput(format!("Unknown artifact kind: {}", other))),
        }
    }
}

/// Position within an arc
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArcPhase {
    Early,
    Middle,
    Late,
}

impl ArcPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArcPhase::Early => "early",
            ArcPhase::Middle => "middle",
            ArcPhase::Late => "late",
        }
    }
}

impl fmt::Display for ArcPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArcPhase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "early" => Ok(ArcPhase::Early),
            "middle" => Ok(ArcPhase::Middle),
            "late" => Ok(ArcPhase::Late),
            other => Err(Error::InvalidInput(format!("Unknown arc phase: {}", other))),
        }
    }
}

/// A multi-day themed sequence of bundles
///
/// At most one arc per user has `completed_date == None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arc {
    pub id: Uuid,
    pub user_id: String,
    pub theme: String,
    pub description: String,
    pub short_description: String,
    pub start_date: NaiveDate,
    pub target_duration_days: u32,
    pub current_phase: ArcPhase,
    pub completed_date: Option<NaiveDate>,
    /// Retrospective written when the arc completes
    pub completion_summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Arc {
    /// New active arc in its early phase
    pub fn new(
        user_id: impl Into<String>,
        theme: impl Into<String>,
        description: impl Into<String>,
        short_description: impl Into<String>,
        start_date: NaiveDate,
        target_duration_days: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            theme: theme.into(),
            description: description.into(),
            short_description: short_description.into(),
            start_date,
            target_duration_days,
            current_phase: ArcPhase::Early,
            completed_date: None,
            completion_summary: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.completed_date.is_none()
    }
}

/// Lifecycle of a persisted daily bundle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BundleStatus {
    /// Generated, not yet interacted with
    Draft,
    /// First genuine interaction happened; exposures recorded
    Delivered,
}

impl BundleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BundleStatus::Draft => "draft",
            BundleStatus::Delivered => "delivered",
        }
    }
}

impl FromStr for BundleStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BundleStatus::Draft),
            "delivered" => Ok(BundleStatus::Delivered),
            other => Err(Error::InvalidInput(format!("Unknown bundle status: {}", other))),
        }
    }
}

/// Append-only ledger entry recording that an artifact was shown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureEntry {
    pub user_id: String,
    pub artifact_type: ArtifactKind,
    /// `normalize(title) - normalize(creator)`
    pub canonical_id: String,
    /// `normalize(creator)`
    pub creator_id: String,
    pub arc_id: Uuid,
    pub shown_at: DateTime<Utc>,
}
