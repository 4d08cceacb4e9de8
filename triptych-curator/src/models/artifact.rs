//! Artifact proposals and resolved references
//!
//! A proposal is what the generation service claims an artifact to be. The
//! three kinds carry different disambiguation fields, so they are separate
//! types joined by the [`Proposal`] trait.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use triptych_common::db::ArtifactKind;
use triptych_common::{canonical_creator, canonical_identifier};

/// Proposed musical work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicProposal {
    pub title: String,
    /// Primary credited artist
    pub artist: String,
    /// Composer, for classical and other composed works
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composer: Option<String>,
    /// Performer or ensemble when different from the artist
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default)]
    pub search_hint: String,
}

/// Proposed visual artwork
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageProposal {
    pub title: String,
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(default)]
    pub search_hint: String,
}

/// Proposed literary excerpt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextProposal {
    /// Title of the work the excerpt comes from
    pub title: String,
    pub author: String,
    pub excerpt: String,
    #[serde(default)]
    pub search_hint: String,
}

/// The day's three proposals, as returned by one structured generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalTriple {
    pub music: MusicProposal,
    pub image: ImageProposal,
    pub text: TextProposal,
}

/// Identity used to compare a candidate against recent exposures
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    /// `normalize(title) - normalize(creator)`
    Artifact(String),
    /// `normalize(creator)` only
    Creator(String),
}

/// Behaviour shared by the three proposal kinds
pub trait Proposal: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    const KIND: ArtifactKind;

    fn title(&self) -> &str;

    fn creator(&self) -> &str;

    fn dedup_key(&self) -> DedupKey {
        DedupKey::Artifact(canonical_identifier(self.title(), self.creator()))
    }
}

impl Proposal for MusicProposal {
    const KIND: ArtifactKind = ArtifactKind::Music;

    fn title(&self) -> &str {
        &self.title
    }

    fn creator(&self) -> &str {
        &self.artist
    }
}

impl Proposal for ImageProposal {
    const KIND: ArtifactKind = ArtifactKind::Image;

    fn title(&self) -> &str {
        &self.title
    }

    fn creator(&self) -> &str {
        &self.artist
    }
}

impl Proposal for TextProposal {
    const KIND: ArtifactKind = ArtifactKind::Text;

    fn title(&self) -> &str {
        &self.title
    }

    fn creator(&self) -> &str {
        &self.author
    }

    // Texts are deduplicated by author alone
    fn dedup_key(&self) -> DedupKey {
        DedupKey::Creator(canonical_creator(&self.author))
    }
}

/// Verified external reference for an artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedReference {
    pub url: String,
    /// Landing page when `url` points at the raw asset (archive images)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl ResolvedReference {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source_url: None,
        }
    }

    pub fn with_source(url: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source_url: Some(source_url.into()),
        }
    }
}

/// A finalized artifact: the proposal that survived selection plus its
/// reference (`None` when no verifiable reference was found)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curated<P> {
    pub proposal: P,
    pub reference: Option<ResolvedReference>,
}
