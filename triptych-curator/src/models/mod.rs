//! Data models for curation

pub mod artifact;
pub mod bundle;

pub use artifact::{
    Curated, DedupKey, ImageProposal, MusicProposal, Proposal, ProposalTriple, ResolvedReference,
    TextProposal,
};
pub use bundle::DailyBundle;
