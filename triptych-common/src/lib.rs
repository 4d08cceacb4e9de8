//! # Triptych Common Library
//!
//! Shared code for the Triptych curation services including:
//! - Error and result types
//! - Configuration loading and root folder resolution
//! - Identity normalization used for duplicate detection
//! - Database bootstrap and shared persisted models
//! - Calendar/timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod normalize;
pub mod time;

pub use error::{Error, Result};
pub use normalize::{canonical_creator, canonical_identifier, normalize};
