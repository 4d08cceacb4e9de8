//! Core trait definitions for the resolver seams
//!
//! Each external catalog sits behind a trait so the curation pipeline can be
//! driven by in-process fakes in tests:
//! - [`ArtifactResolver`]: proposal → verified reference (music, image)
//! - [`ReadingResolver`]: title/query → best reading URL

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ResolvedReference;

/// Resolver error
///
/// The link resolution engine treats every variant as "no reference found";
/// resolver errors never abort a curation run.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Network communication error
    #[error("Network error: {0}")]
    Network(String),

    /// External API returned an error status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse the catalog response
    #[error("Parse error: {0}")]
    Parse(String),

    /// Resolver misconfigured (missing key, bad URL)
    #[error("Resolver not available: {0}")]
    NotAvailable(String),
}

/// Resolves a proposal of kind `P` to a verified external reference
///
/// `Ok(None)` means the catalog had no entry passing the resolver's match
/// rule.
#[async_trait]
pub trait ArtifactResolver<P>: Send + Sync {
    /// Resolver name for logging
    fn name(&self) -> &'static str;

    async fn resolve(&self, candidate: &P) -> Result<Option<ResolvedReference>, ResolverError>;
}

/// Finds a reading link for a title
#[async_trait]
pub trait ReadingResolver: Send + Sync {
    async fn resolve(&self, title: &str, query: &str) -> Result<Option<String>, ResolverError>;
}
