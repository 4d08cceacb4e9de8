//! Link resolution engine
//!
//! Per-type bounded retry: resolve the candidate; if no reference was found
//! or the candidate is a recent duplicate, ask generation for an alternative
//! and try again, up to a fixed number of resolve attempts. When the budget
//! runs out the last candidate is accepted as-is (empty or duplicate
//! reference) and a warning is attached. Exhaustion is never an error.
//!
//! Resolver errors count as "not found". Generation errors propagate.

use serde_json::json;
use triptych_common::db::ArtifactKind;

use crate::models::{Curated, Proposal, ResolvedReference};
use crate::services::context_aggregator::CurationContext;
use crate::services::generation_client::{
    generate_structured, ContentGenerator, GenerationError, GenerationRequest, GenerationRole,
};
use crate::services::prompts;
use crate::types::ArtifactResolver;

/// Resolve attempts for a musical work
pub const MAX_MUSIC_ATTEMPTS: u32 = 5;
/// Resolve attempts for an artwork
pub const MAX_IMAGE_ATTEMPTS: u32 = 3;
/// Duplicate checks for a literary excerpt
pub const MAX_TEXT_ATTEMPTS: u32 = 3;

pub fn max_attempts(kind: ArtifactKind) -> u32 {
    match kind {
        ArtifactKind::Music => MAX_MUSIC_ATTEMPTS,
        ArtifactKind::Image => MAX_IMAGE_ATTEMPTS,
        ArtifactKind::Text => MAX_TEXT_ATTEMPTS,
    }
}

/// Why a candidate was turned down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unresolved,
    RecentDuplicate,
}

impl Rejection {
    fn as_str(&self) -> &'static str {
        match self {
            Rejection::Unresolved => "no verifiable reference found",
            Rejection::RecentDuplicate => "shown recently",
        }
    }
}

/// Final state of one resolution loop
#[derive(Debug, Clone)]
pub struct ResolutionOutcome<P> {
    pub curated: Curated<P>,
    /// Set when the budget ran out and the last candidate was accepted
    pub warning: Option<String>,
}

/// Resolve `initial` with the budget for its kind
///
/// `resolver` is `None` for kinds without a resolution call (text); those
/// retry only to avoid recent duplicates.
pub async fn resolve_with_retry<P: Proposal>(
    initial: P,
    resolver: Option<&dyn ArtifactResolver<P>>,
    generator: &dyn ContentGenerator,
    context: &CurationContext,
) -> Result<ResolutionOutcome<P>, GenerationError> {
    resolve_with_budget(initial, resolver, generator, context, max_attempts(P::KIND)).await
}

/// [`resolve_with_retry`] with an explicit attempt budget
pub async fn resolve_with_budget<P: Proposal>(
    initial: P,
    resolver: Option<&dyn ArtifactResolver<P>>,
    generator: &dyn ContentGenerator,
    context: &CurationContext,
    max_attempts: u32,
) -> Result<ResolutionOutcome<P>, GenerationError> {
    let max_attempts = max_attempts.max(1);
    let user_id = context.arc.user_id.as_str();
    let mut candidate = initial;
    let mut failed: Vec<P> = Vec::new();
    let mut attempt = 0;

    loop {
        attempt += 1;

        let reference = match resolver {
            Some(resolver) => lookup(resolver, &candidate, user_id).await,
            None => None,
        };

        let rejection = if resolver.is_some() && reference.is_none() {
            Some(Rejection::Unresolved)
        } else if context.recent.contains(P::KIND, &candidate.dedup_key()) {
            Some(Rejection::RecentDuplicate)
        } else {
            None
        };

        let Some(rejection) = rejection else {
            tracing::info!(
                user_id = %user_id,
                kind = %P::KIND,
                attempt,
                title = %candidate.title(),
                "Artifact finalized"
            );
            return Ok(ResolutionOutcome {
                curated: Curated {
                    proposal: candidate,
                    reference,
                },
                warning: None,
            });
        };

        tracing::debug!(
            user_id = %user_id,
            kind = %P::KIND,
            attempt,
            title = %candidate.title(),
            reason = rejection.as_str(),
            "Candidate rejected"
        );

        if attempt >= max_attempts {
            let warning = format!(
                "{} \"{}\" accepted after {} attempts: {}",
                P::KIND,
                candidate.title(),
                attempt,
                rejection.as_str()
            );
            tracing::warn!(user_id = %user_id, kind = %P::KIND, "{}", warning);

            return Ok(ResolutionOutcome {
                curated: Curated {
                    proposal: candidate,
                    reference,
                },
                warning: Some(warning),
            });
        }

        failed.push(candidate.clone());
        candidate = request_alternative(generator, context, &candidate, &failed, rejection).await?;
    }
}

async fn lookup<P: Proposal>(
    resolver: &dyn ArtifactResolver<P>,
    candidate: &P,
    user_id: &str,
) -> Option<ResolvedReference> {
    match resolver.resolve(candidate).await {
        Ok(reference) => reference,
        Err(e) => {
            tracing::warn!(
                user_id = %user_id,
                resolver = resolver.name(),
                title = %candidate.title(),
                error = %e,
                "Resolver error treated as not found"
            );
            None
        }
    }
}

async fn request_alternative<P: Proposal>(
    generator: &dyn ContentGenerator,
    context: &CurationContext,
    rejected: &P,
    failed: &[P],
    rejection: Rejection,
) -> Result<P, GenerationError> {
    let failed_summary: Vec<_> = failed
        .iter()
        .map(|p| json!({ "title": p.title(), "creator": p.creator() }))
        .collect();

    let request = GenerationRequest::new(
        GenerationRole::ProposeAlternative,
        prompts::propose_alternative(P::KIND),
        json!({
            "arc": context.arc_json(),
            "constraints": context.constraints_json(),
            "artifact_type": P::KIND,
            "rejected": rejected,
            "reason": rejection.as_str(),
            "failed": failed_summary,
        }),
    );

    generate_structured(generator, request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budgets_by_kind() {
        assert_eq!(max_attempts(ArtifactKind::Music), 5);
        assert_eq!(max_attempts(ArtifactKind::Image), 3);
        assert_eq!(max_attempts(ArtifactKind::Text), 3);
    }
}
