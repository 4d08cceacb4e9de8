//! Coherence validation
//!
//! One check over the proposed triple, then at most one replacement request
//! per affected artifact type. Music issues are logged and left alone.
//! Replacements are trusted and not re-checked, so the loop is bounded.

use serde::{Deserialize, Serialize};
use serde_json::json;
use triptych_common::db::ArtifactKind;

use crate::models::{ImageProposal, Proposal, ProposalTriple, TextProposal};
use crate::services::context_aggregator::CurationContext;
use crate::services::generation_client::{
    generate_structured, ContentGenerator, GenerationError, GenerationRequest, GenerationRole,
};
use crate::services::prompts;

/// Validator answer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherenceVerdict {
    pub coherent: bool,
    #[serde(default)]
    pub issues: Vec<CoherenceIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoherenceIssue {
    pub artifact_type: ArtifactKind,
    pub problem: String,
    #[serde(default)]
    pub suggested_fix: String,
}

impl CoherenceVerdict {
    /// Issues for `kind`, in the order reported
    pub fn issues_for(&self, kind: ArtifactKind) -> Vec<&CoherenceIssue> {
        self.issues.iter().filter(|i| i.artifact_type == kind).collect()
    }
}

/// Ask the validator about a triple
pub async fn check_coherence(
    generator: &dyn ContentGenerator,
    context: &CurationContext,
    triple: &ProposalTriple,
) -> Result<CoherenceVerdict, GenerationError> {
    let request = GenerationRequest::new(
        GenerationRole::CheckCoherence,
        prompts::CHECK_COHERENCE,
        json!({
            "arc": context.arc_json(),
            "music": triple.music,
            "image": triple.image,
            "text": triple.text,
        }),
    );

    generate_structured(generator, request).await
}

/// Check a triple and repair image/text issues
///
/// Returns the triple with any replacements applied. Generation failures
/// propagate.
pub async fn validate_and_repair(
    generator: &dyn ContentGenerator,
    context: &CurationContext,
    triple: ProposalTriple,
) -> Result<ProposalTriple, GenerationError> {
    let verdict = check_coherence(generator, context, &triple).await?;

    if verdict.coherent {
        tracing::debug!(user_id = %context.arc.user_id, "Triple is coherent");
        return Ok(triple);
    }

    apply_replacements(generator, context, triple, &verdict).await
}

/// Apply one replacement per flagged image/text type
pub async fn apply_replacements(
    generator: &dyn ContentGenerator,
    context: &CurationContext,
    mut triple: ProposalTriple,
    verdict: &CoherenceVerdict,
) -> Result<ProposalTriple, GenerationError> {
    for issue in verdict.issues_for(ArtifactKind::Music) {
        tracing::warn!(
            user_id = %context.arc.user_id,
            problem = %issue.problem,
            "Music coherence issue left unrepaired"
        );
    }

    let image_issues = verdict.issues_for(ArtifactKind::Image);
    if !image_issues.is_empty() {
        let untouched = json!({ "music": triple.music, "text": triple.text });
        triple.image = request_replacement::<ImageProposal>(
            generator,
            context,
            &triple.image,
            untouched,
            &image_issues,
        )
        .await?;
    }

    let text_issues = verdict.issues_for(ArtifactKind::Text);
    if !text_issues.is_empty() {
        let untouched = json!({ "music": triple.music, "image": triple.image });
        triple.text = request_replacement::<TextProposal>(
            generator,
            context,
            &triple.text,
            untouched,
            &text_issues,
        )
        .await?;
    }

    Ok(triple)
}

async fn request_replacement<P: Proposal>(
    generator: &dyn ContentGenerator,
    context: &CurationContext,
    current: &P,
    untouched: serde_json::Value,
    issues: &[&CoherenceIssue],
) -> Result<P, GenerationError> {
    let problems: Vec<_> = issues
        .iter()
        .map(|i| json!({ "problem": i.problem, "suggested_fix": i.suggested_fix }))
        .collect();

    tracing::info!(
        user_id = %context.arc.user_id,
        kind = %P::KIND,
        replaced = %current.title(),
        issues = issues.len(),
        "Requesting coherence replacement"
    );

    let request = GenerationRequest::new(
        GenerationRole::ProposeReplacement,
        prompts::propose_replacement(P::KIND),
        json!({
            "arc": context.arc_json(),
            "constraints": context.constraints_json(),
            "artifact_type": P::KIND,
            "current": current,
            "keep": untouched,
            "issues": problems,
        }),
    );

    generate_structured(generator, request).await
}
