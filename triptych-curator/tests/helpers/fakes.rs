//! In-process fakes for the generation service and catalog resolvers

use async_trait::async_trait;
use serde_json::json;
use sqlx::SqlitePool;
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};
use triptych_common::config::CurationConfig;
use triptych_curator::models::{ImageProposal, MusicProposal, Proposal, ResolvedReference};
use triptych_curator::services::generation_client::{
    ContentGenerator, GenerationError, GenerationRequest, GenerationRole,
};
use triptych_curator::services::CurationOrchestrator;
use triptych_curator::types::{ArtifactResolver, ResolverError};

/// Script key: role plus the `artifact_type` named in the request context
type ScriptKey = (GenerationRole, Option<String>);

/// Generation fake answering from per-role scripts
///
/// Scripted responses are consumed in order; once a script is empty the
/// role's default answers. A role with neither fails the call, the way an
/// unreachable service would.
#[derive(Default)]
pub struct ScriptedGenerator {
    scripts: Mutex<HashMap<ScriptKey, VecDeque<String>>>,
    defaults: Mutex<HashMap<ScriptKey, String>>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer for every call with `role` when nothing is scripted
    pub fn set_default(&self, role: GenerationRole, response: impl Into<String>) {
        self.defaults
            .lock()
            .unwrap()
            .insert((role, None), response.into());
    }

    /// Default answer for `role` requests about one artifact type
    pub fn set_default_for(&self, role: GenerationRole, kind: &str, response: impl Into<String>) {
        self.defaults
            .lock()
            .unwrap()
            .insert((role, Some(kind.to_string())), response.into());
    }

    /// Queue a one-shot answer for `role` requests about one artifact type
    pub fn push_for(&self, role: GenerationRole, kind: &str, response: impl Into<String>) {
        self.scripts
            .lock()
            .unwrap()
            .entry((role, Some(kind.to_string())))
            .or_default()
            .push_back(response.into());
    }

    /// Queue a one-shot answer for `role`
    pub fn push(&self, role: GenerationRole, response: impl Into<String>) {
        self.scripts
            .lock()
            .unwrap()
            .entry((role, None))
            .or_default()
            .push_back(response.into());
    }

    pub fn clear_default(&self, role: GenerationRole) {
        self.defaults.lock().unwrap().remove(&(role, None));
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn roles(&self) -> Vec<GenerationRole> {
        self.calls().iter().map(|c| c.role).collect()
    }

    pub fn calls_for(&self, role: GenerationRole) -> Vec<GenerationRequest> {
        self.calls().into_iter().filter(|c| c.role == role).collect()
    }

    fn answer(&self, key: &ScriptKey) -> Option<String> {
        let generic = (key.0, None);

        let mut scripts = self.scripts.lock().unwrap();
        for k in [key, &generic] {
            if let Some(response) = scripts.get_mut(k).and_then(|q| q.pop_front()) {
                return Some(response);
            }
        }
        drop(scripts);

        let defaults = self.defaults.lock().unwrap();
        defaults.get(key).or_else(|| defaults.get(&generic)).cloned()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.calls.lock().unwrap().push(request.clone());

        let kind = request
            .context
            .get("artifact_type")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        self.answer(&(request.role, kind)).ok_or_else(|| {
            GenerationError::Api(503, format!("no scripted response for {}", request.role))
        })
    }
}

/// Generator answering every role with a coherent, ordinary day
pub fn standard_generator() -> ScriptedGenerator {
    let generator = ScriptedGenerator::new();
    generator.set_default(
        GenerationRole::ProposeTriple,
        json!({
            "music": {"title": "So What", "artist": "Miles Davis", "album": "Kind of Blue", "search_hint": "miles davis so what"},
            "image": {"title": "Nighthawks", "artist": "Edward Hopper", "year": "1942", "search_hint": "hopper nighthawks"},
            "text": {"title": "Acquainted with the Night", "author": "Robert Frost", "excerpt": "I have been one acquainted with the night.", "search_hint": "frost acquainted with the night"}
        })
        .to_string(),
    );
    generator.set_default(
        GenerationRole::CheckCoherence,
        r#"Looks good: {"coherent": true, "issues": []}"#,
    );
    generator.set_default(
        GenerationRole::WriteFraming,
        "```json\n{\"framing\": \"Three views of the city after dark.\"}\n```",
    );
    generator.set_default(
        GenerationRole::CompleteArc,
        json!({
            "summary": "A week spent walking through the night.",
            "next_arc": {
                "theme": "First Light",
                "description": "Works about dawn and beginnings",
                "short_description": "Dawn"
            }
        })
        .to_string(),
    );
    generator
}

/// Resolver fake answering from a script, then a default
pub struct FakeResolver<P> {
    script: Mutex<VecDeque<Result<Option<ResolvedReference>, ResolverError>>>,
    default: Option<ResolvedReference>,
    seen_titles: Mutex<Vec<String>>,
    _kind: PhantomData<fn() -> P>,
}

impl<P> FakeResolver<P> {
    /// Resolves every candidate to `url`
    pub fn always(url: &str) -> Self {
        Self::with_default(Some(ResolvedReference::new(url)))
    }

    /// Never finds anything
    pub fn never() -> Self {
        Self::with_default(None)
    }

    fn with_default(default: Option<ResolvedReference>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default,
            seen_titles: Mutex::new(Vec::new()),
            _kind: PhantomData,
        }
    }

    /// Queue a one-shot answer
    pub fn push(&self, answer: Result<Option<ResolvedReference>, ResolverError>) {
        self.script.lock().unwrap().push_back(answer);
    }

    /// Titles looked up, in order
    pub fn seen_titles(&self) -> Vec<String> {
        self.seen_titles.lock().unwrap().clone()
    }
}

#[async_trait]
impl<P: Proposal> ArtifactResolver<P> for FakeResolver<P> {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn resolve(&self, candidate: &P) -> Result<Option<ResolvedReference>, ResolverError> {
        self.seen_titles
            .lock()
            .unwrap()
            .push(candidate.title().to_string());

        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(self.default.clone()))
    }
}

/// Orchestrator over the given fakes with default curation settings
pub fn build_orchestrator(
    pool: &SqlitePool,
    generator: Arc<ScriptedGenerator>,
    music: Arc<FakeResolver<MusicProposal>>,
    image: Arc<FakeResolver<ImageProposal>>,
) -> CurationOrchestrator {
    build_orchestrator_with(pool, generator, music, image, CurationConfig::default())
}

/// Orchestrator over the given fakes with explicit curation settings
pub fn build_orchestrator_with(
    pool: &SqlitePool,
    generator: Arc<ScriptedGenerator>,
    music: Arc<FakeResolver<MusicProposal>>,
    image: Arc<FakeResolver<ImageProposal>>,
    settings: CurationConfig,
) -> CurationOrchestrator {
    CurationOrchestrator::new(pool.clone(), generator, music, image, settings)
}
