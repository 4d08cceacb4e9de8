//! Content generation client
//!
//! Turns structured context into structured proposals via a text-generation
//! service. The service answers in prose; callers expect one of a few fixed
//! JSON shapes, so every response goes through [`parse_structured`], which
//! tolerates code fences and surrounding commentary.
//!
//! A response that cannot be coerced into the expected shape fails that call.
//! There is no retry at this layer.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Generation client errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Malformed {role} response: {reason}")]
    Malformed { role: GenerationRole, reason: String },

    #[error("Empty response")]
    EmptyResponse,
}

/// Which fixed response shape a request expects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationRole {
    /// Music, image and text proposals in one call
    ProposeTriple,
    /// Single replacement after a failed resolution
    ProposeAlternative,
    /// Cross-reference check over the triple
    CheckCoherence,
    /// Single replacement addressing a coherence issue
    ProposeReplacement,
    /// Framing prose over the finalized artifacts
    WriteFraming,
    /// Retrospective of a finished arc plus the next arc's theme
    CompleteArc,
}

impl std::fmt::Display for GenerationRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GenerationRole::ProposeTriple => "propose_triple",
            GenerationRole::ProposeAlternative => "propose_alternative",
            GenerationRole::CheckCoherence => "check_coherence",
            GenerationRole::ProposeReplacement => "propose_replacement",
            GenerationRole::WriteFraming => "write_framing",
            GenerationRole::CompleteArc => "complete_arc",
        };
        f.write_str(name)
    }
}

/// One request to the generation service
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub role: GenerationRole,
    /// Role instructions (system prompt)
    pub instructions: String,
    /// Structured context, sent as JSON
    pub context: serde_json::Value,
}

impl GenerationRequest {
    pub fn new(role: GenerationRole, instructions: impl Into<String>, context: serde_json::Value) -> Self {
        Self {
            role,
            instructions: instructions.into(),
            context,
        }
    }
}

/// Text-generation backend
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Raw text answer for a request
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Send a request and coerce the answer into `T`
pub async fn generate_structured<T: DeserializeOwned>(
    generator: &dyn ContentGenerator,
    request: GenerationRequest,
) -> Result<T, GenerationError> {
    tracing::debug!(role = %request.role, "Requesting structured generation");
    let text = generator.complete(&request).await?;
    parse_structured(request.role, &text)
}

/// Coerce a generation answer into `T`
///
/// Accepts bare JSON, JSON inside a ``` fence (with or without a language
/// tag), or JSON embedded in prose (outermost `{...}`).
pub fn parse_structured<T: DeserializeOwned>(role: GenerationRole, text: &str) -> Result<T, GenerationError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return Ok(value);
    }

    let candidate = extract_json(trimmed).ok_or_else(|| GenerationError::Malformed {
        role,
        reason: "no JSON object found".to_string(),
    })?;

    serde_json::from_str::<T>(candidate).map_err(|e| GenerationError::Malformed {
        role,
        reason: e.to_string(),
    })
}

/// Locate the JSON payload inside a prose answer
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(fenced) = fenced_block(text) {
        if fenced.starts_with('{') || fenced.starts_with('[') {
            return Some(fenced);
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // Skip an optional language tag on the fence line
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    let close = body.find("```")?;
    Some(body[..close].trim())
}

// ============================================================================
// HTTP implementation (Anthropic Messages API)
// ============================================================================

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message>,
}

#[derive(Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

/// Generation client backed by an HTTP messages endpoint
pub struct HttpContentGenerator {
    http_client: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: String,
}

impl HttpContentGenerator {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
            model: model.into(),
            max_tokens,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            system: &request.instructions,
            messages: vec![Message {
                role: "user",
                content: request.context.to_string(),
            }],
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api(status.as_u16(), error_text));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| GenerationError::Malformed {
            role: request.role,
            reason: format!("envelope: {}", e),
        })?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        tracing::debug!(role = %request.role, chars = text.len(), "Generation response received");

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Framing {
        framing: String,
    }

    #[test]
    fn test_bare_json() {
        let parsed: Framing = parse_structured(GenerationRole::WriteFraming, r#"{"framing": "dusk"}"#).unwrap();
        assert_eq!(parsed.framing, "dusk");
    }

    #[test]
    fn test_fenced_json_with_language_tag() {
        let text = "Here you go:\n```json\n{\"framing\": \"dawn\"}\n```\nEnjoy!";
        let parsed: Framing = parse_structured(GenerationRole::WriteFraming, text).unwrap();
        assert_eq!(parsed.framing, "dawn");
    }

    #[test]
    fn test_fenced_json_without_language_tag() {
        let text = "```\n{\"framing\": \"noon\"}\n```";
        assert_eq!(extract_json(text), Some("{\"framing\": \"noon\"}"));
    }

    #[test]
    fn test_json_embedded_in_prose() {
        let text = "Sure. {\"framing\": \"a {nested} word\"} Let me know.";
        let parsed: Framing = parse_structured(GenerationRole::WriteFraming, text).unwrap();
        assert_eq!(parsed.framing, "a {nested} word");
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let result: Result<Framing, _> =
            parse_structured(GenerationRole::WriteFraming, r#"{"prose": "missing field"}"#);
        assert!(matches!(
            result,
            Err(GenerationError::Malformed { role: GenerationRole::WriteFraming, .. })
        ));
    }

    #[test]
    fn test_no_json_is_malformed() {
        let result: Result<Framing, _> = parse_structured(GenerationRole::CheckCoherence, "I cannot help with that.");
        assert!(matches!(result, Err(GenerationError::Malformed { .. })));
    }

    #[test]
    fn test_empty_response() {
        let result: Result<Framing, _> = parse_structured(GenerationRole::WriteFraming, "   ");
        assert!(matches!(result, Err(GenerationError::EmptyResponse)));
    }
}
