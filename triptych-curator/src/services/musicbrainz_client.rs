//! MusicBrainz music resolver
//!
//! Resolves a proposed musical work to a MusicBrainz recording page.
//!
//! A catalog hit is accepted only when its title matches the proposed title
//! and one of its credited artists equals the proposed artist, composer, or
//! performer. Titles match when the hit contains the proposed title as a
//! whole-word run, or when both have the same word count, the same numbers,
//! and Jaro-Winkler ≥ 0.85. Any other track by the same artist, including a
//! different number in the same series, is never accepted as a substitute.
//!
//! Rate limit: 1 request/second (MusicBrainz Terms of Service).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use triptych_common::normalize;

use crate::models::{MusicProposal, ResolvedReference};
use crate::types::{ArtifactResolver, ResolverError};

const USER_AGENT: &str = "Triptych/0.1.0 (https://github.com/triptych/triptych)";
const RECORDING_PAGE_BASE: &str = "https://musicbrainz.org/recording";
const RATE_LIMIT_MS: u64 = 1000;
const SEARCH_LIMIT: u32 = 10;

/// Minimum Jaro-Winkler similarity for a fuzzy title match
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Recording search response
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBSearchResponse {
    #[serde(default)]
    pub recordings: Vec<MBRecording>,
}

/// MusicBrainz recording (search result subset)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBRecording {
    /// Recording MBID
    pub id: String,
    pub title: String,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<MBArtistCredit>,
}

/// MusicBrainz artist credit
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBArtistCredit {
    /// Display name (may differ from artist.name for collaborations)
    pub name: String,
    #[serde(default)]
    pub artist: Option<MBArtist>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MBArtist {
    pub id: String,
    pub name: String,
}

impl MBRecording {
    /// Every name this recording is credited under
    fn credited_names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.artist_credit.len() * 2);
        for credit in &self.artist_credit {
            names.push(credit.name.as_str());
            if let Some(artist) = &credit.artist {
                names.push(artist.name.as_str());
            }
        }
        names
    }
}

/// Rate limiter enforcing a minimum interval between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<RateLimiter>,
}

impl MusicBrainzClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ResolverError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ResolverError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }

    /// Lucene recording search
    pub async fn search_recordings(&self, query: &str) -> Result<Vec<MBRecording>, ResolverError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/recording", self.base_url.trim_end_matches('/'));
        let limit = SEARCH_LIMIT.to_string();

        tracing::debug!(query = %query, "Querying MusicBrainz recording search");

        let response = self
            .http_client
            .get(&url)
            .query(&[("query", query), ("limit", limit.as_str()), ("fmt", "json")])
            .send()
            .await
            .map_err(|e| ResolverError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ResolverError::Api(status.as_u16(), error_text));
        }

        let parsed: MBSearchResponse = response
            .json()
            .await
            .map_err(|e| ResolverError::Parse(e.to_string()))?;

        Ok(parsed.recordings)
    }
}

#[async_trait]
impl ArtifactResolver<MusicProposal> for MusicBrainzClient {
    fn name(&self) -> &'static str {
        "musicbrainz"
    }

    async fn resolve(&self, candidate: &MusicProposal) -> Result<Option<ResolvedReference>, ResolverError> {
        let mut last_error = None;
        let mut any_succeeded = false;

        for query in music_query_variants(candidate) {
            let recordings = match self.search_recordings(&query).await {
                Ok(recordings) => recordings,
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "MusicBrainz query failed");
                    last_error = Some(e);
                    continue;
                }
            };
            any_succeeded = true;

            if let Some(hit) = recordings
                .iter()
                .find(|rec| recording_matches(candidate, &rec.title, &rec.credited_names()))
            {
                tracing::info!(
                    title = %candidate.title,
                    mbid = %hit.id,
                    query = %query,
                    "MusicBrainz recording matched"
                );
                return Ok(Some(ResolvedReference::new(format!("{}/{}", RECORDING_PAGE_BASE, hit.id))));
            }
        }

        match (any_succeeded, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(None),
        }
    }
}

/// Ordered, de-duplicated search queries for a music proposal
///
/// Order: caller hint, artist+title (fielded), creator+title, title+creator,
/// title alone, then composer and performer variants.
pub fn music_query_variants(proposal: &MusicProposal) -> Vec<String> {
    let title = strip_quotes(&proposal.title);
    let artist = strip_quotes(&proposal.artist);

    let mut variants = Vec::new();
    let hint = proposal.search_hint.trim();
    if !hint.is_empty() {
        variants.push(hint.to_string());
    }
    variants.push(format!("artist:\"{}\" AND recording:\"{}\"", artist, title));
    variants.push(format!("{} {}", artist, title));
    variants.push(format!("{} {}", title, artist));
    variants.push(format!("recording:\"{}\"", title));

    for extra in [&proposal.composer, &proposal.performer].into_iter().flatten() {
        let extra = strip_quotes(extra);
        if !extra.is_empty() {
            variants.push(format!("artist:\"{}\" AND recording:\"{}\"", extra, title));
            variants.push(format!("{} {}", extra, title));
        }
    }

    let mut seen = std::collections::HashSet::new();
    variants.retain(|v| seen.insert(v.clone()));
    variants
}

/// Match rule for a catalog hit against a proposal
pub fn recording_matches(proposal: &MusicProposal, hit_title: &str, hit_artists: &[&str]) -> bool {
    title_matches(&proposal.title, hit_title) && artist_matches(proposal, hit_artists)
}

fn title_matches(proposed: &str, hit: &str) -> bool {
    let proposed = title_words(proposed);
    let hit = title_words(hit);
    if proposed.is_empty() || hit.is_empty() {
        return false;
    }

    if contains_words(&hit, &proposed) {
        return true;
    }

    // Fuzzy matching only absorbs spelling differences; "No. 5" never becomes "No. 7"
    proposed.len() == hit.len()
        && number_tokens(&proposed) == number_tokens(&hit)
        && strsim::jaro_winkler(&proposed.join(" "), &hit.join(" "))
            >= TITLE_SIMILARITY_THRESHOLD
}

fn title_words(value: &str) -> Vec<String> {
    normalize(value)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn number_tokens(words: &[String]) -> Vec<&str> {
    words
        .iter()
        .filter(|word| word.chars().any(|c| c.is_ascii_digit()))
        .map(String::as_str)
        .collect()
}

fn contains_words(haystack: &[String], needle: &[String]) -> bool {
    haystack.len() >= needle.len() && haystack.windows(needle.len()).any(|run| run == needle)
}

fn artist_matches(proposal: &MusicProposal, hit_artists: &[&str]) -> bool {
    let stated: Vec<String> = std::iter::once(&proposal.artist)
        .chain(proposal.composer.iter())
        .chain(proposal.performer.iter())
        .map(|name| normalize(name))
        .filter(|name| !name.is_empty())
        .collect();

    hit_artists
        .iter()
        .map(|name| normalize(name))
        .any(|name| stated.contains(&name))
}

fn strip_quotes(value: &str) -> String {
    value.replace('"', "").trim().to_string()
}
