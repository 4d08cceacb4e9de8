//! Image archive resolver (Art Institute of Chicago public API)
//!
//! Resolves a proposed artwork to an IIIF image URL plus the artwork's
//! landing page. An entry is accepted only when its image URL answers a HEAD
//! request with an `image/*` content type. Entries credited to the proposed
//! artist are tried before the rest, and among those an exact title first.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use triptych_common::normalize;

use crate::models::{ImageProposal, ResolvedReference};
use crate::types::{ArtifactResolver, ResolverError};

const USER_AGENT: &str = "Triptych/0.1.0 (https://github.com/triptych/triptych)";
const DEFAULT_IIIF_BASE: &str = "https://www.artic.edu/iiif/2";
const ARTWORK_PAGE_BASE: &str = "https://www.artic.edu/artworks";
const SEARCH_FIELDS: &str = "id,title,artist_title,image_id";
const SEARCH_LIMIT: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveSearchResponse {
    #[serde(default)]
    pub data: Vec<ArchiveArtwork>,
    #[serde(default)]
    pub config: Option<ArchiveConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveArtwork {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub artist_title: Option<String>,
    /// Absent for entries without a digitized image
    #[serde(default)]
    pub image_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    #[serde(default)]
    pub iiif_url: Option<String>,
}

impl ArchiveArtwork {
    /// IIIF full-image URL (843px wide, the archive's recommended size)
    pub fn image_url(&self, iiif_base: &str) -> Option<String> {
        self.image_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .map(|id| format!("{}/{}/full/843,/0/default.jpg", iiif_base.trim_end_matches('/'), id))
    }

    pub fn page_url(&self) -> String {
        format!("{}/{}", ARTWORK_PAGE_BASE, self.id)
    }
}

/// Art Institute of Chicago API client
pub struct ImageArchiveClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl ImageArchiveClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ResolverError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| ResolverError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into(),
        })
    }

    /// Full-text artwork search
    pub async fn search_artworks(&self, query: &str) -> Result<ArchiveSearchResponse, ResolverError> {
        let url = format!("{}/artworks/search", self.base_url.trim_end_matches('/'));
        let limit = SEARCH_LIMIT.to_string();

        tracing::debug!(query = %query, "Querying image archive");

        let response = self
            .http_client
            .get(&url)
            .query(&[("q", query), ("fields", SEARCH_FIELDS), ("limit", limit.as_str())])
            .send()
            .await
            .map_err(|e| ResolverError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ResolverError::Api(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ResolverError::Parse(e.to_string()))
    }

    /// HEAD the image URL; true when it is reachable and serves an image
    pub async fn is_image_reachable(&self, url: &str) -> bool {
        match self.http_client.head(url).send().await {
            Ok(response) => {
                let content_type = response
                    .headers()
                    .get(reqwest::header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok());
                response.status().is_success() && is_image_content_type(content_type)
            }
            Err(e) => {
                tracing::debug!(url = %url, error = %e, "Image HEAD check failed");
                false
            }
        }
    }
}

#[async_trait]
impl ArtifactResolver<ImageProposal> for ImageArchiveClient {
    fn name(&self) -> &'static str {
        "artic"
    }

    async fn resolve(&self, candidate: &ImageProposal) -> Result<Option<ResolvedReference>, ResolverError> {
        let mut last_error = None;
        let mut any_succeeded = false;

        for query in image_query_variants(candidate) {
            let results = match self.search_artworks(&query).await {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "Image archive query failed");
                    last_error = Some(e);
                    continue;
                }
            };
            any_succeeded = true;

            let iiif_base = results
                .config
                .as_ref()
                .and_then(|c| c.iiif_url.clone())
                .unwrap_or_else(|| DEFAULT_IIIF_BASE.to_string());

            for artwork in rank_artworks(candidate, &results.data) {
                let Some(image_url) = artwork.image_url(&iiif_base) else {
                    continue;
                };
                if self.is_image_reachable(&image_url).await {
                    tracing::info!(
                        title = %candidate.title,
                        artwork_id = artwork.id,
                        query = %query,
                        "Archive image resolved"
                    );
                    return Ok(Some(ResolvedReference::with_source(image_url, artwork.page_url())));
                }
            }
        }

        match (any_succeeded, last_error) {
            (false, Some(e)) => Err(e),
            _ => Ok(None),
        }
    }
}

/// Search hits reordered so the proposed artist's works come first
///
/// Relative order is otherwise kept, since the archive already ranks by
/// relevance.
pub fn rank_artworks<'a>(proposal: &ImageProposal, artworks: &'a [ArchiveArtwork]) -> Vec<&'a ArchiveArtwork> {
    let artist = normalize(&proposal.artist);
    let title = normalize(&proposal.title);

    let mut ranked: Vec<&ArchiveArtwork> = artworks.iter().collect();
    ranked.sort_by_key(|artwork| {
        let artist_matches = artwork
            .artist_title
            .as_deref()
            .map(normalize)
            .is_some_and(|credited| !artist.is_empty() && credited == artist);
        let title_matches = artwork
            .title
            .as_deref()
            .map(normalize)
            .is_some_and(|found| !title.is_empty() && found == title);
        (!artist_matches, !title_matches)
    });
    ranked
}

/// Ordered, de-duplicated search queries for an image proposal
pub fn image_query_variants(proposal: &ImageProposal) -> Vec<String> {
    let title = proposal.title.trim();
    let artist = proposal.artist.trim();

    let candidates = [
        proposal.search_hint.trim().to_string(),
        format!("{} {}", title, artist),
        format!("{} {}", artist, title),
        title.to_string(),
    ];

    let mut variants: Vec<String> = Vec::new();
    for query in candidates {
        let query = query.trim().to_string();
        if !query.is_empty() && !variants.contains(&query) {
            variants.push(query);
        }
    }
    variants
}

fn is_image_content_type(content_type: Option<&str>) -> bool {
    content_type
        .map(|ct| ct.trim().to_ascii_lowercase().starts_with("image/"))
        .unwrap_or(false)
}
