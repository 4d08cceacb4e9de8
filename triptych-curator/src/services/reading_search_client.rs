//! Reading link resolver (web search)
//!
//! Finds a page to read more about a literary work. Preference order:
//! encyclopedia (wikipedia.org), then a fixed allow-list of reputable
//! literary/reference domains, then the first general result.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::types::{ReadingResolver, ResolverError};

const ENCYCLOPEDIA_DOMAIN: &str = "wikipedia.org";

/// Reputable domains, checked in order after the encyclopedia
const REPUTABLE_DOMAINS: &[&str] = &[
    "britannica.com",
    "poetryfoundation.org",
    "poets.org",
    "gutenberg.org",
    "plato.stanford.edu",
    "sparknotes.com",
    "newyorker.com",
    "theparisreview.org",
    "bl.uk",
    "loc.gov",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    web: Option<WebResults>,
}

#[derive(Debug, Deserialize)]
struct WebResults {
    #[serde(default)]
    results: Vec<WebResult>,
}

#[derive(Debug, Deserialize)]
struct WebResult {
    url: String,
}

/// Web search client (Brave Search API shape)
pub struct ReadingSearchClient {
    http_client: reqwest::Client,
    search_url: String,
    api_key: Option<String>,
}

impl ReadingSearchClient {
    pub fn new(search_url: impl Into<String>, api_key: Option<String>) -> Result<Self, ResolverError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ResolverError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            search_url: search_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Result URLs for a query, in search-engine order
    pub async fn search(&self, query: &str) -> Result<Vec<String>, ResolverError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| ResolverError::NotAvailable("search API key not configured".to_string()))?;

        let response = self
            .http_client
            .get(&self.search_url)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ResolverError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ResolverError::Api(status.as_u16(), error_text));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| ResolverError::Parse(e.to_string()))?;

        Ok(parsed
            .web
            .map(|w| w.results.into_iter().map(|r| r.url).collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ReadingResolver for ReadingSearchClient {
    async fn resolve(&self, title: &str, query: &str) -> Result<Option<String>, ResolverError> {
        let query = if query.trim().is_empty() { title } else { query };
        if query.trim().is_empty() {
            return Ok(None);
        }

        let urls = self.search(query).await?;
        let picked = pick_reading_url(&urls).map(str::to_string);

        tracing::debug!(title = %title, found = picked.is_some(), "Reading link search complete");
        Ok(picked)
    }
}

/// Choose the best URL from search results
pub fn pick_reading_url(urls: &[String]) -> Option<&str> {
    if let Some(url) = urls.iter().find(|u| host_matches(u, ENCYCLOPEDIA_DOMAIN)) {
        return Some(url);
    }

    for domain in REPUTABLE_DOMAINS {
        if let Some(url) = urls.iter().find(|u| host_matches(u, domain)) {
            return Some(url);
        }
    }

    urls.first().map(String::as_str)
}

/// True when the URL's host is `domain` or a subdomain of it
fn host_matches(url: &str, domain: &str) -> bool {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
        .rsplit('@')
        .next()
        .unwrap_or("")
        .split(':')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    host == domain || host.ends_with(&format!(".{}", domain))
}
