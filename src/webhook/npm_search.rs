//! Client for the npm registry search endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::source::USER_AGENT;

/// Public npm registry.
pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";
/// Path of the search endpoint relative to the registry base.
pub const SEARCH_PATH: &str = "/-/v1/search";

/// Query string of a search; unset fields are left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchParams {
    /// Full-text query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    /// Offset of the first result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u32>,
    /// Weight of the quality score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<f64>,
    /// Weight of the popularity score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub popularity: Option<f64>,
    /// Weight of the maintenance score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<f64>,
}

impl SearchParams {
    /// Plain text query with registry defaults for everything else.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Package summary inside a search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPackage {
    /// Package name.
    pub name: String,
    /// Latest version.
    #[serde(default)]
    pub version: Option<String>,
    /// Short description.
    #[serde(default)]
    pub description: Option<String>,
    /// Declared keywords.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Publish date.
    #[serde(default)]
    pub date: Option<String>,
}

/// Per-dimension scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetail {
    /// Code quality signals.
    pub quality: f64,
    /// Download and dependent counts.
    pub popularity: f64,
    /// Release and issue activity.
    pub maintenance: f64,
}

/// Combined score of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Weighted total.
    #[serde(rename = "final")]
    pub total: f64,
    /// Breakdown by dimension.
    pub detail: ScoreDetail,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchObject {
    /// Matched package.
    pub package: SearchPackage,
    /// Registry score.
    pub score: Score,
    /// Relevance of the hit for this query.
    pub search_score: f64,
}

/// Search response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Hits, best first.
    pub objects: Vec<SearchObject>,
    /// Total number of matches across all pages.
    pub total: u64,
    /// Server timestamp of the search.
    pub time: String,
}

impl SearchResult {
    /// Best hit, unless the registry reported no matches.
    pub fn top_package(&self) -> Option<&SearchPackage> {
        if self.total == 0 {
            return None;
        }
        self.objects.first().map(|object| &object.package)
    }
}

/// Anything that can answer a package search.
#[async_trait]
pub trait PackageSearch: Send + Sync {
    /// Runs one search.
    async fn search(&self, params: &SearchParams) -> Result<SearchResult>;
}

/// Async search client for an npm-compatible registry.
#[derive(Clone, Debug)]
pub struct NpmSearchClient {
    client: Client,
    endpoint: String,
}

impl NpmSearchClient {
    /// Builds a client for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        anyhow::ensure!(!base_url.trim().is_empty(), "missing registry URL");
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(timeout)
            .build()
            .context("failed to build registry search client")?;
        let endpoint = format!("{}{SEARCH_PATH}", base_url.trim().trim_end_matches('/'));
        Ok(Self { client, endpoint })
    }

    /// Fully qualified search URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PackageSearch for NpmSearchClient {
    async fn search(&self, params: &SearchParams) -> Result<SearchResult> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(params)
            .send()
            .await
            .with_context(|| format!("search request to {} failed", self.endpoint))?
            .error_for_status()
            .context("registry rejected search")?;
        let result = response
            .json::<SearchResult>()
            .await
            .context("failed to decode search response")?;
        tracing::debug!(
            text = params.text.as_deref().unwrap_or_default(),
            total = result.total,
            hits = result.objects.len(),
            "package search"
        );
        Ok(result)
    }
}
