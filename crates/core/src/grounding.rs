//! Retrieval Grounding Resolution
//!
//! Before the gateway accepts any connection it must know which retrieval
//! corpus (if any) the upstream model should ground its answers on. This module
//! defines the catalog abstraction used to discover corpora and the policy that
//! turns a catalog listing into a startup decision.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, warn};

/// Errors raised while resolving the grounding configuration.
///
/// Both variants are fatal at startup: the process refuses to serve rather
/// than run with a half-resolved configuration.
#[derive(Debug, thiserror::Error)]
pub enum GroundingError {
    #[error("Grounding configuration error: {0}")]
    Configuration(String),
    #[error("Corpus catalog unavailable: {0}")]
    Unavailable(String),
}

/// How strictly the gateway insists on having a retrieval corpus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroundingMode {
    /// A corpus must be found, otherwise startup fails.
    Required,
    /// Use a corpus when one exists, otherwise run ungrounded.
    Optional,
    /// Never consult the catalog; run ungrounded.
    Disabled,
}

impl FromStr for GroundingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "optional" => Ok(Self::Optional),
            "disabled" | "off" | "none" => Ok(Self::Disabled),
            other => Err(format!("'{}' is not a valid grounding mode", other)),
        }
    }
}

/// A retrieval corpus as listed by the catalog.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RagCorpus {
    /// Full resource name, e.g. `projects/p/locations/l/ragCorpora/123`.
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl RagCorpus {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: None,
        }
    }
}

/// Defines the contract for any service that can enumerate retrieval corpora.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CorpusCatalog: Send + Sync {
    /// Lists every corpus visible to the configured project, in catalog order.
    async fn list_corpora(&self) -> Result<Vec<RagCorpus>, GroundingError>;
}

/// Resolves the retrieval corpus the upstream session will be grounded on.
///
/// An explicitly configured corpus wins without touching the catalog. Otherwise
/// the most recently listed corpus (the last entry) is chosen.
pub async fn resolve_grounding<C>(
    catalog: &C,
    mode: GroundingMode,
    explicit: Option<&str>,
) -> Result<Option<RagCorpus>, GroundingError>
where
    C: CorpusCatalog + ?Sized,
{
    if mode == GroundingMode::Disabled {
        info!("Retrieval grounding disabled. Sessions will run ungrounded.");
        return Ok(None);
    }

    if let Some(name) = explicit.filter(|n| !n.trim().is_empty()) {
        info!(corpus = %name, "Using explicitly configured retrieval corpus.");
        return Ok(Some(RagCorpus::named(name.trim())));
    }

    let corpora = catalog.list_corpora().await?;
    match corpora.into_iter().last() {
        Some(corpus) => {
            info!(
                corpus = %corpus.name,
                display_name = ?corpus.display_name,
                "Using retrieval corpus."
            );
            Ok(Some(corpus))
        }
        None if mode == GroundingMode::Required => Err(GroundingError::Configuration(
            "no retrieval corpus found; create one or set RAG_MODE=optional".to_string(),
        )),
        None => {
            warn!("No retrieval corpus found. Continuing without grounding.");
            Ok(None)
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRagCorporaResponse {
    #[serde(default)]
    rag_corpora: Vec<RagCorpus>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// A `CorpusCatalog` backed by the Vertex AI REST API.
pub struct VertexRagCatalog {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl VertexRagCatalog {
    /// Creates a catalog client for the given project and region.
    ///
    /// # Arguments
    ///
    /// * `project` - The project that owns the corpora.
    /// * `location` - The region, e.g. `us-central1`.
    /// * `access_token` - An OAuth bearer token for the Vertex AI API.
    pub fn new(project: &str, location: &str, access_token: String) -> Self {
        let base_url = format!(
            "https://{location}-aiplatform.googleapis.com/v1/projects/{project}/locations/{location}/ragCorpora"
        );
        Self::with_base_url(base_url, access_token)
    }

    pub fn with_base_url(base_url: String, access_token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            access_token,
        }
    }
}

#[async_trait]
impl CorpusCatalog for VertexRagCatalog {
    async fn list_corpora(&self) -> Result<Vec<RagCorpus>, GroundingError> {
        let mut corpora = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&self.base_url)
                .bearer_auth(&self.access_token);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| GroundingError::Unavailable(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GroundingError::Unavailable(format!(
                    "listing corpora returned {}: {}",
                    status, body
                )));
            }

            let page: ListRagCorporaResponse = response
                .json()
                .await
                .map_err(|e| GroundingError::Unavailable(e.to_string()))?;
            corpora.extend(page.rag_corpora);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(corpora)
    }
}
