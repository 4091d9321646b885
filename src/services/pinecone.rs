use std::fmt;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use super::{
    http::send_json,
    retrieval::{RetrievalMatch, VectorIndex},
};
use crate::error::ServiceError;

const SERVICE: &str = "pinecone";
const API_VERSION: &str = "2024-07";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    include_values: bool,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<ScoredMatch>,
}

#[derive(Deserialize)]
struct ScoredMatch {
    id: String,
    score: Option<f32>,
    #[serde(default)]
    metadata: ReviewMetadata,
}

#[derive(Deserialize, Default)]
struct ReviewMetadata {
    review: Option<String>,
    subject: Option<String>,
    stars: Option<Value>,
    first_name: Option<String>,
    last_name: Option<String>,
}

#[derive(Deserialize)]
struct IndexDescription {
    host: String,
}

impl From<ScoredMatch> for RetrievalMatch {
    fn from(m: ScoredMatch) -> Self {
        let meta = m.metadata;
        let professor = [meta.first_name.as_deref(), meta.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        RetrievalMatch {
            identifier: m.id,
            professor: Some(professor).filter(|name| !name.is_empty()),
            subject: meta.subject,
            review: meta.review,
            stars: meta.stars.as_ref().and_then(star_value),
            score: m.score,
        }
    }
}

// Ratings were uploaded both as numbers and as strings.
fn star_value(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Data-plane client for one Pinecone index.
#[derive(Clone)]
pub struct PineconeIndex {
    http: Client,
    api_key: String,
    host: String,
}

impl fmt::Debug for PineconeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PineconeIndex").field("host", &self.host).finish_non_exhaustive()
    }
}

impl PineconeIndex {
    pub fn new(http: Client, api_key: impl Into<String>, host: impl Into<String>) -> Self {
        Self { http, api_key: api_key.into(), host: normalize_host(&host.into()) }
    }

    /// Use `host` when given, otherwise look the index host up through the
    /// control plane.
    pub async fn connect(
        http: Client,
        api_key: &str,
        control_url: &str,
        index: &str,
        host: Option<&str>,
    ) -> Result<Self, ServiceError> {
        if let Some(host) = host {
            return Ok(Self::new(http, api_key, host));
        }
        let url = format!("{}/indexes/{}", control_url.trim_end_matches('/'), index);
        let request = http
            .get(url)
            .header("Api-Key", api_key)
            .header("X-Pinecone-API-Version", API_VERSION);
        let description: IndexDescription = send_json(request, SERVICE).await?;
        info!(index, host = %description.host, "resolved pinecone index host");
        Ok(Self::new(http, api_key, description.host))
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    #[instrument(skip(self, vector), fields(host = %self.host))]
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<RetrievalMatch>, ServiceError> {
        let body = QueryRequest {
            namespace,
            vector,
            top_k,
            include_metadata: true,
            include_values: false,
        };
        let request = self
            .http
            .post(format!("{}/query", self.host))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body);
        let response: QueryResponse = send_json(request, SERVICE).await?;
        Ok(response.matches.into_iter().map(RetrievalMatch::from).collect())
    }
}
