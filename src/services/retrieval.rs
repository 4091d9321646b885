use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::{AppError, Phase, ServiceError};

pub const RESULTS_HEADER: &str = "\n\nReturned Results:\n";

const NO_RATING: &str = "No rating";
const NO_REVIEW: &str = "No review available";
const NO_SUBJECT: &str = "Unknown subject";

/// One nearest-neighbor hit from the review index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetrievalMatch {
    pub identifier: String,
    pub professor: Option<String>,
    pub subject: Option<String>,
    pub review: Option<String>,
    pub stars: Option<f64>,
    pub score: Option<f32>,
}

impl RetrievalMatch {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self { identifier: identifier.into(), ..Default::default() }
    }

    fn display_name(&self) -> &str {
        self.professor.as_deref().unwrap_or(&self.identifier)
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Up to `top_k` matches, most similar first, metadata included.
    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<RetrievalMatch>, ServiceError>;
}

/// Render matches into the plain-text block appended to the user's message.
pub fn format_matches(matches: &[RetrievalMatch]) -> String {
    let mut block = String::from(RESULTS_HEADER);
    for m in matches {
        let stars = m.stars.map(|s| s.to_string());
        block.push_str(&format!(
            "Professor: {}\nStars: {}\nReview: {}\nSubject: {}\n\n",
            m.display_name(),
            stars.as_deref().unwrap_or(NO_RATING),
            m.review.as_deref().unwrap_or(NO_REVIEW),
            m.subject.as_deref().unwrap_or(NO_SUBJECT),
        ));
    }
    block
}

/// Embeds a question and turns the closest reviews into prompt context.
#[derive(Clone)]
pub struct ContextBuilder {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    namespace: String,
    top_k: usize,
}

impl ContextBuilder {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        namespace: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self { embedder, index, namespace: namespace.into(), top_k }
    }

    #[instrument(skip(self, text), fields(namespace = %self.namespace, top_k = self.top_k))]
    pub async fn build(&self, text: &str) -> Result<String, AppError> {
        debug!(phase = %Phase::Embedding, "embedding question");
        let vector = self
            .embedder
            .embed(text)
            .await
            .map_err(AppError::upstream(Phase::Embedding))?;

        debug!(phase = %Phase::Retrieving, dimensions = vector.len(), "querying review index");
        let matches = self
            .index
            .query(&vector, self.top_k, &self.namespace)
            .await
            .map_err(AppError::upstream(Phase::Retrieving))?;

        debug!(matches = matches.len(), "retrieved reviews");
        Ok(format_matches(&matches))
    }
}
