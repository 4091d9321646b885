#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;
use professor_chat::{
    error::ServiceError,
    message::ModelTurn,
    routes::create_router,
    services::{
        orchestrator::{ChatPipeline, GenerativeModel, TextStream},
        retrieval::{ContextBuilder, Embedder, RetrievalMatch, VectorIndex},
    },
    state::{AppState, ReplyMode},
};

pub struct MockEmbedder {
    pub fail: bool,
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
        if self.fail {
            return Err(ServiceError::payload("mock-embedder", "embedding unavailable"));
        }
        Ok(vec![0.1, 0.2, 0.3, 0.4])
    }
}

pub struct MockIndex {
    pub matches: Vec<RetrievalMatch>,
    pub fail: bool,
}

#[async_trait]
impl VectorIndex for MockIndex {
    async fn query(
        &self,
        _vector: &[f32],
        _top_k: usize,
        _namespace: &str,
    ) -> Result<Vec<RetrievalMatch>, ServiceError> {
        if self.fail {
            return Err(ServiceError::payload("mock-index", "index unavailable"));
        }
        Ok(self.matches.clone())
    }
}

/// Model that answers with a fixed reply and records every conversation.
#[derive(Default)]
pub struct MockModel {
    pub reply: String,
    pub fail: bool,
    /// Pieces handed out by `generate_stream`; `None` entries become errors.
    pub pieces: Option<Vec<Option<String>>>,
    pub seen: Mutex<Vec<Vec<ModelTurn>>>,
}

#[async_trait]
impl GenerativeModel for MockModel {
    async fn generate(&self, turns: &[ModelTurn]) -> Result<String, ServiceError> {
        self.seen.lock().unwrap().push(turns.to_vec());
        if self.fail {
            return Err(ServiceError::payload("mock-model", "generation unavailable"));
        }
        Ok(self.reply.clone())
    }

    async fn generate_stream(&self, turns: &[ModelTurn]) -> Result<TextStream, ServiceError> {
        let Some(pieces) = self.pieces.clone() else {
            let text = self.generate(turns).await?;
            return Ok(Box::pin(stream::once(async move { Ok::<_, ServiceError>(text) })));
        };
        self.seen.lock().unwrap().push(turns.to_vec());
        let items = pieces.into_iter().map(|piece| {
            piece.ok_or_else(|| ServiceError::payload("mock-model", "stream interrupted"))
        });
        Ok(Box::pin(stream::iter(items.collect::<Vec<_>>())))
    }
}

pub fn professor(id: &str, subject: &str, stars: f64, review: &str) -> RetrievalMatch {
    RetrievalMatch {
        subject: Some(subject.to_string()),
        stars: Some(stars),
        review: Some(review.to_string()),
        ..RetrievalMatch::new(id)
    }
}

pub struct Backend {
    pub embedder: MockEmbedder,
    pub index: MockIndex,
    pub model: Arc<MockModel>,
}

impl Backend {
    pub fn answering(reply: &str) -> Self {
        Self {
            embedder: MockEmbedder { fail: false },
            index: MockIndex {
                matches: vec![professor("Dr. Knuth", "Algorithms", 5.0, "Rigorous but fair.")],
                fail: false,
            },
            model: Arc::new(MockModel { reply: reply.to_string(), ..Default::default() }),
        }
    }

    pub fn pipeline(self) -> ChatPipeline {
        let context = ContextBuilder::new(Arc::new(self.embedder), Arc::new(self.index), "ns1", 5);
        ChatPipeline::new(context, self.model)
    }

    pub fn router(self, mode: ReplyMode) -> axum::Router {
        let state = Arc::new(AppState::new(self.pipeline(), mode));
        create_router("public").with_state(state)
    }
}
