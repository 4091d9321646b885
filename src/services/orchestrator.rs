use std::{pin::Pin, sync::Arc};

use async_trait::async_trait;
use futures::{Stream, stream};
use tracing::{debug, info, instrument};

use super::{prompt::build_conversation, retrieval::ContextBuilder};
use crate::{
    error::{AppError, Phase, ServiceError},
    message::{ChatMessage, ModelTurn, Role},
};

pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ServiceError>> + Send>>;

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Complete reply for the conversation.
    async fn generate(&self, turns: &[ModelTurn]) -> Result<String, ServiceError>;

    /// Reply as a stream of text pieces. Providers without token streaming
    /// yield the whole reply as one piece.
    async fn generate_stream(&self, turns: &[ModelTurn]) -> Result<TextStream, ServiceError> {
        let text = self.generate(turns).await?;
        Ok(Box::pin(stream::once(async move { Ok::<_, ServiceError>(text) })))
    }
}

/// Retrieval followed by generation for one chat request.
#[derive(Clone)]
pub struct ChatPipeline {
    context: ContextBuilder,
    model: Arc<dyn GenerativeModel>,
}

impl ChatPipeline {
    pub fn new(context: ContextBuilder, model: Arc<dyn GenerativeModel>) -> Self {
        Self { context, model }
    }

    /// Check the transcript and build the model conversation for it.
    pub async fn prepare(&self, transcript: &[ChatMessage]) -> Result<Vec<ModelTurn>, AppError> {
        let last = validate(transcript)?;
        let block = self.context.build(&last.content).await?;
        build_conversation(transcript, &block)
            .ok_or_else(|| AppError::BadRequest("transcript is empty".into()))
    }

    #[instrument(skip_all, fields(messages = transcript.len()))]
    pub async fn reply(&self, transcript: &[ChatMessage]) -> Result<String, AppError> {
        let turns = self.prepare(transcript).await?;
        debug!(phase = %Phase::Generating, turns = turns.len(), "calling model");
        let text = self
            .model
            .generate(&turns)
            .await
            .map_err(AppError::upstream(Phase::Generating))?;
        info!(chars = text.len(), "reply generated");
        Ok(text)
    }

    #[instrument(skip_all, fields(messages = transcript.len()))]
    pub async fn reply_stream(&self, transcript: &[ChatMessage]) -> Result<TextStream, AppError> {
        let turns = self.prepare(transcript).await?;
        debug!(phase = %Phase::Generating, turns = turns.len(), "opening model stream");
        self.model
            .generate_stream(&turns)
            .await
            .map_err(AppError::upstream(Phase::Generating))
    }
}

fn validate(transcript: &[ChatMessage]) -> Result<&ChatMessage, AppError> {
    let last = transcript
        .last()
        .ok_or_else(|| AppError::BadRequest("transcript is empty".into()))?;
    if last.role != Role::User {
        return Err(AppError::BadRequest("last message must come from the user".into()));
    }
    if last.content.trim().is_empty() {
        return Err(AppError::BadRequest("message cannot be empty".into()));
    }
    Ok(last)
}
