// src/state.rs
use std::sync::Arc;

use crate::services::orchestrator::ChatPipeline;

pub type SharedState = Arc<AppState>;

/// How the reply is written to the response body.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplyMode {
    /// Whole reply generated first, then sent as one chunk.
    #[default]
    SingleChunk,
    /// Model tokens forwarded as they arrive.
    Streaming,
}

pub struct AppState {
    pub pipeline: ChatPipeline,
    pub reply_mode: ReplyMode,
}

impl AppState {
    pub fn new(pipeline: ChatPipeline, reply_mode: ReplyMode) -> Self {
        Self { pipeline, reply_mode }
    }
}
