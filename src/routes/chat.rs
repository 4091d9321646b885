use std::convert::Infallible;

use axum::{
    Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Response},
};
use futures::{StreamExt, TryStreamExt, stream};
use tracing::{Instrument, debug, error, info_span};
use uuid::Uuid;

use crate::{
    error::{AppError, Phase, ServiceError},
    message::ChatMessage,
    state::{ReplyMode, SharedState},
};

pub async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<Vec<ChatMessage>>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(transcript) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let span = info_span!("chat", request_id = %Uuid::new_v4(), messages = transcript.len());
    async move {
        debug!(phase = %Phase::Received, mode = ?state.reply_mode, "chat request");
        match state.reply_mode {
            ReplyMode::SingleChunk => single_chunk(&state, &transcript).await,
            ReplyMode::Streaming => streaming(&state, &transcript).await,
        }
    }
    .instrument(span)
    .await
}

async fn single_chunk(state: &SharedState, transcript: &[ChatMessage]) -> Result<Response, AppError> {
    let text = state.pipeline.reply(transcript).await?;
    debug!(phase = %Phase::Streaming, bytes = text.len(), "sending reply");
    let body = Body::from_stream(stream::once(async move { Ok::<_, Infallible>(text) }));
    Ok(plain_text(body))
}

// The first piece is awaited before the status line goes out, so a model
// that fails or stays silent up front still gets a 500.
async fn streaming(state: &SharedState, transcript: &[ChatMessage]) -> Result<Response, AppError> {
    let mut pieces = state.pipeline.reply_stream(transcript).await?;
    let first = match pieces.next().await {
        Some(Ok(piece)) => piece,
        Some(Err(e)) => return Err(AppError::upstream(Phase::Generating)(e)),
        None => {
            let empty = ServiceError::payload("model", "stream ended without any text");
            return Err(AppError::upstream(Phase::Generating)(empty));
        }
    };
    debug!(phase = %Phase::Streaming, "forwarding model stream");

    let rest = pieces.inspect_err(|e| error!(phase = %Phase::Streaming, error = %e, "model stream broke off"));
    let body = Body::from_stream(
        stream::once(async move { Ok::<_, ServiceError>(first) }).chain(rest),
    );
    Ok(plain_text(body))
}

fn plain_text(body: Body) -> Response {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}
