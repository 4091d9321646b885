use std::{collections::VecDeque, fmt, pin::Pin};

use async_trait::async_trait;
use axum::body::Bytes;
use futures::{Stream, StreamExt, stream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{
    http::{send, send_json},
    orchestrator::{GenerativeModel, TextStream},
    retrieval::Embedder,
};
use crate::{
    error::ServiceError,
    message::{ModelRole, ModelTurn},
};

const SERVICE: &str = "gemini";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<ModelRole>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Text of the first candidate, parts joined.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        Some(content.parts.iter().map(|p| p.text.as_str()).collect())
    }

    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback.as_ref()?.block_reason.as_deref()
    }

    fn blocked_error(reason: &str) -> ServiceError {
        ServiceError::payload(SERVICE, format!("prompt blocked: {reason}"))
    }

    fn into_reply(self) -> Result<String, ServiceError> {
        if let Some(text) = self.text() {
            return Ok(text);
        }
        match self.block_reason() {
            Some(reason) => Err(Self::blocked_error(reason)),
            None => Err(ServiceError::payload(SERVICE, "response has no candidates")),
        }
    }
}

/// REST client for the Gemini embedding and generation endpoints.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    embedding_model: String,
    chat_model: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("chat_model", &self.chat_model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        http: Client,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        embedding_model: impl Into<String>,
        chat_model: impl Into<String>,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            embedding_model: embedding_model.into(),
            chat_model: chat_model.into(),
        }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, model, method)
    }

    fn generate_body<'a>(turns: &'a [ModelTurn]) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: turns
                .iter()
                .map(|turn| Content {
                    role: Some(turn.role),
                    parts: vec![Part { text: &turn.text }],
                })
                .collect(),
        }
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    #[instrument(skip_all, fields(model = %self.embedding_model))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let body = EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content { role: None, parts: vec![Part { text }] },
        };
        let request = self
            .http
            .post(self.endpoint(&self.embedding_model, "embedContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let response: EmbedResponse = send_json(request, SERVICE).await?;
        if response.embedding.values.is_empty() {
            return Err(ServiceError::payload(SERVICE, "empty embedding"));
        }
        Ok(response.embedding.values)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    #[instrument(skip_all, fields(model = %self.chat_model, turns = turns.len()))]
    async fn generate(&self, turns: &[ModelTurn]) -> Result<String, ServiceError> {
        let request = self
            .http
            .post(self.endpoint(&self.chat_model, "generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::generate_body(turns));
        let response: GenerateResponse = send_json(request, SERVICE).await?;
        response.into_reply()
    }

    #[instrument(skip_all, fields(model = %self.chat_model, turns = turns.len()))]
    async fn generate_stream(&self, turns: &[ModelTurn]) -> Result<TextStream, ServiceError> {
        let request = self
            .http
            .post(self.endpoint(&self.chat_model, "streamGenerateContent"))
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::generate_body(turns));
        let response = send(request, SERVICE).await?;
        debug!("model stream opened");

        let state = SseState {
            bytes: Box::pin(response.bytes_stream()),
            buffer: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        };
        Ok(Box::pin(stream::unfold(state, next_piece)))
    }
}

type ByteStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

struct SseState {
    bytes: ByteStream,
    buffer: Vec<u8>,
    pending: VecDeque<String>,
    finished: bool,
}

async fn next_piece(mut state: SseState) -> Option<(Result<String, ServiceError>, SseState)> {
    loop {
        if let Some(text) = state.pending.pop_front() {
            return Some((Ok(text), state));
        }
        if state.finished {
            return None;
        }
        let drained = match state.bytes.next().await {
            Some(Ok(chunk)) => {
                state.buffer.extend_from_slice(&chunk);
                drain_events(&mut state.buffer)
            }
            Some(Err(e)) => Err(ServiceError::transport(SERVICE)(e)),
            None => {
                state.finished = true;
                state.buffer.push(b'\n');
                drain_events(&mut state.buffer)
            }
        };
        match drained {
            Ok(pieces) => state.pending.extend(pieces),
            Err(e) => {
                state.finished = true;
                state.pending.clear();
                return Some((Err(e), state));
            }
        }
    }
}

/// Pull every complete `data:` line out of `buffer` and decode the text it
/// carries. An incomplete trailing line stays in the buffer.
fn drain_events(buffer: &mut Vec<u8>) -> Result<Vec<String>, ServiceError> {
    let mut pieces = Vec::new();
    while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        let Some(data) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() || data == "[DONE]" {
            continue;
        }
        let event: GenerateResponse =
            serde_json::from_str(data).map_err(|e| ServiceError::payload(SERVICE, e.to_string()))?;
        if let Some(reason) = event.block_reason() {
            return Err(GenerateResponse::blocked_error(reason));
        }
        match event.text() {
            Some(text) if !text.is_empty() => pieces.push(text),
            _ => {}
        }
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use mockito::Matcher;
    use serde_json::json;

    fn client(server: &mockito::ServerGuard) -> GeminiClient {
        GeminiClient::new(Client::new(), "test-key", server.url(), "embedding-001", "gemini-pro")
    }

    #[test]
    fn request_body_uses_provider_roles() {
        let turns = vec![
            ModelTurn::new(ModelRole::User, "preamble"),
            ModelTurn::new(ModelRole::Model, "earlier answer"),
        ];
        let body = serde_json::to_value(GeminiClient::generate_body(&turns)).unwrap();
        assert_eq!(
            body,
            json!({"contents": [
                {"role": "user", "parts": [{"text": "preamble"}]},
                {"role": "model", "parts": [{"text": "earlier answer"}]}
            ]})
        );
    }

    #[test]
    fn drain_keeps_partial_lines() {
        let mut buffer = b"data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Hel\"}]}}]}\r\n\r\ndata: {\"cand".to_vec();
        let pieces = drain_events(&mut buffer).unwrap();
        assert_eq!(pieces, vec!["Hel".to_string()]);
        assert_eq!(buffer, b"data: {\"cand".to_vec());
    }

    #[test]
    fn blocked_prompt_is_an_error() {
        let response: GenerateResponse =
            serde_json::from_value(json!({"promptFeedback": {"blockReason": "SAFETY"}})).unwrap();
        let err = response.into_reply().unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn blocked_event_fails_the_stream() {
        let mut buffer = b"data: {\"promptFeedback\":{\"blockReason\":\"SAFETY\"}}\r\n".to_vec();
        let err = drain_events(&mut buffer).unwrap_err();
        assert!(err.to_string().contains("prompt blocked: SAFETY"));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let client = GeminiClient::new(Client::new(), "gm-secret", "http://x", "e", "c");
        assert!(!format!("{client:?}").contains("gm-secret"));
    }

    #[tokio::test]
    async fn blocked_stream_yields_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-pro:streamGenerateContent")
            .match_query(Matcher::UrlEncoded("alt".into(), "sse".into()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body("data: {\"promptFeedback\":{\"blockReason\":\"SAFETY\"}}\r\n\r\n")
            .create_async()
            .await;

        let result: Result<Vec<String>, ServiceError> = client(&server)
            .generate_stream(&[ModelTurn::new(ModelRole::User, "hi")])
            .await
            .unwrap()
            .try_collect()
            .await;

        assert!(matches!(result, Err(ServiceError::Payload { .. })));
    }

    #[tokio::test]
    async fn embed_returns_vector_values() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1beta/models/embedding-001:embedContent")
            .match_header("x-goog-api-key", "test-key")
            .match_body(Matcher::PartialJson(json!({
                "model": "models/embedding-001",
                "content": {"parts": [{"text": "algorithms"}]}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"embedding": {"values": [0.25, -0.5]}}"#)
            .create_async()
            .await;

        let values = client(&server).embed("algorithms").await.unwrap();

        assert_eq!(values, vec![0.25f32, -0.5]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn generate_joins_candidate_parts() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-pro:generateContent")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"candidates": [{"content": {"role": "model", "parts": [{"text": "Professor: A"}, {"text": "\nRecommendation: A"}]}}]}"#,
            )
            .create_async()
            .await;

        let text = client(&server)
            .generate(&[ModelTurn::new(ModelRole::User, "hi")])
            .await
            .unwrap();

        assert_eq!(text, "Professor: A\nRecommendation: A");
    }

    #[tokio::test]
    async fn error_status_carries_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-pro:generateContent")
            .with_status(429)
            .with_body("quota exceeded")
            .create_async()
            .await;

        let err = client(&server)
            .generate(&[ModelTurn::new(ModelRole::User, "hi")])
            .await
            .unwrap_err();

        match err {
            ServiceError::Status { status, body, .. } => {
                assert_eq!(status.as_u16(), 429);
                assert_eq!(body, "quota exceeded");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn stream_yields_each_event() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1beta/models/gemini-pro:streamGenerateContent")
            .match_query(Matcher::UrlEncoded("alt".into(), "sse".into()))
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(concat!(
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Professor: \"}]}}]}\r\n\r\n",
                "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Ada\"}]}}]}\r\n\r\n",
            ))
            .create_async()
            .await;

        let pieces: Vec<String> = client(&server)
            .generate_stream(&[ModelTurn::new(ModelRole::User, "hi")])
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(pieces, vec!["Professor: ".to_string(), "Ada".to_string()]);
    }
}
