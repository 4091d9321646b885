// src/error.rs
use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

/// Step of a chat request. Upstream failures carry the step they happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Received,
    Embedding,
    Retrieving,
    Generating,
    Streaming,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Received => "received",
            Phase::Embedding => "embedding",
            Phase::Retrieving => "retrieving",
            Phase::Generating => "generating",
            Phase::Streaming => "streaming",
        };
        f.write_str(name)
    }
}

/// Failure of a call to one of the hosted services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} returned {status}: {body}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("{service} returned an unusable payload: {reason}")]
    Payload {
        service: &'static str,
        reason: String,
    },
}

impl ServiceError {
    pub fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| ServiceError::Transport { service, source }
    }

    pub fn payload(service: &'static str, reason: impl Into<String>) -> Self {
        ServiceError::Payload { service, reason: reason.into() }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} must be set")]
    Missing(&'static str),
    #[error("environment variable {name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Error returned by the chat handler.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("{phase} failed: {source}")]
    Upstream {
        phase: Phase,
        #[source]
        source: ServiceError,
    },
}

impl AppError {
    pub fn upstream(phase: Phase) -> impl FnOnce(ServiceError) -> Self {
        move |source| AppError::Upstream { phase, source }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::BadRequest(reason) => {
                warn!(%reason, "rejecting chat request");
                (StatusCode::BAD_REQUEST, "Bad Request").into_response()
            }
            AppError::Upstream { phase, source } => {
                error!(%phase, error = %source, "chat request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}
