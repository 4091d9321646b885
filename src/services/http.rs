use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;

use crate::error::ServiceError;

/// Send a request and fail on transport errors or a non-success status.
pub async fn send(request: RequestBuilder, service: &'static str) -> Result<Response, ServiceError> {
    let response = request.send().await.map_err(ServiceError::transport(service))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status { service, status, body })
}

/// Send a request and decode its JSON body.
pub async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    service: &'static str,
) -> Result<T, ServiceError> {
    let response = send(request, service).await?;
    let bytes = response.bytes().await.map_err(ServiceError::transport(service))?;
    serde_json::from_slice(&bytes).map_err(|e| ServiceError::payload(service, e.to_string()))
}
