use axum::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::types::ErrorBody;
use serde::de::DeserializeOwned;
use service::errors::ServiceError;
use thiserror::Error;
use tracing::{error, warn};

use crate::state::AppState;

/// `{"error": ...}` response with the status already decided.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Map a service failure. Validation messages go back verbatim; anything
    /// else is logged and replaced by `fallback`.
    pub fn from_service(e: ServiceError, fallback: &str) -> Self {
        let status = status_for(&e);
        match e {
            ServiceError::Validation(msg) => Self::new(status, msg),
            other => {
                if status.is_server_error() {
                    error!(code = other.code(), error = %other, "{fallback}");
                } else {
                    warn!(code = other.code(), error = %other, "{fallback}");
                }
                Self::new(status, fallback)
            }
        }
    }

    /// Collapse the status to 200 when the server runs in legacy mode.
    pub fn legacy(mut self, legacy: bool) -> Self {
        if legacy {
            self.status = StatusCode::OK;
        }
        self
    }
}

pub fn status_for(e: &ServiceError) -> StatusCode {
    match e {
        ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
        ServiceError::Serialization(_) | ServiceError::Deserialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ServiceError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Cancelled(_) => StatusCode::REQUEST_TIMEOUT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

/// JSON body extractor whose rejections use the `{"error"}` shape.
pub struct ValidJson<T>(pub T);

#[async_trait]
impl<T> FromRequest<AppState> for ValidJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(v)) => Ok(ValidJson(v)),
            Err(rejection) => {
                let detail = match &rejection {
                    JsonRejection::MissingJsonContentType(_) => "expected application/json".to_string(),
                    other => other.body_text(),
                };
                warn!(%detail, "rejected request body");
                Err(ApiError::bad_request(format!("Invalid JSON payload: {detail}")).legacy(state.legacy_error_status))
            }
        }
    }
}

/// Query-string extractor with the same rejection shape as `ValidJson`.
pub struct ValidQuery<T>(pub T);

#[async_trait]
impl<T> FromRequestParts<AppState> for ValidQuery<T>
where
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(v)) => Ok(ValidQuery(v)),
            Err(rejection) => {
                let detail = rejection.body_text();
                warn!(%detail, "rejected query string");
                Err(ApiError::bad_request(format!("Invalid query string: {detail}")).legacy(state.legacy_error_status))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("store unavailable: {0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_kind() {
        assert_eq!(status_for(&ServiceError::Validation("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(&ServiceError::Deserialization("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(&ServiceError::Serialization("x".into())), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(&ServiceError::StoreUnavailable("x".into())), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(status_for(&ServiceError::Cancelled("x".into())), StatusCode::REQUEST_TIMEOUT);
    }

    #[test]
    fn internal_details_are_hidden() {
        let e = ApiError::from_service(ServiceError::StoreUnavailable("pool timed out".into()), "Failed to save preferences");
        assert_eq!(e.message, "Failed to save preferences");
        let e = ApiError::from_service(ServiceError::Validation("Invalid user ID".into()), "unused");
        assert_eq!(e.message, "Invalid user ID");
        assert_eq!(e.legacy(true).status, StatusCode::OK);
    }
}
