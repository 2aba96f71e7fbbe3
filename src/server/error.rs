//! Error responses for the HTTP surface.

use axum::http::header::{CONTENT_TYPE, RETRY_AFTER};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::auth::{AuthError, DenyPayload};
use crate::engine::EngineError;
use crate::pipeline::RecognitionError;

/// Seconds a client is told to wait before retrying an unavailable engine.
const RETRY_AFTER_SECS: &str = "5";

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Every failure `POST /ocr/image` can produce, short of an authority deny.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Recognition(#[from] RecognitionError),
    #[error("{message}")]
    Upload { status: StatusCode, message: String },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(AuthError::AuthorityUnreachable(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Auth(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Engine(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Recognition(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upload { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        match &self {
            ApiError::Engine(e) if e.is_retryable() => (
                status,
                [(RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS))],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

/// The authority's refusal goes back exactly as it was received.
impl IntoResponse for DenyPayload {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        match self.content_type {
            Some(content_type) => {
                response.headers_mut().insert(CONTENT_TYPE, content_type);
            }
            None => {
                response.headers_mut().remove(CONTENT_TYPE);
            }
        }
        response
    }
}
