use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::domain::error::DomainError;

/// HTTP-facing wrapper that maps a domain error kind to its status code.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        Self(error)
    }
}

#[must_use]
pub fn error_body(kind: &str, message: &str) -> Value {
    json!({
        "error": {
            "code": kind,
            "message": message,
        }
    })
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DomainError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DomainError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::NotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Conflict(_) => StatusCode::CONFLICT,
            DomainError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            DomainError::Transport(_) => StatusCode::BAD_GATEWAY,
            DomainError::Storage(_) | DomainError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = error_body(self.0.kind(), &self.0.to_string());
        (status, Json(body)).into_response()
    }
}
