//! Application error type mapping to HTTP status codes and envelope format.
//!
//! `SESSION_CLOSED` is the one domain error code API clients are expected to
//! branch on: it tells a customer UI to stop its input box, where every other
//! failure is just surfaced.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use livedesk_types::error::ChatError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Chat domain errors.
    Chat(ChatError),
    /// Authentication failure (missing or invalid API key).
    Unauthorized(String),
    /// Validation error.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Chat(ChatError::NotFound) => (
                StatusCode::NOT_FOUND,
                "SESSION_NOT_FOUND",
                "Session not found".to_string(),
            ),
            AppError::Chat(ChatError::InvalidTransition(msg)) => {
                (StatusCode::CONFLICT, "INVALID_TRANSITION", msg.clone())
            }
            AppError::Chat(ChatError::SessionClosed) => (
                StatusCode::CONFLICT,
                "SESSION_CLOSED",
                "Session is closed and no longer accepts messages".to_string(),
            ),
            AppError::Chat(ChatError::Unauthorized(msg)) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone())
            }
            AppError::Chat(ChatError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Chat(ChatError::DeliveryFailed(msg)) => {
                (StatusCode::BAD_GATEWAY, "DELIVERY_FAILED", msg.clone())
            }
            AppError::Chat(ChatError::Storage(msg)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_ERROR",
                msg.clone(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_closed_maps_to_conflict() {
        let response = AppError::Chat(ChatError::SessionClosed).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = AppError::Chat(ChatError::NotFound).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_bad_key_maps_to_401() {
        let response = AppError::Unauthorized("bad key".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
