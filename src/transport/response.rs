//! Maps the crate's error taxonomy onto HTTP status codes (§7) in one
//! place, so every handler gets the same mapping through `?` instead of
//! repeating a `match`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::AppError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    reason: String,
    message: String,
}

/// Newtype so `AppError` can implement `IntoResponse` without the
/// orphan-impl restriction biting callers outside this crate.
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

fn status_and_body(err: &AppError) -> (StatusCode, ErrorBody) {
    match err {
        AppError::Parse { reason, message } => (
            StatusCode::BAD_REQUEST,
            ErrorBody { code: "parse_error", reason: reason.clone(), message: message.clone() },
        ),
        AppError::Rules { reason, message } => (
            StatusCode::BAD_REQUEST,
            ErrorBody { code: "rules_error", reason: reason.clone(), message: message.clone() },
        ),
        AppError::Internal { reason, .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody { code: "internal_error", reason: reason.clone(), message: "an internal error occurred".to_string() },
        ),
        AppError::NotFound(what) => (
            StatusCode::NOT_FOUND,
            ErrorBody { code: "not_found", reason: "not_found".to_string(), message: what.clone() },
        ),
        AppError::Infra(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorBody {
                code: "infra_error",
                reason: "infra_error".to_string(),
                message: "a storage or cache error occurred".to_string(),
            },
        ),
        AppError::Auth(message) => (
            StatusCode::UNAUTHORIZED,
            ErrorBody { code: "auth_error", reason: "auth_error".to_string(), message: message.clone() },
        ),
        AppError::WithContext { source, .. } => status_and_body(source),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = status_and_body(&self.0);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed with an internal error");
        }
        (status, Json(body)).into_response()
    }
}

/// WebSocket close codes (§6): 4003 auth error, 4004 unknown table. Every
/// other error is delivered as an `error` frame over the still-open
/// connection rather than a close (§4.8).
pub const WS_CLOSE_AUTH_ERROR: u16 = 4003;
pub const WS_CLOSE_UNKNOWN_TABLE: u16 = 4004;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let (status, _) = status_and_body(&AppError::not_found("table x"));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn auth_error_maps_to_401() {
        let (status, _) = status_and_body(&AppError::Auth("no token".to_string()));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn context_wrapped_error_keeps_the_inner_status() {
        let err = AppError::rules("not_your_turn", "x").with_context(crate::error::ErrorContext::default());
        let (status, _) = status_and_body(&err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
