//! Protocol error to HTTP response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::OidcError;

impl IntoResponse for OidcError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(category = %self.category(), error = %self, "request failed");
        } else {
            tracing::debug!(category = %self.category(), error = %self, "request rejected");
        }
        let body = json!({
            "error": self.oauth_error_code(),
            "error_description": self.error_description(),
        });
        (status, Json(body)).into_response()
    }
}
