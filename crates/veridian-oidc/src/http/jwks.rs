//! JWKS endpoint handler.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::token::jwt::JwtCodec;

/// State for the JWKS endpoint.
#[derive(Clone)]
pub struct JwksState {
    /// Codec holding the signing key pair.
    pub jwt: Arc<JwtCodec>,
}

impl JwksState {
    /// Creates the state.
    #[must_use]
    pub fn new(jwt: Arc<JwtCodec>) -> Self {
        Self { jwt }
    }
}

/// Handler for `GET /{tenant_id}/v1/jwks`.
pub async fn jwks_handler(State(state): State<JwksState>) -> impl IntoResponse {
    (
        [(header::CACHE_CONTROL, "public, max-age=3600")],
        Json(state.jwt.jwks()),
    )
}
