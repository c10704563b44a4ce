//! Token endpoint handler.
//!
//! `POST /{tenant_id}/v1/tokens` with an `application/x-www-form-urlencoded`
//! body. Client credentials arrive via the request body, an
//! `Authorization: Basic` header, or (for mTLS clients) the
//! `x-ssl-cert-thumbprint` header set by the terminating proxy.

use std::sync::Arc;

use axum::Form;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};

use crate::error::OidcError;
use crate::oauth::client_auth::ClientCredentials;
use crate::token::service::{TokenRequest, TokenService};

/// Header carrying the client certificate thumbprint asserted by the
/// TLS-terminating proxy.
pub const CERT_THUMBPRINT_HEADER: &str = "x-ssl-cert-thumbprint";

/// State for the token endpoint.
#[derive(Clone)]
pub struct TokenState {
    /// The token service.
    pub service: Arc<TokenService>,
}

impl TokenState {
    /// Creates the state.
    #[must_use]
    pub fn new(service: Arc<TokenService>) -> Self {
        Self { service }
    }
}

/// Extracts client credentials from the request.
#[must_use]
pub fn extract_credentials(headers: &HeaderMap, request: &TokenRequest) -> ClientCredentials {
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(ClientCredentials::parse_basic);
    let certificate_thumbprint = headers
        .get(CERT_THUMBPRINT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);
    ClientCredentials {
        client_id: request.client_id.clone(),
        client_secret: request.client_secret.clone(),
        basic,
        certificate_thumbprint,
    }
}

/// Handler for `POST /{tenant_id}/v1/tokens`.
///
/// Responses carry `Cache-Control: no-store` per RFC 6749.
pub async fn token_handler(
    State(state): State<TokenState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Result<Response, OidcError> {
    let credentials = extract_credentials(&headers, &request);
    let response = state.service.handle(&tenant_id, request, credentials).await?;
    Ok((
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        axum::Json(response),
    )
        .into_response())
}
