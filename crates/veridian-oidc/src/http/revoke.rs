//! Token revocation endpoint handler (RFC 7009).

use std::sync::Arc;

use axum::Form;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::error::OidcError;
use crate::http::introspect::authenticate_caller;
use crate::storage::ClientStorage;
use crate::token::revocation::RevocationService;

/// State for the revocation endpoint.
#[derive(Clone)]
pub struct RevocationState {
    /// The revocation service.
    pub service: Arc<RevocationService>,
    /// Client storage for authenticating the caller.
    pub client_storage: Arc<dyn ClientStorage>,
}

/// Form body of a revocation request.
#[derive(Debug, Deserialize)]
pub struct RevocationRequest {
    pub token: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Handler for `POST /{tenant_id}/v1/tokens/revocation`.
///
/// Always returns 200 for authenticated callers, even for unknown tokens.
pub async fn revoke_handler(
    State(state): State<RevocationState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Form(request): Form<RevocationRequest>,
) -> Result<Response, OidcError> {
    authenticate_caller(
        &state.client_storage,
        &tenant_id,
        &headers,
        request.client_id.clone(),
        request.client_secret.clone(),
    )
    .await?;
    state.service.revoke(&tenant_id, &request.token).await?;
    Ok(StatusCode::OK.into_response())
}
