//! Token introspection endpoint handler (RFC 7662).

use std::sync::Arc;

use axum::Form;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::error::OidcError;
use crate::oauth::client_auth::{ClientCredentials, authenticate_client};
use crate::storage::ClientStorage;
use crate::token::introspection::IntrospectionService;

/// State for the introspection endpoint.
#[derive(Clone)]
pub struct IntrospectionState {
    /// The introspection service.
    pub service: Arc<IntrospectionService>,
    /// Client storage for authenticating the caller.
    pub client_storage: Arc<dyn ClientStorage>,
}

/// Form body of an introspection request.
#[derive(Debug, Deserialize)]
pub struct IntrospectionRequest {
    pub token: String,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Handler for `POST /{tenant_id}/v1/tokens/introspection`.
///
/// The caller authenticates as a registered client; the token under
/// inspection never causes an error, only `active: false`.
pub async fn introspection_handler(
    State(state): State<IntrospectionState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Form(request): Form<IntrospectionRequest>,
) -> Result<Response, OidcError> {
    authenticate_caller(
        &state.client_storage,
        &tenant_id,
        &headers,
        request.client_id.clone(),
        request.client_secret.clone(),
    )
    .await?;
    let response = state.service.introspect(&tenant_id, &request.token).await?;
    Ok(Json(response).into_response())
}

/// Authenticates the calling client from Basic or body credentials.
pub(crate) async fn authenticate_caller(
    client_storage: &Arc<dyn ClientStorage>,
    tenant_id: &str,
    headers: &HeaderMap,
    client_id: Option<String>,
    client_secret: Option<String>,
) -> Result<(), OidcError> {
    let basic = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(ClientCredentials::parse_basic);
    let credentials = ClientCredentials {
        client_id,
        client_secret,
        basic,
        certificate_thumbprint: None,
    };
    let client_id = credentials
        .asserted_client_id()
        .ok_or_else(|| OidcError::invalid_request("request must contains client_id"))?
        .to_string();
    let client = client_storage
        .find_by_id(tenant_id, &client_id)
        .await?
        .filter(|c| c.active)
        .ok_or_else(|| OidcError::invalid_client(format!("client is not found ({client_id})")))?;
    authenticate_client(&client, &credentials)
}
