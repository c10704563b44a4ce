//! Backchannel authentication endpoint handler (CIBA core).

use std::sync::Arc;

use axum::Form;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::ciba::{BackchannelAuthenticationParams, CibaService};
use crate::error::OidcError;
use crate::oauth::client_auth::ClientCredentials;

/// State for the backchannel authentication endpoint.
#[derive(Clone)]
pub struct BackchannelState {
    /// The CIBA service.
    pub service: Arc<CibaService>,
}

impl BackchannelState {
    /// Creates the state.
    #[must_use]
    pub fn new(service: Arc<CibaService>) -> Self {
        Self { service }
    }
}

/// Wire form of a backchannel authentication request, protocol parameters
/// and body credentials together.
#[derive(Debug, Deserialize)]
pub struct BackchannelRequestForm {
    pub scope: Option<String>,
    pub login_hint: Option<String>,
    pub binding_message: Option<String>,
    pub user_code: Option<String>,
    pub requested_expiry: Option<i64>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Handler for `POST /{tenant_id}/v1/backchannel/authentications`.
pub async fn backchannel_handler(
    State(state): State<BackchannelState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    Form(form): Form<BackchannelRequestForm>,
) -> Result<Response, OidcError> {
    let basic = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(ClientCredentials::parse_basic);
    let credentials = ClientCredentials {
        client_id: form.client_id,
        client_secret: form.client_secret,
        basic,
        certificate_thumbprint: None,
    };
    let params = BackchannelAuthenticationParams {
        scope: form.scope,
        login_hint: form.login_hint,
        binding_message: form.binding_message,
        user_code: form.user_code,
        requested_expiry: form.requested_expiry,
    };
    let response = state.service.request(&tenant_id, params, credentials).await?;
    Ok((
        [(header::CACHE_CONTROL, "no-store")],
        Json(response),
    )
        .into_response())
}
