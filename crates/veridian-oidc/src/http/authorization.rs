//! Authorization endpoint handlers.
//!
//! `GET /{tenant_id}/v1/authorizations` validates the request and either
//! redirects to the sign-in UI with a fresh transaction (binding the
//! browser via the `AUTH_SESSION` cookie) or, for a satisfied
//! `prompt=none`, straight back to the client. The remaining handlers
//! drive the pending transaction: interactions, view data, the authorize
//! and deny decisions, and session-backed authorization.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use serde_json::json;
use uuid::Uuid;

use crate::error::OidcError;
use crate::interaction::{InteractionStatus, InteractionType};
use crate::oauth::request::AuthorizationRequestParams;
use crate::oauth::service::{AuthorizationService, AuthorizationStart, AuthorizeStartError};
use crate::session::{AUTH_SESSION_COOKIE, OP_SESSION_COOKIE};

/// State for the authorization endpoint handlers.
#[derive(Clone)]
pub struct AuthorizationState {
    /// The authorization service.
    pub service: Arc<AuthorizationService>,
    /// Whether cookies carry the `Secure` attribute.
    pub secure_cookies: bool,
}

impl AuthorizationState {
    /// Creates the state.
    #[must_use]
    pub fn new(service: Arc<AuthorizationService>, secure_cookies: bool) -> Self {
        Self {
            service,
            secure_cookies,
        }
    }
}

/// Handler for `GET /{tenant_id}/v1/authorizations`.
pub async fn authorize_handler(
    State(state): State<AuthorizationState>,
    Path(tenant_id): Path<String>,
    Query(params): Query<AuthorizationRequestParams>,
    jar: CookieJar,
) -> Response {
    start_authorization(state, tenant_id, params, jar).await
}

/// Handler for `POST /{tenant_id}/v1/authorizations` (form-encoded).
pub async fn authorize_post_handler(
    State(state): State<AuthorizationState>,
    Path(tenant_id): Path<String>,
    jar: CookieJar,
    axum::Form(params): axum::Form<AuthorizationRequestParams>,
) -> Response {
    start_authorization(state, tenant_id, params, jar).await
}

async fn start_authorization(
    state: AuthorizationState,
    tenant_id: String,
    params: AuthorizationRequestParams,
    jar: CookieJar,
) -> Response {
    let op_session = cookie_value(&jar, OP_SESSION_COOKIE);
    match state
        .service
        .request_authorization(&tenant_id, params, op_session.as_deref())
        .await
    {
        Ok(AuthorizationStart::PendingInteraction { transaction }) => {
            let location = state.service.sign_in_location(transaction.id);
            let cookie = session_cookie(
                AUTH_SESSION_COOKIE,
                transaction.auth_session.clone(),
                state.secure_cookies,
            );
            (jar.add(cookie), Redirect::to(&location)).into_response()
        }
        Ok(AuthorizationStart::Authorized { redirect_uri }) => {
            Redirect::to(&redirect_uri).into_response()
        }
        Err(AuthorizeStartError::Redirect { location }) => Redirect::to(&location).into_response(),
        Err(AuthorizeStartError::Direct(err)) => err.into_response(),
    }
}

/// Handler for `GET /{tenant_id}/v1/authorizations/{id}/view-data`.
pub async fn view_data_handler(
    State(state): State<AuthorizationState>,
    Path((tenant_id, id)): Path<(String, Uuid)>,
    jar: CookieJar,
) -> Result<Response, OidcError> {
    let op_session = cookie_value(&jar, OP_SESSION_COOKIE);
    let view = state
        .service
        .view_data(&tenant_id, id, op_session.as_deref())
        .await?;
    Ok(Json(view).into_response())
}

/// Handler for `POST /{tenant_id}/v1/authorizations/{id}/{interaction}`.
pub async fn interaction_handler(
    State(state): State<AuthorizationState>,
    Path((tenant_id, id, interaction)): Path<(String, Uuid, String)>,
    jar: CookieJar,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response, OidcError> {
    let interaction_type = InteractionType::parse(&interaction).ok_or_else(|| {
        OidcError::invalid_request(format!(
            "authentication interaction ({interaction}) is unknown"
        ))
    })?;
    let auth_session = cookie_value(&jar, AUTH_SESSION_COOKIE);
    let outcome = state
        .service
        .submit_interaction(
            &tenant_id,
            id,
            interaction_type,
            &payload,
            auth_session.as_deref(),
        )
        .await?;
    let status = match outcome.status {
        InteractionStatus::Success | InteractionStatus::Deny => StatusCode::OK,
        InteractionStatus::ClientError => StatusCode::BAD_REQUEST,
    };
    Ok((status, Json(outcome.response)).into_response())
}

/// Handler for `POST /{tenant_id}/v1/authorizations/{id}/authorize`.
pub async fn authorize_action_handler(
    State(state): State<AuthorizationState>,
    Path((tenant_id, id)): Path<(String, Uuid)>,
    jar: CookieJar,
) -> Result<Response, OidcError> {
    let auth_session = cookie_value(&jar, AUTH_SESSION_COOKIE);
    let op_session = cookie_value(&jar, OP_SESSION_COOKIE);
    let grant = state
        .service
        .authorize(&tenant_id, id, auth_session.as_deref(), op_session.as_deref())
        .await?;
    Ok(grant_response(grant, jar, state.secure_cookies))
}

/// Handler for `POST /{tenant_id}/v1/authorizations/{id}/authorize-with-session`.
pub async fn authorize_with_session_handler(
    State(state): State<AuthorizationState>,
    Path((tenant_id, id)): Path<(String, Uuid)>,
    jar: CookieJar,
) -> Result<Response, OidcError> {
    let auth_session = cookie_value(&jar, AUTH_SESSION_COOKIE);
    let op_session = cookie_value(&jar, OP_SESSION_COOKIE);
    let grant = state
        .service
        .authorize_with_session(&tenant_id, id, auth_session.as_deref(), op_session.as_deref())
        .await?;
    Ok(grant_response(grant, jar, state.secure_cookies))
}

/// Handler for `POST /{tenant_id}/v1/authorizations/{id}/deny`.
pub async fn deny_handler(
    State(state): State<AuthorizationState>,
    Path((tenant_id, id)): Path<(String, Uuid)>,
    jar: CookieJar,
) -> Result<Response, OidcError> {
    let auth_session = cookie_value(&jar, AUTH_SESSION_COOKIE);
    let grant = state
        .service
        .deny(&tenant_id, id, auth_session.as_deref())
        .await?;
    Ok(Json(json!({"redirect_uri": grant.redirect_uri})).into_response())
}

fn grant_response(
    grant: crate::oauth::service::AuthorizeGrant,
    jar: CookieJar,
    secure: bool,
) -> Response {
    let body = Json(json!({"redirect_uri": grant.redirect_uri}));
    match grant.op_session_cookie {
        Some(value) => {
            let cookie = session_cookie(OP_SESSION_COOKIE, value, secure);
            (jar.add(cookie), body).into_response()
        }
        None => body.into_response(),
    }
}

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name).map(|c| c.value().to_string())
}

fn session_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}
