//! UserInfo endpoint handler (OIDC Core section 5.3).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::OidcError;
use crate::storage::{RevokedTokenStorage, UserStorage};
use crate::token::jwt::{AccessTokenClaims, JwtCodec};

/// State for the userinfo endpoint.
#[derive(Clone)]
pub struct UserinfoState {
    /// Codec verifying presented access tokens.
    pub jwt: Arc<JwtCodec>,
    /// User storage.
    pub user_storage: Arc<dyn UserStorage>,
    /// Revocation list.
    pub revoked: Arc<dyn RevokedTokenStorage>,
}

/// Handler for `GET`/`POST` `/{tenant_id}/v1/userinfo`.
///
/// Claims are released per the access token's granted scopes: `profile`
/// adds name and username, `email` and `phone` their respective claims.
pub async fn userinfo_handler(
    State(state): State<UserinfoState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, OidcError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| OidcError::invalid_token("userinfo request must contains a bearer token"))?;

    let claims: AccessTokenClaims = state.jwt.decode(token)?;
    if state.revoked.is_revoked(&tenant_id, &claims.jti).await? {
        return Err(OidcError::invalid_token("token is revoked"));
    }
    let scopes: Vec<&str> = claims.scope.split_whitespace().collect();
    if !scopes.contains(&"openid") {
        return Err(OidcError::insufficient_scope(
            "userinfo requires the openid scope",
        ));
    }
    let sub = claims
        .sub
        .as_deref()
        .ok_or_else(|| OidcError::invalid_token("token has no subject"))?;
    let user = state
        .user_storage
        .find_by_sub(&tenant_id, sub)
        .await?
        .ok_or_else(|| OidcError::invalid_token(format!("subject is not found ({sub})")))?;

    let mut body = json!({"sub": user.sub});
    if scopes.contains(&"profile") {
        body["name"] = json!(user.name);
        body["preferred_username"] = json!(user.username);
    }
    if scopes.contains(&"email") {
        body["email"] = json!(user.email);
        body["email_verified"] = json!(user.email_verified);
    }
    if scopes.contains(&"phone") {
        body["phone_number"] = json!(user.phone_number);
    }
    Ok(Json(body).into_response())
}
