//! Token introspection (RFC 7662).

use std::sync::Arc;

use serde::Serialize;

use crate::error::OidcError;
use crate::storage::RevokedTokenStorage;
use crate::token::jwt::{AccessTokenClaims, JwtCodec};

/// Introspection response. Inactive tokens carry `active: false` and
/// nothing else.
#[derive(Debug, Clone, Serialize)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl IntrospectionResponse {
    fn inactive() -> Self {
        Self {
            active: false,
            scope: None,
            client_id: None,
            sub: None,
            token_type: None,
            exp: None,
            iat: None,
            jti: None,
        }
    }
}

/// Introspects self-contained access tokens against the signing key and
/// the revocation list.
pub struct IntrospectionService {
    jwt: Arc<JwtCodec>,
    revoked: Arc<dyn RevokedTokenStorage>,
}

impl IntrospectionService {
    /// Creates the service.
    #[must_use]
    pub fn new(jwt: Arc<JwtCodec>, revoked: Arc<dyn RevokedTokenStorage>) -> Self {
        Self { jwt, revoked }
    }

    /// Introspects a token.
    ///
    /// Malformed, expired, foreign, and revoked tokens all produce
    /// `active: false`; introspection never errors on bad input.
    ///
    /// # Errors
    ///
    /// Propagates storage failures only.
    pub async fn introspect(
        &self,
        tenant_id: &str,
        token: &str,
    ) -> Result<IntrospectionResponse, OidcError> {
        let Ok(claims) = self.jwt.decode::<AccessTokenClaims>(token) else {
            return Ok(IntrospectionResponse::inactive());
        };
        if self.revoked.is_revoked(tenant_id, &claims.jti).await? {
            return Ok(IntrospectionResponse::inactive());
        }
        Ok(IntrospectionResponse {
            active: true,
            scope: Some(claims.scope),
            client_id: Some(claims.client_id),
            sub: claims.sub,
            token_type: Some("Bearer"),
            exp: Some(claims.exp),
            iat: Some(claims.iat),
            jti: Some(claims.jti),
        })
    }
}
