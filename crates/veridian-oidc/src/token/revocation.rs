//! Token revocation (RFC 7009).

use std::sync::Arc;

use time::OffsetDateTime;

use crate::error::OidcError;
use crate::events::{SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::storage::{RefreshTokenStorage, RevokedTokenStorage};
use crate::token::jwt::{AccessTokenClaims, JwtCodec};

/// Revokes access and refresh tokens.
///
/// Per RFC 7009 revocation always reports success to the caller, even for
/// unknown tokens.
pub struct RevocationService {
    jwt: Arc<JwtCodec>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
    revoked: Arc<dyn RevokedTokenStorage>,
    event_sink: Arc<dyn SecurityEventSink>,
}

impl RevocationService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        jwt: Arc<JwtCodec>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
        revoked: Arc<dyn RevokedTokenStorage>,
        event_sink: Arc<dyn SecurityEventSink>,
    ) -> Self {
        Self {
            jwt,
            refresh_tokens,
            revoked,
            event_sink,
        }
    }

    /// Revokes a token of either kind.
    ///
    /// Refresh tokens are deleted; access tokens have their `jti` recorded
    /// until natural expiry.
    ///
    /// # Errors
    ///
    /// Propagates storage failures only.
    pub async fn revoke(&self, tenant_id: &str, token: &str) -> Result<(), OidcError> {
        // Try refresh token first: opaque values never parse as our JWTs.
        if let Some(record) = self.refresh_tokens.consume(tenant_id, token).await? {
            self.event_sink
                .record(
                    SecurityEvent::new(SecurityEventType::TokenRevoked, tenant_id)
                        .with_client(&record.client_id)
                        .with_detail(serde_json::json!({"token_type": "refresh_token"})),
                )
                .await?;
            return Ok(());
        }

        if let Ok(claims) = self.jwt.decode::<AccessTokenClaims>(token) {
            let expires_at = OffsetDateTime::from_unix_timestamp(claims.exp)
                .unwrap_or_else(|_| OffsetDateTime::now_utc());
            self.revoked
                .revoke(tenant_id, &claims.jti, expires_at)
                .await?;
            self.event_sink
                .record(
                    SecurityEvent::new(SecurityEventType::TokenRevoked, tenant_id)
                        .with_client(&claims.client_id)
                        .with_detail(serde_json::json!({"token_type": "access_token"})),
                )
                .await?;
        }
        // Unknown token: silently succeed per RFC 7009.
        Ok(())
    }
}
