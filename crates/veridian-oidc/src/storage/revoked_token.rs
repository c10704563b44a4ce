//! Revoked access token storage.
//!
//! Access tokens are self-contained JWTs; revocation (RFC 7009) records the
//! `jti` so introspection and resource access can reject them before expiry.

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::OidcError;

/// Storage for revoked access token identifiers.
#[async_trait]
pub trait RevokedTokenStorage: Send + Sync {
    /// Records a revoked `jti` until its natural expiry.
    async fn revoke(
        &self,
        tenant_id: &str,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), OidcError>;

    /// Returns `true` if the `jti` has been revoked.
    async fn is_revoked(&self, tenant_id: &str, jti: &str) -> Result<bool, OidcError>;
}
