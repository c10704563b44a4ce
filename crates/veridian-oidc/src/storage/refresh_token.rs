//! Refresh token storage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::OidcError;

/// A stored refresh token grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
    /// The opaque token value handed to the client.
    pub token: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// The client the token was issued to.
    pub client_id: String,
    /// The subject the token acts for; `None` for user-less grants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Granted scopes, carried to every derived access token.
    pub scopes: Vec<String>,
    /// Issue time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Expiry time.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl RefreshTokenRecord {
    /// Returns `true` if the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }
}

/// Storage for refresh tokens. Rotation deletes the old record and creates
/// a fresh one in two calls; single-use is enforced via `consume`.
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Persists a new refresh token.
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), OidcError>;

    /// Atomically removes and returns the record for a token value.
    ///
    /// A second consume of the same value observes `None`.
    async fn consume(
        &self,
        tenant_id: &str,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, OidcError>;

    /// Deletes all tokens issued to a client for a subject.
    async fn delete_for_client_sub(
        &self,
        tenant_id: &str,
        client_id: &str,
        sub: &str,
    ) -> Result<(), OidcError>;
}
