//! OP session storage.

use async_trait::async_trait;

use crate::error::OidcError;
use crate::session::OpSession;

/// Storage for authenticated OP sessions (SSO).
#[async_trait]
pub trait OpSessionStorage: Send + Sync {
    /// Persists a new session.
    async fn create(&self, session: &OpSession) -> Result<(), OidcError>;

    /// Finds a session by its cookie value.
    async fn find_by_cookie(
        &self,
        tenant_id: &str,
        cookie_value: &str,
    ) -> Result<Option<OpSession>, OidcError>;

    /// Replaces a stored session (upgrade, lifetime extension).
    async fn update(&self, session: &OpSession) -> Result<(), OidcError>;

    /// Deletes a session by cookie value (logout).
    async fn delete(&self, tenant_id: &str, cookie_value: &str) -> Result<(), OidcError>;

    /// Removes expired sessions; returns how many were removed.
    async fn delete_expired(&self, tenant_id: &str) -> Result<u64, OidcError>;
}
