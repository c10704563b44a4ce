//! Consent ledger storage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::OidcError;

/// A user's recorded consent for a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsentRecord {
    /// Owning tenant.
    pub tenant_id: String,
    /// The subject who granted consent.
    pub sub: String,
    /// The client consent was granted to.
    pub client_id: String,
    /// Scopes covered by this consent.
    pub scopes: Vec<String>,
    /// When consent was first granted.
    #[serde(with = "time::serde::rfc3339")]
    pub granted_at: OffsetDateTime,
    /// When consent was last extended.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ConsentRecord {
    /// Returns `true` when every requested scope is already covered.
    #[must_use]
    pub fn covers(&self, requested: &[String]) -> bool {
        requested.iter().all(|s| self.scopes.contains(s))
    }
}

/// Storage for per-user, per-client consent grants.
#[async_trait]
pub trait ConsentStorage: Send + Sync {
    /// Finds the consent record for a subject and client.
    async fn find(
        &self,
        tenant_id: &str,
        sub: &str,
        client_id: &str,
    ) -> Result<Option<ConsentRecord>, OidcError>;

    /// Records consent, merging scopes into any existing record.
    async fn grant(
        &self,
        tenant_id: &str,
        sub: &str,
        client_id: &str,
        scopes: &[String],
    ) -> Result<(), OidcError>;

    /// Revokes a subject's consent for a client.
    async fn revoke(&self, tenant_id: &str, sub: &str, client_id: &str) -> Result<(), OidcError>;

    /// Lists all consents granted by a subject.
    async fn list_for_sub(
        &self,
        tenant_id: &str,
        sub: &str,
    ) -> Result<Vec<ConsentRecord>, OidcError>;
}
