//! Authorization transaction storage.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::OidcError;
use crate::oauth::transaction::AuthorizationTransaction;

/// Storage for pending and completed authorization transactions.
#[async_trait]
pub trait TransactionStorage: Send + Sync {
    /// Persists a new transaction.
    async fn create(&self, transaction: &AuthorizationTransaction) -> Result<(), OidcError>;

    /// Finds a transaction by identifier.
    async fn find_by_id(
        &self,
        tenant_id: &str,
        id: Uuid,
    ) -> Result<Option<AuthorizationTransaction>, OidcError>;

    /// Replaces a stored transaction.
    async fn update(&self, transaction: &AuthorizationTransaction) -> Result<(), OidcError>;

    /// Atomically marks the authorization code consumed and returns the
    /// owning transaction.
    ///
    /// Exactly one caller observes `Some` for a given code; concurrent or
    /// repeated exchanges observe `None`. Backends must make the check and
    /// the mark a single atomic step.
    async fn consume_code(
        &self,
        tenant_id: &str,
        code: &str,
    ) -> Result<Option<AuthorizationTransaction>, OidcError>;

    /// Removes expired transactions; returns how many were removed.
    async fn delete_expired(&self, tenant_id: &str) -> Result<u64, OidcError>;
}
