//! Interaction challenge context storage.
//!
//! Challenge interactions (OTP, FIDO) persist server-side context between
//! the challenge and verification steps, keyed by transaction and method.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::OidcError;

/// Storage for per-transaction interaction contexts.
#[async_trait]
pub trait InteractionContextStorage: Send + Sync {
    /// Persists the context for a transaction and method, replacing any
    /// previous one.
    async fn save(
        &self,
        transaction_id: Uuid,
        method: &str,
        context: serde_json::Value,
    ) -> Result<(), OidcError>;

    /// Retrieves the stored context.
    async fn find(
        &self,
        transaction_id: Uuid,
        method: &str,
    ) -> Result<Option<serde_json::Value>, OidcError>;

    /// Removes the stored context after verification.
    async fn delete(&self, transaction_id: Uuid, method: &str) -> Result<(), OidcError>;
}
