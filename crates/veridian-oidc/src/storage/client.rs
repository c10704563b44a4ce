//! Client registration storage.

use async_trait::async_trait;

use crate::error::OidcError;
use crate::types::Client;

/// Storage for client registrations, scoped by tenant.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Finds an active client by identifier.
    async fn find_by_id(
        &self,
        tenant_id: &str,
        client_id: &str,
    ) -> Result<Option<Client>, OidcError>;

    /// Registers or replaces a client.
    async fn save(&self, tenant_id: &str, client: Client) -> Result<(), OidcError>;

    /// Removes a client registration.
    async fn delete(&self, tenant_id: &str, client_id: &str) -> Result<(), OidcError>;
}
