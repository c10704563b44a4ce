//! In-memory client registry.

use async_trait::async_trait;
use dashmap::DashMap;
use veridian_oidc::error::OidcError;
use veridian_oidc::storage::ClientStorage;
use veridian_oidc::types::Client;

use crate::{TenantKey, tenant_key};

/// Client registrations held in a concurrent map keyed by tenant and
/// client identifier.
#[derive(Debug, Default)]
pub struct InMemoryClientStorage {
    clients: DashMap<TenantKey, Client>,
}

impl InMemoryClientStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientStorage for InMemoryClientStorage {
    async fn find_by_id(
        &self,
        tenant_id: &str,
        client_id: &str,
    ) -> Result<Option<Client>, OidcError> {
        Ok(self
            .clients
            .get(&tenant_key(tenant_id, client_id))
            .map(|entry| entry.value().clone()))
    }

    async fn save(&self, tenant_id: &str, client: Client) -> Result<(), OidcError> {
        self.clients
            .insert(tenant_key(tenant_id, &client.client_id), client);
        Ok(())
    }

    async fn delete(&self, tenant_id: &str, client_id: &str) -> Result<(), OidcError> {
        self.clients.remove(&tenant_key(tenant_id, client_id));
        Ok(())
    }
}
