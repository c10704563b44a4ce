//! In-memory interaction challenge context storage.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;
use veridian_oidc::error::OidcError;
use veridian_oidc::storage::InteractionContextStorage;

/// Challenge contexts keyed by transaction and method name.
#[derive(Debug, Default)]
pub struct InMemoryInteractionContextStorage {
    contexts: DashMap<(Uuid, String), serde_json::Value>,
}

impl InMemoryInteractionContextStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InteractionContextStorage for InMemoryInteractionContextStorage {
    async fn save(
        &self,
        transaction_id: Uuid,
        method: &str,
        context: serde_json::Value,
    ) -> Result<(), OidcError> {
        self.contexts
            .insert((transaction_id, method.to_string()), context);
        Ok(())
    }

    async fn find(
        &self,
        transaction_id: Uuid,
        method: &str,
    ) -> Result<Option<serde_json::Value>, OidcError> {
        Ok(self
            .contexts
            .get(&(transaction_id, method.to_string()))
            .map(|entry| entry.value().clone()))
    }

    async fn delete(&self, transaction_id: Uuid, method: &str) -> Result<(), OidcError> {
        self.contexts.remove(&(transaction_id, method.to_string()));
        Ok(())
    }
}
