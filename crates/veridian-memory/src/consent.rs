//! In-memory consent ledger.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use veridian_oidc::error::OidcError;
use veridian_oidc::storage::{ConsentRecord, ConsentStorage};

/// Consent grants keyed by tenant, subject, and client.
#[derive(Debug, Default)]
pub struct InMemoryConsentStorage {
    consents: DashMap<(String, String, String), ConsentRecord>,
}

impl InMemoryConsentStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(tenant_id: &str, sub: &str, client_id: &str) -> (String, String, String) {
    (
        tenant_id.to_string(),
        sub.to_string(),
        client_id.to_string(),
    )
}

#[async_trait]
impl ConsentStorage for InMemoryConsentStorage {
    async fn find(
        &self,
        tenant_id: &str,
        sub: &str,
        client_id: &str,
    ) -> Result<Option<ConsentRecord>, OidcError> {
        Ok(self
            .consents
            .get(&key(tenant_id, sub, client_id))
            .map(|entry| entry.value().clone()))
    }

    async fn grant(
        &self,
        tenant_id: &str,
        sub: &str,
        client_id: &str,
        scopes: &[String],
    ) -> Result<(), OidcError> {
        let now = OffsetDateTime::now_utc();
        self.consents
            .entry(key(tenant_id, sub, client_id))
            .and_modify(|record| {
                for scope in scopes {
                    if !record.scopes.contains(scope) {
                        record.scopes.push(scope.clone());
                    }
                }
                record.updated_at = now;
            })
            .or_insert_with(|| ConsentRecord {
                tenant_id: tenant_id.to_string(),
                sub: sub.to_string(),
                client_id: client_id.to_string(),
                scopes: scopes.to_vec(),
                granted_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn revoke(&self, tenant_id: &str, sub: &str, client_id: &str) -> Result<(), OidcError> {
        self.consents.remove(&key(tenant_id, sub, client_id));
        Ok(())
    }

    async fn list_for_sub(
        &self,
        tenant_id: &str,
        sub: &str,
    ) -> Result<Vec<ConsentRecord>, OidcError> {
        Ok(self
            .consents
            .iter()
            .filter(|entry| entry.key().0 == tenant_id && entry.key().1 == sub)
            .map(|entry| entry.value().clone())
            .collect())
    }
}
