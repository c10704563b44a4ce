//! In-memory refresh token storage.

use async_trait::async_trait;
use dashmap::DashMap;
use veridian_oidc::error::OidcError;
use veridian_oidc::storage::{RefreshTokenRecord, RefreshTokenStorage};

use crate::{TenantKey, tenant_key};

/// Refresh tokens keyed by tenant and token value. `consume` relies on the
/// atomicity of map removal for single use.
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStorage {
    tokens: DashMap<TenantKey, RefreshTokenRecord>,
}

impl InMemoryRefreshTokenStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStorage for InMemoryRefreshTokenStorage {
    async fn create(&self, record: &RefreshTokenRecord) -> Result<(), OidcError> {
        self.tokens
            .insert(tenant_key(&record.tenant_id, &record.token), record.clone());
        Ok(())
    }

    async fn consume(
        &self,
        tenant_id: &str,
        token: &str,
    ) -> Result<Option<RefreshTokenRecord>, OidcError> {
        Ok(self
            .tokens
            .remove(&tenant_key(tenant_id, token))
            .map(|(_, record)| record))
    }

    async fn delete_for_client_sub(
        &self,
        tenant_id: &str,
        client_id: &str,
        sub: &str,
    ) -> Result<(), OidcError> {
        self.tokens.retain(|(tenant, _), record| {
            tenant != tenant_id || record.client_id != client_id || record.sub.as_deref() != Some(sub)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    fn record(token: &str) -> RefreshTokenRecord {
        let now = OffsetDateTime::now_utc();
        RefreshTokenRecord {
            token: token.to_string(),
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            sub: Some("user-1".to_string()),
            scopes: vec!["openid".to_string()],
            created_at: now,
            expires_at: now + Duration::days(30),
        }
    }

    #[tokio::test]
    async fn consume_is_single_use() {
        let storage = InMemoryRefreshTokenStorage::new();
        storage.create(&record("rt-1")).await.unwrap();

        assert!(storage.consume("tenant-1", "rt-1").await.unwrap().is_some());
        assert!(storage.consume("tenant-1", "rt-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_for_client_sub_clears_matching_tokens() {
        let storage = InMemoryRefreshTokenStorage::new();
        storage.create(&record("rt-1")).await.unwrap();
        let mut other = record("rt-2");
        other.sub = Some("user-2".to_string());
        storage.create(&other).await.unwrap();

        storage
            .delete_for_client_sub("tenant-1", "client-1", "user-1")
            .await
            .unwrap();
        assert!(storage.consume("tenant-1", "rt-1").await.unwrap().is_none());
        assert!(storage.consume("tenant-1", "rt-2").await.unwrap().is_some());
    }
}
