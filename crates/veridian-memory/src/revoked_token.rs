//! In-memory revoked token list.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use veridian_oidc::error::OidcError;
use veridian_oidc::storage::RevokedTokenStorage;

use crate::{TenantKey, tenant_key};

/// Revoked access token identifiers, each held until its natural expiry.
#[derive(Debug, Default)]
pub struct InMemoryRevokedTokenStorage {
    revoked: DashMap<TenantKey, OffsetDateTime>,
}

impl InMemoryRevokedTokenStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevokedTokenStorage for InMemoryRevokedTokenStorage {
    async fn revoke(
        &self,
        tenant_id: &str,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> Result<(), OidcError> {
        self.revoked.insert(tenant_key(tenant_id, jti), expires_at);
        Ok(())
    }

    async fn is_revoked(&self, tenant_id: &str, jti: &str) -> Result<bool, OidcError> {
        let key = tenant_key(tenant_id, jti);
        match self.revoked.get(&key).map(|entry| *entry.value()) {
            Some(expires_at) if expires_at > OffsetDateTime::now_utc() => Ok(true),
            Some(_) => {
                // The token itself has expired; the entry is no longer needed.
                self.revoked.remove(&key);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[tokio::test]
    async fn revoked_until_expiry() {
        let storage = InMemoryRevokedTokenStorage::new();
        let now = OffsetDateTime::now_utc();
        storage
            .revoke("tenant-1", "jti-live", now + Duration::hours(1))
            .await
            .unwrap();
        storage
            .revoke("tenant-1", "jti-stale", now - Duration::hours(1))
            .await
            .unwrap();

        assert!(storage.is_revoked("tenant-1", "jti-live").await.unwrap());
        assert!(!storage.is_revoked("tenant-1", "jti-stale").await.unwrap());
        assert!(!storage.is_revoked("tenant-1", "jti-unknown").await.unwrap());
    }
}
