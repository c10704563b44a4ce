//! In-memory OP session storage, keyed by cookie value.

use async_trait::async_trait;
use dashmap::DashMap;
use veridian_oidc::error::OidcError;
use veridian_oidc::session::OpSession;
use veridian_oidc::storage::OpSessionStorage;

use crate::{TenantKey, tenant_key};

#[derive(Debug, Default)]
pub struct InMemoryOpSessionStorage {
    sessions: DashMap<TenantKey, OpSession>,
}

impl InMemoryOpSessionStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OpSessionStorage for InMemoryOpSessionStorage {
    async fn create(&self, session: &OpSession) -> Result<(), OidcError> {
        self.sessions.insert(
            tenant_key(&session.tenant_id, &session.cookie_value),
            session.clone(),
        );
        Ok(())
    }

    async fn find_by_cookie(
        &self,
        tenant_id: &str,
        cookie_value: &str,
    ) -> Result<Option<OpSession>, OidcError> {
        Ok(self
            .sessions
            .get(&tenant_key(tenant_id, cookie_value))
            .map(|entry| entry.value().clone()))
    }

    async fn update(&self, session: &OpSession) -> Result<(), OidcError> {
        self.sessions.insert(
            tenant_key(&session.tenant_id, &session.cookie_value),
            session.clone(),
        );
        Ok(())
    }

    async fn delete(&self, tenant_id: &str, cookie_value: &str) -> Result<(), OidcError> {
        self.sessions.remove(&tenant_key(tenant_id, cookie_value));
        Ok(())
    }

    async fn delete_expired(&self, tenant_id: &str) -> Result<u64, OidcError> {
        let before = self.sessions.len();
        self.sessions
            .retain(|(tenant, _), session| tenant != tenant_id || !session.is_expired());
        Ok((before - self.sessions.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    #[tokio::test]
    async fn expired_sessions_are_swept() {
        let storage = InMemoryOpSessionStorage::new();
        let live = OpSession::new(
            "tenant-1",
            "user-1",
            "urn:veridian:acr:1",
            vec!["pwd".to_string()],
            OffsetDateTime::now_utc(),
            Duration::hours(8),
        );
        let mut stale = OpSession::new(
            "tenant-1",
            "user-2",
            "urn:veridian:acr:1",
            vec!["pwd".to_string()],
            OffsetDateTime::now_utc(),
            Duration::hours(8),
        );
        stale.expires_at = OffsetDateTime::now_utc() - Duration::minutes(1);
        storage.create(&live).await.unwrap();
        storage.create(&stale).await.unwrap();

        assert_eq!(storage.delete_expired("tenant-1").await.unwrap(), 1);
        assert!(
            storage
                .find_by_cookie("tenant-1", &live.cookie_value)
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            storage
                .find_by_cookie("tenant-1", &stale.cookie_value)
                .await
                .unwrap()
                .is_none()
        );
    }
}
