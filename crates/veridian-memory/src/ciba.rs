//! In-memory backchannel authentication request storage.

use async_trait::async_trait;
use dashmap::DashMap;
use veridian_oidc::ciba::{BackchannelAuthenticationRequest, CibaStatus};
use veridian_oidc::error::OidcError;
use veridian_oidc::storage::CibaRequestStorage;

use crate::{TenantKey, tenant_key};

/// Backchannel requests keyed by tenant and `auth_req_id`.
///
/// Status transitions happen under the entry's shard lock, which makes the
/// monotonic guard and `consume_granted` atomic with respect to concurrent
/// token polls.
#[derive(Debug, Default)]
pub struct InMemoryCibaRequestStorage {
    requests: DashMap<TenantKey, BackchannelAuthenticationRequest>,
}

impl InMemoryCibaRequestStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Returns `true` when moving from `from` to `to` is a forward transition.
fn transition_allowed(from: CibaStatus, to: CibaStatus) -> bool {
    matches!(
        (from, to),
        (CibaStatus::Pending, CibaStatus::Granted)
            | (CibaStatus::Pending, CibaStatus::Denied)
            | (CibaStatus::Granted, CibaStatus::Consumed)
    )
}

#[async_trait]
impl CibaRequestStorage for InMemoryCibaRequestStorage {
    async fn create(&self, request: &BackchannelAuthenticationRequest) -> Result<(), OidcError> {
        self.requests.insert(
            tenant_key(&request.tenant_id, &request.auth_req_id),
            request.clone(),
        );
        Ok(())
    }

    async fn find_by_id(
        &self,
        tenant_id: &str,
        auth_req_id: &str,
    ) -> Result<Option<BackchannelAuthenticationRequest>, OidcError> {
        Ok(self
            .requests
            .get(&tenant_key(tenant_id, auth_req_id))
            .map(|entry| entry.value().clone()))
    }

    async fn update_status(
        &self,
        tenant_id: &str,
        auth_req_id: &str,
        status: CibaStatus,
    ) -> Result<(), OidcError> {
        if let Some(mut entry) = self.requests.get_mut(&tenant_key(tenant_id, auth_req_id))
            && transition_allowed(entry.status, status)
        {
            entry.status = status;
        }
        Ok(())
    }

    async fn consume_granted(
        &self,
        tenant_id: &str,
        auth_req_id: &str,
    ) -> Result<Option<BackchannelAuthenticationRequest>, OidcError> {
        let Some(mut entry) = self.requests.get_mut(&tenant_key(tenant_id, auth_req_id)) else {
            return Ok(None);
        };
        if entry.status != CibaStatus::Granted {
            return Ok(None);
        }
        entry.status = CibaStatus::Consumed;
        Ok(Some(entry.value().clone()))
    }

    async fn find_pending_by_device(
        &self,
        tenant_id: &str,
        device_id: &str,
    ) -> Result<Vec<BackchannelAuthenticationRequest>, OidcError> {
        Ok(self
            .requests
            .iter()
            .filter(|entry| {
                entry.key().0 == tenant_id
                    && entry.value().status == CibaStatus::Pending
                    && !entry.value().is_expired()
                    && entry.value().device_id.as_deref() == Some(device_id)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};
    use uuid::Uuid;

    fn request(auth_req_id: &str) -> BackchannelAuthenticationRequest {
        let now = OffsetDateTime::now_utc();
        BackchannelAuthenticationRequest {
            auth_req_id: auth_req_id.to_string(),
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            scopes: vec!["openid".to_string()],
            sub: "user-1".to_string(),
            device_id: Some("device-1".to_string()),
            binding_message: None,
            user_code: None,
            transaction_id: Uuid::new_v4(),
            status: CibaStatus::Pending,
            interval: 5,
            created_at: now,
            expires_at: now + Duration::minutes(5),
        }
    }

    #[tokio::test]
    async fn consume_granted_is_exactly_once() {
        let storage = InMemoryCibaRequestStorage::new();
        storage.create(&request("req-1")).await.unwrap();
        storage
            .update_status("tenant-1", "req-1", CibaStatus::Granted)
            .await
            .unwrap();

        assert!(
            storage
                .consume_granted("tenant-1", "req-1")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            storage
                .consume_granted("tenant-1", "req-1")
                .await
                .unwrap()
                .is_none()
        );
        let stored = storage.find_by_id("tenant-1", "req-1").await.unwrap().unwrap();
        assert_eq!(stored.status, CibaStatus::Consumed);
    }

    #[tokio::test]
    async fn status_never_regresses() {
        let storage = InMemoryCibaRequestStorage::new();
        storage.create(&request("req-1")).await.unwrap();
        storage
            .update_status("tenant-1", "req-1", CibaStatus::Denied)
            .await
            .unwrap();
        storage
            .update_status("tenant-1", "req-1", CibaStatus::Granted)
            .await
            .unwrap();

        let stored = storage.find_by_id("tenant-1", "req-1").await.unwrap().unwrap();
        assert_eq!(stored.status, CibaStatus::Denied);
        assert!(
            storage
                .consume_granted("tenant-1", "req-1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn pending_listing_excludes_settled_requests() {
        let storage = InMemoryCibaRequestStorage::new();
        storage.create(&request("req-1")).await.unwrap();
        storage.create(&request("req-2")).await.unwrap();
        storage
            .update_status("tenant-1", "req-2", CibaStatus::Granted)
            .await
            .unwrap();

        let pending = storage
            .find_pending_by_device("tenant-1", "device-1")
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].auth_req_id, "req-1");
    }
}
