//! In-memory end-user account storage.
//!
//! Passwords are stored as SHA-256 digests. This backend is meant for
//! development and tests; a production backend would use a memory-hard
//! password hash.

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use veridian_oidc::error::OidcError;
use veridian_oidc::storage::UserStorage;
use veridian_oidc::types::User;

use crate::{TenantKey, tenant_key};

/// User accounts keyed by tenant and subject, with password digests keyed
/// by tenant and username.
#[derive(Debug, Default)]
pub struct InMemoryUserStorage {
    users: DashMap<TenantKey, User>,
    passwords: DashMap<TenantKey, String>,
}

impl InMemoryUserStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[async_trait]
impl UserStorage for InMemoryUserStorage {
    async fn find_by_sub(&self, tenant_id: &str, sub: &str) -> Result<Option<User>, OidcError> {
        Ok(self
            .users
            .get(&tenant_key(tenant_id, sub))
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_username(
        &self,
        tenant_id: &str,
        username: &str,
    ) -> Result<Option<User>, OidcError> {
        Ok(self
            .users
            .iter()
            .find(|entry| entry.key().0 == tenant_id && entry.value().username == username)
            .map(|entry| entry.value().clone()))
    }

    async fn find_by_email(&self, tenant_id: &str, email: &str) -> Result<Vec<User>, OidcError> {
        Ok(self
            .users
            .iter()
            .filter(|entry| {
                entry.key().0 == tenant_id && entry.value().email.as_deref() == Some(email)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn find_by_phone_number(
        &self,
        tenant_id: &str,
        phone_number: &str,
    ) -> Result<Vec<User>, OidcError> {
        Ok(self
            .users
            .iter()
            .filter(|entry| {
                entry.key().0 == tenant_id
                    && entry.value().phone_number.as_deref() == Some(phone_number)
            })
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn find_by_device(
        &self,
        tenant_id: &str,
        device_id: &str,
    ) -> Result<Option<User>, OidcError> {
        Ok(self
            .users
            .iter()
            .find(|entry| {
                entry.key().0 == tenant_id && entry.value().has_authentication_device(device_id)
            })
            .map(|entry| entry.value().clone()))
    }

    async fn verify_password(
        &self,
        tenant_id: &str,
        username: &str,
        password: &str,
    ) -> Result<Option<User>, OidcError> {
        let Some(user) = self.find_by_username(tenant_id, username).await? else {
            return Ok(None);
        };
        if !user.active {
            return Ok(None);
        }
        let stored = self
            .passwords
            .get(&tenant_key(tenant_id, username))
            .map(|entry| entry.value().clone());
        if stored.as_deref() == Some(digest(password).as_str()) {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }

    async fn create(&self, tenant_id: &str, user: User, password: &str) -> Result<(), OidcError> {
        self.passwords
            .insert(tenant_key(tenant_id, &user.username), digest(password));
        self.users.insert(tenant_key(tenant_id, &user.sub), user);
        Ok(())
    }

    async fn add_authentication_device(
        &self,
        tenant_id: &str,
        sub: &str,
        device_id: &str,
    ) -> Result<(), OidcError> {
        let mut entry = self
            .users
            .get_mut(&tenant_key(tenant_id, sub))
            .ok_or_else(|| OidcError::not_found(format!("user is not found ({sub})")))?;
        let user = entry.value_mut();
        if !user.has_authentication_device(device_id) {
            user.authentication_devices.push(device_id.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn user(sub: &str, username: &str) -> User {
        User {
            sub: sub.to_string(),
            username: username.to_string(),
            name: Some("Ichiro Suzuki".to_string()),
            email: Some(format!("{username}@example.com")),
            email_verified: true,
            phone_number: Some("+81312345678".to_string()),
            authentication_devices: vec!["device-1".to_string()],
            active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[tokio::test]
    async fn verify_password_checks_digest() {
        let storage = InMemoryUserStorage::new();
        storage
            .create("tenant-1", user("user-1", "ichiro"), "secret")
            .await
            .unwrap();

        assert!(
            storage
                .verify_password("tenant-1", "ichiro", "secret")
                .await
                .unwrap()
                .is_some()
        );
        assert!(
            storage
                .verify_password("tenant-1", "ichiro", "wrong")
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            storage
                .verify_password("tenant-1", "nobody", "secret")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn inactive_accounts_cannot_authenticate() {
        let storage = InMemoryUserStorage::new();
        let mut account = user("user-1", "ichiro");
        account.active = false;
        storage
            .create("tenant-1", account, "secret")
            .await
            .unwrap();

        assert!(
            storage
                .verify_password("tenant-1", "ichiro", "secret")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn registered_device_becomes_resolvable() {
        let storage = InMemoryUserStorage::new();
        storage
            .create("tenant-1", user("user-1", "ichiro"), "secret")
            .await
            .unwrap();

        storage
            .add_authentication_device("tenant-1", "user-1", "device-2")
            .await
            .unwrap();
        // Re-registering the same device does not duplicate it.
        storage
            .add_authentication_device("tenant-1", "user-1", "device-2")
            .await
            .unwrap();

        let owner = storage
            .find_by_device("tenant-1", "device-2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owner.sub, "user-1");
        assert_eq!(
            owner
                .authentication_devices
                .iter()
                .filter(|d| *d == "device-2")
                .count(),
            1
        );

        let missing = storage
            .add_authentication_device("tenant-1", "user-9", "device-3")
            .await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn device_lookup_finds_owner() {
        let storage = InMemoryUserStorage::new();
        storage
            .create("tenant-1", user("user-1", "ichiro"), "secret")
            .await
            .unwrap();

        let owner = storage
            .find_by_device("tenant-1", "device-1")
            .await
            .unwrap();
        assert_eq!(owner.map(|u| u.sub), Some("user-1".to_string()));
        assert!(
            storage
                .find_by_device("tenant-1", "device-9")
                .await
                .unwrap()
                .is_none()
        );
    }
}
