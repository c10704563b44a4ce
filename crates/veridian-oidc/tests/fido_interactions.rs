//! FIDO interactor tests.
//!
//! These live as integration tests rather than unit tests: they exercise the
//! interactors against `veridian-memory`, which depends on `veridian-oidc`,
//! and a unit-test build would link a second copy of the crate whose storage
//! traits do not unify with the test build's.

use std::sync::Arc;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use veridian_memory::{InMemoryInteractionContextStorage, InMemoryUserStorage};
use veridian_oidc::error::OidcError;
use veridian_oidc::interaction::fido::FidoVerification;
use veridian_oidc::interaction::{
    Fido2AuthenticationInteractor, Fido2ChallengeInteractor, FidoGateway,
    FidoUafRegistrationChallengeInteractor, FidoUafRegistrationInteractor, InteractionVerdict,
    Interactor,
};
use veridian_oidc::oauth::transaction::AuthorizationTransaction;
use veridian_oidc::storage::UserStorage;
use veridian_oidc::types::{ResponseTypeSet, User};

/// Gateway that verifies any payload carrying a `device_id`.
struct StaticGateway;

#[async_trait]
impl FidoGateway for StaticGateway {
    async fn authentication_challenge(
        &self,
        _tenant_id: &str,
        _payload: &serde_json::Value,
    ) -> Result<serde_json::Value, OidcError> {
        Ok(serde_json::json!({"challenge": "nonce"}))
    }

    async fn verify_authentication(
        &self,
        _tenant_id: &str,
        _challenge: &serde_json::Value,
        assertion: &serde_json::Value,
    ) -> Result<FidoVerification, OidcError> {
        Ok(match assertion.get("device_id").and_then(|v| v.as_str()) {
            Some(device_id) => FidoVerification::Verified {
                device_id: device_id.to_string(),
            },
            None => FidoVerification::Rejected {
                reason: "missing device_id".to_string(),
            },
        })
    }

    async fn registration_challenge(
        &self,
        _tenant_id: &str,
        _payload: &serde_json::Value,
    ) -> Result<serde_json::Value, OidcError> {
        Ok(serde_json::json!({"challenge": "nonce"}))
    }

    async fn verify_registration(
        &self,
        _tenant_id: &str,
        _challenge: &serde_json::Value,
        attestation: &serde_json::Value,
    ) -> Result<FidoVerification, OidcError> {
        Ok(match attestation.get("device_id").and_then(|v| v.as_str()) {
            Some(device_id) => FidoVerification::Verified {
                device_id: device_id.to_string(),
            },
            None => FidoVerification::Rejected {
                reason: "missing device_id".to_string(),
            },
        })
    }
}

fn account(sub: &str, devices: Vec<String>) -> User {
    User {
        sub: sub.to_string(),
        username: "ichiro".to_string(),
        name: None,
        email: None,
        email_verified: false,
        phone_number: None,
        authentication_devices: devices,
        active: true,
        created_at: OffsetDateTime::now_utc(),
    }
}

fn transaction() -> AuthorizationTransaction {
    AuthorizationTransaction::new(
        "tenant-1",
        "client-1",
        ResponseTypeSet::parse("code").unwrap(),
        vec!["openid".to_string()],
        "https://rp.example.com/cb",
        Duration::minutes(10),
    )
}

#[tokio::test]
async fn registration_attaches_device_to_bound_user() {
    let users = Arc::new(InMemoryUserStorage::new());
    users
        .create("tenant-1", account("user-1", vec![]), "secret")
        .await
        .unwrap();
    let contexts = Arc::new(InMemoryInteractionContextStorage::new());
    let gateway: Arc<dyn FidoGateway> = Arc::new(StaticGateway);

    let mut txn = transaction();
    txn.bind_user(account("user-1", vec![]));

    let challenge =
        FidoUafRegistrationChallengeInteractor::new(contexts.clone(), gateway.clone());
    let verdict = challenge
        .execute("tenant-1", &txn, &serde_json::json!({}))
        .await
        .unwrap();
    assert!(matches!(verdict, InteractionVerdict::Challenge { .. }));

    let registration =
        FidoUafRegistrationInteractor::new(users.clone(), contexts, gateway);
    let verdict = registration
        .execute("tenant-1", &txn, &serde_json::json!({"device_id": "device-7"}))
        .await
        .unwrap();
    assert!(matches!(verdict, InteractionVerdict::Success { user: None, .. }));

    let owner = users.find_by_device("tenant-1", "device-7").await.unwrap();
    assert_eq!(owner.map(|u| u.sub), Some("user-1".to_string()));
}

#[tokio::test]
async fn registration_requires_bound_user() {
    let users = Arc::new(InMemoryUserStorage::new());
    let contexts = Arc::new(InMemoryInteractionContextStorage::new());
    let registration =
        FidoUafRegistrationInteractor::new(users, contexts, Arc::new(StaticGateway));

    let verdict = registration
        .execute(
            "tenant-1",
            &transaction(),
            &serde_json::json!({"device_id": "device-7"}),
        )
        .await
        .unwrap();
    match verdict {
        InteractionVerdict::Failure { description, .. } => {
            assert!(description.contains("requires an authenticated user"));
        }
        other => panic!("unexpected verdict: {other:?}"),
    }
}

#[tokio::test]
async fn fido2_authentication_resolves_device_owner() {
    let users = Arc::new(InMemoryUserStorage::new());
    users
        .create(
            "tenant-1",
            account("user-1", vec!["device-1".to_string()]),
            "secret",
        )
        .await
        .unwrap();
    let contexts = Arc::new(InMemoryInteractionContextStorage::new());
    let gateway: Arc<dyn FidoGateway> = Arc::new(StaticGateway);

    let txn = transaction();
    let challenge = Fido2ChallengeInteractor::new(contexts.clone(), gateway.clone());
    challenge
        .execute("tenant-1", &txn, &serde_json::json!({}))
        .await
        .unwrap();

    let authentication =
        Fido2AuthenticationInteractor::new(users, contexts, gateway);
    let verdict = authentication
        .execute("tenant-1", &txn, &serde_json::json!({"device_id": "device-1"}))
        .await
        .unwrap();
    match verdict {
        InteractionVerdict::Success { user, .. } => {
            assert_eq!(user.map(|u| u.sub), Some("user-1".to_string()));
        }
        other => panic!("unexpected verdict: {other:?}"),
    }
}

#[tokio::test]
async fn fido2_authentication_requires_prior_challenge() {
    let users = Arc::new(InMemoryUserStorage::new());
    let contexts = Arc::new(InMemoryInteractionContextStorage::new());
    let authentication =
        Fido2AuthenticationInteractor::new(users, contexts, Arc::new(StaticGateway));

    let verdict = authentication
        .execute(
            "tenant-1",
            &transaction(),
            &serde_json::json!({"device_id": "device-1"}),
        )
        .await
        .unwrap();
    match verdict {
        InteractionVerdict::Failure { description, .. } => {
            assert!(description.contains("challenge has not been issued"));
        }
        other => panic!("unexpected verdict: {other:?}"),
    }
}
