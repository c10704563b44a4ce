//! FIDO authentication and registration interactions.
//!
//! Covers the FIDO UAF authentication and registration ceremonies and the
//! FIDO2/WebAuthn authentication ceremony. The cryptographic work lives
//! behind `FidoGateway`; these interactors hold the protocol plumbing:
//! challenge context persistence, user resolution from the verified key
//! handle, device attachment, and verdict mapping.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OidcError;
use crate::interaction::{FailureResolution, InteractionType, InteractionVerdict, Interactor};
use crate::oauth::transaction::AuthorizationTransaction;
use crate::storage::{InteractionContextStorage, UserStorage};

/// Outcome of assertion verification at the gateway.
#[derive(Debug, Clone)]
pub enum FidoVerification {
    /// The assertion verified; the key belongs to this device.
    Verified {
        /// Device identifier the authenticator key is registered under.
        device_id: String,
    },
    /// The assertion did not verify.
    Rejected {
        /// Reason, surfaced in the failure description.
        reason: String,
    },
}

/// Performs the FIDO UAF cryptographic ceremony.
#[async_trait]
pub trait FidoGateway: Send + Sync {
    /// Produces an authentication challenge for the given request context.
    async fn authentication_challenge(
        &self,
        tenant_id: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, OidcError>;

    /// Verifies an authentication assertion against the stored challenge.
    async fn verify_authentication(
        &self,
        tenant_id: &str,
        challenge: &serde_json::Value,
        assertion: &serde_json::Value,
    ) -> Result<FidoVerification, OidcError>;

    /// Produces a registration challenge for the given request context.
    async fn registration_challenge(
        &self,
        tenant_id: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, OidcError>;

    /// Verifies a registration attestation against the stored challenge.
    /// `Verified` carries the device identifier the new key was enrolled
    /// under.
    async fn verify_registration(
        &self,
        tenant_id: &str,
        challenge: &serde_json::Value,
        attestation: &serde_json::Value,
    ) -> Result<FidoVerification, OidcError>;
}

/// Issues a FIDO UAF authentication challenge.
pub struct FidoUafChallengeInteractor {
    context_storage: Arc<dyn InteractionContextStorage>,
    gateway: Arc<dyn FidoGateway>,
}

impl FidoUafChallengeInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(
        context_storage: Arc<dyn InteractionContextStorage>,
        gateway: Arc<dyn FidoGateway>,
    ) -> Self {
        Self {
            context_storage,
            gateway,
        }
    }
}

#[async_trait]
impl Interactor for FidoUafChallengeInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::FidoUafAuthenticationChallenge
    }

    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        let challenge = self
            .gateway
            .authentication_challenge(tenant_id, payload)
            .await?;
        self.context_storage
            .save(
                transaction.id,
                self.interaction_type().method_name(),
                challenge.clone(),
            )
            .await?;
        Ok(InteractionVerdict::Challenge {
            response: challenge,
        })
    }
}

/// Verifies a FIDO UAF assertion and resolves the owning user.
pub struct FidoUafVerificationInteractor {
    user_storage: Arc<dyn UserStorage>,
    context_storage: Arc<dyn InteractionContextStorage>,
    gateway: Arc<dyn FidoGateway>,
}

impl FidoUafVerificationInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(
        user_storage: Arc<dyn UserStorage>,
        context_storage: Arc<dyn InteractionContextStorage>,
        gateway: Arc<dyn FidoGateway>,
    ) -> Self {
        Self {
            user_storage,
            context_storage,
            gateway,
        }
    }
}

#[async_trait]
impl Interactor for FidoUafVerificationInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::FidoUafAuthentication
    }

    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        let method = self.interaction_type().method_name();
        let Some(challenge) = self.context_storage.find(transaction.id, method).await? else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "fido-uaf authentication challenge has not been issued".to_string(),
                resolution: FailureResolution::Unresolved,
            });
        };

        match self
            .gateway
            .verify_authentication(tenant_id, &challenge, payload)
            .await?
        {
            FidoVerification::Verified { device_id } => {
                self.context_storage.delete(transaction.id, method).await?;
                let user = self.user_storage.find_by_device(tenant_id, &device_id).await?;
                match user {
                    Some(user) => Ok(InteractionVerdict::Success {
                        response: serde_json::json!({"status": "verified"}),
                        user: Some(user),
                    }),
                    None => Ok(InteractionVerdict::Failure {
                        error: "invalid_request".to_string(),
                        description: "authenticator is not registered to any user".to_string(),
                        resolution: FailureResolution::Unresolved,
                    }),
                }
            }
            FidoVerification::Rejected { reason } => Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: format!("fido-uaf assertion is invalid ({reason})"),
                resolution: FailureResolution::Unresolved,
            }),
        }
    }
}

/// Issues a FIDO UAF registration challenge.
pub struct FidoUafRegistrationChallengeInteractor {
    context_storage: Arc<dyn InteractionContextStorage>,
    gateway: Arc<dyn FidoGateway>,
}

impl FidoUafRegistrationChallengeInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(
        context_storage: Arc<dyn InteractionContextStorage>,
        gateway: Arc<dyn FidoGateway>,
    ) -> Self {
        Self {
            context_storage,
            gateway,
        }
    }
}

#[async_trait]
impl Interactor for FidoUafRegistrationChallengeInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::FidoUafRegistrationChallenge
    }

    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        let challenge = self
            .gateway
            .registration_challenge(tenant_id, payload)
            .await?;
        self.context_storage
            .save(
                transaction.id,
                self.interaction_type().method_name(),
                challenge.clone(),
            )
            .await?;
        Ok(InteractionVerdict::Challenge {
            response: challenge,
        })
    }
}

/// Verifies a FIDO UAF registration attestation and attaches the enrolled
/// device to the transaction's user.
///
/// Registration requires an already-bound user; the device cannot be the
/// first proof of identity.
pub struct FidoUafRegistrationInteractor {
    user_storage: Arc<dyn UserStorage>,
    context_storage: Arc<dyn InteractionContextStorage>,
    gateway: Arc<dyn FidoGateway>,
}

impl FidoUafRegistrationInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(
        user_storage: Arc<dyn UserStorage>,
        context_storage: Arc<dyn InteractionContextStorage>,
        gateway: Arc<dyn FidoGateway>,
    ) -> Self {
        Self {
            user_storage,
            context_storage,
            gateway,
        }
    }
}

#[async_trait]
impl Interactor for FidoUafRegistrationInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::FidoUafRegistration
    }

    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        let Some(user) = &transaction.user else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "fido-uaf registration requires an authenticated user".to_string(),
                resolution: FailureResolution::Unresolved,
            });
        };
        let method = self.interaction_type().method_name();
        let Some(challenge) = self.context_storage.find(transaction.id, method).await? else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "fido-uaf registration challenge has not been issued".to_string(),
                resolution: FailureResolution::Resolved,
            });
        };

        match self
            .gateway
            .verify_registration(tenant_id, &challenge, payload)
            .await?
        {
            FidoVerification::Verified { device_id } => {
                self.context_storage.delete(transaction.id, method).await?;
                self.user_storage
                    .add_authentication_device(tenant_id, &user.sub, &device_id)
                    .await?;
                Ok(InteractionVerdict::Success {
                    response: serde_json::json!({
                        "status": "registered",
                        "device_id": device_id,
                    }),
                    user: None,
                })
            }
            FidoVerification::Rejected { reason } => Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: format!("fido-uaf attestation is invalid ({reason})"),
                resolution: FailureResolution::Resolved,
            }),
        }
    }
}

/// Issues a FIDO2/WebAuthn authentication challenge.
pub struct Fido2ChallengeInteractor {
    context_storage: Arc<dyn InteractionContextStorage>,
    gateway: Arc<dyn FidoGateway>,
}

impl Fido2ChallengeInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(
        context_storage: Arc<dyn InteractionContextStorage>,
        gateway: Arc<dyn FidoGateway>,
    ) -> Self {
        Self {
            context_storage,
            gateway,
        }
    }
}

#[async_trait]
impl Interactor for Fido2ChallengeInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::Fido2AuthenticationChallenge
    }

    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        let challenge = self
            .gateway
            .authentication_challenge(tenant_id, payload)
            .await?;
        self.context_storage
            .save(
                transaction.id,
                self.interaction_type().method_name(),
                challenge.clone(),
            )
            .await?;
        Ok(InteractionVerdict::Challenge {
            response: challenge,
        })
    }
}

/// Verifies a FIDO2/WebAuthn assertion and resolves the owning user.
pub struct Fido2AuthenticationInteractor {
    user_storage: Arc<dyn UserStorage>,
    context_storage: Arc<dyn InteractionContextStorage>,
    gateway: Arc<dyn FidoGateway>,
}

impl Fido2AuthenticationInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(
        user_storage: Arc<dyn UserStorage>,
        context_storage: Arc<dyn InteractionContextStorage>,
        gateway: Arc<dyn FidoGateway>,
    ) -> Self {
        Self {
            user_storage,
            context_storage,
            gateway,
        }
    }
}

#[async_trait]
impl Interactor for Fido2AuthenticationInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::Fido2Authentication
    }

    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        let method = self.interaction_type().method_name();
        let Some(challenge) = self.context_storage.find(transaction.id, method).await? else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "fido2 authentication challenge has not been issued".to_string(),
                resolution: FailureResolution::Unresolved,
            });
        };

        match self
            .gateway
            .verify_authentication(tenant_id, &challenge, payload)
            .await?
        {
            FidoVerification::Verified { device_id } => {
                self.context_storage.delete(transaction.id, method).await?;
                let user = self.user_storage.find_by_device(tenant_id, &device_id).await?;
                match user {
                    Some(user) => Ok(InteractionVerdict::Success {
                        response: serde_json::json!({"status": "verified"}),
                        user: Some(user),
                    }),
                    None => Ok(InteractionVerdict::Failure {
                        error: "invalid_request".to_string(),
                        description: "authenticator is not registered to any user".to_string(),
                        resolution: FailureResolution::Unresolved,
                    }),
                }
            }
            FidoVerification::Rejected { reason } => Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: format!("fido2 assertion is invalid ({reason})"),
                resolution: FailureResolution::Unresolved,
            }),
        }
    }
}

// Tests for these interactors live in `tests/fido_interactions.rs`: they use
// the `veridian-memory` storage backends, and the dev-dependency cycle back to
// this crate means a unit-test build would link two incompatible copies of it.
