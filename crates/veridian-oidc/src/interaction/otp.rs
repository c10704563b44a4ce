//! E-mail and SMS one-time-code interactions.
//!
//! Both channels are two-step: a challenge interaction generates a code,
//! stores it in the interaction context, and hands it to the delivery
//! gateway; the verification interaction compares the submitted code and
//! resolves the user by the challenged address.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;

use crate::error::OidcError;
use crate::interaction::{FailureResolution, InteractionType, InteractionVerdict, Interactor};
use crate::oauth::transaction::AuthorizationTransaction;
use crate::storage::{InteractionContextStorage, UserLookup, UserStorage};

/// OTP delivery channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpChannel {
    Email,
    Sms,
}

impl OtpChannel {
    fn destination_field(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "phone_number",
        }
    }
}

/// Delivers one-time codes out of band.
#[async_trait]
pub trait OtpGateway: Send + Sync {
    /// Sends a code to the destination over the given channel.
    async fn deliver(
        &self,
        channel: OtpChannel,
        destination: &str,
        code: &str,
    ) -> Result<(), OidcError>;
}

/// Gateway that logs codes instead of delivering them. Development only.
#[derive(Debug, Clone, Default)]
pub struct TracingOtpGateway;

#[async_trait]
impl OtpGateway for TracingOtpGateway {
    async fn deliver(
        &self,
        channel: OtpChannel,
        destination: &str,
        code: &str,
    ) -> Result<(), OidcError> {
        tracing::info!(?channel, destination, code, "otp delivery (not sent)");
        Ok(())
    }
}

fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{n:06}")
}

// =============================================================================
// Challenge
// =============================================================================

struct ChallengeCore {
    channel: OtpChannel,
    context_storage: Arc<dyn InteractionContextStorage>,
    gateway: Arc<dyn OtpGateway>,
}

impl ChallengeCore {
    async fn run(
        &self,
        _tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
        method: &str,
    ) -> Result<InteractionVerdict, OidcError> {
        let field = self.channel.destination_field();
        let destination = payload
            .get(field)
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .or_else(|| bound_destination(transaction, self.channel));
        let Some(destination) = destination else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: format!("authentication challenge request must contains {field}"),
                resolution: FailureResolution::Unresolved,
            });
        };

        let code = generate_code();
        self.context_storage
            .save(
                transaction.id,
                method,
                serde_json::json!({
                    "verification_code": code,
                    "destination": destination,
                }),
            )
            .await?;
        self.gateway
            .deliver(self.channel, &destination, &code)
            .await?;

        Ok(InteractionVerdict::Challenge {
            response: serde_json::json!({"status": "challenge_sent"}),
        })
    }
}

fn bound_destination(
    transaction: &AuthorizationTransaction,
    channel: OtpChannel,
) -> Option<String> {
    let user = transaction.user.as_ref()?;
    match channel {
        OtpChannel::Email => user.email.clone(),
        OtpChannel::Sms => user.phone_number.clone(),
    }
}

/// Issues an e-mail verification code.
pub struct EmailChallengeInteractor {
    core: ChallengeCore,
}

impl EmailChallengeInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(
        context_storage: Arc<dyn InteractionContextStorage>,
        gateway: Arc<dyn OtpGateway>,
    ) -> Self {
        Self {
            core: ChallengeCore {
                channel: OtpChannel::Email,
                context_storage,
                gateway,
            },
        }
    }
}

#[async_trait]
impl Interactor for EmailChallengeInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::EmailAuthenticationChallenge
    }

    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        self.core
            .run(tenant_id, transaction, payload, self.interaction_type().method_name())
            .await
    }
}

/// Issues an SMS verification code.
pub struct SmsChallengeInteractor {
    core: ChallengeCore,
}

impl SmsChallengeInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(
        context_storage: Arc<dyn InteractionContextStorage>,
        gateway: Arc<dyn OtpGateway>,
    ) -> Self {
        Self {
            core: ChallengeCore {
                channel: OtpChannel::Sms,
                context_storage,
                gateway,
            },
        }
    }
}

#[async_trait]
impl Interactor for SmsChallengeInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::SmsAuthenticationChallenge
    }

    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        self.core
            .run(tenant_id, transaction, payload, self.interaction_type().method_name())
            .await
    }
}

// =============================================================================
// Verification
// =============================================================================

struct VerificationCore {
    channel: OtpChannel,
    user_storage: Arc<dyn UserStorage>,
    context_storage: Arc<dyn InteractionContextStorage>,
}

impl VerificationCore {
    async fn run(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
        method: &str,
    ) -> Result<InteractionVerdict, OidcError> {
        let Some(submitted) = payload.get("verification_code").and_then(|v| v.as_str()) else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "authentication request must contains verification_code".to_string(),
                resolution: FailureResolution::Unresolved,
            });
        };
        let Some(context) = self.context_storage.find(transaction.id, method).await? else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "authentication challenge has not been issued".to_string(),
                resolution: FailureResolution::Unresolved,
            });
        };
        let expected = context
            .get("verification_code")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let destination = context
            .get("destination")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        if submitted != expected {
            // Resolution detail only; the response never says whether the
            // destination maps to zero, one, or many accounts.
            let resolution = match self.lookup(tenant_id, &destination).await? {
                UserLookup::Resolved(_) => FailureResolution::Resolved,
                UserLookup::Unresolved => FailureResolution::Unresolved,
                UserLookup::Ambiguous => FailureResolution::Ambiguous,
            };
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "verification_code does not match".to_string(),
                resolution,
            });
        }

        self.context_storage.delete(transaction.id, method).await?;

        let user = match transaction.user.clone() {
            Some(user) => Some(user),
            None => self.lookup(tenant_id, &destination).await?.into_user(),
        };
        Ok(InteractionVerdict::Success {
            response: serde_json::json!({"status": "verified"}),
            user,
        })
    }

    async fn lookup(&self, tenant_id: &str, destination: &str) -> Result<UserLookup, OidcError> {
        let matches = match self.channel {
            OtpChannel::Email => self.user_storage.find_by_email(tenant_id, destination).await?,
            OtpChannel::Sms => {
                self.user_storage
                    .find_by_phone_number(tenant_id, destination)
                    .await?
            }
        };
        Ok(UserLookup::from_matches(matches))
    }
}

/// Verifies an e-mail code.
pub struct EmailVerificationInteractor {
    core: VerificationCore,
}

impl EmailVerificationInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(
        user_storage: Arc<dyn UserStorage>,
        context_storage: Arc<dyn InteractionContextStorage>,
    ) -> Self {
        Self {
            core: VerificationCore {
                channel: OtpChannel::Email,
                user_storage,
                context_storage,
            },
        }
    }
}

#[async_trait]
impl Interactor for EmailVerificationInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::EmailAuthentication
    }

    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        self.core
            .run(tenant_id, transaction, payload, self.interaction_type().method_name())
            .await
    }
}

/// Verifies an SMS code.
pub struct SmsVerificationInteractor {
    core: VerificationCore,
}

impl SmsVerificationInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(
        user_storage: Arc<dyn UserStorage>,
        context_storage: Arc<dyn InteractionContextStorage>,
    ) -> Self {
        Self {
            core: VerificationCore {
                channel: OtpChannel::Sms,
                user_storage,
                context_storage,
            },
        }
    }
}

#[async_trait]
impl Interactor for SmsVerificationInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::SmsAuthentication
    }

    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        self.core
            .run(tenant_id, transaction, payload, self.interaction_type().method_name())
            .await
    }
}
