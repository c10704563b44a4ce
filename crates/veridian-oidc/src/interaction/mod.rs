//! Authentication interaction engine.
//!
//! Interactions are the steps a user performs against a pending
//! authorization transaction: password entry, OTP challenge and
//! verification, FIDO ceremonies, device approval. The engine dispatches a
//! closed set of interaction types to registered interactors, enforces the
//! selected authentication policy's available methods, accumulates result
//! counters on the transaction, and binds the authenticated user.

pub mod device;
pub mod fido;
pub mod otp;
pub mod password;
pub mod registration;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OidcError;
use crate::events::{SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::oauth::transaction::AuthorizationTransaction;
use crate::policy::AuthenticationPolicy;
use crate::types::User;

pub use device::{DeviceApproveInteractor, DeviceDenyInteractor, verify_device_secret_jwt};
pub use fido::{
    Fido2AuthenticationInteractor, Fido2ChallengeInteractor, FidoGateway,
    FidoUafChallengeInteractor, FidoUafRegistrationChallengeInteractor,
    FidoUafRegistrationInteractor, FidoUafVerificationInteractor,
};
pub use otp::{
    EmailChallengeInteractor, EmailVerificationInteractor, OtpChannel, OtpGateway,
    SmsChallengeInteractor, SmsVerificationInteractor, TracingOtpGateway,
};
pub use password::PasswordInteractor;
pub use registration::InitialRegistrationInteractor;

// =============================================================================
// Interaction types
// =============================================================================

/// The closed set of interaction types addressable over HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionType {
    PasswordAuthentication,
    EmailAuthenticationChallenge,
    EmailAuthentication,
    SmsAuthenticationChallenge,
    SmsAuthentication,
    FidoUafAuthenticationChallenge,
    FidoUafAuthentication,
    FidoUafRegistrationChallenge,
    FidoUafRegistration,
    Fido2AuthenticationChallenge,
    Fido2Authentication,
    AuthenticationDeviceApprove,
    AuthenticationDeviceDeny,
    InitialRegistration,
}

impl InteractionType {
    /// Parses the path segment naming an interaction.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "password-authentication" => Some(Self::PasswordAuthentication),
            "email-authentication-challenge" => Some(Self::EmailAuthenticationChallenge),
            "email-authentication" => Some(Self::EmailAuthentication),
            "sms-authentication-challenge" => Some(Self::SmsAuthenticationChallenge),
            "sms-authentication" => Some(Self::SmsAuthentication),
            "fido-uaf-authentication-challenge" => Some(Self::FidoUafAuthenticationChallenge),
            "fido-uaf-authentication" => Some(Self::FidoUafAuthentication),
            "fido-uaf-registration-challenge" => Some(Self::FidoUafRegistrationChallenge),
            "fido-uaf-registration" => Some(Self::FidoUafRegistration),
            "fido2-authentication-challenge" => Some(Self::Fido2AuthenticationChallenge),
            "fido2-authentication" => Some(Self::Fido2Authentication),
            "authentication-device-approve" => Some(Self::AuthenticationDeviceApprove),
            "authentication-device-deny" => Some(Self::AuthenticationDeviceDeny),
            "initial-registration" => Some(Self::InitialRegistration),
            _ => None,
        }
    }

    /// Returns the path segment for this interaction.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PasswordAuthentication => "password-authentication",
            Self::EmailAuthenticationChallenge => "email-authentication-challenge",
            Self::EmailAuthentication => "email-authentication",
            Self::SmsAuthenticationChallenge => "sms-authentication-challenge",
            Self::SmsAuthentication => "sms-authentication",
            Self::FidoUafAuthenticationChallenge => "fido-uaf-authentication-challenge",
            Self::FidoUafAuthentication => "fido-uaf-authentication",
            Self::FidoUafRegistrationChallenge => "fido-uaf-registration-challenge",
            Self::FidoUafRegistration => "fido-uaf-registration",
            Self::Fido2AuthenticationChallenge => "fido2-authentication-challenge",
            Self::Fido2Authentication => "fido2-authentication",
            Self::AuthenticationDeviceApprove => "authentication-device-approve",
            Self::AuthenticationDeviceDeny => "authentication-device-deny",
            Self::InitialRegistration => "initial-registration",
        }
    }

    /// Returns the method name used for policy counters. Challenge steps
    /// share their verification step's method.
    #[must_use]
    pub fn method_name(&self) -> &'static str {
        match self {
            Self::PasswordAuthentication => "password-authentication",
            Self::EmailAuthenticationChallenge | Self::EmailAuthentication => {
                "email-authentication"
            }
            Self::SmsAuthenticationChallenge | Self::SmsAuthentication => "sms-authentication",
            Self::FidoUafAuthenticationChallenge | Self::FidoUafAuthentication => {
                "fido-uaf-authentication"
            }
            Self::FidoUafRegistrationChallenge | Self::FidoUafRegistration => {
                "fido-uaf-registration"
            }
            Self::Fido2AuthenticationChallenge | Self::Fido2Authentication => {
                "fido2-authentication"
            }
            Self::AuthenticationDeviceApprove | Self::AuthenticationDeviceDeny => {
                "authentication-device"
            }
            Self::InitialRegistration => "initial-registration",
        }
    }
}

impl std::fmt::Display for InteractionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Verdicts and outcomes
// =============================================================================

/// How a failed attempt's user resolution went, for event detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureResolution {
    /// The identifier matched exactly one account.
    Resolved,
    /// No account matched the presented identifier.
    Unresolved,
    /// The identifier matched several accounts. Expected for non-unique
    /// attributes; handled like `Unresolved` apart from the event detail.
    Ambiguous,
}

/// What an interactor decided about one attempt.
#[derive(Debug)]
pub enum InteractionVerdict {
    /// Authentication succeeded; optionally binds a user.
    Success {
        user: Option<User>,
        response: serde_json::Value,
    },
    /// A challenge was issued; no counters change.
    Challenge { response: serde_json::Value },
    /// The attempt failed.
    Failure {
        error: String,
        description: String,
        resolution: FailureResolution,
    },
    /// The user denied the request through this interaction.
    Denied,
}

/// Result of one engine execution, ready for the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct InteractionOutcome {
    /// `success`, `client_error`, or `deny`.
    pub status: InteractionStatus,
    /// Response body for the caller.
    pub response: serde_json::Value,
}

/// Outcome status categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionStatus {
    Success,
    ClientError,
    Deny,
}

// =============================================================================
// Interactor trait
// =============================================================================

/// One authentication interaction implementation.
#[async_trait]
pub trait Interactor: Send + Sync {
    /// The interaction type this interactor handles.
    fn interaction_type(&self) -> InteractionType;

    /// Executes one attempt against a pending transaction.
    ///
    /// Expected failures (wrong password, wrong code, unknown user) are
    /// verdicts, not errors; `Err` is reserved for storage and gateway
    /// failures.
    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError>;
}

// =============================================================================
// Engine
// =============================================================================

/// Dispatches interactions and applies their verdicts to the transaction.
pub struct InteractionEngine {
    interactors: HashMap<InteractionType, Arc<dyn Interactor>>,
    event_sink: Arc<dyn SecurityEventSink>,
}

impl InteractionEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new(event_sink: Arc<dyn SecurityEventSink>) -> Self {
        Self {
            interactors: HashMap::new(),
            event_sink,
        }
    }

    /// Registers an interactor, replacing any previous one for its type.
    #[must_use]
    pub fn register(mut self, interactor: Arc<dyn Interactor>) -> Self {
        self.interactors
            .insert(interactor.interaction_type(), interactor);
        self
    }

    /// Executes one interaction against a transaction.
    ///
    /// Applies the verdict to the transaction's counters and user binding
    /// and records a security event. The caller persists the transaction.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for unknown or policy-unavailable
    /// interaction types and for cross-user binding attempts; propagates
    /// storage and gateway failures.
    pub async fn execute(
        &self,
        tenant_id: &str,
        transaction: &mut AuthorizationTransaction,
        interaction_type: InteractionType,
        payload: &serde_json::Value,
        policy: &AuthenticationPolicy,
    ) -> Result<InteractionOutcome, OidcError> {
        let method = interaction_type.method_name();
        if !policy.is_method_available(method) {
            return Err(OidcError::invalid_request(format!(
                "authentication interaction ({interaction_type}) is not available for this authorization request"
            )));
        }
        let interactor = self.interactors.get(&interaction_type).ok_or_else(|| {
            OidcError::invalid_request(format!(
                "authentication interaction ({interaction_type}) is unknown"
            ))
        })?;

        let verdict = interactor
            .execute(tenant_id, transaction, payload)
            .await?;

        match verdict {
            InteractionVerdict::Success { user, response } => {
                if let Some(user) = user {
                    if let Some(bound) = &transaction.user
                        && bound.sub != user.sub
                    {
                        return Err(OidcError::invalid_request(
                            "authorization request is already bound to another user",
                        ));
                    }
                    transaction.bind_user(user);
                }
                transaction.record_success(method);
                self.event_sink
                    .record(
                        SecurityEvent::new(SecurityEventType::InteractionSucceeded, tenant_id)
                            .with_client(&transaction.client_id)
                            .with_transaction(transaction.id)
                            .with_detail(serde_json::json!({"interaction": method})),
                    )
                    .await?;
                Ok(InteractionOutcome {
                    status: InteractionStatus::Success,
                    response,
                })
            }
            InteractionVerdict::Challenge { response } => Ok(InteractionOutcome {
                status: InteractionStatus::Success,
                response,
            }),
            InteractionVerdict::Failure {
                error,
                description,
                resolution,
            } => {
                transaction.record_failure(method, &error, &description);
                self.event_sink
                    .record(
                        SecurityEvent::new(SecurityEventType::InteractionFailed, tenant_id)
                            .with_client(&transaction.client_id)
                            .with_transaction(transaction.id)
                            .with_detail(serde_json::json!({
                                "interaction": method,
                                "error": error,
                                "resolution": resolution,
                            })),
                    )
                    .await?;
                Ok(InteractionOutcome {
                    status: InteractionStatus::ClientError,
                    response: serde_json::json!({
                        "error": error,
                        "error_description": description,
                    }),
                })
            }
            InteractionVerdict::Denied => Ok(InteractionOutcome {
                status: InteractionStatus::Deny,
                response: serde_json::json!({"status": "denied"}),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_parse_round_trip() {
        for name in [
            "password-authentication",
            "email-authentication-challenge",
            "email-authentication",
            "sms-authentication-challenge",
            "sms-authentication",
            "fido-uaf-authentication-challenge",
            "fido-uaf-authentication",
            "fido-uaf-registration-challenge",
            "fido-uaf-registration",
            "fido2-authentication-challenge",
            "fido2-authentication",
            "authentication-device-approve",
            "authentication-device-deny",
            "initial-registration",
        ] {
            let parsed = InteractionType::parse(name).unwrap();
            assert_eq!(parsed.as_str(), name);
        }
        assert!(InteractionType::parse("carrier-pigeon").is_none());
    }

    #[test]
    fn test_challenge_shares_method_name() {
        assert_eq!(
            InteractionType::SmsAuthenticationChallenge.method_name(),
            InteractionType::SmsAuthentication.method_name()
        );
        assert_eq!(
            InteractionType::AuthenticationDeviceApprove.method_name(),
            "authentication-device"
        );
    }
}
