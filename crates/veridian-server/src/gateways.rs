//! Development gateway implementations.

use async_trait::async_trait;
use serde_json::json;
use veridian_oidc::error::OidcError;
use veridian_oidc::interaction::FidoGateway;
use veridian_oidc::interaction::fido::FidoVerification;
use veridian_oidc::random::urlsafe_token;

/// FIDO gateway that skips the cryptographic ceremony. Development only.
///
/// The challenge is a random nonce; an assertion verifies when it echoes
/// the nonce and names a device. A production deployment wires a real UAF
/// server here.
pub struct EchoFidoGateway;

#[async_trait]
impl FidoGateway for EchoFidoGateway {
    async fn authentication_challenge(
        &self,
        _tenant_id: &str,
        _payload: &serde_json::Value,
    ) -> Result<serde_json::Value, OidcError> {
        Ok(json!({ "challenge": urlsafe_token(32) }))
    }

    async fn verify_authentication(
        &self,
        _tenant_id: &str,
        challenge: &serde_json::Value,
        assertion: &serde_json::Value,
    ) -> Result<FidoVerification, OidcError> {
        let expected = challenge.get("challenge").and_then(|v| v.as_str());
        let presented = assertion.get("challenge").and_then(|v| v.as_str());
        if expected.is_none() || expected != presented {
            return Ok(FidoVerification::Rejected {
                reason: "assertion does not match the issued challenge".to_string(),
            });
        }
        match assertion.get("device_id").and_then(|v| v.as_str()) {
            Some(device_id) => Ok(FidoVerification::Verified {
                device_id: device_id.to_string(),
            }),
            None => Ok(FidoVerification::Rejected {
                reason: "assertion does not name a device".to_string(),
            }),
        }
    }

    async fn registration_challenge(
        &self,
        _tenant_id: &str,
        _payload: &serde_json::Value,
    ) -> Result<serde_json::Value, OidcError> {
        Ok(json!({ "challenge": urlsafe_token(32) }))
    }

    async fn verify_registration(
        &self,
        _tenant_id: &str,
        challenge: &serde_json::Value,
        attestation: &serde_json::Value,
    ) -> Result<FidoVerification, OidcError> {
        let expected = challenge.get("challenge").and_then(|v| v.as_str());
        let presented = attestation.get("challenge").and_then(|v| v.as_str());
        if expected.is_none() || expected != presented {
            return Ok(FidoVerification::Rejected {
                reason: "attestation does not match the issued challenge".to_string(),
            });
        }
        match attestation.get("device_id").and_then(|v| v.as_str()) {
            Some(device_id) => Ok(FidoVerification::Verified {
                device_id: device_id.to_string(),
            }),
            None => Ok(FidoVerification::Rejected {
                reason: "attestation does not name a device".to_string(),
            }),
        }
    }
}
