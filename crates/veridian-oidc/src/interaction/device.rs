//! Authentication-device approval interactions and device endpoint auth.
//!
//! CIBA transactions are approved or denied from a registered
//! authentication device. The device authenticates its HTTP calls with a
//! short-lived HS256 JWT signed by its device secret
//! (`iss` = `device:<device_id>`).

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::OidcError;
use crate::interaction::{FailureResolution, InteractionType, InteractionVerdict, Interactor};
use crate::oauth::transaction::AuthorizationTransaction;
use crate::storage::UserStorage;

/// Approves a pending transaction from an authentication device.
pub struct DeviceApproveInteractor {
    user_storage: Arc<dyn UserStorage>,
}

impl DeviceApproveInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(user_storage: Arc<dyn UserStorage>) -> Self {
        Self { user_storage }
    }
}

#[async_trait]
impl Interactor for DeviceApproveInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::AuthenticationDeviceApprove
    }

    async fn execute(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        let Some(device_id) = payload.get("device_id").and_then(|v| v.as_str()) else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "authentication device request must contains device_id".to_string(),
                resolution: FailureResolution::Unresolved,
            });
        };

        let Some(user) = self.user_storage.find_by_device(tenant_id, device_id).await? else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "authentication device is not registered to any user".to_string(),
                resolution: FailureResolution::Unresolved,
            });
        };

        // The device must belong to the user the transaction resolved.
        if let Some(bound) = &transaction.user
            && bound.sub != user.sub
        {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "authentication device does not belong to the requested user"
                    .to_string(),
                resolution: FailureResolution::Resolved,
            });
        }

        Ok(InteractionVerdict::Success {
            response: serde_json::json!({"status": "approved"}),
            user: Some(user),
        })
    }
}

/// Denies a pending transaction from an authentication device.
pub struct DeviceDenyInteractor;

#[async_trait]
impl Interactor for DeviceDenyInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::AuthenticationDeviceDeny
    }

    async fn execute(
        &self,
        _tenant_id: &str,
        _transaction: &AuthorizationTransaction,
        _payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        Ok(InteractionVerdict::Denied)
    }
}

#[derive(Debug, Deserialize)]
struct DeviceJwtClaims {
    iss: String,
    #[allow(dead_code)]
    exp: i64,
}

/// Verifies a device secret JWT and returns the asserted device identifier.
///
/// The token must be HS256-signed with `secret` and carry
/// `iss` = `device:<device_id>` plus a valid `exp`.
///
/// # Errors
///
/// Returns `invalid_client` when the token does not verify or the issuer
/// does not match the addressed device.
pub fn verify_device_secret_jwt(
    token: &str,
    device_id: &str,
    secret: &str,
) -> Result<String, OidcError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    let data = jsonwebtoken::decode::<DeviceJwtClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| OidcError::invalid_client(format!("device secret jwt is invalid: {e}")))?;

    let asserted = data
        .claims
        .iss
        .strip_prefix("device:")
        .ok_or_else(|| OidcError::invalid_client("device secret jwt iss must be device:<id>"))?;
    if asserted != device_id {
        return Err(OidcError::invalid_client(
            "device secret jwt iss does not match the addressed device",
        ));
    }
    Ok(asserted.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use time::OffsetDateTime;

    fn device_jwt(device_id: &str, secret: &str, exp_offset: i64) -> String {
        let claims = serde_json::json!({
            "iss": format!("device:{device_id}"),
            "exp": OffsetDateTime::now_utc().unix_timestamp() + exp_offset,
        });
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_valid_device_jwt() {
        let token = device_jwt("device-1", "device-secret", 300);
        let asserted = verify_device_secret_jwt(&token, "device-1", "device-secret").unwrap();
        assert_eq!(asserted, "device-1");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = device_jwt("device-1", "other-secret", 300);
        assert!(verify_device_secret_jwt(&token, "device-1", "device-secret").is_err());
    }

    #[test]
    fn test_expired_jwt_rejected() {
        let token = device_jwt("device-1", "device-secret", -300);
        assert!(verify_device_secret_jwt(&token, "device-1", "device-secret").is_err());
    }

    #[test]
    fn test_issuer_mismatch_rejected() {
        let token = device_jwt("device-2", "device-secret", 300);
        let err = verify_device_secret_jwt(&token, "device-1", "device-secret").unwrap_err();
        assert_eq!(err.http_status(), 401);
    }
}
