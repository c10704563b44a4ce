//! Password authentication interaction.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OidcError;
use crate::interaction::{FailureResolution, InteractionType, InteractionVerdict, Interactor};
use crate::oauth::transaction::AuthorizationTransaction;
use crate::storage::UserStorage;

/// Verifies a username and password against the user store.
pub struct PasswordInteractor {
    user_storage: Arc<dyn UserStorage>,
}

impl PasswordInteractor {
    /// Creates the interactor over the given user store.
    #[must_use]
    pub fn new(user_storage: Arc<dyn UserStorage>) -> Self {
        Self { user_storage }
    }
}

#[async_trait]
impl Interactor for PasswordInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::PasswordAuthentication
    }

    async fn execute(
        &self,
        tenant_id: &str,
        _transaction: &AuthorizationTransaction,
        payload: &serde_json::Value,
    ) -> Result<InteractionVerdict, OidcError> {
        let Some(username) = payload.get("username").and_then(|v| v.as_str()) else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "password authentication request must contains username".to_string(),
                resolution: FailureResolution::Unresolved,
            });
        };
        let Some(password) = payload.get("password").and_then(|v| v.as_str()) else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "password authentication request must contains password".to_string(),
                resolution: FailureResolution::Unresolved,
            });
        };

        match self
            .user_storage
            .verify_password(tenant_id, username, password)
            .await?
        {
            Some(user) => Ok(InteractionVerdict::Success {
                response: serde_json::json!({"sub": user.sub}),
                user: Some(user),
            }),
            None => {
                // Distinguish unknown account from wrong password only in
                // the event detail, never in the response.
                let resolution = if self
                    .user_storage
                    .find_by_username(tenant_id, username)
                    .await?
                    .is_some()
                {
                    FailureResolution::Resolved
                } else {
                    FailureResolution::Unresolved
                };
                Ok(InteractionVerdict::Failure {
                    error: "invalid_request".to_string(),
                    description: "username or password is incorrect".to_string(),
                    resolution,
                })
            }
        }
    }
}
