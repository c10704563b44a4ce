//! Initial user registration interaction.
//!
//! Lets a transaction create an account inline (sign-up during sign-in) and
//! binds the new user in the same step.

use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::OidcError;
use crate::interaction::{FailureResolution, InteractionType, InteractionVerdict, Interactor};
use crate::oauth::transaction::AuthorizationTransaction;
use crate::storage::UserStorage;
use crate::types::User;

/// Registers a new user account within a transaction.
pub struct InitialRegistrationInteractor {
    user_storage: Arc<dyn UserStorage>,
}

impl InitialRegistrationInteractor {
    /// Creates the interactor.
    #[must_use]
    pub fn new(user_storage: Arc<dyn UserStorage>) -> Self {
        Self { user_storage }
    }
}

#[async_trait]
impl Interactor for InitialRegistrationInteractor {
    fn interaction_type(&self) -> InteractionType {
        InteractionType::InitialRegistration
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
                description: "initial registration request must contains username".to_string(),
                resolution: FailureResolution::Unresolved,
            });
        };
        let Some(password) = payload.get("password").and_then(|v| v.as_str()) else {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: "initial registration request must contains password".to_string(),
                resolution: FailureResolution::Unresolved,
            });
        };
        if self
            .user_storage
            .find_by_username(tenant_id, username)
            .await?
            .is_some()
        {
            return Ok(InteractionVerdict::Failure {
                error: "invalid_request".to_string(),
                description: format!("username is already registered ({username})"),
                resolution: FailureResolution::Resolved,
            });
        }

        let user = User {
            sub: Uuid::new_v4().to_string(),
            username: username.to_string(),
            name: payload
                .get("name")
                .and_then(|v| v.as_str())
                .map(ToString::to_string),
            email: payload
                .get("email")
                .and_then(|v| v.as_str())
                .map(ToString::to_string),
            email_verified: false,
            phone_number: payload
                .get("phone_number")
                .and_then(|v| v.as_str())
                .map(ToString::to_string),
            authentication_devices: Vec::new(),
            active: true,
            created_at: OffsetDateTime::now_utc(),
        };
        self.user_storage
            .create(tenant_id, user.clone(), password)
            .await?;

        Ok(InteractionVerdict::Success {
            response: serde_json::json!({"sub": user.sub}),
            user: Some(user),
        })
    }
}
