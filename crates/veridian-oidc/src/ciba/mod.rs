//! Client-Initiated Backchannel Authentication (CIBA).
//!
//! A backchannel authentication request resolves the end user from a login
//! hint, opens a companion transaction that the user's authentication
//! device drives, and is then polled at the token endpoint with its
//! `auth_req_id`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::OidcError;
use crate::events::{SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::oauth::client_auth::{ClientCredentials, authenticate_client};
use crate::oauth::transaction::{AuthorizationTransaction, TransactionStatus};
use crate::storage::{
    CibaRequestStorage, ClientStorage, TransactionStorage, UserStorage, user::resolve_login_hint,
};
use crate::types::{GrantType, ResponseTypeSet};

/// Lifecycle states of a backchannel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CibaStatus {
    /// Awaiting the user's decision.
    Pending,
    /// The user approved; tokens may be issued once.
    Granted,
    /// The user denied the request.
    Denied,
    /// Tokens have been issued; the request is terminal.
    Consumed,
}

/// A stored backchannel authentication request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackchannelAuthenticationRequest {
    /// The `auth_req_id` handed to the client.
    pub auth_req_id: String,
    /// Owning tenant.
    pub tenant_id: String,
    /// The requesting client.
    pub client_id: String,
    /// Granted scope tokens.
    pub scopes: Vec<String>,
    /// The resolved subject.
    pub sub: String,
    /// Device the approval request was addressed to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    /// Message displayed on the authentication device.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding_message: Option<String>,
    /// Secret code identifying the user to the authorization server, when
    /// the client registration requires one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
    /// Companion transaction accumulating the device interactions.
    pub transaction_id: Uuid,
    /// Current state.
    pub status: CibaStatus,
    /// Minimum seconds between token-endpoint polls.
    pub interval: i64,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Expiry time.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl BackchannelAuthenticationRequest {
    /// Returns `true` if the request has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }
}

/// Raw backchannel authentication request parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackchannelAuthenticationParams {
    pub scope: Option<String>,
    pub login_hint: Option<String>,
    pub binding_message: Option<String>,
    pub user_code: Option<String>,
    pub requested_expiry: Option<i64>,
}

/// Response to a backchannel authentication request.
#[derive(Debug, Clone, Serialize)]
pub struct BackchannelAuthenticationResponse {
    pub auth_req_id: String,
    pub expires_in: i64,
    pub interval: i64,
}

/// Configuration for the CIBA service.
#[derive(Debug, Clone)]
pub struct CibaConfig {
    /// Default request lifetime.
    pub request_ttl: Duration,
    /// Minimum poll interval in seconds.
    pub poll_interval: i64,
}

impl Default for CibaConfig {
    fn default() -> Self {
        Self {
            request_ttl: Duration::minutes(5),
            poll_interval: 5,
        }
    }
}

/// Handles backchannel authentication requests and device decisions.
pub struct CibaService {
    client_storage: Arc<dyn ClientStorage>,
    user_storage: Arc<dyn UserStorage>,
    ciba_storage: Arc<dyn CibaRequestStorage>,
    transaction_storage: Arc<dyn TransactionStorage>,
    event_sink: Arc<dyn SecurityEventSink>,
    config: CibaConfig,
}

impl CibaService {
    /// Creates the service over its storage backends.
    #[must_use]
    pub fn new(
        client_storage: Arc<dyn ClientStorage>,
        user_storage: Arc<dyn UserStorage>,
        ciba_storage: Arc<dyn CibaRequestStorage>,
        transaction_storage: Arc<dyn TransactionStorage>,
        event_sink: Arc<dyn SecurityEventSink>,
        config: CibaConfig,
    ) -> Self {
        Self {
            client_storage,
            user_storage,
            ciba_storage,
            transaction_storage,
            event_sink,
            config,
        }
    }

    /// Handles a backchannel authentication request.
    ///
    /// Validation order: client authentication, grant-type registration,
    /// scope, login-hint resolution, user code. On success a pending
    /// request and its companion transaction are persisted.
    ///
    /// # Errors
    ///
    /// `invalid_client` for authentication failures, `unauthorized_client`
    /// when the CIBA grant is not registered, `invalid_scope` /
    /// `invalid_request` / `unknown_user_id` conditions as `invalid_request`
    /// per the CIBA core spec.
    pub async fn request(
        &self,
        tenant_id: &str,
        params: BackchannelAuthenticationParams,
        credentials: ClientCredentials,
    ) -> Result<BackchannelAuthenticationResponse, OidcError> {
        // 1. Resolve and authenticate the client
        let client_id = credentials
            .asserted_client_id()
            .ok_or_else(|| {
                OidcError::invalid_request(
                    "backchannel authentication request must contains client_id",
                )
            })?
            .to_string();
        let client = self
            .client_storage
            .find_by_id(tenant_id, &client_id)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| {
                OidcError::invalid_client(format!("client is not found ({client_id})"))
            })?;
        authenticate_client(&client, &credentials)?;

        // 2. Grant registration
        if !client.is_grant_type_allowed(GrantType::Ciba) {
            return Err(OidcError::unauthorized_client(format!(
                "client is unauthorized grant_type ({})",
                GrantType::Ciba
            )));
        }

        // 3. Scope
        let raw_scope = params.scope.clone().unwrap_or_default();
        let scopes = client.filter_scopes(raw_scope.split_whitespace());
        if scopes.is_empty() {
            return Err(OidcError::invalid_scope(format!(
                "backchannel authentication request does not contains valid scope ({raw_scope})"
            )));
        }

        // 4. Login hint
        let hint = params.login_hint.as_deref().ok_or_else(|| {
            OidcError::invalid_request(
                "backchannel authentication request must contains login_hint",
            )
        })?;
        let user = resolve_login_hint(self.user_storage.as_ref(), tenant_id, hint)
            .await?
            .into_user()
            .ok_or_else(|| {
                OidcError::invalid_request(format!(
                    "backchannel authentication request login_hint does not identify a user ({hint})"
                ))
            })?;

        // 5. User code, when the registration demands one
        if client.backchannel_user_code_parameter && params.user_code.is_none() {
            return Err(OidcError::invalid_request(
                "backchannel authentication request must contains user_code",
            ));
        }

        // 6. Companion transaction for the device interactions
        let ttl = params
            .requested_expiry
            .filter(|v| *v > 0)
            .map_or(self.config.request_ttl, Duration::seconds);
        let mut transaction = AuthorizationTransaction::new(
            tenant_id,
            &client.client_id,
            ResponseTypeSet::code(),
            scopes.clone(),
            "urn:veridian:ciba",
            ttl,
        );
        transaction.backchannel = true;
        transaction.user = Some(user.clone());
        self.transaction_storage.create(&transaction).await?;

        // 7. The backchannel request itself
        let request = BackchannelAuthenticationRequest {
            auth_req_id: crate::random::urlsafe_token(32),
            tenant_id: tenant_id.to_string(),
            client_id: client.client_id.clone(),
            scopes,
            sub: user.sub.clone(),
            device_id: user.authentication_devices.first().cloned(),
            binding_message: params.binding_message,
            user_code: params.user_code,
            transaction_id: transaction.id,
            status: CibaStatus::Pending,
            interval: self.config.poll_interval,
            created_at: OffsetDateTime::now_utc(),
            expires_at: OffsetDateTime::now_utc() + ttl,
        };
        self.ciba_storage.create(&request).await?;

        self.event_sink
            .record(
                SecurityEvent::new(SecurityEventType::CibaRequested, tenant_id)
                    .with_client(&client.client_id)
                    .with_sub(&user.sub)
                    .with_transaction(&request.auth_req_id),
            )
            .await?;

        Ok(BackchannelAuthenticationResponse {
            auth_req_id: request.auth_req_id,
            expires_in: (request.expires_at - request.created_at).whole_seconds(),
            interval: request.interval,
        })
    }

    /// Lists pending requests addressed to an authentication device.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn pending_for_device(
        &self,
        tenant_id: &str,
        device_id: &str,
    ) -> Result<Vec<BackchannelAuthenticationRequest>, OidcError> {
        let mut pending = self
            .ciba_storage
            .find_pending_by_device(tenant_id, device_id)
            .await?;
        pending.retain(|r| !r.is_expired());
        Ok(pending)
    }

    /// Applies the device's decision once the companion transaction settles.
    ///
    /// Called after a device interaction ran against the companion
    /// transaction: `Authorized`-satisfying transactions grant the request,
    /// denied transactions deny it. Status transitions are monotonic.
    ///
    /// # Errors
    ///
    /// `not_found` when the request is unknown; storage failures propagate.
    pub async fn settle(
        &self,
        tenant_id: &str,
        auth_req_id: &str,
        decision: CibaStatus,
    ) -> Result<(), OidcError> {
        let request = self
            .ciba_storage
            .find_by_id(tenant_id, auth_req_id)
            .await?
            .ok_or_else(|| {
                OidcError::not_found(format!(
                    "backchannel authentication request is not found ({auth_req_id})"
                ))
            })?;
        if request.status != CibaStatus::Pending {
            return Ok(());
        }
        self.ciba_storage
            .update_status(tenant_id, auth_req_id, decision)
            .await?;

        let event_type = match decision {
            CibaStatus::Granted => SecurityEventType::CibaGranted,
            _ => SecurityEventType::CibaDenied,
        };
        self.event_sink
            .record(
                SecurityEvent::new(event_type, tenant_id)
                    .with_client(&request.client_id)
                    .with_sub(&request.sub)
                    .with_transaction(auth_req_id),
            )
            .await?;

        if decision == CibaStatus::Denied
            && let Some(mut txn) = self
                .transaction_storage
                .find_by_id(tenant_id, request.transaction_id)
                .await?
        {
            txn.status = TransactionStatus::Denied;
            self.transaction_storage.update(&txn).await?;
        }
        Ok(())
    }
}
