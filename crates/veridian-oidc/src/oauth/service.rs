//! Authorization service.
//!
//! Owns the authorization request lifecycle: validation of incoming
//! requests, transaction creation, interaction dispatch, session-backed
//! silent authorization, the explicit authorize / deny decisions, and
//! artifact issuance for code, implicit, and hybrid response types.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::OidcError;
use crate::events::{SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::interaction::{
    InteractionEngine, InteractionOutcome, InteractionStatus, InteractionType,
};
use crate::oauth::pkce::CodeChallengeMethod;
use crate::oauth::request::{AuthorizationRequestParams, Display, Prompt, parse_max_age};
use crate::oauth::request_object::{
    RequestObjectFetcher, RequestObjectPolicy, RequestObjectValidator,
};
use crate::oauth::response::{ResponseMode, redirect_error_url, redirect_success_url};
use crate::oauth::transaction::{
    AuthorizationTransaction, RequestObjectOrigin, TransactionStatus,
};
use crate::policy::{AuthenticationPolicy, AuthenticationPolicySet};
use crate::session::OpSession;
use crate::storage::{
    ClientStorage, ConsentStorage, OpSessionStorage, TransactionStorage,
};
use crate::token::jwt::{AccessTokenClaims, IdTokenClaims, JwtCodec};
use crate::token::service::TokenConfig;
use crate::types::{Client, ResponseType, ResponseTypeSet};

// =============================================================================
// Config and result types
// =============================================================================

/// Authorization service configuration.
#[derive(Debug, Clone)]
pub struct AuthorizationConfig {
    /// Issuer identifier.
    pub issuer: String,
    /// Sign-in UI base URL.
    pub sign_in_url: String,
    /// Transaction lifetime.
    pub transaction_ttl: Duration,
    /// OP session lifetime.
    pub op_session_ttl: Duration,
    /// Request-object signature policy.
    pub request_object_policy: RequestObjectPolicy,
    /// ACR values ordered weakest to strongest.
    pub acr_order: Vec<String>,
    /// ACR recorded when no method earned a higher level.
    pub default_acr: String,
    /// Tenant-default authentication policies.
    pub authentication_policies: AuthenticationPolicySet,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        crate::config::IdpConfig::default().authorization_config()
    }
}

/// Outcome of a valid authorization request.
#[derive(Debug)]
pub enum AuthorizationStart {
    /// A transaction was created; redirect the browser to the sign-in UI
    /// and set the `AUTH_SESSION` cookie from the transaction.
    PendingInteraction {
        transaction: AuthorizationTransaction,
    },
    /// `prompt=none` was satisfied by an existing session; redirect with
    /// artifacts immediately.
    Authorized { redirect_uri: String },
}

/// How a failed authorization request is delivered.
#[derive(Debug)]
pub enum AuthorizeStartError {
    /// The redirect URI could not be trusted; respond directly.
    Direct(OidcError),
    /// The redirect URI is validated; deliver the error to the client.
    Redirect { location: String },
}

impl From<OidcError> for AuthorizeStartError {
    fn from(err: OidcError) -> Self {
        Self::Direct(err)
    }
}

/// A granted authorization, ready for the final redirect.
#[derive(Debug)]
pub struct AuthorizeGrant {
    /// Where to send the browser.
    pub redirect_uri: String,
    /// `OP_SESSION` cookie value to set.
    pub op_session_cookie: Option<String>,
}

/// Data for rendering the sign-in and consent view.
#[derive(Debug, serde::Serialize)]
pub struct ViewData {
    pub client_id: String,
    pub client_name: String,
    pub scopes: Vec<String>,
    /// Whether an existing session could complete this request without
    /// re-authentication.
    pub session_enabled: bool,
    /// Whether the view offers a cancel action. Backchannel companion
    /// transactions have no browser redirect to deliver the denial to.
    pub show_cancel: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tos_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_uri: Option<String>,
}

// =============================================================================
// Service
// =============================================================================

/// Drives authorization transactions from request to redirect.
pub struct AuthorizationService {
    client_storage: Arc<dyn ClientStorage>,
    transaction_storage: Arc<dyn TransactionStorage>,
    op_session_storage: Arc<dyn OpSessionStorage>,
    consent_storage: Arc<dyn ConsentStorage>,
    engine: Arc<InteractionEngine>,
    event_sink: Arc<dyn SecurityEventSink>,
    jwt: Arc<JwtCodec>,
    token_config: TokenConfig,
    request_object_validator: RequestObjectValidator,
    request_object_fetcher: Option<Arc<dyn RequestObjectFetcher>>,
    config: AuthorizationConfig,
}

impl AuthorizationService {
    /// Creates the service over its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client_storage: Arc<dyn ClientStorage>,
        transaction_storage: Arc<dyn TransactionStorage>,
        op_session_storage: Arc<dyn OpSessionStorage>,
        consent_storage: Arc<dyn ConsentStorage>,
        engine: Arc<InteractionEngine>,
        event_sink: Arc<dyn SecurityEventSink>,
        jwt: Arc<JwtCodec>,
        token_config: TokenConfig,
        config: AuthorizationConfig,
    ) -> Self {
        let request_object_validator = RequestObjectValidator::new(&config.issuer);
        Self {
            client_storage,
            transaction_storage,
            op_session_storage,
            consent_storage,
            engine,
            event_sink,
            jwt,
            token_config,
            request_object_validator,
            request_object_fetcher: None,
            config,
        }
    }

    /// Installs a fetcher for `request_uri` request objects.
    #[must_use]
    pub fn with_request_object_fetcher(mut self, fetcher: Arc<dyn RequestObjectFetcher>) -> Self {
        self.request_object_fetcher = Some(fetcher);
        self
    }

    /// Returns the sign-in UI URL for a transaction.
    #[must_use]
    pub fn sign_in_location(&self, transaction_id: Uuid) -> String {
        format!("{}?id={}", self.config.sign_in_url, transaction_id)
    }

    /// Handles an authorization request.
    ///
    /// Validation order: client, redirect URI, request object, response
    /// type, scope, OIDC parameters, PKCE. Errors before the redirect URI
    /// is trusted are returned directly; afterwards they are delivered by
    /// redirect with `state` echoed when supplied.
    ///
    /// # Errors
    ///
    /// See `AuthorizeStartError`.
    pub async fn request_authorization(
        &self,
        tenant_id: &str,
        mut params: AuthorizationRequestParams,
        op_session_cookie: Option<&str>,
    ) -> Result<AuthorizationStart, AuthorizeStartError> {
        // 1. Client
        let Some(client_id) = params.client_id.clone() else {
            return Err(OidcError::invalid_request(
                "authorization request must contains client_id",
            )
            .into());
        };
        let client = self
            .client_storage
            .find_by_id(tenant_id, &client_id)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| {
                OidcError::invalid_request(format!(
                    "authorization request client_id is not registered ({client_id})"
                ))
            })?;

        // 2. Redirect URI; everything after this can redirect errors
        let redirect_uri = match params.redirect_uri.clone() {
            Some(uri) => {
                if !client.is_redirect_uri_registered(&uri) {
                    return Err(OidcError::invalid_request(format!(
                        "authorization request redirect_uri does not register in client configuration ({uri})"
                    ))
                    .into());
                }
                uri
            }
            None => client
                .single_redirect_uri()
                .map(ToString::to_string)
                .ok_or_else(|| {
                    OidcError::invalid_request(
                        "authorization request must contains redirect_uri",
                    )
                })?,
        };

        // 3. Request object
        let mut origin = RequestObjectOrigin::Plain;
        let request_jwt = match (params.request.clone(), params.request_uri.clone()) {
            (Some(jwt), _) => {
                origin = RequestObjectOrigin::RequestParam;
                Some(jwt)
            }
            (None, Some(uri)) => {
                origin = RequestObjectOrigin::RequestUri;
                let fetcher = self.request_object_fetcher.as_ref().ok_or_else(|| {
                    self.redirect_err(
                        &redirect_uri,
                        &OidcError::invalid_request_object(
                            "request_uri is not supported by this authorization server",
                        ),
                        params.state.as_deref(),
                        false,
                    )
                })?;
                match fetcher.fetch(&uri).await {
                    Ok(jwt) => Some(jwt),
                    Err(err) => {
                        return Err(self.redirect_err(
                            &redirect_uri,
                            &err,
                            params.state.as_deref(),
                            false,
                        ));
                    }
                }
            }
            (None, None) => None,
        };
        if let Some(jwt) = request_jwt {
            let policy = self.config.request_object_policy;
            let result = if RequestObjectValidator::is_unsigned(&jwt) {
                self.request_object_validator
                    .validate_unsigned(&jwt, &client, policy)
            } else {
                self.request_object_validator.validate(&jwt, &client, policy)
            };
            match result {
                Ok(claims) => params.merge_request_object(&claims),
                Err(err) => {
                    return Err(self.redirect_err(
                        &redirect_uri,
                        &err,
                        params.state.as_deref(),
                        false,
                    ));
                }
            }
        }
        let state = params.state.clone().filter(|s| !s.is_empty());

        // 4. Response type
        let Some(raw_response_type) = params.response_type.clone() else {
            return Err(self.redirect_err(
                &redirect_uri,
                &OidcError::invalid_request("response type is required in authorization request"),
                state.as_deref(),
                false,
            ));
        };
        let Some(response_types) = ResponseTypeSet::parse(&raw_response_type) else {
            return Err(self.redirect_err(
                &redirect_uri,
                &OidcError::unsupported_response_type(format!(
                    "authorization server is unsupported response_type ({raw_response_type})"
                )),
                state.as_deref(),
                false,
            ));
        };
        let fragment = response_types.requires_fragment();
        if !client.is_response_type_registered(&response_types) {
            return Err(self.redirect_err(
                &redirect_uri,
                &OidcError::unauthorized_client(format!(
                    "client is unauthorized response_type ({raw_response_type})"
                )),
                state.as_deref(),
                fragment,
            ));
        }

        // 5. Scope
        let raw_scope = params.scope.clone().unwrap_or_default();
        let scopes = client.filter_scopes(raw_scope.split_whitespace());
        if scopes.is_empty() {
            return Err(self.redirect_err(
                &redirect_uri,
                &OidcError::invalid_scope(format!(
                    "authorization request does not contains valid scope ({raw_scope})"
                )),
                state.as_deref(),
                fragment,
            ));
        }

        // 6. OIDC parameters
        if let Some(display) = params.display.as_deref()
            && let Err(err) = Display::parse(display)
        {
            return Err(self.redirect_err(&redirect_uri, &err, state.as_deref(), fragment));
        }
        let prompt = match params.prompt.as_deref() {
            Some(raw) => match Prompt::parse(raw) {
                Ok(p) => Some(p),
                Err(err) => {
                    return Err(self.redirect_err(
                        &redirect_uri,
                        &err,
                        state.as_deref(),
                        fragment,
                    ));
                }
            },
            None => None,
        };
        let max_age = match params.max_age.as_deref() {
            Some(raw) => match parse_max_age(raw) {
                Ok(v) => Some(v),
                Err(err) => {
                    return Err(self.redirect_err(
                        &redirect_uri,
                        &err,
                        state.as_deref(),
                        fragment,
                    ));
                }
            },
            None => None,
        };
        let response_mode = params.response_mode.as_deref().and_then(ResponseMode::parse);

        // 7. PKCE
        if params.code_challenge.is_some()
            && let Err(err) = CodeChallengeMethod::parse(params.code_challenge_method.as_deref())
        {
            return Err(self.redirect_err(&redirect_uri, &err, state.as_deref(), fragment));
        }

        // 8. Transaction
        let mut transaction = AuthorizationTransaction::new(
            tenant_id,
            &client.client_id,
            response_types,
            scopes,
            &redirect_uri,
            self.config.transaction_ttl,
        );
        transaction.state = state;
        transaction.nonce = params.nonce.clone();
        transaction.response_mode = response_mode;
        transaction.acr_values = params.acr_value_tokens();
        transaction.max_age = max_age;
        transaction.prompt = prompt;
        transaction.code_challenge = params.code_challenge.clone();
        transaction.code_challenge_method = params.code_challenge_method.clone();
        transaction.authorization_details = params
            .authorization_details
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok());
        transaction.request_object_origin = origin;

        self.transaction_storage.create(&transaction).await?;
        self.event_sink
            .record(
                SecurityEvent::new(SecurityEventType::AuthorizationRequested, tenant_id)
                    .with_client(&client.client_id)
                    .with_transaction(transaction.id)
                    .with_detail(serde_json::json!({
                        "response_type": transaction.response_types.canonical(),
                        "scope": transaction.scopes.join(" "),
                    })),
            )
            .await?;

        // 9. prompt=none: succeed or fail silently, never show UI
        if prompt == Some(Prompt::None) {
            return self
                .silent_authorization(tenant_id, transaction, &client, op_session_cookie)
                .await;
        }

        Ok(AuthorizationStart::PendingInteraction { transaction })
    }

    /// Attempts to complete a `prompt=none` request from the session.
    async fn silent_authorization(
        &self,
        tenant_id: &str,
        mut transaction: AuthorizationTransaction,
        client: &Client,
        op_session_cookie: Option<&str>,
    ) -> Result<AuthorizationStart, AuthorizeStartError> {
        let fragment = transaction.response_types.requires_fragment();
        let fail = |service: &Self, txn: &AuthorizationTransaction, err: OidcError| {
            service.redirect_err(&txn.redirect_uri, &err, txn.state.as_deref(), fragment)
        };

        let session = match self.find_live_session(tenant_id, op_session_cookie).await? {
            Some(session) => session,
            None => {
                return Err(fail(
                    self,
                    &transaction,
                    OidcError::login_required("authorization request prompt is none, but no end-user session exists"),
                ));
            }
        };
        let policy = self.select_policy(client, &transaction);
        if !session.satisfies_acr(&transaction.acr_values, &self.config.acr_order) {
            return Err(fail(
                self,
                &transaction,
                OidcError::interaction_required(
                    "session acr does not satisfy requested acr_values",
                ),
            ));
        }
        if !session.satisfies_max_age(transaction.max_age) {
            return Err(fail(
                self,
                &transaction,
                OidcError::login_required("session auth_time does not satisfy max_age"),
            ));
        }
        if !session.satisfies_policy(&policy) {
            return Err(fail(
                self,
                &transaction,
                OidcError::interaction_required("session does not satisfy authentication policy"),
            ));
        }
        let consent = self
            .consent_storage
            .find(tenant_id, &session.sub, &client.client_id)
            .await?;
        if !consent.is_some_and(|c| c.covers(&transaction.scopes)) {
            return Err(fail(
                self,
                &transaction,
                OidcError::interaction_required(
                    "authorization request contains scopes without recorded consent",
                ),
            ));
        }

        self.event_sink
            .record(
                SecurityEvent::new(SecurityEventType::SessionReused, tenant_id)
                    .with_client(&client.client_id)
                    .with_sub(&session.sub)
                    .with_transaction(transaction.id),
            )
            .await?;
        let redirect_uri = self
            .finalize(tenant_id, &mut transaction, &session.sub, &session)
            .await?;
        Ok(AuthorizationStart::Authorized { redirect_uri })
    }

    /// Runs one interaction against a pending transaction.
    ///
    /// # Errors
    ///
    /// `not_found` for unknown transactions, `invalid_request` for expired
    /// ones, a 401 session mismatch when the `AUTH_SESSION` cookie is
    /// absent or wrong.
    pub async fn submit_interaction(
        &self,
        tenant_id: &str,
        transaction_id: Uuid,
        interaction_type: InteractionType,
        payload: &serde_json::Value,
        auth_session_cookie: Option<&str>,
    ) -> Result<InteractionOutcome, OidcError> {
        let mut transaction = self.load_pending(tenant_id, transaction_id).await?;
        self.check_auth_session(tenant_id, &transaction, auth_session_cookie)
            .await?;

        let client = self.load_client(tenant_id, &transaction.client_id).await?;
        let policy = self.select_policy(&client, &transaction);
        let outcome = self
            .engine
            .execute(
                tenant_id,
                &mut transaction,
                interaction_type,
                payload,
                &policy,
            )
            .await?;
        if outcome.status == InteractionStatus::Deny {
            transaction.status = TransactionStatus::Denied;
        }
        self.transaction_storage.update(&transaction).await?;
        Ok(outcome)
    }

    /// Runs one device-driven interaction against a CIBA companion
    /// transaction. The device authenticated via its secret JWT, so no
    /// browser cookie binding applies.
    ///
    /// Returns the outcome and whether the transaction now satisfies its
    /// authentication policy.
    ///
    /// # Errors
    ///
    /// Same as `submit_interaction` minus the cookie check.
    pub async fn submit_device_interaction(
        &self,
        tenant_id: &str,
        transaction_id: Uuid,
        interaction_type: InteractionType,
        payload: &serde_json::Value,
    ) -> Result<(InteractionOutcome, bool), OidcError> {
        let mut transaction = self.load_pending(tenant_id, transaction_id).await?;
        let client = self.load_client(tenant_id, &transaction.client_id).await?;
        let policy = self.select_policy(&client, &transaction);
        let outcome = self
            .engine
            .execute(
                tenant_id,
                &mut transaction,
                interaction_type,
                payload,
                &policy,
            )
            .await?;
        if outcome.status == InteractionStatus::Deny {
            transaction.status = TransactionStatus::Denied;
        }
        let satisfied = policy.success_conditions.evaluate(&transaction.interactions)
            && transaction.user.is_some();
        self.transaction_storage.update(&transaction).await?;
        Ok((outcome, satisfied))
    }

    /// Completes a transaction after interactive authentication.
    ///
    /// # Errors
    ///
    /// A 401 session mismatch for a wrong `AUTH_SESSION` cookie;
    /// `invalid_request` when the accumulated interactions do not satisfy
    /// the selected authentication policy.
    pub async fn authorize(
        &self,
        tenant_id: &str,
        transaction_id: Uuid,
        auth_session_cookie: Option<&str>,
        op_session_cookie: Option<&str>,
    ) -> Result<AuthorizeGrant, OidcError> {
        let mut transaction = self.load_pending(tenant_id, transaction_id).await?;
        self.check_auth_session(tenant_id, &transaction, auth_session_cookie)
            .await?;

        let client = self.load_client(tenant_id, &transaction.client_id).await?;
        let policy = self.select_policy(&client, &transaction);
        if transaction.user.is_none()
            || !policy.success_conditions.evaluate(&transaction.interactions)
        {
            return Err(OidcError::invalid_request(
                "authorization request does not satisfy authentication policy",
            ));
        }
        let sub = transaction
            .user
            .as_ref()
            .map(|u| u.sub.clone())
            .unwrap_or_default();

        // Session: extend and upgrade an existing one, else create
        let acr = self.achieved_acr(&transaction);
        let amr = session_amr(&transaction);
        let auth_time = transaction.auth_time.unwrap_or_else(OffsetDateTime::now_utc);
        let session = match self.find_live_session(tenant_id, op_session_cookie).await? {
            Some(mut existing) if existing.sub == sub => {
                // A weaker re-authentication never lowers the session level.
                let acr = self.stronger_acr(&existing.acr, &acr);
                existing.upgrade(acr, amr, auth_time);
                existing.extend(self.config.op_session_ttl);
                self.op_session_storage.update(&existing).await?;
                existing
            }
            _ => {
                let session = OpSession::new(
                    tenant_id,
                    &sub,
                    acr,
                    amr,
                    auth_time,
                    self.config.op_session_ttl,
                );
                self.op_session_storage.create(&session).await?;
                self.event_sink
                    .record(
                        SecurityEvent::new(SecurityEventType::SessionCreated, tenant_id)
                            .with_sub(&sub)
                            .with_transaction(transaction.id),
                    )
                    .await?;
                session
            }
        };

        self.consent_storage
            .grant(tenant_id, &sub, &client.client_id, &transaction.scopes)
            .await?;

        let cookie = session.cookie_value.clone();
        let redirect_uri = self
            .finalize(tenant_id, &mut transaction, &sub, &session)
            .await
            .map_err(flatten_start_error)?;
        Ok(AuthorizeGrant {
            redirect_uri,
            op_session_cookie: Some(cookie),
        })
    }

    /// Completes a transaction by reusing an existing OP session without
    /// fresh interactions.
    ///
    /// # Errors
    ///
    /// A 401 session mismatch for a wrong `AUTH_SESSION` cookie and for a
    /// missing or expired OP session; `invalid_request` when the session
    /// does not satisfy the request's ACR, freshness, or policy
    /// requirements.
    pub async fn authorize_with_session(
        &self,
        tenant_id: &str,
        transaction_id: Uuid,
        auth_session_cookie: Option<&str>,
        op_session_cookie: Option<&str>,
    ) -> Result<AuthorizeGrant, OidcError> {
        let mut transaction = self.load_pending(tenant_id, transaction_id).await?;
        self.check_auth_session(tenant_id, &transaction, auth_session_cookie)
            .await?;

        let client = self.load_client(tenant_id, &transaction.client_id).await?;
        let session = self
            .find_live_session(tenant_id, op_session_cookie)
            .await?
            .ok_or_else(|| {
                OidcError::session_mismatch("session does not exist or is expired")
            })?;
        if !session.satisfies_acr(&transaction.acr_values, &self.config.acr_order) {
            return Err(OidcError::invalid_request(format!(
                "session acr ({}) does not satisfy requested acr_values ({})",
                session.acr,
                transaction.acr_values.join(" ")
            )));
        }
        if !session.satisfies_max_age(transaction.max_age) {
            return Err(OidcError::invalid_request(
                "session auth_time does not satisfy max_age",
            ));
        }
        let policy = self.select_policy(&client, &transaction);
        if !session.satisfies_policy(&policy) {
            return Err(OidcError::invalid_request(
                "session does not satisfy authentication policy",
            ));
        }

        let mut session = session;
        session.extend(self.config.op_session_ttl);
        self.op_session_storage.update(&session).await?;
        self.consent_storage
            .grant(tenant_id, &session.sub, &client.client_id, &transaction.scopes)
            .await?;
        self.event_sink
            .record(
                SecurityEvent::new(SecurityEventType::SessionReused, tenant_id)
                    .with_client(&client.client_id)
                    .with_sub(&session.sub)
                    .with_transaction(transaction.id),
            )
            .await?;

        let sub = session.sub.clone();
        let cookie = session.cookie_value.clone();
        let redirect_uri = self
            .finalize(tenant_id, &mut transaction, &sub, &session)
            .await
            .map_err(flatten_start_error)?;
        Ok(AuthorizeGrant {
            redirect_uri,
            op_session_cookie: Some(cookie),
        })
    }

    /// Denies a pending transaction.
    ///
    /// # Errors
    ///
    /// A 401 session mismatch for a wrong `AUTH_SESSION` cookie.
    pub async fn deny(
        &self,
        tenant_id: &str,
        transaction_id: Uuid,
        auth_session_cookie: Option<&str>,
    ) -> Result<AuthorizeGrant, OidcError> {
        let mut transaction = self.load_pending(tenant_id, transaction_id).await?;
        self.check_auth_session(tenant_id, &transaction, auth_session_cookie)
            .await?;

        transaction.status = TransactionStatus::Denied;
        self.transaction_storage.update(&transaction).await?;
        self.event_sink
            .record(
                SecurityEvent::new(SecurityEventType::AuthorizationDenied, tenant_id)
                    .with_client(&transaction.client_id)
                    .with_transaction(transaction.id),
            )
            .await?;

        let redirect_uri = redirect_error_url(
            &transaction.redirect_uri,
            &OidcError::denied_by_resource_owner(),
            transaction.state.as_deref(),
            transaction.response_types.requires_fragment(),
        )?;
        Ok(AuthorizeGrant {
            redirect_uri,
            op_session_cookie: None,
        })
    }

    /// Returns the data needed to render the sign-in view.
    ///
    /// # Errors
    ///
    /// `not_found` for unknown transactions.
    pub async fn view_data(
        &self,
        tenant_id: &str,
        transaction_id: Uuid,
        op_session_cookie: Option<&str>,
    ) -> Result<ViewData, OidcError> {
        let transaction = self.load_pending(tenant_id, transaction_id).await?;
        let client = self.load_client(tenant_id, &transaction.client_id).await?;
        let policy = self.select_policy(&client, &transaction);

        let session_enabled = match self.find_live_session(tenant_id, op_session_cookie).await? {
            Some(session) => {
                session.satisfies_acr(&transaction.acr_values, &self.config.acr_order)
                    && session.satisfies_max_age(transaction.max_age)
                    && session.satisfies_policy(&policy)
            }
            None => false,
        };

        Ok(ViewData {
            client_id: client.client_id.clone(),
            client_name: client.name.clone(),
            scopes: transaction.scopes.clone(),
            session_enabled,
            show_cancel: !transaction.backchannel,
            tos_uri: client.tos_uri.clone(),
            policy_uri: client.policy_uri.clone(),
        })
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn load_pending(
        &self,
        tenant_id: &str,
        id: Uuid,
    ) -> Result<AuthorizationTransaction, OidcError> {
        let transaction = self
            .transaction_storage
            .find_by_id(tenant_id, id)
            .await?
            .ok_or_else(|| {
                OidcError::not_found(format!("authorization request is not found ({id})"))
            })?;
        if transaction.is_expired() {
            return Err(OidcError::invalid_request(format!(
                "authorization request is expired ({id})"
            )));
        }
        if transaction.status != TransactionStatus::PendingInteraction {
            return Err(OidcError::invalid_request(format!(
                "authorization request is already handled ({id})"
            )));
        }
        Ok(transaction)
    }

    async fn load_client(&self, tenant_id: &str, client_id: &str) -> Result<Client, OidcError> {
        self.client_storage
            .find_by_id(tenant_id, client_id)
            .await?
            .ok_or_else(|| {
                OidcError::internal(format!(
                    "client vanished while its transaction was pending ({client_id})"
                ))
            })
    }

    async fn check_auth_session(
        &self,
        tenant_id: &str,
        transaction: &AuthorizationTransaction,
        presented: Option<&str>,
    ) -> Result<(), OidcError> {
        if transaction.matches_auth_session(presented) {
            return Ok(());
        }
        self.event_sink
            .record(
                SecurityEvent::new(SecurityEventType::SessionMismatch, tenant_id)
                    .with_client(&transaction.client_id)
                    .with_transaction(transaction.id),
            )
            .await?;
        Err(OidcError::session_mismatch(
            "request AUTH_SESSION does not match the authorization request binding",
        ))
    }

    fn select_policy(
        &self,
        client: &Client,
        transaction: &AuthorizationTransaction,
    ) -> AuthenticationPolicy {
        client
            .authentication_policies
            .as_ref()
            .unwrap_or(&self.config.authentication_policies)
            .select(&transaction.scopes, &transaction.acr_values)
    }

    async fn find_live_session(
        &self,
        tenant_id: &str,
        cookie: Option<&str>,
    ) -> Result<Option<OpSession>, OidcError> {
        let Some(cookie) = cookie else {
            return Ok(None);
        };
        Ok(self
            .op_session_storage
            .find_by_cookie(tenant_id, cookie)
            .await?
            .filter(|s| !s.is_expired()))
    }

    /// ACR earned by the transaction's performed methods, never by the
    /// requested `acr_values`.
    fn achieved_acr(&self, transaction: &AuthorizationTransaction) -> String {
        crate::policy::achieved_acr(
            &transaction.successful_methods(),
            &self.config.acr_order,
            &self.config.default_acr,
        )
    }

    /// Picks the stronger of two ACR values per the tenant ordering.
    /// Unranked values lose to ranked ones.
    fn stronger_acr(&self, current: &str, achieved: &str) -> String {
        let rank = |acr: &str| self.config.acr_order.iter().position(|level| level == acr);
        match (rank(current), rank(achieved)) {
            (Some(c), Some(a)) if c > a => current.to_string(),
            (Some(_), None) => current.to_string(),
            _ => achieved.to_string(),
        }
    }

    fn redirect_err(
        &self,
        redirect_uri: &str,
        error: &OidcError,
        state: Option<&str>,
        fragment: bool,
    ) -> AuthorizeStartError {
        match redirect_error_url(redirect_uri, error, state, fragment) {
            Ok(location) => AuthorizeStartError::Redirect { location },
            Err(internal) => AuthorizeStartError::Direct(internal),
        }
    }

    /// Issues the artifacts for the transaction's response types and builds
    /// the success redirect.
    async fn finalize(
        &self,
        tenant_id: &str,
        transaction: &mut AuthorizationTransaction,
        sub: &str,
        session: &OpSession,
    ) -> Result<String, AuthorizeStartError> {
        let now = OffsetDateTime::now_utc();
        let mut pairs: Vec<(String, String)> = Vec::new();

        if transaction.response_types.contains(ResponseType::Code) {
            let code = transaction.issue_code();
            pairs.push(("code".to_string(), code));
        }
        if transaction.response_types.contains(ResponseType::Token) {
            let claims = AccessTokenClaims {
                iss: self.jwt.issuer().to_string(),
                sub: Some(sub.to_string()),
                aud: tenant_id.to_string(),
                client_id: transaction.client_id.clone(),
                scope: transaction.scopes.join(" "),
                exp: (now + self.token_config.access_token_ttl).unix_timestamp(),
                iat: now.unix_timestamp(),
                jti: Uuid::new_v4().to_string(),
                cnf: None,
            };
            pairs.push(("access_token".to_string(), self.jwt.encode(&claims)?));
            pairs.push(("token_type".to_string(), "Bearer".to_string()));
            pairs.push((
                "expires_in".to_string(),
                self.token_config.access_token_ttl.whole_seconds().to_string(),
            ));
        }
        if transaction.response_types.contains(ResponseType::IdToken) {
            let claims = IdTokenClaims {
                iss: self.jwt.issuer().to_string(),
                sub: sub.to_string(),
                aud: transaction.client_id.clone(),
                exp: (now + self.token_config.id_token_ttl).unix_timestamp(),
                iat: now.unix_timestamp(),
                auth_time: Some(session.auth_time.unix_timestamp()),
                nonce: transaction.nonce.clone(),
                acr: Some(session.acr.clone()),
                amr: Some(session.amr.clone()),
            };
            pairs.push(("id_token".to_string(), self.jwt.encode(&claims)?));
        }
        if let Some(state) = transaction.state.as_deref() {
            pairs.push(("state".to_string(), state.to_string()));
        }

        transaction.status = TransactionStatus::Authorized;
        self.transaction_storage.update(transaction).await?;
        self.event_sink
            .record(
                SecurityEvent::new(SecurityEventType::AuthorizationGranted, tenant_id)
                    .with_client(&transaction.client_id)
                    .with_sub(sub)
                    .with_transaction(transaction.id),
            )
            .await?;

        let fragment = match transaction.response_mode {
            Some(ResponseMode::Query) => false,
            Some(ResponseMode::Fragment) => true,
            None => transaction.response_types.requires_fragment(),
        };
        let borrowed: Vec<(&str, &str)> = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        Ok(redirect_success_url(
            &transaction.redirect_uri,
            &borrowed,
            fragment,
        )?)
    }
}

fn session_amr(transaction: &AuthorizationTransaction) -> Vec<String> {
    // Record both AMR aliases and raw method names so policy checks on the
    // session can match either form.
    let mut amr = transaction.amr();
    for method in transaction.successful_methods() {
        if !amr.contains(&method) {
            amr.push(method);
        }
    }
    amr
}

fn flatten_start_error(err: AuthorizeStartError) -> OidcError {
    match err {
        AuthorizeStartError::Direct(e) => e,
        AuthorizeStartError::Redirect { location } => {
            OidcError::internal(format!("unexpected redirect during finalize: {location}"))
        }
    }
}
