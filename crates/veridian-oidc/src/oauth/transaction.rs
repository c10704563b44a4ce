//! Authorization transaction state.
//!
//! A transaction is created when an authorization request passes validation
//! and lives until it is authorized, denied, or expires. It accumulates
//! interaction results, binds the resolved user, and carries the validated
//! request parameters through to token issuance.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::oauth::request::Prompt;
use crate::random::urlsafe_token;
use crate::types::{ResponseTypeSet, User};

/// Lifecycle states of an authorization transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Awaiting user interaction.
    PendingInteraction,
    /// The user authorized; artifacts have been issued.
    Authorized,
    /// The user denied the request.
    Denied,
    /// Validation or processing failed after creation.
    Errored,
}

/// Where the effective request parameters came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestObjectOrigin {
    /// Plain query parameters.
    #[default]
    Plain,
    /// A signed request object passed via `request`.
    RequestParam,
    /// A signed request object fetched via `request_uri`.
    RequestUri,
}

/// Error detail recorded for a failed interaction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionError {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable description.
    pub error_description: String,
}

/// Accumulated result counters for one interaction method.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionResult {
    /// Number of successful attempts.
    pub success_count: u32,
    /// Number of failed attempts.
    pub failure_count: u32,
    /// The most recent failure, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<InteractionError>,
}

/// A pending authorization request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationTransaction {
    /// Opaque transaction identifier, placed in the sign-in redirect.
    pub id: Uuid,

    /// Owning tenant.
    pub tenant_id: String,

    /// The requesting client.
    pub client_id: String,

    /// Validated response-type set.
    pub response_types: ResponseTypeSet,

    /// Granted scope tokens (already filtered against the registration).
    pub scopes: Vec<String>,

    /// Validated redirect URI.
    pub redirect_uri: String,

    /// Opaque client state, echoed verbatim on every redirect. `None` when
    /// the request carried no `state`; never stored as an empty string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    /// OIDC nonce, copied into the ID token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    /// Requested response mode, when the request overrode the default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<crate::oauth::response::ResponseMode>,

    /// Requested ACR values, strongest preference first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub acr_values: Vec<String>,

    /// Maximum acceptable authentication age in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,

    /// Requested prompt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<Prompt>,

    /// PKCE challenge, if the request carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,

    /// PKCE challenge method (`S256` or `plain`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,

    /// RAR authorization details, passed through opaquely.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_details: Option<serde_json::Value>,

    /// Provenance of the effective parameters.
    #[serde(default)]
    pub request_object_origin: RequestObjectOrigin,

    /// Whether this is a backchannel companion transaction, driven by an
    /// authentication device instead of a browser. Companion transactions
    /// have no redirect leg to deliver a cancellation to.
    #[serde(default)]
    pub backchannel: bool,

    /// Random value bound to the browser via the `AUTH_SESSION` cookie at
    /// transaction creation. Interaction and authorize calls must present
    /// the matching cookie.
    pub auth_session: String,

    /// Current lifecycle state.
    pub status: TransactionStatus,

    /// Per-method interaction counters.
    #[serde(default)]
    pub interactions: BTreeMap<String, InteractionResult>,

    /// The resolved and authenticated user, once an interaction succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,

    /// Time of the first successful authentication in this transaction.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub auth_time: Option<OffsetDateTime>,

    /// Authorization code issued at authorize time, until consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_code: Option<String>,

    /// Whether the issued code has been exchanged. Codes are single-use.
    #[serde(default)]
    pub code_consumed: bool,

    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// Expiry time; the transaction is unusable afterwards.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl AuthorizationTransaction {
    /// Creates a new pending transaction with a fresh `AUTH_SESSION` value.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        response_types: ResponseTypeSet,
        scopes: Vec<String>,
        redirect_uri: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            response_types,
            scopes,
            redirect_uri: redirect_uri.into(),
            state: None,
            nonce: None,
            response_mode: None,
            acr_values: Vec::new(),
            max_age: None,
            prompt: None,
            code_challenge: None,
            code_challenge_method: None,
            authorization_details: None,
            request_object_origin: RequestObjectOrigin::Plain,
            backchannel: false,
            auth_session: urlsafe_token(32),
            status: TransactionStatus::PendingInteraction,
            interactions: BTreeMap::new(),
            user: None,
            auth_time: None,
            authorization_code: None,
            code_consumed: false,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Returns `true` if the transaction has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }

    /// Records a successful attempt of the given interaction method and
    /// stamps `auth_time` on the first success.
    pub fn record_success(&mut self, method: &str) {
        let entry = self.interactions.entry(method.to_string()).or_default();
        entry.success_count += 1;
        entry.last_error = None;
        if self.auth_time.is_none() {
            self.auth_time = Some(OffsetDateTime::now_utc());
        }
    }

    /// Records a failed attempt of the given interaction method.
    pub fn record_failure(&mut self, method: &str, error: &str, description: &str) {
        let entry = self.interactions.entry(method.to_string()).or_default();
        entry.failure_count += 1;
        entry.last_error = Some(InteractionError {
            error: error.to_string(),
            error_description: description.to_string(),
        });
    }

    /// Binds the authenticated user to the transaction.
    ///
    /// A transaction authenticates exactly one user; later interactions for
    /// a different subject are rejected by the engine before reaching here.
    pub fn bind_user(&mut self, user: User) {
        self.user = Some(user);
    }

    /// Returns the AMR values for this transaction's successful methods.
    #[must_use]
    pub fn amr(&self) -> Vec<String> {
        self.interactions
            .iter()
            .filter(|(_, result)| result.success_count > 0)
            .map(|(method, _)| crate::policy::amr_alias(method))
            .collect()
    }

    /// Returns the raw method names that have succeeded at least once.
    #[must_use]
    pub fn successful_methods(&self) -> Vec<String> {
        self.interactions
            .iter()
            .filter(|(_, result)| result.success_count > 0)
            .map(|(method, _)| method.clone())
            .collect()
    }

    /// Issues a fresh single-use authorization code on this transaction.
    pub fn issue_code(&mut self) -> String {
        let code = urlsafe_token(32);
        self.authorization_code = Some(code.clone());
        self.code_consumed = false;
        code
    }

    /// Returns `true` when the presented `AUTH_SESSION` cookie value matches
    /// the one bound at creation.
    #[must_use]
    pub fn matches_auth_session(&self, presented: Option<&str>) -> bool {
        presented.is_some_and(|value| value == self.auth_session)
    }
}
