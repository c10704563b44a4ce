//! OP sessions and single sign-on.
//!
//! An OP session is created or extended when a user authorizes a request.
//! Later requests from the same browser can reuse it, either silently
//! (`prompt=none`) or through the explicit authorize-with-session action,
//! provided the session satisfies the request's ACR, freshness, and policy
//! requirements.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::policy::AuthenticationPolicy;
use crate::random::urlsafe_token;

/// Cookie carrying the OP session identifier.
pub const OP_SESSION_COOKIE: &str = "OP_SESSION";

/// Cookie binding a browser to a pending authorization transaction.
pub const AUTH_SESSION_COOKIE: &str = "AUTH_SESSION";

/// An authenticated OP session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpSession {
    /// Session identifier.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Authenticated subject.
    pub sub: String,
    /// ACR achieved by the authentication that created or last upgraded
    /// this session.
    pub acr: String,
    /// Methods performed, as AMR values plus raw method names.
    pub amr: Vec<String>,
    /// Time of the underlying authentication event.
    #[serde(with = "time::serde::rfc3339")]
    pub auth_time: OffsetDateTime,
    /// Random cookie value identifying this session in the browser.
    pub cookie_value: String,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Expiry time.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl OpSession {
    /// Creates a new session for a freshly authenticated subject.
    #[must_use]
    pub fn new(
        tenant_id: impl Into<String>,
        sub: impl Into<String>,
        acr: impl Into<String>,
        amr: Vec<String>,
        auth_time: OffsetDateTime,
        ttl: Duration,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            sub: sub.into(),
            acr: acr.into(),
            amr,
            auth_time,
            cookie_value: urlsafe_token(32),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Returns `true` if the session has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() >= self.expires_at
    }

    /// Extends the session lifetime from now.
    pub fn extend(&mut self, ttl: Duration) {
        self.expires_at = OffsetDateTime::now_utc() + ttl;
    }

    /// Upgrades the session after a stronger authentication: merges AMR
    /// values, adopts the new ACR, and refreshes `auth_time`.
    pub fn upgrade(&mut self, acr: impl Into<String>, amr: Vec<String>, auth_time: OffsetDateTime) {
        self.acr = acr.into();
        for value in amr {
            if !self.amr.contains(&value) {
                self.amr.push(value);
            }
        }
        self.auth_time = auth_time;
    }

    /// Returns the authentication age in whole seconds.
    #[must_use]
    pub fn auth_age_seconds(&self) -> i64 {
        (OffsetDateTime::now_utc() - self.auth_time).whole_seconds()
    }

    /// Checks the request's `max_age` against the authentication time.
    #[must_use]
    pub fn satisfies_max_age(&self, max_age: Option<i64>) -> bool {
        max_age.is_none_or(|limit| self.auth_age_seconds() <= limit)
    }

    /// Checks the session's ACR against requested values using the tenant's
    /// ACR ordering (weakest first). Satisfied when the session's level is
    /// at least one requested level; an empty request is always satisfied.
    #[must_use]
    pub fn satisfies_acr(&self, requested: &[String], acr_order: &[String]) -> bool {
        if requested.is_empty() {
            return true;
        }
        let Some(session_rank) = acr_rank(&self.acr, acr_order) else {
            return false;
        };
        requested
            .iter()
            .filter_map(|r| acr_rank(r, acr_order))
            .any(|requested_rank| session_rank >= requested_rank)
    }

    /// Checks whether the session's recorded methods satisfy a policy's
    /// success conditions.
    #[must_use]
    pub fn satisfies_policy(&self, policy: &AuthenticationPolicy) -> bool {
        policy.satisfied_by_amr(&self.amr)
    }
}

fn acr_rank(acr: &str, acr_order: &[String]) -> Option<usize> {
    acr_order.iter().position(|level| level == acr)
}
