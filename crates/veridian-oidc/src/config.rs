//! Server-level configuration.
//!
//! `IdpConfig` is the serde-friendly form loaded from files or the
//! environment (durations in humantime syntax, e.g. `"10m"`); services
//! consume the plain per-concern configs derived from it.

use std::time::Duration as StdDuration;

use serde::{Deserialize, Serialize};
use time::Duration;

use crate::ciba::CibaConfig;
use crate::oauth::request_object::RequestObjectPolicy;
use crate::oauth::service::AuthorizationConfig;
use crate::policy::AuthenticationPolicySet;
use crate::token::TokenConfig;

/// Top-level identity provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdpConfig {
    /// Issuer identifier, e.g. `https://op.example.com`.
    pub issuer: String,

    /// Sign-in UI base URL; the transaction id is appended as `?id=`.
    pub sign_in_url: String,

    /// Authorization transaction lifetime.
    #[serde(with = "humantime_serde", default = "default_transaction_ttl")]
    pub transaction_ttl: StdDuration,

    /// OP session lifetime.
    #[serde(with = "humantime_serde", default = "default_op_session_ttl")]
    pub op_session_ttl: StdDuration,

    /// Access token lifetime.
    #[serde(with = "humantime_serde", default = "default_access_token_ttl")]
    pub access_token_ttl: StdDuration,

    /// Refresh token lifetime.
    #[serde(with = "humantime_serde", default = "default_refresh_token_ttl")]
    pub refresh_token_ttl: StdDuration,

    /// ID token lifetime.
    #[serde(with = "humantime_serde", default = "default_access_token_ttl")]
    pub id_token_ttl: StdDuration,

    /// CIBA request lifetime.
    #[serde(with = "humantime_serde", default = "default_ciba_ttl")]
    pub ciba_request_ttl: StdDuration,

    /// CIBA minimum poll interval in seconds.
    #[serde(default = "default_ciba_interval")]
    pub ciba_poll_interval: i64,

    /// Request-object signature policy.
    #[serde(default)]
    pub request_object_policy: RequestObjectPolicy,

    /// ACR values ordered weakest to strongest.
    #[serde(default = "default_acr_order")]
    pub acr_order: Vec<String>,

    /// ACR recorded when no performed method earned a higher level.
    #[serde(default = "default_acr")]
    pub default_acr: String,

    /// Tenant-default authentication policies.
    #[serde(default)]
    pub authentication_policies: AuthenticationPolicySet,
}

fn default_transaction_ttl() -> StdDuration {
    StdDuration::from_secs(600)
}

fn default_op_session_ttl() -> StdDuration {
    StdDuration::from_secs(3600)
}

fn default_access_token_ttl() -> StdDuration {
    StdDuration::from_secs(3600)
}

fn default_refresh_token_ttl() -> StdDuration {
    StdDuration::from_secs(30 * 24 * 3600)
}

fn default_ciba_ttl() -> StdDuration {
    StdDuration::from_secs(300)
}

fn default_ciba_interval() -> i64 {
    5
}

fn default_acr_order() -> Vec<String> {
    vec![
        "urn:veridian:loa:1".to_string(),
        "urn:veridian:loa:2".to_string(),
        "urn:veridian:loa:3".to_string(),
    ]
}

fn default_acr() -> String {
    "urn:veridian:loa:1".to_string()
}

impl Default for IdpConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            sign_in_url: "http://localhost:8080/signin".to_string(),
            transaction_ttl: default_transaction_ttl(),
            op_session_ttl: default_op_session_ttl(),
            access_token_ttl: default_access_token_ttl(),
            refresh_token_ttl: default_refresh_token_ttl(),
            id_token_ttl: default_access_token_ttl(),
            ciba_request_ttl: default_ciba_ttl(),
            ciba_poll_interval: default_ciba_interval(),
            request_object_policy: RequestObjectPolicy::default(),
            acr_order: default_acr_order(),
            default_acr: default_acr(),
            authentication_policies: AuthenticationPolicySet::default(),
        }
    }
}

impl IdpConfig {
    /// Derives the authorization service configuration.
    #[must_use]
    pub fn authorization_config(&self) -> AuthorizationConfig {
        AuthorizationConfig {
            issuer: self.issuer.clone(),
            sign_in_url: self.sign_in_url.clone(),
            transaction_ttl: to_time(self.transaction_ttl),
            op_session_ttl: to_time(self.op_session_ttl),
            request_object_policy: self.request_object_policy,
            acr_order: self.acr_order.clone(),
            default_acr: self.default_acr.clone(),
            authentication_policies: self.authentication_policies.clone(),
        }
    }

    /// Derives the token service configuration.
    #[must_use]
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            access_token_ttl: to_time(self.access_token_ttl),
            refresh_token_ttl: to_time(self.refresh_token_ttl),
            id_token_ttl: to_time(self.id_token_ttl),
            acr_order: self.acr_order.clone(),
            default_acr: self.default_acr.clone(),
        }
    }

    /// Derives the CIBA service configuration.
    #[must_use]
    pub fn ciba_config(&self) -> CibaConfig {
        CibaConfig {
            request_ttl: to_time(self.ciba_request_ttl),
            poll_interval: self.ciba_poll_interval,
        }
    }
}

fn to_time(d: StdDuration) -> Duration {
    Duration::try_from(d).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humantime_durations() {
        let config: IdpConfig = serde_json::from_value(serde_json::json!({
            "issuer": "https://op.example.com",
            "sign_in_url": "https://op.example.com/signin",
            "transaction_ttl": "10m",
            "access_token_ttl": "1h",
        }))
        .unwrap();
        assert_eq!(config.transaction_ttl, StdDuration::from_secs(600));
        assert_eq!(config.access_token_ttl, StdDuration::from_secs(3600));
        assert_eq!(config.ciba_poll_interval, 5);
    }

    #[test]
    fn test_derived_configs() {
        let config = IdpConfig::default();
        assert_eq!(
            config.authorization_config().transaction_ttl,
            Duration::minutes(10)
        );
        assert_eq!(config.token_config().access_token_ttl, Duration::hours(1));
        assert_eq!(config.ciba_config().poll_interval, 5);
    }
}
