//! End-user account types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An end-user account known to the authorization server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Stable subject identifier issued in tokens.
    pub sub: String,

    /// Login name, unique per tenant.
    pub username: String,

    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// E-mail address; used as a login hint and for e-mail OTP delivery.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Whether the e-mail address has been verified.
    #[serde(default)]
    pub email_verified: bool,

    /// Phone number in E.164 form; used for SMS OTP delivery. Not unique.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    /// Identifiers of authentication devices registered for CIBA approval.
    #[serde(default)]
    pub authentication_devices: Vec<String>,

    /// Whether this account is active.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Account creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

fn default_active() -> bool {
    true
}

impl User {
    /// Returns `true` if the given device identifier belongs to this user.
    #[must_use]
    pub fn has_authentication_device(&self, device_id: &str) -> bool {
        self.authentication_devices.iter().any(|d| d == device_id)
    }
}
