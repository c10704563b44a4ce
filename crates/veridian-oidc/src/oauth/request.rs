//! Authorization request parameters.
//!
//! Raw query parameters from the authorization endpoint, before validation.
//! Everything is optional here; the service validates presence and values
//! and produces the protocol error messages.

use serde::{Deserialize, Serialize};

use crate::error::OidcError;

/// Raw authorization request parameters as received on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorizationRequestParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_locales: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr_values: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_challenge_method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization_details: Option<String>,
}

impl AuthorizationRequestParams {
    /// Splits `scope` into individual tokens.
    #[must_use]
    pub fn scope_tokens(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Splits `acr_values` into individual tokens.
    #[must_use]
    pub fn acr_value_tokens(&self) -> Vec<String> {
        self.acr_values
            .as_deref()
            .map(|s| s.split_whitespace().map(ToString::to_string).collect())
            .unwrap_or_default()
    }

    /// Merges claims from a validated request object over these parameters.
    ///
    /// Request-object claims take precedence over plain query parameters.
    pub fn merge_request_object(&mut self, claims: &serde_json::Value) {
        let Some(map) = claims.as_object() else {
            return;
        };
        for (key, value) in map {
            let Some(text) = value_as_param(value) else {
                continue;
            };
            match key.as_str() {
                "response_type" => self.response_type = Some(text),
                "client_id" => self.client_id = Some(text),
                "redirect_uri" => self.redirect_uri = Some(text),
                "scope" => self.scope = Some(text),
                "state" => self.state = Some(text),
                "response_mode" => self.response_mode = Some(text),
                "nonce" => self.nonce = Some(text),
                "display" => self.display = Some(text),
                "prompt" => self.prompt = Some(text),
                "max_age" => self.max_age = Some(text),
                "ui_locales" => self.ui_locales = Some(text),
                "id_token_hint" => self.id_token_hint = Some(text),
                "login_hint" => self.login_hint = Some(text),
                "acr_values" => self.acr_values = Some(text),
                "claims" => self.claims = Some(text),
                "code_challenge" => self.code_challenge = Some(text),
                "code_challenge_method" => self.code_challenge_method = Some(text),
                "authorization_details" => self.authorization_details = Some(text),
                _ => {}
            }
        }
    }
}

fn value_as_param(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
            Some(value.to_string())
        }
        serde_json::Value::Null => None,
    }
}

// =============================================================================
// Display
// =============================================================================

/// OIDC `display` parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Display {
    Page,
    Popup,
    Touch,
    Wap,
}

impl Display {
    /// Parses the `display` parameter.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` naming the offending value.
    pub fn parse(value: &str) -> Result<Self, OidcError> {
        match value {
            "page" => Ok(Self::Page),
            "popup" => Ok(Self::Popup),
            "touch" => Ok(Self::Touch),
            "wap" => Ok(Self::Wap),
            other => Err(OidcError::invalid_request(format!(
                "authorization request display is defined that page, popup, touch, wap, but request display is ({other})"
            ))),
        }
    }
}

// =============================================================================
// Prompt
// =============================================================================

/// OIDC `prompt` parameter values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    None,
    Login,
    Consent,
    SelectAccount,
}

impl Prompt {
    /// Parses the `prompt` parameter.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` naming the offending value.
    pub fn parse(value: &str) -> Result<Self, OidcError> {
        match value {
            "none" => Ok(Self::None),
            "login" => Ok(Self::Login),
            "consent" => Ok(Self::Consent),
            "select_account" => Ok(Self::SelectAccount),
            other => Err(OidcError::invalid_request(format!(
                "authorization request prompt is defined that none, login, consent, select_account, but request prompt is ({other})"
            ))),
        }
    }
}

/// Parses the `max_age` parameter as a non-negative integer of seconds.
///
/// # Errors
///
/// Returns `invalid_request` naming the offending value when the parameter
/// is not a non-negative integer.
pub fn parse_max_age(value: &str) -> Result<i64, OidcError> {
    value
        .parse::<i64>()
        .ok()
        .filter(|v| *v >= 0)
        .ok_or_else(|| {
            OidcError::invalid_request(format!(
                "authorization request max_age is invalid ({value})"
            ))
        })
}
