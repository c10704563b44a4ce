//! OAuth 2.0 / OpenID Connect client registration types.
//!
//! This module defines the `Client` struct and related enums for client
//! registrations: allowed grant types, registered response-type combinations,
//! redirect URIs, scopes, authentication method, and CIBA delivery mode.

use serde::{Deserialize, Serialize};

use crate::policy::AuthenticationPolicySet;

// =============================================================================
// Grant Type
// =============================================================================

/// OAuth 2.0 grant types.
///
/// Defines the token-endpoint flows a client is allowed to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code flow (with PKCE where registered).
    AuthorizationCode,
    /// Refresh Token flow.
    RefreshToken,
    /// Resource Owner Password Credentials flow.
    /// WARNING: legacy grant, only for trusted first-party applications.
    Password,
    /// Client-Initiated Backchannel Authentication (CIBA).
    #[serde(rename = "urn:openid:params:grant-type:ciba")]
    Ciba,
    /// JWT Bearer assertion grant (RFC 7523).
    #[serde(rename = "urn:ietf:params:oauth:grant-type:jwt-bearer")]
    JwtBearer,
}

impl GrantType {
    /// Returns the OAuth 2.0 `grant_type` parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
            Self::Password => "password",
            Self::Ciba => "urn:openid:params:grant-type:ciba",
            Self::JwtBearer => "urn:ietf:params:oauth:grant-type:jwt-bearer",
        }
    }

    /// Parses a `grant_type` parameter value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "authorization_code" => Some(Self::AuthorizationCode),
            "refresh_token" => Some(Self::RefreshToken),
            "password" => Some(Self::Password),
            "urn:openid:params:grant-type:ciba" => Some(Self::Ciba),
            "urn:ietf:params:oauth:grant-type:jwt-bearer" => Some(Self::JwtBearer),
            _ => None,
        }
    }
}

impl std::fmt::Display for GrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Response Type
// =============================================================================

/// A single OAuth 2.0 / OIDC response type token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Authorization code.
    Code,
    /// Access token (implicit).
    Token,
    /// ID token (implicit).
    IdToken,
}

impl ResponseType {
    /// Returns the `response_type` token value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Token => "token",
            Self::IdToken => "id_token",
        }
    }
}

/// A space-delimited set of response-type tokens, order-insensitive.
///
/// `"code id_token"` and `"id_token code"` compare equal. The canonical
/// rendering orders tokens as `code`, `token`, `id_token`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResponseTypeSet {
    types: Vec<ResponseType>,
}

impl ResponseTypeSet {
    /// Parses a raw `response_type` parameter value.
    ///
    /// Returns `None` if the value is empty or contains an unknown token.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let mut types = Vec::new();
        for token in raw.split_whitespace() {
            let rt = match token {
                "code" => ResponseType::Code,
                "token" => ResponseType::Token,
                "id_token" => ResponseType::IdToken,
                _ => return None,
            };
            if !types.contains(&rt) {
                types.push(rt);
            }
        }
        if types.is_empty() {
            return None;
        }
        types.sort();
        Some(Self { types })
    }

    /// The plain authorization-code set.
    #[must_use]
    pub fn code() -> Self {
        Self {
            types: vec![ResponseType::Code],
        }
    }

    /// Returns `true` if the set contains the given token.
    #[must_use]
    pub fn contains(&self, rt: ResponseType) -> bool {
        self.types.contains(&rt)
    }

    /// Returns `true` if this is a hybrid or implicit flow, i.e. tokens are
    /// delivered in the fragment component by default.
    #[must_use]
    pub fn requires_fragment(&self) -> bool {
        self.contains(ResponseType::Token) || self.contains(ResponseType::IdToken)
    }

    /// Returns the canonical space-delimited rendering.
    #[must_use]
    pub fn canonical(&self) -> String {
        self.types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl std::fmt::Display for ResponseTypeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl TryFrom<String> for ResponseTypeSet {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("invalid response_type ({value})"))
    }
}

impl From<ResponseTypeSet> for String {
    fn from(value: ResponseTypeSet) -> Self {
        value.canonical()
    }
}

// =============================================================================
// Token Endpoint Auth Method
// =============================================================================

/// Client authentication methods at the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenEndpointAuthMethod {
    /// Public client, no authentication.
    None,
    /// Secret in the request body.
    #[default]
    ClientSecretPost,
    /// Secret via HTTP Basic authentication.
    ClientSecretBasic,
    /// Mutual-TLS client certificate (RFC 8705).
    TlsClientAuth,
}

impl TokenEndpointAuthMethod {
    /// Returns the registered metadata value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::ClientSecretPost => "client_secret_post",
            Self::ClientSecretBasic => "client_secret_basic",
            Self::TlsClientAuth => "tls_client_auth",
        }
    }
}

// =============================================================================
// CIBA Delivery Mode
// =============================================================================

/// CIBA token delivery modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CibaDeliveryMode {
    /// The client polls the token endpoint.
    #[default]
    Poll,
    /// The server pings the client, which then polls the token endpoint.
    Ping,
    /// Tokens are pushed to the client notification endpoint.
    Push,
}

impl CibaDeliveryMode {
    /// Returns the registered metadata value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poll => "poll",
            Self::Ping => "ping",
            Self::Push => "push",
        }
    }

    /// Returns `true` if the client may poll the token endpoint with an
    /// `auth_req_id`. Push clients must not.
    #[must_use]
    pub fn allows_token_polling(&self) -> bool {
        !matches!(self, Self::Push)
    }
}

// =============================================================================
// Client
// =============================================================================

/// An OAuth 2.0 / OpenID Connect client registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    /// Unique client identifier used in protocol flows.
    pub client_id: String,

    /// Client secret (confidential clients).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,

    /// Human-readable display name.
    pub name: String,

    /// Token-endpoint authentication method.
    #[serde(default)]
    pub token_endpoint_auth_method: TokenEndpointAuthMethod,

    /// Grant types this client is allowed to use.
    pub grant_types: Vec<GrantType>,

    /// Registered response-type combinations for the authorization endpoint.
    #[serde(default)]
    pub response_types: Vec<ResponseTypeSet>,

    /// Allowed redirect URIs, compared by exact string equality.
    #[serde(default)]
    pub redirect_uris: Vec<String>,

    /// Scopes this client is allowed to request.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// ACR values this client may request.
    #[serde(default)]
    pub acr_values: Vec<String>,

    /// Authentication policies evaluated for this client's transactions.
    /// Falls back to the tenant default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_policies: Option<AuthenticationPolicySet>,

    /// CIBA token delivery mode.
    #[serde(default)]
    pub backchannel_token_delivery_mode: CibaDeliveryMode,

    /// Whether backchannel authentication requests from this client must
    /// carry a `user_code`.
    #[serde(default)]
    pub backchannel_user_code_parameter: bool,

    /// SHA-256 thumbprint (base64url, no padding) of the registered mTLS
    /// client certificate. Required when the auth method is `tls_client_auth`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_client_certificate_thumbprint: Option<String>,

    /// Whether access tokens issued to this client carry a certificate
    /// binding confirmation claim (`cnf.x5t#S256`).
    #[serde(default)]
    pub tls_client_certificate_bound_access_tokens: bool,

    /// PEM-encoded RSA public key used to verify signed request objects and
    /// JWT bearer assertions from this client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_object_verification_key: Option<String>,

    /// Whether this client is currently active.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Terms-of-service URI shown on the consent view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tos_uri: Option<String>,

    /// Privacy-policy URI shown on the consent view.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_uri: Option<String>,
}

fn default_active() -> bool {
    true
}

impl Client {
    /// Checks if the given redirect URI is registered, by exact comparison.
    #[must_use]
    pub fn is_redirect_uri_registered(&self, uri: &str) -> bool {
        self.redirect_uris.iter().any(|registered| registered == uri)
    }

    /// Returns the sole registered redirect URI, if exactly one exists.
    ///
    /// Used to default `redirect_uri` when the authorization request omits it.
    #[must_use]
    pub fn single_redirect_uri(&self) -> Option<&str> {
        match self.redirect_uris.as_slice() {
            [uri] => Some(uri.as_str()),
            _ => None,
        }
    }

    /// Checks if the given grant type is allowed for this client.
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: GrantType) -> bool {
        self.grant_types.contains(&grant_type)
    }

    /// Checks if the given response-type combination is registered.
    #[must_use]
    pub fn is_response_type_registered(&self, set: &ResponseTypeSet) -> bool {
        self.response_types.iter().any(|registered| registered == set)
    }

    /// Checks if the given scope token is allowed for this client.
    #[must_use]
    pub fn is_scope_allowed(&self, scope: &str) -> bool {
        self.scopes.iter().any(|allowed| allowed == scope)
    }

    /// Filters a requested scope list down to the tokens this client may use.
    ///
    /// Unknown tokens are dropped rather than rejected; the caller errors only
    /// when nothing survives.
    #[must_use]
    pub fn filter_scopes<'a>(&self, requested: impl Iterator<Item = &'a str>) -> Vec<String> {
        requested
            .filter(|s| self.is_scope_allowed(s))
            .map(ToString::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        Client {
            client_id: "client-1".to_string(),
            client_secret: Some("secret".to_string()),
            name: "Test Client".to_string(),
            token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretPost,
            grant_types: vec![GrantType::AuthorizationCode, GrantType::RefreshToken],
            response_types: vec![
                ResponseTypeSet::parse("code").unwrap(),
                ResponseTypeSet::parse("code id_token").unwrap(),
            ],
            redirect_uris: vec!["https://rp.example.com/cb".to_string()],
            scopes: vec![
                "openid".to_string(),
                "profile".to_string(),
                "email".to_string(),
            ],
            acr_values: vec![],
            authentication_policies: None,
            backchannel_token_delivery_mode: CibaDeliveryMode::Poll,
            backchannel_user_code_parameter: false,
            tls_client_certificate_thumbprint: None,
            tls_client_certificate_bound_access_tokens: false,
            request_object_verification_key: None,
            active: true,
            tos_uri: None,
            policy_uri: None,
        }
    }

    #[test]
    fn test_response_type_set_order_insensitive() {
        let a = ResponseTypeSet::parse("code id_token").unwrap();
        let b = ResponseTypeSet::parse("id_token code").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.canonical(), "code id_token");
    }

    #[test]
    fn test_response_type_set_rejects_unknown() {
        assert!(ResponseTypeSet::parse("code unknown").is_none());
        assert!(ResponseTypeSet::parse("").is_none());
    }

    #[test]
    fn test_requires_fragment() {
        assert!(!ResponseTypeSet::parse("code").unwrap().requires_fragment());
        assert!(ResponseTypeSet::parse("token").unwrap().requires_fragment());
        assert!(
            ResponseTypeSet::parse("code id_token")
                .unwrap()
                .requires_fragment()
        );
    }

    #[test]
    fn test_redirect_uri_exact_match() {
        let c = client();
        assert!(c.is_redirect_uri_registered("https://rp.example.com/cb"));
        assert!(!c.is_redirect_uri_registered("https://rp.example.com/cb/"));
        assert!(!c.is_redirect_uri_registered("https://rp.example.com/cb?x=1"));
    }

    #[test]
    fn test_filter_scopes_drops_unknown() {
        let c = client();
        let filtered = c.filter_scopes("openid unknown email".split_whitespace());
        assert_eq!(filtered, vec!["openid", "email"]);
    }

    #[test]
    fn test_grant_type_urn_parsing() {
        assert_eq!(
            GrantType::parse("urn:openid:params:grant-type:ciba"),
            Some(GrantType::Ciba)
        );
        assert_eq!(
            GrantType::parse("urn:ietf:params:oauth:grant-type:jwt-bearer"),
            Some(GrantType::JwtBearer)
        );
        assert_eq!(GrantType::parse("bogus"), None);
    }

    #[test]
    fn test_single_redirect_uri() {
        let mut c = client();
        assert_eq!(c.single_redirect_uri(), Some("https://rp.example.com/cb"));
        c.redirect_uris.push("https://rp.example.com/cb2".to_string());
        assert_eq!(c.single_redirect_uri(), None);
    }
}
