//! Token-endpoint client authentication.
//!
//! Supports `none` (public clients), `client_secret_post`,
//! `client_secret_basic`, and `tls_client_auth` (RFC 8705, modelled as a
//! certificate-thumbprint comparison because TLS terminates upstream).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::OidcError;
use crate::types::{Client, TokenEndpointAuthMethod};

/// Credentials presented with a token-endpoint request.
#[derive(Debug, Clone, Default)]
pub struct ClientCredentials {
    /// `client_id` from the request body.
    pub client_id: Option<String>,
    /// `client_secret` from the request body.
    pub client_secret: Option<String>,
    /// Decoded `Authorization: Basic` credentials, if present.
    pub basic: Option<(String, String)>,
    /// SHA-256 thumbprint (base64url, no padding) of the TLS client
    /// certificate, as asserted by the terminating proxy.
    pub certificate_thumbprint: Option<String>,
}

impl ClientCredentials {
    /// Decodes an `Authorization: Basic` header value into `(id, secret)`.
    #[must_use]
    pub fn parse_basic(header: &str) -> Option<(String, String)> {
        let encoded = header.strip_prefix("Basic ")?;
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        let text = String::from_utf8(decoded).ok()?;
        let (id, secret) = text.split_once(':')?;
        Some((id.to_string(), secret.to_string()))
    }

    /// Returns the client_id asserted by the request, preferring Basic
    /// credentials over body parameters.
    #[must_use]
    pub fn asserted_client_id(&self) -> Option<&str> {
        self.basic
            .as_ref()
            .map(|(id, _)| id.as_str())
            .or(self.client_id.as_deref())
    }
}

/// Authenticates a client against its registered method.
///
/// # Errors
///
/// Returns `invalid_client` (HTTP 401) when the required credentials are
/// missing or do not match the registration.
pub fn authenticate_client(
    client: &Client,
    credentials: &ClientCredentials,
) -> Result<(), OidcError> {
    match client.token_endpoint_auth_method {
        TokenEndpointAuthMethod::None => Ok(()),
        TokenEndpointAuthMethod::ClientSecretPost => {
            let Some(presented) = credentials.client_secret.as_deref() else {
                return Err(OidcError::invalid_client(
                    "client authentication type is client_secret_post, but request does not contains client_secret_post",
                ));
            };
            let registered = client.client_secret.as_deref().ok_or_else(|| {
                OidcError::configuration(format!(
                    "client ({}) registers client_secret_post but has no secret",
                    client.client_id
                ))
            })?;
            if presented != registered {
                return Err(OidcError::invalid_client(
                    "client authentication type is client_secret_post, but request client_secret does not match client_secret",
                ));
            }
            Ok(())
        }
        TokenEndpointAuthMethod::ClientSecretBasic => {
            let Some((id, secret)) = credentials.basic.as_ref() else {
                return Err(OidcError::invalid_client(
                    "client authentication type is client_secret_basic, but request does not contains client_secret_basic",
                ));
            };
            let registered = client.client_secret.as_deref().ok_or_else(|| {
                OidcError::configuration(format!(
                    "client ({}) registers client_secret_basic but has no secret",
                    client.client_id
                ))
            })?;
            if id != &client.client_id || secret != registered {
                return Err(OidcError::invalid_client(
                    "client authentication type is client_secret_basic, but request client_secret does not match client_secret",
                ));
            }
            Ok(())
        }
        TokenEndpointAuthMethod::TlsClientAuth => {
            let Some(presented) = credentials.certificate_thumbprint.as_deref() else {
                return Err(OidcError::invalid_client(
                    "client authentication type is tls_client_auth, but request does not contains client certificate",
                ));
            };
            let registered = client
                .tls_client_certificate_thumbprint
                .as_deref()
                .ok_or_else(|| {
                    OidcError::configuration(format!(
                        "client ({}) registers tls_client_auth but has no certificate thumbprint",
                        client.client_id
                    ))
                })?;
            if presented != registered {
                return Err(OidcError::invalid_client(
                    "client authentication type is tls_client_auth, but client certificate does not match registered certificate",
                ));
            }
            Ok(())
        }
    }
}
