//! Protocol error types.
//!
//! This module defines all error types that can occur while processing
//! authorization, interaction, and token requests. Protocol-defined errors
//! carry the exact OAuth 2.0 / OpenID Connect error code and are surfaced
//! verbatim to callers with the mandated HTTP status.

use std::fmt;

/// Errors that can occur during authorization and token operations.
#[derive(Debug, thiserror::Error)]
pub enum OidcError {
    /// The request is missing a required parameter or is otherwise malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// Description of why the request is invalid.
        message: String,
    },

    /// Client authentication failed.
    #[error("Invalid client: {message}")]
    InvalidClient {
        /// Description of why the client authentication failed.
        message: String,
    },

    /// The authorization grant or refresh token is invalid, expired, or consumed.
    #[error("Invalid grant: {message}")]
    InvalidGrant {
        /// Description of why the grant is invalid.
        message: String,
    },

    /// The client is not authorized for the requested response or grant type.
    #[error("Unauthorized client: {message}")]
    UnauthorizedClient {
        /// Description of the authorization failure.
        message: String,
    },

    /// The authorization server does not support the requested response type.
    #[error("Unsupported response type: {message}")]
    UnsupportedResponseType {
        /// Description including the offending response type.
        message: String,
    },

    /// The authorization server does not support the requested grant type.
    #[error("Unsupported grant type: {grant_type}")]
    UnsupportedGrantType {
        /// The unsupported grant type.
        grant_type: String,
    },

    /// The requested scope is invalid, unknown, or malformed.
    #[error("Invalid scope: {message}")]
    InvalidScope {
        /// Description of why the scope is invalid.
        message: String,
    },

    /// The resource owner or authorization server denied the request.
    #[error("Access denied: {message}")]
    AccessDenied {
        /// Description of the denial.
        message: String,
    },

    /// CIBA: the end user has not yet completed authentication.
    #[error("Authorization pending")]
    AuthorizationPending,

    /// CIBA: the backchannel authentication request has expired.
    #[error("Expired token")]
    ExpiredToken,

    /// Silent authorization requires a login but none exists.
    #[error("Login required: {message}")]
    LoginRequired {
        /// Description of why login is required.
        message: String,
    },

    /// Silent authorization requires user interaction.
    #[error("Interaction required: {message}")]
    InteractionRequired {
        /// Description of why interaction is required.
        message: String,
    },

    /// A signed request object failed validation.
    #[error("Invalid request object: {message}")]
    InvalidRequestObject {
        /// Description of the validation failure.
        message: String,
    },

    /// The presented auth-session cookie does not match the transaction binding.
    ///
    /// Surfaced as HTTP 401 with `auth_session_mismatch` in the
    /// `error_description`, defeating cross-browser hijacking of a pending
    /// transaction.
    #[error("Session mismatch: {message}")]
    SessionMismatch {
        /// Description, always containing `auth_session_mismatch`.
        message: String,
    },

    /// An access token is invalid, malformed, or revoked.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The token lacks a scope required by the endpoint.
    #[error("Insufficient scope: {message}")]
    InsufficientScope {
        /// Description of the missing scope.
        message: String,
    },

    /// The referenced entity does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Description of what was not found.
        message: String,
    },

    /// An error occurred while storing or retrieving data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The server configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl OidcError {
    /// Creates a new `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClient` error.
    #[must_use]
    pub fn invalid_client(message: impl Into<String>) -> Self {
        Self::InvalidClient {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidGrant` error.
    #[must_use]
    pub fn invalid_grant(message: impl Into<String>) -> Self {
        Self::InvalidGrant {
            message: message.into(),
        }
    }

    /// Creates a new `UnauthorizedClient` error.
    #[must_use]
    pub fn unauthorized_client(message: impl Into<String>) -> Self {
        Self::UnauthorizedClient {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedResponseType` error.
    #[must_use]
    pub fn unsupported_response_type(message: impl Into<String>) -> Self {
        Self::UnsupportedResponseType {
            message: message.into(),
        }
    }

    /// Creates a new `UnsupportedGrantType` error.
    #[must_use]
    pub fn unsupported_grant_type(grant_type: impl Into<String>) -> Self {
        Self::UnsupportedGrantType {
            grant_type: grant_type.into(),
        }
    }

    /// Creates a new `InvalidScope` error.
    #[must_use]
    pub fn invalid_scope(message: impl Into<String>) -> Self {
        Self::InvalidScope {
            message: message.into(),
        }
    }

    /// Creates a new `AccessDenied` error.
    #[must_use]
    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::AccessDenied {
            message: message.into(),
        }
    }

    /// Creates the fixed denial error mandated by RFC 6749.
    #[must_use]
    pub fn denied_by_resource_owner() -> Self {
        Self::AccessDenied {
            message: "The resource owner or authorization server denied the request.".to_string(),
        }
    }

    /// Creates a new `LoginRequired` error.
    #[must_use]
    pub fn login_required(message: impl Into<String>) -> Self {
        Self::LoginRequired {
            message: message.into(),
        }
    }

    /// Creates a new `InteractionRequired` error.
    #[must_use]
    pub fn interaction_required(message: impl Into<String>) -> Self {
        Self::InteractionRequired {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidRequestObject` error.
    #[must_use]
    pub fn invalid_request_object(message: impl Into<String>) -> Self {
        Self::InvalidRequestObject {
            message: message.into(),
        }
    }

    /// Creates a new `SessionMismatch` error.
    ///
    /// The description always contains `auth_session_mismatch` so that
    /// callers can detect the condition without parsing free text.
    #[must_use]
    pub fn session_mismatch(detail: impl Into<String>) -> Self {
        Self::SessionMismatch {
            message: format!("auth_session_mismatch: {}", detail.into()),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `InsufficientScope` error.
    #[must_use]
    pub fn insufficient_scope(message: impl Into<String>) -> Self {
        Self::InsufficientScope {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the OAuth 2.0 error code for this error.
    #[must_use]
    pub fn oauth_error_code(&self) -> &'static str {
        match self {
            Self::InvalidRequest { .. } => "invalid_request",
            Self::InvalidClient { .. } => "invalid_client",
            Self::InvalidGrant { .. } => "invalid_grant",
            Self::UnauthorizedClient { .. } => "unauthorized_client",
            Self::UnsupportedResponseType { .. } => "unsupported_response_type",
            Self::UnsupportedGrantType { .. } => "unsupported_grant_type",
            Self::InvalidScope { .. } => "invalid_scope",
            Self::AccessDenied { .. } => "access_denied",
            Self::AuthorizationPending => "authorization_pending",
            Self::ExpiredToken => "expired_token",
            Self::LoginRequired { .. } => "login_required",
            Self::InteractionRequired { .. } => "interaction_required",
            Self::InvalidRequestObject { .. } => "invalid_request_object",
            Self::SessionMismatch { .. } => "access_denied",
            Self::InvalidToken { .. } => "invalid_token",
            Self::InsufficientScope { .. } => "insufficient_scope",
            Self::NotFound { .. } => "not_found",
            Self::Storage { .. } => "server_error",
            Self::Configuration { .. } => "server_error",
            Self::Internal { .. } => "server_error",
        }
    }

    /// Returns the human-readable description surfaced as `error_description`.
    ///
    /// Restricted to the printable ASCII subset mandated by RFC 6749
    /// (`%x20-21 / %x23-5B / %x5D-7E`).
    #[must_use]
    pub fn error_description(&self) -> String {
        let raw = match self {
            Self::InvalidRequest { message }
            | Self::InvalidClient { message }
            | Self::InvalidGrant { message }
            | Self::UnauthorizedClient { message }
            | Self::UnsupportedResponseType { message }
            | Self::InvalidScope { message }
            | Self::AccessDenied { message }
            | Self::LoginRequired { message }
            | Self::InteractionRequired { message }
            | Self::InvalidRequestObject { message }
            | Self::SessionMismatch { message }
            | Self::InvalidToken { message }
            | Self::InsufficientScope { message }
            | Self::NotFound { message }
            | Self::Storage { message }
            | Self::Configuration { message }
            | Self::Internal { message } => message.clone(),
            Self::UnsupportedGrantType { grant_type } => {
                format!("token request grant_type is unsupported ({grant_type})")
            }
            Self::AuthorizationPending => {
                "The authorization request is still pending as the end-user hasn't yet been authenticated".to_string()
            }
            Self::ExpiredToken => {
                "The auth_req_id has expired. The Client will need to make a new Authentication Request.".to_string()
            }
        };
        sanitize_error_description(&raw)
    }

    /// Returns the HTTP status code mandated for this error.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient { .. } | Self::SessionMismatch { .. } | Self::InvalidToken { .. } => 401,
            Self::InsufficientScope { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. } => 500,
            _ => 400,
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.http_status() < 500
    }

    /// Returns `true` if this error may be delivered via redirect once the
    /// redirect URI has been validated against the client registration.
    #[must_use]
    pub fn is_redirectable(&self) -> bool {
        matches!(
            self,
            Self::InvalidRequest { .. }
                | Self::UnauthorizedClient { .. }
                | Self::UnsupportedResponseType { .. }
                | Self::InvalidScope { .. }
                | Self::AccessDenied { .. }
                | Self::LoginRequired { .. }
                | Self::InteractionRequired { .. }
                | Self::InvalidRequestObject { .. }
        )
    }

    /// Returns the error category for logging and monitoring.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidClient { .. } | Self::SessionMismatch { .. } => ErrorCategory::Authentication,
            Self::InvalidGrant { .. } | Self::InvalidToken { .. } | Self::ExpiredToken => {
                ErrorCategory::Token
            }
            Self::InvalidScope { .. }
            | Self::AccessDenied { .. }
            | Self::UnauthorizedClient { .. }
            | Self::InsufficientScope { .. } => ErrorCategory::Authorization,
            Self::InvalidRequest { .. }
            | Self::UnsupportedResponseType { .. }
            | Self::UnsupportedGrantType { .. }
            | Self::InvalidRequestObject { .. }
            | Self::NotFound { .. } => ErrorCategory::Validation,
            Self::AuthorizationPending | Self::LoginRequired { .. } | Self::InteractionRequired { .. } => {
                ErrorCategory::Interaction
            }
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Replaces characters outside the RFC 6749 `error_description` charset.
///
/// The allowed set is `%x20-21 / %x23-5B / %x5D-7E` (printable ASCII minus
/// `"` and `\`).
#[must_use]
pub fn sanitize_error_description(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\u{20}'..='\u{21}' | '\u{23}'..='\u{5B}' | '\u{5D}'..='\u{7E}' => c,
            _ => ' ',
        })
        .collect()
}

/// Categories of errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity verification failures.
    Authentication,
    /// Permission and consent failures.
    Authorization,
    /// Token validation failures.
    Token,
    /// Request validation failures.
    Validation,
    /// Pending or required user interaction.
    Interaction,
    /// Storage failures.
    Infrastructure,
    /// Configuration failures.
    Configuration,
    /// Unexpected internal failures.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Token => write!(f, "token"),
            Self::Validation => write!(f, "validation"),
            Self::Interaction => write!(f, "interaction"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_error_code() {
        assert_eq!(
            OidcError::invalid_request("x").oauth_error_code(),
            "invalid_request"
        );
        assert_eq!(
            OidcError::invalid_client("x").oauth_error_code(),
            "invalid_client"
        );
        assert_eq!(
            OidcError::AuthorizationPending.oauth_error_code(),
            "authorization_pending"
        );
        assert_eq!(OidcError::ExpiredToken.oauth_error_code(), "expired_token");
        assert_eq!(
            OidcError::login_required("x").oauth_error_code(),
            "login_required"
        );
    }

    #[test]
    fn test_http_status() {
        assert_eq!(OidcError::invalid_request("x").http_status(), 400);
        assert_eq!(OidcError::invalid_client("x").http_status(), 401);
        assert_eq!(OidcError::session_mismatch("x").http_status(), 401);
        assert_eq!(OidcError::not_found("x").http_status(), 404);
        assert_eq!(OidcError::storage("x").http_status(), 500);
    }

    #[test]
    fn test_session_mismatch_description() {
        let err = OidcError::session_mismatch("AUTH_SESSION cookie is missing");
        assert!(err.error_description().contains("auth_session_mismatch"));
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn test_denied_by_resource_owner_message() {
        let err = OidcError::denied_by_resource_owner();
        assert_eq!(
            err.error_description(),
            "The resource owner or authorization server denied the request."
        );
    }

    #[test]
    fn test_sanitize_error_description() {
        assert_eq!(sanitize_error_description("plain ascii"), "plain ascii");
        assert_eq!(sanitize_error_description("quote\"back\\slash"), "quote back slash");
        assert_eq!(sanitize_error_description("caf\u{e9}"), "caf ");
    }

    #[test]
    fn test_redirectable() {
        assert!(OidcError::invalid_scope("x").is_redirectable());
        assert!(OidcError::denied_by_resource_owner().is_redirectable());
        assert!(!OidcError::invalid_client("x").is_redirectable());
        assert!(!OidcError::session_mismatch("x").is_redirectable());
    }
}
