//! # veridian-oidc
//!
//! OAuth 2.0 / OpenID Connect authorization server core for Veridian.
//!
//! This crate provides:
//! - Authorization request lifecycle (front-channel and backchannel)
//! - Pluggable end-user authentication interactions with policy evaluation
//! - OP session management and single sign-on
//! - CIBA backchannel authentication with authentication devices
//! - Token issuance, introspection, and revocation
//! - Per-tenant client and user registries behind storage traits
//!
//! ## Modules
//!
//! - [`config`] - Provider configuration
//! - [`oauth`] - Authorization request handling and client authentication
//! - [`interaction`] - Authentication interaction engine and interactors
//! - [`session`] - OP sessions and SSO checks
//! - [`ciba`] - Client-initiated backchannel authentication
//! - [`token`] - Token issuance, JWT codec, introspection, revocation
//! - [`policy`] - Authentication policies and success conditions
//! - [`storage`] - Storage traits for protocol state
//! - [`events`] - Security event recording
//! - [`http`] - Axum handlers for the protocol endpoints

pub mod ciba;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod interaction;
pub mod oauth;
pub mod policy;
pub mod random;
pub mod session;
pub mod storage;
pub mod token;
pub mod types;

pub use ciba::{CibaService, CibaStatus};
pub use config::IdpConfig;
pub use error::{ErrorCategory, OidcError};
pub use events::{SecurityEvent, SecurityEventSink, SecurityEventType, TracingEventSink};
pub use interaction::{InteractionEngine, InteractionOutcome, InteractionStatus, InteractionType};
pub use oauth::service::{AuthorizationConfig, AuthorizationService, AuthorizationStart};
pub use policy::{AuthenticationPolicy, AuthenticationPolicySet};
pub use session::{AUTH_SESSION_COOKIE, OP_SESSION_COOKIE, OpSession};
pub use token::jwt::JwtCodec;
pub use token::service::{TokenConfig, TokenService};
pub use types::{Client, GrantType, ResponseType, ResponseTypeSet, User};
