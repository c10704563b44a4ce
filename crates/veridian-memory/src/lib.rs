//! # veridian-memory
//!
//! In-memory implementations of the `veridian-oidc` storage traits, backed
//! by `DashMap` for concurrent access. Suitable for development, tests, and
//! single-node deployments; state is lost on restart.
//!
//! The single-use guarantees (authorization codes, refresh tokens, granted
//! backchannel requests) are enforced with atomic map operations so that
//! concurrent consumers observe exactly one success.

pub mod ciba;
pub mod client;
pub mod consent;
pub mod interaction_context;
pub mod op_session;
pub mod refresh_token;
pub mod revoked_token;
pub mod transaction;
pub mod user;

pub use ciba::InMemoryCibaRequestStorage;
pub use client::InMemoryClientStorage;
pub use consent::InMemoryConsentStorage;
pub use interaction_context::InMemoryInteractionContextStorage;
pub use op_session::InMemoryOpSessionStorage;
pub use refresh_token::InMemoryRefreshTokenStorage;
pub use revoked_token::InMemoryRevokedTokenStorage;
pub use transaction::InMemoryTransactionStorage;
pub use user::InMemoryUserStorage;

/// Composite key of tenant identifier plus an entity identifier.
pub(crate) type TenantKey = (String, String);

pub(crate) fn tenant_key(tenant_id: &str, id: &str) -> TenantKey {
    (tenant_id.to_string(), id.to_string())
}
