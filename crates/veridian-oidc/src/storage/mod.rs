//! Storage abstractions.
//!
//! Every persistent concern sits behind an async trait so backends can be
//! swapped (in-memory for tests and development, a database in production).
//! All methods return `Result` with storage failures mapped to
//! `OidcError::Storage`.

pub mod ciba;
pub mod client;
pub mod consent;
pub mod interaction_context;
pub mod op_session;
pub mod refresh_token;
pub mod revoked_token;
pub mod transaction;
pub mod user;

pub use ciba::CibaRequestStorage;
pub use client::ClientStorage;
pub use consent::{ConsentRecord, ConsentStorage};
pub use interaction_context::InteractionContextStorage;
pub use op_session::OpSessionStorage;
pub use refresh_token::{RefreshTokenRecord, RefreshTokenStorage};
pub use revoked_token::RevokedTokenStorage;
pub use transaction::TransactionStorage;
pub use user::{UserLookup, UserStorage};
