//! Authorization endpoint: request validation, transaction lifecycle,
//! response construction.

pub mod client_auth;
pub mod pkce;
pub mod request;
pub mod request_object;
pub mod response;
pub mod service;
pub mod transaction;

pub use request::{AuthorizationRequestParams, Display, Prompt};
pub use response::{ResponseMode, redirect_error_url, redirect_success_url};
pub use service::{
    AuthorizationConfig, AuthorizationService, AuthorizationStart, AuthorizeGrant,
    AuthorizeStartError, ViewData,
};
pub use transaction::{
    AuthorizationTransaction, InteractionResult, RequestObjectOrigin, TransactionStatus,
};
