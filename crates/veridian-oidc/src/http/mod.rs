//! HTTP handlers for the protocol endpoints.
//!
//! Each endpoint file carries its handler and a small `*State` struct; the
//! server assembles them into one router with [`router`].

pub mod authorization;
pub mod ciba;
pub mod device;
pub mod error;
pub mod introspect;
pub mod jwks;
pub mod revoke;
pub mod token;
pub mod userinfo;

use axum::Router;
use axum::routing::{get, post};

pub use authorization::AuthorizationState;
pub use ciba::BackchannelState;
pub use device::DeviceState;
pub use introspect::IntrospectionState;
pub use jwks::JwksState;
pub use revoke::RevocationState;
pub use token::TokenState;
pub use userinfo::UserinfoState;

/// Builds the protocol router. All routes are tenant-scoped under
/// `/{tenant_id}/v1`.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn router(
    authorization: AuthorizationState,
    token: TokenState,
    introspection: IntrospectionState,
    revocation: RevocationState,
    backchannel: BackchannelState,
    device: DeviceState,
    jwks: JwksState,
    userinfo: UserinfoState,
) -> Router {
    Router::new()
        .route(
            "/{tenant_id}/v1/authorizations",
            get(authorization::authorize_handler).post(authorization::authorize_post_handler),
        )
        .route(
            "/{tenant_id}/v1/authorizations/{id}/view-data",
            get(authorization::view_data_handler),
        )
        .route(
            "/{tenant_id}/v1/authorizations/{id}/authorize",
            post(authorization::authorize_action_handler),
        )
        .route(
            "/{tenant_id}/v1/authorizations/{id}/authorize-with-session",
            post(authorization::authorize_with_session_handler),
        )
        .route(
            "/{tenant_id}/v1/authorizations/{id}/deny",
            post(authorization::deny_handler),
        )
        .route(
            "/{tenant_id}/v1/authorizations/{id}/{interaction}",
            post(authorization::interaction_handler),
        )
        .with_state(authorization)
        .merge(
            Router::new()
                .route("/{tenant_id}/v1/tokens", post(token::token_handler))
                .with_state(token),
        )
        .merge(
            Router::new()
                .route(
                    "/{tenant_id}/v1/tokens/introspection",
                    post(introspect::introspection_handler),
                )
                .with_state(introspection),
        )
        .merge(
            Router::new()
                .route(
                    "/{tenant_id}/v1/tokens/revocation",
                    post(revoke::revoke_handler),
                )
                .with_state(revocation),
        )
        .merge(
            Router::new()
                .route(
                    "/{tenant_id}/v1/backchannel/authentications",
                    post(ciba::backchannel_handler),
                )
                .with_state(backchannel),
        )
        .merge(
            Router::new()
                .route(
                    "/{tenant_id}/v1/authentication-devices/{device_id}/backchannel/authentications",
                    get(device::pending_requests_handler),
                )
                .route(
                    "/{tenant_id}/v1/authentication-devices/{device_id}/backchannel/authentications/{auth_req_id}",
                    post(device::decision_handler),
                )
                .with_state(device),
        )
        .merge(
            Router::new()
                .route("/{tenant_id}/v1/jwks", get(jwks::jwks_handler))
                .with_state(jwks),
        )
        .merge(
            Router::new()
                .route(
                    "/{tenant_id}/v1/userinfo",
                    get(userinfo::userinfo_handler).post(userinfo::userinfo_handler),
                )
                .with_state(userinfo),
        )
}
