//! Service construction and router assembly.

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use veridian_memory::{
    InMemoryCibaRequestStorage, InMemoryClientStorage, InMemoryConsentStorage,
    InMemoryInteractionContextStorage, InMemoryOpSessionStorage, InMemoryRefreshTokenStorage,
    InMemoryRevokedTokenStorage, InMemoryTransactionStorage, InMemoryUserStorage,
};
use veridian_oidc::ciba::CibaService;
use veridian_oidc::events::{SecurityEventSink, TracingEventSink};
use veridian_oidc::http::{
    self, AuthorizationState, BackchannelState, DeviceState, IntrospectionState, JwksState,
    RevocationState, TokenState, UserinfoState,
};
use veridian_oidc::interaction::{
    DeviceApproveInteractor, DeviceDenyInteractor, EmailChallengeInteractor,
    EmailVerificationInteractor, Fido2AuthenticationInteractor, Fido2ChallengeInteractor,
    FidoUafChallengeInteractor, FidoUafRegistrationChallengeInteractor,
    FidoUafRegistrationInteractor, FidoUafVerificationInteractor, InitialRegistrationInteractor,
    InteractionEngine, PasswordInteractor, SmsChallengeInteractor, SmsVerificationInteractor,
    TracingOtpGateway,
};
use veridian_oidc::oauth::service::AuthorizationService;
use veridian_oidc::storage::{
    CibaRequestStorage, ClientStorage, ConsentStorage, InteractionContextStorage, OpSessionStorage,
    RefreshTokenStorage, RevokedTokenStorage, TransactionStorage, UserStorage,
};
use veridian_oidc::token::introspection::IntrospectionService;
use veridian_oidc::token::jwt::JwtCodec;
use veridian_oidc::token::revocation::RevocationService;
use veridian_oidc::token::service::TokenService;

use crate::config::ServerConfig;
use crate::gateways::EchoFidoGateway;
use crate::seed;

/// Builds the application router from configuration, wiring every service
/// to the in-memory storage backends.
pub async fn build(config: &ServerConfig) -> anyhow::Result<Router> {
    let client_storage: Arc<dyn ClientStorage> = Arc::new(InMemoryClientStorage::new());
    let user_storage: Arc<dyn UserStorage> = Arc::new(InMemoryUserStorage::new());
    let transaction_storage: Arc<dyn TransactionStorage> =
        Arc::new(InMemoryTransactionStorage::new());
    let op_session_storage: Arc<dyn OpSessionStorage> = Arc::new(InMemoryOpSessionStorage::new());
    let consent_storage: Arc<dyn ConsentStorage> = Arc::new(InMemoryConsentStorage::new());
    let refresh_token_storage: Arc<dyn RefreshTokenStorage> =
        Arc::new(InMemoryRefreshTokenStorage::new());
    let revoked_storage: Arc<dyn RevokedTokenStorage> = Arc::new(InMemoryRevokedTokenStorage::new());
    let ciba_storage: Arc<dyn CibaRequestStorage> = Arc::new(InMemoryCibaRequestStorage::new());
    let context_storage: Arc<dyn InteractionContextStorage> =
        Arc::new(InMemoryInteractionContextStorage::new());

    if config.seed_demo_data {
        seed::seed_demo_tenant(client_storage.as_ref(), user_storage.as_ref()).await?;
    }

    let event_sink: Arc<dyn SecurityEventSink> = Arc::new(TracingEventSink);
    let jwt = Arc::new(JwtCodec::generate(&config.idp.issuer)?);

    let otp_gateway = Arc::new(TracingOtpGateway);
    let fido_gateway = Arc::new(EchoFidoGateway);
    let engine = Arc::new(
        InteractionEngine::new(event_sink.clone())
            .register(Arc::new(PasswordInteractor::new(user_storage.clone())))
            .register(Arc::new(InitialRegistrationInteractor::new(
                user_storage.clone(),
            )))
            .register(Arc::new(EmailChallengeInteractor::new(
                context_storage.clone(),
                otp_gateway.clone(),
            )))
            .register(Arc::new(EmailVerificationInteractor::new(
                user_storage.clone(),
                context_storage.clone(),
            )))
            .register(Arc::new(SmsChallengeInteractor::new(
                context_storage.clone(),
                otp_gateway,
            )))
            .register(Arc::new(SmsVerificationInteractor::new(
                user_storage.clone(),
                context_storage.clone(),
            )))
            .register(Arc::new(FidoUafChallengeInteractor::new(
                context_storage.clone(),
                fido_gateway.clone(),
            )))
            .register(Arc::new(FidoUafVerificationInteractor::new(
                user_storage.clone(),
                context_storage.clone(),
                fido_gateway.clone(),
            )))
            .register(Arc::new(FidoUafRegistrationChallengeInteractor::new(
                context_storage.clone(),
                fido_gateway.clone(),
            )))
            .register(Arc::new(FidoUafRegistrationInteractor::new(
                user_storage.clone(),
                context_storage.clone(),
                fido_gateway.clone(),
            )))
            .register(Arc::new(Fido2ChallengeInteractor::new(
                context_storage.clone(),
                fido_gateway.clone(),
            )))
            .register(Arc::new(Fido2AuthenticationInteractor::new(
                user_storage.clone(),
                context_storage,
                fido_gateway,
            )))
            .register(Arc::new(DeviceApproveInteractor::new(user_storage.clone())))
            .register(Arc::new(DeviceDenyInteractor)),
    );

    let authorization = Arc::new(AuthorizationService::new(
        client_storage.clone(),
        transaction_storage.clone(),
        op_session_storage,
        consent_storage,
        engine,
        event_sink.clone(),
        jwt.clone(),
        config.idp.token_config(),
        config.idp.authorization_config(),
    ));
    let token = Arc::new(TokenService::new(
        client_storage.clone(),
        transaction_storage.clone(),
        refresh_token_storage.clone(),
        ciba_storage.clone(),
        user_storage.clone(),
        event_sink.clone(),
        jwt.clone(),
        config.idp.token_config(),
    ));
    let ciba = Arc::new(CibaService::new(
        client_storage.clone(),
        user_storage.clone(),
        ciba_storage,
        transaction_storage,
        event_sink.clone(),
        config.idp.ciba_config(),
    ));
    let introspection = Arc::new(IntrospectionService::new(jwt.clone(), revoked_storage.clone()));
    let revocation = Arc::new(RevocationService::new(
        jwt.clone(),
        refresh_token_storage,
        revoked_storage.clone(),
        event_sink,
    ));

    let router = http::router(
        AuthorizationState::new(authorization.clone(), config.secure_cookies),
        TokenState::new(token),
        IntrospectionState {
            service: introspection,
            client_storage: client_storage.clone(),
        },
        RevocationState {
            service: revocation,
            client_storage,
        },
        BackchannelState::new(ciba.clone()),
        DeviceState {
            ciba,
            authorization,
            device_secret: config.device_secret.clone(),
        },
        JwksState::new(jwt.clone()),
        UserinfoState {
            jwt,
            user_storage,
            revoked: revoked_storage,
        },
    );
    Ok(router.layer(TraceLayer::new_for_http()))
}
