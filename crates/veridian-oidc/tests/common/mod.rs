//! Shared fixtures for the end-to-end scenario tests.

#![allow(dead_code)]

use std::sync::Arc;

use time::OffsetDateTime;
use veridian_memory::{
    InMemoryCibaRequestStorage, InMemoryClientStorage, InMemoryConsentStorage,
    InMemoryOpSessionStorage, InMemoryRefreshTokenStorage, InMemoryTransactionStorage,
    InMemoryUserStorage,
};
use veridian_oidc::ciba::CibaService;
use veridian_oidc::config::IdpConfig;
use veridian_oidc::events::{SecurityEventSink, TracingEventSink};
use veridian_oidc::interaction::{
    DeviceApproveInteractor, DeviceDenyInteractor, InteractionEngine, PasswordInteractor,
};
use veridian_oidc::oauth::client_auth::ClientCredentials;
use veridian_oidc::oauth::{AuthorizationRequestParams, AuthorizationService};
use veridian_oidc::storage::{
    CibaRequestStorage, ClientStorage, ConsentStorage, OpSessionStorage, RefreshTokenStorage,
    TransactionStorage, UserStorage,
};
use veridian_oidc::token::jwt::JwtCodec;
use veridian_oidc::token::service::{TokenRequest, TokenService};
use veridian_oidc::types::{
    CibaDeliveryMode, Client, GrantType, ResponseTypeSet, TokenEndpointAuthMethod, User,
};

pub const TENANT: &str = "tenant-1";
pub const CLIENT_ID: &str = "client-1";
pub const CLIENT_SECRET: &str = "client-1-secret";
pub const REDIRECT_URI: &str = "https://rp.example.com/cb";
pub const USERNAME: &str = "ichiro";
pub const PASSWORD: &str = "correct horse";
pub const SUB: &str = "user-1";
pub const DEVICE_ID: &str = "device-1";

pub struct Harness {
    pub authorization: AuthorizationService,
    pub token: TokenService,
    pub ciba: CibaService,
    pub jwt: Arc<JwtCodec>,
    pub clients: Arc<dyn ClientStorage>,
    pub users: Arc<dyn UserStorage>,
    pub transactions: Arc<dyn TransactionStorage>,
    pub ciba_requests: Arc<dyn CibaRequestStorage>,
}

/// Builds a fully wired service stack over in-memory storage, seeded with
/// one confidential client and one user.
pub async fn harness() -> Harness {
    let clients: Arc<dyn ClientStorage> = Arc::new(InMemoryClientStorage::new());
    let users: Arc<dyn UserStorage> = Arc::new(InMemoryUserStorage::new());
    let transactions: Arc<dyn TransactionStorage> = Arc::new(InMemoryTransactionStorage::new());
    let op_sessions: Arc<dyn OpSessionStorage> = Arc::new(InMemoryOpSessionStorage::new());
    let consents: Arc<dyn ConsentStorage> = Arc::new(InMemoryConsentStorage::new());
    let refresh_tokens: Arc<dyn RefreshTokenStorage> = Arc::new(InMemoryRefreshTokenStorage::new());
    let ciba_requests: Arc<dyn CibaRequestStorage> = Arc::new(InMemoryCibaRequestStorage::new());
    let event_sink: Arc<dyn SecurityEventSink> = Arc::new(TracingEventSink);

    let config = IdpConfig::default();
    let jwt = Arc::new(JwtCodec::generate(&config.issuer).expect("key generation"));

    let engine = Arc::new(
        InteractionEngine::new(event_sink.clone())
            .register(Arc::new(PasswordInteractor::new(users.clone())))
            .register(Arc::new(DeviceApproveInteractor::new(users.clone())))
            .register(Arc::new(DeviceDenyInteractor)),
    );

    let authorization = AuthorizationService::new(
        clients.clone(),
        transactions.clone(),
        op_sessions,
        consents,
        engine,
        event_sink.clone(),
        jwt.clone(),
        config.token_config(),
        config.authorization_config(),
    );
    let token = TokenService::new(
        clients.clone(),
        transactions.clone(),
        refresh_tokens,
        ciba_requests.clone(),
        users.clone(),
        event_sink.clone(),
        jwt.clone(),
        config.token_config(),
    );
    let ciba = CibaService::new(
        clients.clone(),
        users.clone(),
        ciba_requests.clone(),
        transactions.clone(),
        event_sink,
        config.ciba_config(),
    );

    clients
        .save(TENANT, test_client())
        .await
        .expect("client seed");
    users
        .create(TENANT, test_user(), PASSWORD)
        .await
        .expect("user seed");

    Harness {
        authorization,
        token,
        ciba,
        jwt,
        clients,
        users,
        transactions,
        ciba_requests,
    }
}

pub fn test_client() -> Client {
    Client {
        client_id: CLIENT_ID.to_string(),
        client_secret: Some(CLIENT_SECRET.to_string()),
        name: "Test Client".to_string(),
        token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretPost,
        grant_types: vec![
            GrantType::AuthorizationCode,
            GrantType::RefreshToken,
            GrantType::Ciba,
        ],
        response_types: vec![
            ResponseTypeSet::parse("code").unwrap(),
            ResponseTypeSet::parse("code id_token").unwrap(),
            ResponseTypeSet::parse("token id_token").unwrap(),
        ],
        redirect_uris: vec![REDIRECT_URI.to_string()],
        scopes: vec![
            "openid".to_string(),
            "profile".to_string(),
            "email".to_string(),
        ],
        acr_values: Vec::new(),
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

pub fn test_user() -> User {
    User {
        sub: SUB.to_string(),
        username: USERNAME.to_string(),
        name: Some("Ichiro Suzuki".to_string()),
        email: Some("ichiro@example.com".to_string()),
        email_verified: true,
        phone_number: Some("+81312345678".to_string()),
        authentication_devices: vec![DEVICE_ID.to_string()],
        active: true,
        created_at: OffsetDateTime::now_utc(),
    }
}

/// Authorization request parameters for a plain code flow.
pub fn code_params() -> AuthorizationRequestParams {
    AuthorizationRequestParams {
        response_type: Some("code".to_string()),
        client_id: Some(CLIENT_ID.to_string()),
        redirect_uri: Some(REDIRECT_URI.to_string()),
        scope: Some("openid profile".to_string()),
        state: Some("af0ifjsldkj".to_string()),
        nonce: Some("n-0S6_WzA2Mj".to_string()),
        ..AuthorizationRequestParams::default()
    }
}

/// Token request credentials for the seeded client.
pub fn client_credentials() -> ClientCredentials {
    ClientCredentials {
        client_id: Some(CLIENT_ID.to_string()),
        client_secret: Some(CLIENT_SECRET.to_string()),
        basic: None,
        certificate_thumbprint: None,
    }
}

/// A code-exchange token request.
pub fn code_exchange(code: &str) -> TokenRequest {
    TokenRequest {
        grant_type: Some("authorization_code".to_string()),
        code: Some(code.to_string()),
        redirect_uri: Some(REDIRECT_URI.to_string()),
        ..TokenRequest::default()
    }
}

/// Extracts a query parameter from a redirect URI.
pub fn query_param(uri: &str, name: &str) -> Option<String> {
    let url = url::Url::parse(uri).expect("redirect uri parses");
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Extracts a fragment parameter from a redirect URI.
pub fn fragment_param(uri: &str, name: &str) -> Option<String> {
    let url = url::Url::parse(uri).expect("redirect uri parses");
    let fragment = url.fragment()?;
    fragment.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (k == name).then(|| {
            url::form_urlencoded::parse(v.as_bytes())
                .map(|(decoded, _)| decoded.into_owned())
                .next()
                .unwrap_or_else(|| v.to_string())
        })
    })
}
