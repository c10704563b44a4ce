//! Demo tenant seeding for development setups.

use time::OffsetDateTime;
use veridian_oidc::error::OidcError;
use veridian_oidc::storage::{ClientStorage, UserStorage};
use veridian_oidc::types::{
    CibaDeliveryMode, Client, GrantType, ResponseTypeSet, TokenEndpointAuthMethod, User,
};

/// Tenant seeded at startup when `seed_demo_data` is on.
pub const DEMO_TENANT: &str = "demo";

/// Registers the demo client and user.
pub async fn seed_demo_tenant(
    clients: &dyn ClientStorage,
    users: &dyn UserStorage,
) -> Result<(), OidcError> {
    let client = Client {
        client_id: "demo-client".to_string(),
        client_secret: Some("demo-secret".to_string()),
        name: "Demo Client".to_string(),
        token_endpoint_auth_method: TokenEndpointAuthMethod::ClientSecretPost,
        grant_types: vec![
            GrantType::AuthorizationCode,
            GrantType::RefreshToken,
            GrantType::Ciba,
        ],
        response_types: vec![
            ResponseTypeSet::parse("code").expect("static response type"),
            ResponseTypeSet::parse("code id_token").expect("static response type"),
        ],
        redirect_uris: vec!["http://localhost:3000/callback".to_string()],
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
    };
    clients.save(DEMO_TENANT, client).await?;

    let user = User {
        sub: "demo-user".to_string(),
        username: "demo".to_string(),
        name: Some("Demo User".to_string()),
        email: Some("demo@example.com".to_string()),
        email_verified: true,
        phone_number: Some("+15555550100".to_string()),
        authentication_devices: vec!["demo-device".to_string()],
        active: true,
        created_at: OffsetDateTime::now_utc(),
    };
    users.create(DEMO_TENANT, user, "demo-password").await?;

    tracing::info!(tenant = DEMO_TENANT, "demo tenant seeded");
    Ok(())
}
