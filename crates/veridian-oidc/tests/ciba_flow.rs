//! CIBA backchannel authentication scenarios.

mod common;

use common::*;
use serde_json::json;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;
use veridian_oidc::ciba::{
    BackchannelAuthenticationParams, BackchannelAuthenticationRequest, CibaStatus,
};
use veridian_oidc::interaction::{InteractionStatus, InteractionType};
use veridian_oidc::oauth::AuthorizationStart;
use veridian_oidc::policy::{
    AuthenticationPolicy, AuthenticationPolicySet, ConditionLeaf, ConditionOperation,
    PolicyConditions, SuccessConditions,
};
use veridian_oidc::token::jwt::IdTokenClaims;
use veridian_oidc::token::service::TokenRequest;
use veridian_oidc::types::CibaDeliveryMode;

const CIBA_GRANT: &str = "urn:openid:params:grant-type:ciba";

/// Policy satisfied by either a password sign-in or a device approval.
fn device_policy_set() -> AuthenticationPolicySet {
    let any_of = vec![
        vec![ConditionLeaf {
            path: "$.password-authentication.success_count".to_string(),
            value_type: "integer".to_string(),
            operation: ConditionOperation::Gte,
            value: 1,
        }],
        vec![ConditionLeaf {
            path: "$.authentication-device.success_count".to_string(),
            value_type: "integer".to_string(),
            operation: ConditionOperation::Gte,
            value: 1,
        }],
    ];
    AuthenticationPolicySet {
        enabled: true,
        policies: vec![AuthenticationPolicy {
            description: Some("password or device approval".to_string()),
            priority: 10,
            conditions: PolicyConditions::default(),
            available_methods: Vec::new(),
            success_conditions: SuccessConditions { any_of },
        }],
    }
}

/// Registers the seeded client with the device-approval policy.
async fn enable_device_policy(h: &Harness) {
    let mut client = test_client();
    client.authentication_policies = Some(device_policy_set());
    h.clients.save(TENANT, client).await.unwrap();
}

fn ciba_params() -> BackchannelAuthenticationParams {
    BackchannelAuthenticationParams {
        scope: Some("openid profile".to_string()),
        login_hint: Some(USERNAME.to_string()),
        binding_message: Some("W4SCT".to_string()),
        user_code: None,
        requested_expiry: None,
    }
}

fn poll(auth_req_id: &str) -> TokenRequest {
    TokenRequest {
        grant_type: Some(CIBA_GRANT.to_string()),
        auth_req_id: Some(auth_req_id.to_string()),
        ..TokenRequest::default()
    }
}

#[tokio::test]
async fn approved_request_yields_tokens_exactly_once() {
    let h = harness().await;
    enable_device_policy(&h).await;

    let response = h
        .ciba
        .request(TENANT, ciba_params(), client_credentials())
        .await
        .expect("backchannel request accepted");
    assert_eq!(response.auth_req_id.len(), 43);
    assert_eq!(response.interval, 5);

    // Polling before the user decided reports authorization_pending.
    let err = h
        .token
        .handle(TENANT, poll(&response.auth_req_id), client_credentials())
        .await
        .expect_err("still pending");
    assert_eq!(err.oauth_error_code(), "authorization_pending");
    assert_eq!(err.http_status(), 400);

    // The device sees the request and approves it.
    let pending = h.ciba.pending_for_device(TENANT, DEVICE_ID).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].binding_message.as_deref(), Some("W4SCT"));

    let (outcome, satisfied) = h
        .authorization
        .submit_device_interaction(
            TENANT,
            pending[0].transaction_id,
            InteractionType::AuthenticationDeviceApprove,
            &json!({"device_id": DEVICE_ID}),
        )
        .await
        .expect("device approval runs");
    assert_eq!(outcome.status, InteractionStatus::Success);
    assert!(satisfied);
    h.ciba
        .settle(TENANT, &response.auth_req_id, CibaStatus::Granted)
        .await
        .unwrap();

    let tokens = h
        .token
        .handle(TENANT, poll(&response.auth_req_id), client_credentials())
        .await
        .expect("granted request issues tokens");
    let id_token: IdTokenClaims = h.jwt.decode(&tokens.id_token.unwrap()).unwrap();
    assert_eq!(id_token.sub, SUB);
    assert!(
        id_token
            .amr
            .unwrap_or_default()
            .iter()
            .any(|amr| amr == "user_approval")
    );

    // The grant is consumed; a second poll fails.
    let err = h
        .token
        .handle(TENANT, poll(&response.auth_req_id), client_credentials())
        .await
        .expect_err("grant already consumed");
    assert_eq!(err.oauth_error_code(), "invalid_grant");
    assert_eq!(
        err.error_description(),
        format!("auth_req_id is already used ({})", response.auth_req_id)
    );
}

#[tokio::test]
async fn denied_request_reports_access_denied() {
    let h = harness().await;
    enable_device_policy(&h).await;

    let response = h
        .ciba
        .request(TENANT, ciba_params(), client_credentials())
        .await
        .unwrap();
    let pending = h.ciba.pending_for_device(TENANT, DEVICE_ID).await.unwrap();

    let (outcome, _) = h
        .authorization
        .submit_device_interaction(
            TENANT,
            pending[0].transaction_id,
            InteractionType::AuthenticationDeviceDeny,
            &json!({"device_id": DEVICE_ID}),
        )
        .await
        .unwrap();
    assert_eq!(outcome.status, InteractionStatus::Deny);
    h.ciba
        .settle(TENANT, &response.auth_req_id, CibaStatus::Denied)
        .await
        .unwrap();

    let err = h
        .token
        .handle(TENANT, poll(&response.auth_req_id), client_credentials())
        .await
        .expect_err("denied request");
    assert_eq!(err.oauth_error_code(), "access_denied");
    assert_eq!(err.http_status(), 400);

    // Settled requests no longer appear on the device.
    assert!(
        h.ciba
            .pending_for_device(TENANT, DEVICE_ID)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn push_mode_client_must_not_poll() {
    let h = harness().await;
    let mut client = test_client();
    client.backchannel_token_delivery_mode = CibaDeliveryMode::Push;
    h.clients.save(TENANT, client).await.unwrap();

    let response = h
        .ciba
        .request(TENANT, ciba_params(), client_credentials())
        .await
        .unwrap();

    let err = h
        .token
        .handle(TENANT, poll(&response.auth_req_id), client_credentials())
        .await
        .expect_err("push clients never poll");
    assert_eq!(err.oauth_error_code(), "unauthorized_client");
    assert_eq!(
        err.error_description(),
        "backchannel delivery mode is push. token request must not allowed"
    );
}

#[tokio::test]
async fn expired_request_reports_expired_token() {
    let h = harness().await;
    let now = OffsetDateTime::now_utc();
    let request = BackchannelAuthenticationRequest {
        auth_req_id: "expired-auth-req".to_string(),
        tenant_id: TENANT.to_string(),
        client_id: CLIENT_ID.to_string(),
        scopes: vec!["openid".to_string()],
        sub: SUB.to_string(),
        device_id: Some(DEVICE_ID.to_string()),
        binding_message: None,
        user_code: None,
        transaction_id: Uuid::new_v4(),
        status: CibaStatus::Pending,
        interval: 5,
        created_at: now - Duration::minutes(10),
        expires_at: now - Duration::minutes(5),
    };
    h.ciba_requests.create(&request).await.unwrap();

    let err = h
        .token
        .handle(TENANT, poll(&request.auth_req_id), client_credentials())
        .await
        .expect_err("lifetime has elapsed");
    assert_eq!(err.oauth_error_code(), "expired_token");
    assert_eq!(err.http_status(), 400);

    // Expired requests no longer appear on the device either.
    assert!(
        h.ciba
            .pending_for_device(TENANT, DEVICE_ID)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn user_code_is_required_when_registered() {
    let h = harness().await;
    let mut client = test_client();
    client.backchannel_user_code_parameter = true;
    h.clients.save(TENANT, client).await.unwrap();

    let err = h
        .ciba
        .request(TENANT, ciba_params(), client_credentials())
        .await
        .expect_err("registration demands a user code");
    assert_eq!(err.oauth_error_code(), "invalid_request");
    assert_eq!(
        err.error_description(),
        "backchannel authentication request must contains user_code"
    );

    let mut params = ciba_params();
    params.user_code = Some("731945".to_string());
    h.ciba
        .request(TENANT, params, client_credentials())
        .await
        .expect("user code satisfies the registration");
}

#[tokio::test]
async fn companion_transaction_view_hides_cancel() {
    let h = harness().await;
    enable_device_policy(&h).await;

    h.ciba
        .request(TENANT, ciba_params(), client_credentials())
        .await
        .unwrap();
    let pending = h.ciba.pending_for_device(TENANT, DEVICE_ID).await.unwrap();
    let view = h
        .authorization
        .view_data(TENANT, pending[0].transaction_id, None)
        .await
        .unwrap();
    assert!(!view.show_cancel);

    // A browser-driven transaction keeps its cancel action.
    let start = h
        .authorization
        .request_authorization(TENANT, code_params(), None)
        .await
        .unwrap();
    let AuthorizationStart::PendingInteraction { transaction } = start else {
        panic!("expected pending interaction");
    };
    let view = h
        .authorization
        .view_data(TENANT, transaction.id, None)
        .await
        .unwrap();
    assert!(view.show_cancel);
}

#[tokio::test]
async fn unknown_login_hint_is_rejected() {
    let h = harness().await;
    let mut params = ciba_params();
    params.login_hint = Some("nobody".to_string());

    let err = h
        .ciba
        .request(TENANT, params, client_credentials())
        .await
        .expect_err("hint resolves no user");
    assert_eq!(err.oauth_error_code(), "invalid_request");
    assert_eq!(
        err.error_description(),
        "backchannel authentication request login_hint does not identify a user (nobody)"
    );
}
