//! OP session reuse (SSO) and AUTH_SESSION binding scenarios.

mod common;

use common::*;
use serde_json::json;
use veridian_oidc::interaction::InteractionType;
use veridian_oidc::oauth::{AuthorizationStart, AuthorizationTransaction, AuthorizeStartError};
use veridian_oidc::policy::{
    AuthenticationPolicy, AuthenticationPolicySet, ConditionLeaf, ConditionOperation,
    PolicyConditions, SuccessConditions,
};
use veridian_oidc::token::jwt::IdTokenClaims;

async fn start_pending(
    h: &Harness,
    params: veridian_oidc::oauth::AuthorizationRequestParams,
) -> AuthorizationTransaction {
    match h
        .authorization
        .request_authorization(TENANT, params, None)
        .await
        .expect("authorization request accepted")
    {
        AuthorizationStart::PendingInteraction { transaction } => transaction,
        AuthorizationStart::Authorized { .. } => panic!("expected pending interaction"),
    }
}

/// Runs password sign-in plus authorize and returns the OP session cookie.
async fn establish_session(h: &Harness) -> String {
    let transaction = start_pending(h, code_params()).await;
    h.authorization
        .submit_interaction(
            TENANT,
            transaction.id,
            InteractionType::PasswordAuthentication,
            &json!({"username": USERNAME, "password": PASSWORD}),
            Some(&transaction.auth_session),
        )
        .await
        .unwrap();
    h.authorization
        .authorize(TENANT, transaction.id, Some(&transaction.auth_session), None)
        .await
        .unwrap()
        .op_session_cookie
        .expect("session cookie issued")
}

#[tokio::test]
async fn prompt_none_without_session_redirects_login_required() {
    let h = harness().await;
    let mut params = code_params();
    params.prompt = Some("none".to_string());

    let err = h
        .authorization
        .request_authorization(TENANT, params, None)
        .await
        .expect_err("no session exists");
    match err {
        AuthorizeStartError::Redirect { location } => {
            assert_eq!(
                query_param(&location, "error").as_deref(),
                Some("login_required")
            );
            assert_eq!(
                query_param(&location, "state").as_deref(),
                Some("af0ifjsldkj")
            );
        }
        AuthorizeStartError::Direct(err) => panic!("expected redirect, got: {err}"),
    }
}

#[tokio::test]
async fn prompt_none_reuses_live_session() {
    let h = harness().await;
    let cookie = establish_session(&h).await;

    let mut params = code_params();
    params.prompt = Some("none".to_string());
    let start = h
        .authorization
        .request_authorization(TENANT, params, Some(&cookie))
        .await
        .expect("silent authorization succeeds");
    let AuthorizationStart::Authorized { redirect_uri } = start else {
        panic!("expected immediate authorization");
    };

    let code = query_param(&redirect_uri, "code").expect("code issued silently");
    let response = h
        .token
        .handle(TENANT, code_exchange(&code), client_credentials())
        .await
        .expect("silent code exchanges");
    assert!(response.id_token.is_some());
}

#[tokio::test]
async fn prompt_none_rejects_weaker_session_acr() {
    let h = harness().await;
    let cookie = establish_session(&h).await;

    let mut params = code_params();
    params.prompt = Some("none".to_string());
    params.acr_values = Some("urn:veridian:loa:3".to_string());

    let err = h
        .authorization
        .request_authorization(TENANT, params, Some(&cookie))
        .await
        .expect_err("session acr is too weak");
    match err {
        AuthorizeStartError::Redirect { location } => {
            assert_eq!(
                query_param(&location, "error").as_deref(),
                Some("interaction_required")
            );
        }
        AuthorizeStartError::Direct(err) => panic!("expected redirect, got: {err}"),
    }
}

#[tokio::test]
async fn authorize_with_session_skips_interactions() {
    let h = harness().await;
    let cookie = establish_session(&h).await;

    let transaction = start_pending(&h, code_params()).await;
    let grant = h
        .authorization
        .authorize_with_session(
            TENANT,
            transaction.id,
            Some(&transaction.auth_session),
            Some(&cookie),
        )
        .await
        .expect("session satisfies the request");
    assert!(query_param(&grant.redirect_uri, "code").is_some());
}

#[tokio::test]
async fn authorize_with_session_requires_live_session() {
    let h = harness().await;
    let transaction = start_pending(&h, code_params()).await;

    let err = h
        .authorization
        .authorize_with_session(
            TENANT,
            transaction.id,
            Some(&transaction.auth_session),
            Some("no-such-cookie"),
        )
        .await
        .expect_err("no session behind the cookie");
    assert_eq!(err.http_status(), 401);
    assert_eq!(err.oauth_error_code(), "access_denied");
    assert!(err.error_description().contains("auth_session_mismatch"));
    assert!(
        err.error_description()
            .contains("session does not exist or is expired")
    );
}

#[tokio::test]
async fn session_acr_reflects_performed_methods() {
    let h = harness().await;

    // One password factor earns the weakest level, whatever was requested.
    let mut params = code_params();
    params.acr_values = Some("urn:veridian:loa:3".to_string());
    let transaction = start_pending(&h, params).await;
    h.authorization
        .submit_interaction(
            TENANT,
            transaction.id,
            InteractionType::PasswordAuthentication,
            &json!({"username": USERNAME, "password": PASSWORD}),
            Some(&transaction.auth_session),
        )
        .await
        .unwrap();
    let grant = h
        .authorization
        .authorize(TENANT, transaction.id, Some(&transaction.auth_session), None)
        .await
        .unwrap();
    let cookie = grant.op_session_cookie.expect("session cookie issued");

    let code = query_param(&grant.redirect_uri, "code").unwrap();
    let tokens = h
        .token
        .handle(TENANT, code_exchange(&code), client_credentials())
        .await
        .unwrap();
    let id_token: IdTokenClaims = h.jwt.decode(&tokens.id_token.unwrap()).unwrap();
    assert_eq!(id_token.acr.as_deref(), Some("urn:veridian:loa:1"));

    // The session carries the earned level, so a silent request for the
    // stronger one cannot succeed.
    let mut params = code_params();
    params.prompt = Some("none".to_string());
    params.acr_values = Some("urn:veridian:loa:3".to_string());
    let err = h
        .authorization
        .request_authorization(TENANT, params, Some(&cookie))
        .await
        .expect_err("password alone does not reach loa:3");
    match err {
        AuthorizeStartError::Redirect { location } => {
            assert_eq!(
                query_param(&location, "error").as_deref(),
                Some("interaction_required")
            );
        }
        AuthorizeStartError::Direct(err) => panic!("expected redirect, got: {err}"),
    }
}

/// Policy requiring both a password sign-in and an SMS verification.
fn password_and_sms_policy_set() -> AuthenticationPolicySet {
    let conjunction = ["password-authentication", "sms-authentication"]
        .iter()
        .map(|method| ConditionLeaf {
            path: format!("$.{method}.success_count"),
            value_type: "integer".to_string(),
            operation: ConditionOperation::Gte,
            value: 1,
        })
        .collect();
    AuthenticationPolicySet {
        enabled: true,
        policies: vec![AuthenticationPolicy {
            description: Some("password and sms".to_string()),
            priority: 10,
            conditions: PolicyConditions::default(),
            available_methods: Vec::new(),
            success_conditions: SuccessConditions {
                any_of: vec![conjunction],
            },
        }],
    }
}

#[tokio::test]
async fn session_must_satisfy_authentication_policy() {
    let h = harness().await;
    let cookie = establish_session(&h).await;

    let mut client = test_client();
    client.authentication_policies = Some(password_and_sms_policy_set());
    h.clients.save(TENANT, client).await.unwrap();

    let transaction = start_pending(&h, code_params()).await;
    let err = h
        .authorization
        .authorize_with_session(
            TENANT,
            transaction.id,
            Some(&transaction.auth_session),
            Some(&cookie),
        )
        .await
        .expect_err("password-only session lacks the sms factor");
    assert_eq!(err.oauth_error_code(), "invalid_request");
    assert_eq!(
        err.error_description(),
        "session does not satisfy authentication policy"
    );
}

#[tokio::test]
async fn foreign_auth_session_cookie_is_rejected() {
    let h = harness().await;
    let transaction = start_pending(&h, code_params()).await;

    let err = h
        .authorization
        .submit_interaction(
            TENANT,
            transaction.id,
            InteractionType::PasswordAuthentication,
            &json!({"username": USERNAME, "password": PASSWORD}),
            Some("attacker-cookie"),
        )
        .await
        .expect_err("hijacked transaction rejected");
    assert_eq!(err.http_status(), 401);
    assert_eq!(err.oauth_error_code(), "access_denied");
    assert!(err.error_description().contains("auth_session_mismatch"));

    // A missing cookie is rejected the same way.
    let err = h
        .authorization
        .authorize(TENANT, transaction.id, None, None)
        .await
        .expect_err("missing cookie rejected");
    assert_eq!(err.http_status(), 401);
}
