//! End-to-end authorization code flow scenarios.

mod common;

use common::*;
use serde_json::json;
use veridian_oidc::interaction::{InteractionStatus, InteractionType};
use veridian_oidc::oauth::{AuthorizationStart, AuthorizeStartError};
use veridian_oidc::token::jwt::{AccessTokenClaims, IdTokenClaims};

async fn start_pending(
    h: &Harness,
    params: veridian_oidc::oauth::AuthorizationRequestParams,
) -> veridian_oidc::oauth::AuthorizationTransaction {
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

#[tokio::test]
async fn code_flow_issues_tokens_with_id_token_claims() {
    let h = harness().await;
    let transaction = start_pending(&h, code_params()).await;

    let location = h.authorization.sign_in_location(transaction.id);
    assert!(location.contains(&format!("?id={}", transaction.id)));

    let outcome = h
        .authorization
        .submit_interaction(
            TENANT,
            transaction.id,
            InteractionType::PasswordAuthentication,
            &json!({"username": USERNAME, "password": PASSWORD}),
            Some(&transaction.auth_session),
        )
        .await
        .expect("interaction runs");
    assert_eq!(outcome.status, InteractionStatus::Success);

    let grant = h
        .authorization
        .authorize(TENANT, transaction.id, Some(&transaction.auth_session), None)
        .await
        .expect("authorize succeeds");
    assert!(grant.op_session_cookie.is_some());
    assert_eq!(
        query_param(&grant.redirect_uri, "state").as_deref(),
        Some("af0ifjsldkj")
    );
    let code = query_param(&grant.redirect_uri, "code").expect("code in redirect");

    let response = h
        .token
        .handle(TENANT, code_exchange(&code), client_credentials())
        .await
        .expect("code exchange succeeds");
    assert_eq!(response.token_type, "Bearer");
    assert!(response.refresh_token.is_some());
    assert_eq!(response.scope, "openid profile");

    let access: AccessTokenClaims = h.jwt.decode(&response.access_token).unwrap();
    assert_eq!(access.sub.as_deref(), Some(SUB));
    assert_eq!(access.aud, TENANT);
    assert_eq!(access.client_id, CLIENT_ID);

    let id_token: IdTokenClaims = h.jwt.decode(&response.id_token.unwrap()).unwrap();
    assert_eq!(id_token.sub, SUB);
    assert_eq!(id_token.aud, CLIENT_ID);
    assert_eq!(id_token.nonce.as_deref(), Some("n-0S6_WzA2Mj"));
    assert!(id_token.auth_time.is_some());
    assert!(
        id_token
            .amr
            .unwrap_or_default()
            .iter()
            .any(|amr| amr == "pwd")
    );
}

#[tokio::test]
async fn authorization_code_is_single_use() {
    let h = harness().await;
    let transaction = start_pending(&h, code_params()).await;
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
    let code = query_param(&grant.redirect_uri, "code").unwrap();

    h.token
        .handle(TENANT, code_exchange(&code), client_credentials())
        .await
        .expect("first exchange succeeds");
    let err = h
        .token
        .handle(TENANT, code_exchange(&code), client_credentials())
        .await
        .expect_err("replay rejected");
    assert_eq!(err.oauth_error_code(), "invalid_grant");
    assert_eq!(err.http_status(), 400);
}

#[tokio::test]
async fn pkce_verifier_must_match_challenge() {
    let h = harness().await;
    let mut params = code_params();
    // Default method is plain.
    params.code_challenge = Some("pkce-verifier-value".to_string());
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
    let code = query_param(&grant.redirect_uri, "code").unwrap();

    let mut missing = code_exchange(&code);
    missing.code_verifier = None;
    let err = h
        .token
        .handle(TENANT, missing, client_credentials())
        .await
        .expect_err("verifier required");
    assert_eq!(err.oauth_error_code(), "invalid_request");

    // The code survives a malformed request only until it is consumed, so
    // run the wrong-verifier case on a fresh grant.
    let transaction = start_pending(&h, {
        let mut params = code_params();
        params.code_challenge = Some("pkce-verifier-value".to_string());
        params
    })
    .await;
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
    let code = query_param(&grant.redirect_uri, "code").unwrap();

    let mut wrong = code_exchange(&code);
    wrong.code_verifier = Some("some-other-value".to_string());
    let err = h
        .token
        .handle(TENANT, wrong, client_credentials())
        .await
        .expect_err("mismatch rejected");
    assert_eq!(err.oauth_error_code(), "invalid_grant");
    assert_eq!(
        err.error_description(),
        "code_verifier does not match code_challenge"
    );
}

#[tokio::test]
async fn authorize_requires_satisfied_policy() {
    let h = harness().await;
    let transaction = start_pending(&h, code_params()).await;

    let err = h
        .authorization
        .authorize(TENANT, transaction.id, Some(&transaction.auth_session), None)
        .await
        .expect_err("no interaction succeeded yet");
    assert_eq!(err.oauth_error_code(), "invalid_request");
    assert_eq!(
        err.error_description(),
        "authorization request does not satisfy authentication policy"
    );
}

#[tokio::test]
async fn deny_redirects_with_access_denied_and_state() {
    let h = harness().await;
    let transaction = start_pending(&h, code_params()).await;

    let grant = h
        .authorization
        .deny(TENANT, transaction.id, Some(&transaction.auth_session))
        .await
        .expect("deny produces a redirect");
    assert_eq!(
        query_param(&grant.redirect_uri, "error").as_deref(),
        Some("access_denied")
    );
    assert_eq!(
        query_param(&grant.redirect_uri, "state").as_deref(),
        Some("af0ifjsldkj")
    );
}

#[tokio::test]
async fn unknown_client_fails_directly() {
    let h = harness().await;
    let mut params = code_params();
    params.client_id = Some("nope".to_string());

    let err = h
        .authorization
        .request_authorization(TENANT, params, None)
        .await
        .expect_err("unknown client rejected");
    match err {
        AuthorizeStartError::Direct(err) => {
            assert_eq!(err.oauth_error_code(), "invalid_request");
            assert_eq!(
                err.error_description(),
                "authorization request client_id is not registered (nope)"
            );
        }
        AuthorizeStartError::Redirect { .. } => panic!("must not redirect to an unknown client"),
    }
}

#[tokio::test]
async fn unsupported_response_type_redirects_with_state() {
    let h = harness().await;
    let mut params = code_params();
    params.response_type = Some("code unknown".to_string());

    let err = h
        .authorization
        .request_authorization(TENANT, params, None)
        .await
        .expect_err("unsupported response type");
    match err {
        AuthorizeStartError::Redirect { location } => {
            assert_eq!(
                query_param(&location, "error").as_deref(),
                Some("unsupported_response_type")
            );
            assert_eq!(
                query_param(&location, "state").as_deref(),
                Some("af0ifjsldkj")
            );
        }
        AuthorizeStartError::Direct(err) => {
            panic!("expected redirect delivery, got direct error: {err}")
        }
    }
}

#[tokio::test]
async fn hybrid_flow_delivers_fragment_tokens() {
    let h = harness().await;
    let mut params = code_params();
    params.response_type = Some("id_token token".to_string());
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
    assert!(
        fragment_param(&grant.redirect_uri, "access_token").is_some(),
        "implicit tokens travel in the fragment"
    );
    assert!(fragment_param(&grant.redirect_uri, "id_token").is_some());
    assert_eq!(
        fragment_param(&grant.redirect_uri, "state").as_deref(),
        Some("af0ifjsldkj")
    );
    assert_eq!(
        fragment_param(&grant.redirect_uri, "token_type").as_deref(),
        Some("Bearer")
    );
}
