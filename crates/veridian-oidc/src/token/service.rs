//! Token endpoint grant handling.
//!
//! Dispatches `grant_type` to the supported flows: authorization code
//! (single-use, PKCE, redirect binding), refresh token rotation, resource
//! owner password, CIBA polling, and JWT bearer assertions.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::ciba::CibaStatus;
use crate::error::OidcError;
use crate::events::{SecurityEvent, SecurityEventSink, SecurityEventType};
use crate::oauth::client_auth::{ClientCredentials, authenticate_client};
use crate::oauth::pkce::{self, CodeChallengeMethod};
use crate::storage::{
    CibaRequestStorage, ClientStorage, RefreshTokenRecord, RefreshTokenStorage,
    TransactionStorage, UserStorage,
};
use crate::token::jwt::{AccessTokenClaims, CertificateConfirmation, IdTokenClaims, JwtCodec};
use crate::types::{Client, GrantType};

/// Raw token request body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub code_verifier: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub scope: Option<String>,
    pub auth_req_id: Option<String>,
    pub assertion: Option<String>,
}

/// Successful token response.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    pub scope: String,
}

/// Token lifetimes and ID-token claim context.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub id_token_ttl: Duration,
    /// ACR values ordered weakest to strongest, for deriving the `acr`
    /// claim from the methods a transaction performed.
    pub acr_order: Vec<String>,
    /// ACR recorded when no method earned a higher level.
    pub default_acr: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::hours(1),
            refresh_token_ttl: Duration::days(30),
            id_token_ttl: Duration::hours(1),
            acr_order: vec![
                "urn:veridian:loa:1".to_string(),
                "urn:veridian:loa:2".to_string(),
                "urn:veridian:loa:3".to_string(),
            ],
            default_acr: "urn:veridian:loa:1".to_string(),
        }
    }
}

/// ID-token material carried from an authorization transaction or session.
#[derive(Debug, Clone, Default)]
struct IdTokenMaterial {
    nonce: Option<String>,
    acr: Option<String>,
    amr: Option<Vec<String>>,
    auth_time: Option<i64>,
}

/// Handles token endpoint requests.
pub struct TokenService {
    client_storage: Arc<dyn ClientStorage>,
    transaction_storage: Arc<dyn TransactionStorage>,
    refresh_token_storage: Arc<dyn RefreshTokenStorage>,
    ciba_storage: Arc<dyn CibaRequestStorage>,
    user_storage: Arc<dyn UserStorage>,
    event_sink: Arc<dyn SecurityEventSink>,
    jwt: Arc<JwtCodec>,
    config: TokenConfig,
}

impl TokenService {
    /// Creates the service over its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client_storage: Arc<dyn ClientStorage>,
        transaction_storage: Arc<dyn TransactionStorage>,
        refresh_token_storage: Arc<dyn RefreshTokenStorage>,
        ciba_storage: Arc<dyn CibaRequestStorage>,
        user_storage: Arc<dyn UserStorage>,
        event_sink: Arc<dyn SecurityEventSink>,
        jwt: Arc<JwtCodec>,
        config: TokenConfig,
    ) -> Self {
        Self {
            client_storage,
            transaction_storage,
            refresh_token_storage,
            ciba_storage,
            user_storage,
            event_sink,
            jwt,
            config,
        }
    }

    /// Handles one token request.
    ///
    /// # Errors
    ///
    /// Protocol errors carry the OAuth error code and mandated HTTP status;
    /// see `OidcError`.
    pub async fn handle(
        &self,
        tenant_id: &str,
        request: TokenRequest,
        credentials: ClientCredentials,
    ) -> Result<TokenResponse, OidcError> {
        // 1. Grant type
        let Some(raw_grant) = request.grant_type.as_deref() else {
            return Err(OidcError::invalid_request(
                "token request must contains grant_type, but this request does not contains grant_type",
            ));
        };
        let grant_type = GrantType::parse(raw_grant)
            .ok_or_else(|| OidcError::unsupported_grant_type(raw_grant))?;

        // 2. Client resolution and authentication
        let client_id = credentials
            .asserted_client_id()
            .ok_or_else(|| {
                OidcError::invalid_request("token request must contains client_id")
            })?
            .to_string();
        let client = self
            .client_storage
            .find_by_id(tenant_id, &client_id)
            .await?
            .filter(|c| c.active)
            .ok_or_else(|| {
                OidcError::invalid_client(format!("client is not found ({client_id})"))
            })?;
        authenticate_client(&client, &credentials)?;

        // 3. Grant registration
        if !client.is_grant_type_allowed(grant_type) {
            return Err(OidcError::unauthorized_client(format!(
                "client is unauthorized grant_type ({grant_type})"
            )));
        }

        // 4. Flow dispatch
        match grant_type {
            GrantType::AuthorizationCode => {
                self.exchange_code(tenant_id, &client, &request, &credentials)
                    .await
            }
            GrantType::RefreshToken => {
                self.refresh(tenant_id, &client, &request, &credentials).await
            }
            GrantType::Password => {
                self.password_grant(tenant_id, &client, &request, &credentials)
                    .await
            }
            GrantType::Ciba => self.ciba_poll(tenant_id, &client, &request, &credentials).await,
            GrantType::JwtBearer => {
                self.jwt_bearer(tenant_id, &client, &request, &credentials)
                    .await
            }
        }
    }

    async fn exchange_code(
        &self,
        tenant_id: &str,
        client: &Client,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, OidcError> {
        let Some(code) = request.code.as_deref() else {
            return Err(OidcError::invalid_request(
                "token request does not contains code, authorization_code grant must contains code",
            ));
        };

        // Single-use: the storage marks the code consumed atomically, so a
        // replayed or concurrent exchange sees None.
        let transaction = self
            .transaction_storage
            .consume_code(tenant_id, code)
            .await?
            .ok_or_else(|| {
                OidcError::invalid_grant(format!("not found authorization code ({code})"))
            })?;

        if transaction.client_id != client.client_id {
            return Err(OidcError::invalid_grant(format!(
                "not found authorization code ({code})"
            )));
        }
        if transaction.is_expired() {
            return Err(OidcError::invalid_grant(format!(
                "authorization code is expired ({code})"
            )));
        }

        let presented_redirect = request.redirect_uri.as_deref().unwrap_or_default();
        if presented_redirect != transaction.redirect_uri {
            return Err(OidcError::invalid_grant(format!(
                "token request redirect_uri does not equals to authorization request redirect_uri ({presented_redirect})"
            )));
        }

        if let Some(challenge) = transaction.code_challenge.as_deref() {
            let Some(verifier) = request.code_verifier.as_deref() else {
                return Err(OidcError::invalid_request(
                    "token request does not contains code_verifier, authorization request contains code_challenge",
                ));
            };
            let method =
                CodeChallengeMethod::parse(transaction.code_challenge_method.as_deref())?;
            if !pkce::verify(verifier, challenge, method) {
                return Err(OidcError::invalid_grant(
                    "code_verifier does not match code_challenge",
                ));
            }
        }

        let material = IdTokenMaterial {
            nonce: transaction.nonce.clone(),
            acr: Some(crate::policy::achieved_acr(
                &transaction.successful_methods(),
                &self.config.acr_order,
                &self.config.default_acr,
            )),
            amr: Some(transaction.amr()),
            auth_time: transaction.auth_time.map(|t| t.unix_timestamp()),
        };
        let sub = transaction.user.as_ref().map(|u| u.sub.clone());
        let response = self
            .issue(
                tenant_id,
                client,
                sub.as_deref(),
                &transaction.scopes,
                Some(material),
                credentials,
                true,
            )
            .await?;

        self.event_sink
            .record(
                SecurityEvent::new(SecurityEventType::TokenIssued, tenant_id)
                    .with_client(&client.client_id)
                    .with_transaction(transaction.id)
                    .with_detail(serde_json::json!({"grant_type": "authorization_code"})),
            )
            .await?;
        Ok(response)
    }

    async fn refresh(
        &self,
        tenant_id: &str,
        client: &Client,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, OidcError> {
        let Some(token) = request.refresh_token.as_deref() else {
            return Err(OidcError::invalid_request(
                "token request does not contains refresh_token, refresh_token grant must contains refresh_token",
            ));
        };
        let record = self
            .refresh_token_storage
            .consume(tenant_id, token)
            .await?
            .ok_or_else(|| OidcError::invalid_grant("not found refresh_token"))?;
        if record.client_id != client.client_id {
            return Err(OidcError::invalid_grant("not found refresh_token"));
        }
        if record.is_expired() {
            return Err(OidcError::invalid_grant("refresh_token is expired"));
        }

        // Optional scope narrowing
        let scopes = match request.scope.as_deref() {
            Some(requested) => {
                let narrowed: Vec<String> = requested
                    .split_whitespace()
                    .filter(|s| record.scopes.iter().any(|r| r == s))
                    .map(ToString::to_string)
                    .collect();
                if narrowed.is_empty() {
                    return Err(OidcError::invalid_scope(format!(
                        "token request does not contains valid scope ({requested})"
                    )));
                }
                narrowed
            }
            None => record.scopes.clone(),
        };

        let response = self
            .issue(
                tenant_id,
                client,
                record.sub.as_deref(),
                &scopes,
                None,
                credentials,
                true,
            )
            .await?;

        self.event_sink
            .record(
                SecurityEvent::new(SecurityEventType::TokenRefreshed, tenant_id)
                    .with_client(&client.client_id)
                    .with_detail(serde_json::json!({"grant_type": "refresh_token"})),
            )
            .await?;
        Ok(response)
    }

    async fn password_grant(
        &self,
        tenant_id: &str,
        client: &Client,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, OidcError> {
        let Some(username) = request.username.as_deref() else {
            return Err(OidcError::invalid_request(
                "token request does not contains username, password grant must contains username",
            ));
        };
        let Some(password) = request.password.as_deref() else {
            return Err(OidcError::invalid_request(
                "token request does not contains password, password grant must contains password",
            ));
        };
        let user = self
            .user_storage
            .verify_password(tenant_id, username, password)
            .await?
            .ok_or_else(|| OidcError::invalid_grant("username or password is incorrect"))?;

        let raw_scope = request.scope.clone().unwrap_or_default();
        let scopes = client.filter_scopes(raw_scope.split_whitespace());
        if scopes.is_empty() {
            return Err(OidcError::invalid_scope(format!(
                "token request does not contains valid scope ({raw_scope})"
            )));
        }

        let response = self
            .issue(
                tenant_id,
                client,
                Some(&user.sub),
                &scopes,
                None,
                credentials,
                true,
            )
            .await?;
        self.event_sink
            .record(
                SecurityEvent::new(SecurityEventType::TokenIssued, tenant_id)
                    .with_client(&client.client_id)
                    .with_sub(&user.sub)
                    .with_detail(serde_json::json!({"grant_type": "password"})),
            )
            .await?;
        Ok(response)
    }

    async fn ciba_poll(
        &self,
        tenant_id: &str,
        client: &Client,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, OidcError> {
        let Some(auth_req_id) = request.auth_req_id.as_deref() else {
            return Err(OidcError::invalid_request(
                "token request does not contains auth_req_id, ciba grant must contains auth_req_id",
            ));
        };

        if !client.backchannel_token_delivery_mode.allows_token_polling() {
            return Err(OidcError::unauthorized_client(
                "backchannel delivery mode is push. token request must not allowed",
            ));
        }

        let backchannel = self
            .ciba_storage
            .find_by_id(tenant_id, auth_req_id)
            .await?
            .filter(|r| r.client_id == client.client_id)
            .ok_or_else(|| {
                OidcError::invalid_grant(format!("not found auth_req_id ({auth_req_id})"))
            })?;

        match backchannel.status {
            CibaStatus::Pending if backchannel.is_expired() => Err(OidcError::ExpiredToken),
            CibaStatus::Pending => Err(OidcError::AuthorizationPending),
            CibaStatus::Denied => Err(OidcError::denied_by_resource_owner()),
            CibaStatus::Consumed => Err(OidcError::invalid_grant(format!(
                "auth_req_id is already used ({auth_req_id})"
            ))),
            CibaStatus::Granted => {
                // Exactly one poll wins the grant.
                let granted = self
                    .ciba_storage
                    .consume_granted(tenant_id, auth_req_id)
                    .await?
                    .ok_or_else(|| {
                        OidcError::invalid_grant(format!(
                            "auth_req_id is already used ({auth_req_id})"
                        ))
                    })?;

                let material = self
                    .transaction_storage
                    .find_by_id(tenant_id, granted.transaction_id)
                    .await?
                    .map(|txn| IdTokenMaterial {
                        nonce: None,
                        acr: Some(crate::policy::achieved_acr(
                            &txn.successful_methods(),
                            &self.config.acr_order,
                            &self.config.default_acr,
                        )),
                        amr: Some(txn.amr()),
                        auth_time: txn.auth_time.map(|t| t.unix_timestamp()),
                    })
                    .unwrap_or_default();

                let response = self
                    .issue(
                        tenant_id,
                        client,
                        Some(&granted.sub),
                        &granted.scopes,
                        Some(material),
                        credentials,
                        true,
                    )
                    .await?;
                self.event_sink
                    .record(
                        SecurityEvent::new(SecurityEventType::TokenIssued, tenant_id)
                            .with_client(&client.client_id)
                            .with_sub(&granted.sub)
                            .with_transaction(auth_req_id)
                            .with_detail(serde_json::json!({"grant_type": "ciba"})),
                    )
                    .await?;
                Ok(response)
            }
        }
    }

    async fn jwt_bearer(
        &self,
        tenant_id: &str,
        client: &Client,
        request: &TokenRequest,
        credentials: &ClientCredentials,
    ) -> Result<TokenResponse, OidcError> {
        let Some(assertion) = request.assertion.as_deref() else {
            return Err(OidcError::invalid_request(
                "token request does not contains assertion, jwt-bearer grant must contains assertion",
            ));
        };
        let pem = client.request_object_verification_key.as_deref().ok_or_else(|| {
            OidcError::invalid_client(
                "client has no registered verification key for jwt-bearer assertions",
            )
        })?;
        let key = DecodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| {
            OidcError::configuration(format!("client verification key is invalid: {e}"))
        })?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&client.client_id]);
        validation.set_audience(&[self.jwt.issuer()]);
        let claims = jsonwebtoken::decode::<serde_json::Value>(assertion, &key, &validation)
            .map_err(|e| OidcError::invalid_grant(format!("assertion is invalid: {e}")))?
            .claims;

        let sub = claims
            .get("sub")
            .and_then(|v| v.as_str())
            .ok_or_else(|| OidcError::invalid_grant("assertion must contains sub"))?;
        let user = self
            .user_storage
            .find_by_sub(tenant_id, sub)
            .await?
            .ok_or_else(|| {
                OidcError::invalid_grant(format!("assertion sub does not identify a user ({sub})"))
            })?;

        let raw_scope = request.scope.clone().unwrap_or_default();
        let scopes = client.filter_scopes(raw_scope.split_whitespace());
        if scopes.is_empty() {
            return Err(OidcError::invalid_scope(format!(
                "token request does not contains valid scope ({raw_scope})"
            )));
        }

        let response = self
            .issue(
                tenant_id,
                client,
                Some(&user.sub),
                &scopes,
                None,
                credentials,
                false,
            )
            .await?;
        self.event_sink
            .record(
                SecurityEvent::new(SecurityEventType::TokenIssued, tenant_id)
                    .with_client(&client.client_id)
                    .with_sub(&user.sub)
                    .with_detail(serde_json::json!({"grant_type": "jwt-bearer"})),
            )
            .await?;
        Ok(response)
    }

    /// Mints the token response: access token, optional ID token (`openid`
    /// scope), optional rotated refresh token.
    #[allow(clippy::too_many_arguments)]
    async fn issue(
        &self,
        tenant_id: &str,
        client: &Client,
        sub: Option<&str>,
        scopes: &[String],
        id_token_material: Option<IdTokenMaterial>,
        credentials: &ClientCredentials,
        offer_refresh: bool,
    ) -> Result<TokenResponse, OidcError> {
        let now = OffsetDateTime::now_utc();
        let scope = scopes.join(" ");

        let cnf = if client.tls_client_certificate_bound_access_tokens {
            credentials
                .certificate_thumbprint
                .clone()
                .map(|x5t_s256| CertificateConfirmation { x5t_s256 })
        } else {
            None
        };

        let access_claims = AccessTokenClaims {
            iss: self.jwt.issuer().to_string(),
            sub: sub.map(ToString::to_string),
            aud: tenant_id.to_string(),
            client_id: client.client_id.clone(),
            scope: scope.clone(),
            exp: (now + self.config.access_token_ttl).unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: Uuid::new_v4().to_string(),
            cnf,
        };
        let access_token = self.jwt.encode(&access_claims)?;

        let id_token = match (sub, id_token_material) {
            (Some(sub), Some(material)) if scopes.iter().any(|s| s == "openid") => {
                let claims = IdTokenClaims {
                    iss: self.jwt.issuer().to_string(),
                    sub: sub.to_string(),
                    aud: client.client_id.clone(),
                    exp: (now + self.config.id_token_ttl).unix_timestamp(),
                    iat: now.unix_timestamp(),
                    auth_time: material.auth_time,
                    nonce: material.nonce,
                    acr: material.acr,
                    amr: material.amr,
                };
                Some(self.jwt.encode(&claims)?)
            }
            _ => None,
        };

        let refresh_token = if offer_refresh
            && client.is_grant_type_allowed(GrantType::RefreshToken)
        {
            let record = RefreshTokenRecord {
                token: crate::random::urlsafe_token(32),
                tenant_id: tenant_id.to_string(),
                client_id: client.client_id.clone(),
                sub: sub.map(ToString::to_string),
                scopes: scopes.to_vec(),
                created_at: now,
                expires_at: now + self.config.refresh_token_ttl,
            };
            self.refresh_token_storage.create(&record).await?;
            Some(record.token)
        } else {
            None
        };

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer",
            expires_in: self.config.access_token_ttl.whole_seconds(),
            refresh_token,
            id_token,
            scope,
        })
    }
}
