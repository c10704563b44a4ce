//! JWT signing and verification.
//!
//! One RS256 key pair per server instance signs access tokens and ID
//! tokens; the public half is published at the JWKS endpoint under a
//! generated `kid`.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OidcError;

// =============================================================================
// Claims
// =============================================================================

/// Certificate-bound token confirmation (RFC 8705).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateConfirmation {
    /// SHA-256 thumbprint of the bound client certificate.
    #[serde(rename = "x5t#S256")]
    pub x5t_s256: String,
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Issuer identifier.
    pub iss: String,
    /// Subject; absent for user-less grants.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Audience.
    pub aud: String,
    /// The client the token was issued to.
    pub client_id: String,
    /// Granted scopes, space-delimited.
    pub scope: String,
    /// Expiry, Unix seconds.
    pub exp: i64,
    /// Issue time, Unix seconds.
    pub iat: i64,
    /// Token identifier, recorded on revocation.
    pub jti: String,
    /// Certificate binding, when the client registered for it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnf: Option<CertificateConfirmation>,
}

/// Claims carried by an ID token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer identifier.
    pub iss: String,
    /// Authenticated subject.
    pub sub: String,
    /// The requesting client.
    pub aud: String,
    /// Expiry, Unix seconds.
    pub exp: i64,
    /// Issue time, Unix seconds.
    pub iat: i64,
    /// Time of the authentication event, Unix seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    /// Nonce copied from the authorization request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Authentication context class achieved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acr: Option<String>,
    /// Authentication methods performed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amr: Option<Vec<String>>,
}

// =============================================================================
// Codec
// =============================================================================

/// RS256 signing codec with a generated key pair.
pub struct JwtCodec {
    issuer: String,
    kid: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    /// Public modulus, big-endian, for the JWKS document.
    n: Vec<u8>,
    /// Public exponent, big-endian, for the JWKS document.
    e: Vec<u8>,
}

impl JwtCodec {
    /// Generates a fresh 2048-bit RSA key pair for the given issuer.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` when key generation fails.
    pub fn generate(issuer: impl Into<String>) -> Result<Self, OidcError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048)
            .map_err(|e| OidcError::configuration(format!("rsa key generation failed: {e}")))?;
        let public_key = private_key.to_public_key();
        let n = public_key.n().to_bytes_be();
        let e = public_key.e().to_bytes_be();

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| OidcError::configuration(format!("rsa key encoding failed: {e}")))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| OidcError::configuration(format!("rsa key encoding failed: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_components(
            &URL_SAFE_NO_PAD.encode(&n),
            &URL_SAFE_NO_PAD.encode(&e),
        )
        .map_err(|e| OidcError::configuration(format!("rsa key encoding failed: {e}")))?;

        Ok(Self {
            issuer: issuer.into(),
            kid: Uuid::new_v4().to_string(),
            encoding_key,
            decoding_key,
            n,
            e,
        })
    }

    /// Returns the issuer identifier baked into every token.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the key identifier placed in token headers.
    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// Signs a claims set.
    ///
    /// # Errors
    ///
    /// Returns `Internal` when signing fails.
    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, OidcError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| OidcError::internal(format!("jwt signing failed: {e}")))
    }

    /// Verifies a token signed by this codec and returns its claims.
    ///
    /// Expiry is enforced; audience is validated at the call sites that
    /// know the expected value.
    ///
    /// # Errors
    ///
    /// Returns `invalid_token` for any verification failure.
    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, OidcError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_aud = false;
        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| OidcError::invalid_token(format!("token is invalid: {e}")))
    }

    /// Returns the JWKS document publishing the verification key.
    #[must_use]
    pub fn jwks(&self) -> serde_json::Value {
        serde_json::json!({
            "keys": [{
                "kty": "RSA",
                "use": "sig",
                "alg": "RS256",
                "kid": self.kid,
                "n": URL_SAFE_NO_PAD.encode(&self.n),
                "e": URL_SAFE_NO_PAD.encode(&self.e),
            }]
        })
    }
}
