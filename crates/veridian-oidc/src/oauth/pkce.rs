//! PKCE (RFC 7636) challenge verification.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::OidcError;

/// PKCE code challenge methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    /// `BASE64URL(SHA256(code_verifier))`.
    S256,
    /// The verifier is the challenge. Permitted by RFC 7636 for clients
    /// that cannot compute SHA-256.
    Plain,
}

impl CodeChallengeMethod {
    /// Parses the `code_challenge_method` parameter. An absent parameter
    /// defaults to `plain` per RFC 7636 section 4.3.
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for unknown methods.
    pub fn parse(value: Option<&str>) -> Result<Self, OidcError> {
        match value {
            None | Some("plain") => Ok(Self::Plain),
            Some("S256") => Ok(Self::S256),
            Some(other) => Err(OidcError::invalid_request(format!(
                "authorization request code_challenge_method is defined that plain, S256, but request code_challenge_method is ({other})"
            ))),
        }
    }

    /// Returns the parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

/// Computes the S256 challenge for a verifier.
#[must_use]
pub fn s256_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Verifies a `code_verifier` against the stored challenge.
#[must_use]
pub fn verify(verifier: &str, challenge: &str, method: CodeChallengeMethod) -> bool {
    if !is_valid_verifier(verifier) {
        return false;
    }
    match method {
        CodeChallengeMethod::S256 => s256_challenge(verifier) == challenge,
        CodeChallengeMethod::Plain => verifier == challenge,
    }
}

/// Checks the RFC 7636 verifier grammar: 43 to 128 characters of
/// `[A-Za-z0-9-._~]`.
#[must_use]
pub fn is_valid_verifier(verifier: &str) -> bool {
    (43..=128).contains(&verifier.len())
        && verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~'))
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERIFIER: &str = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";

    #[test]
    fn test_s256_round_trip() {
        let challenge = s256_challenge(VERIFIER);
        assert!(verify(VERIFIER, &challenge, CodeChallengeMethod::S256));
        assert!(!verify(
            "wrong-verifier-wrong-verifier-wrong-verifier-wrong",
            &challenge,
            CodeChallengeMethod::S256
        ));
    }

    #[test]
    fn test_s256_known_vector() {
        // Appendix B of RFC 7636.
        assert_eq!(
            s256_challenge(VERIFIER),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn test_plain_comparison() {
        assert!(verify(VERIFIER, VERIFIER, CodeChallengeMethod::Plain));
        assert!(!verify(
            VERIFIER,
            "something-else-something-else-something-else-42",
            CodeChallengeMethod::Plain
        ));
    }

    #[test]
    fn test_verifier_grammar() {
        assert!(is_valid_verifier(VERIFIER));
        assert!(!is_valid_verifier("too-short"));
        assert!(!is_valid_verifier(&"a".repeat(129)));
        assert!(!is_valid_verifier(&format!("{}!", &"a".repeat(50))));
    }

    #[test]
    fn test_method_parse_defaults_to_plain() {
        assert_eq!(
            CodeChallengeMethod::parse(None).unwrap(),
            CodeChallengeMethod::Plain
        );
        assert_eq!(
            CodeChallengeMethod::parse(Some("S256")).unwrap(),
            CodeChallengeMethod::S256
        );
        assert!(CodeChallengeMethod::parse(Some("sha512")).is_err());
    }
}
