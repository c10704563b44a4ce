//! Authorization response construction.
//!
//! Builds success and error redirects, delivering parameters in the query
//! or fragment component according to the response mode.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OidcError, sanitize_error_description};

/// OAuth 2.0 response modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Parameters in the query component.
    Query,
    /// Parameters in the fragment component.
    Fragment,
}

impl ResponseMode {
    /// Parses the `response_mode` parameter; unknown values are ignored by
    /// returning `None` so the flow default applies.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "query" => Some(Self::Query),
            "fragment" => Some(Self::Fragment),
            _ => None,
        }
    }
}

/// Builds a success redirect URL carrying the given parameters.
///
/// Parameters go into the fragment when `fragment` is set (implicit and
/// hybrid flows), otherwise into the query component, preserving any query
/// the registered redirect URI already carries.
///
/// # Errors
///
/// Returns `Internal` when the redirect URI cannot be parsed; the URI was
/// validated against the registration earlier, so this indicates a broken
/// registration.
pub fn redirect_success_url(
    redirect_uri: &str,
    params: &[(&str, &str)],
    fragment: bool,
) -> Result<String, OidcError> {
    let mut url = Url::parse(redirect_uri)
        .map_err(|e| OidcError::internal(format!("registered redirect_uri is unparsable: {e}")))?;
    if fragment {
        let encoded = encode_pairs(params);
        url.set_fragment(Some(&encoded));
    } else {
        for (key, value) in params {
            url.query_pairs_mut().append_pair(key, value);
        }
    }
    Ok(url.to_string())
}

/// Builds an error redirect URL with `error`, `error_description`, and the
/// client `state` echoed verbatim when one was supplied.
///
/// # Errors
///
/// Returns `Internal` when the redirect URI cannot be parsed.
pub fn redirect_error_url(
    redirect_uri: &str,
    error: &OidcError,
    state: Option<&str>,
    fragment: bool,
) -> Result<String, OidcError> {
    let description = sanitize_error_description(&error.error_description());
    let mut params: Vec<(&str, &str)> = vec![
        ("error", error.oauth_error_code()),
        ("error_description", &description),
    ];
    if let Some(state) = state {
        params.push(("state", state));
    }
    redirect_success_url(redirect_uri, &params, fragment)
}

fn encode_pairs(params: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_redirect_preserves_existing_query() {
        let url = redirect_success_url(
            "https://rp.example.com/cb?app=1",
            &[("code", "abc"), ("state", "xyz")],
            false,
        )
        .unwrap();
        assert!(url.starts_with("https://rp.example.com/cb?app=1&"));
        assert!(url.contains("code=abc"));
        assert!(url.contains("state=xyz"));
        assert!(!url.contains('#'));
    }

    #[test]
    fn test_fragment_redirect() {
        let url = redirect_success_url(
            "https://rp.example.com/cb",
            &[("access_token", "t"), ("token_type", "Bearer")],
            true,
        )
        .unwrap();
        let (_, fragment) = url.split_once('#').unwrap();
        assert!(fragment.contains("access_token=t"));
        assert!(fragment.contains("token_type=Bearer"));
    }

    #[test]
    fn test_error_redirect_echoes_state_only_when_present() {
        let err = OidcError::denied_by_resource_owner();
        let with_state =
            redirect_error_url("https://rp.example.com/cb", &err, Some("s-1"), false).unwrap();
        assert!(with_state.contains("error=access_denied"));
        assert!(with_state.contains("state=s-1"));

        let without_state =
            redirect_error_url("https://rp.example.com/cb", &err, None, false).unwrap();
        assert!(!without_state.contains("state="));
    }

    #[test]
    fn test_error_description_is_sanitized() {
        let err = OidcError::invalid_request("bad \"value\"");
        let url = redirect_error_url("https://rp.example.com/cb", &err, None, false).unwrap();
        assert!(!url.contains("%22"));
    }
}
