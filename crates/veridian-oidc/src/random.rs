//! Random token generation for codes, cookies, and request identifiers.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

/// Generates a URL-safe random token from `bytes` bytes of OS entropy.
///
/// 32 bytes yields a 43-character base64url string, the size used for
/// authorization codes, `auth_req_id` values, and session cookie values.
#[must_use]
pub fn urlsafe_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
