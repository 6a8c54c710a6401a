//! services/api/src/web/signature.rs
//!
//! Webhook signature verification.
//!
//! The SMS gateway signs every delivery with HMAC-SHA256 over the raw
//! request body, base64-encoded, in the `x-webhook-signature` header. A
//! second header carries a signature under the previous secret during
//! rotation; either one verifying is enough.

use axum::http::HeaderMap;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const ROTATED_SIGNATURE_HEADER: &str = "x-webhook-signature-2";

type HmacSha256 = Hmac<Sha256>;

/// Checks the delivery headers against the signing secret. Returns false
/// for a missing header, undecodable base64, or a mismatched digest; the
/// comparison itself is constant-time.
pub fn verify_signature(headers: &HeaderMap, raw_body: &[u8], secret: &str) -> bool {
    [SIGNATURE_HEADER, ROTATED_SIGNATURE_HEADER]
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .any(|candidate| matches_signature(candidate, raw_body, secret))
}

fn matches_signature(candidate: &str, raw_body: &[u8], secret: &str) -> bool {
    let Ok(expected) = BASE64.decode(candidate) else {
        return false;
    };
    // new_from_slice only fails on zero-length keys, which config loading
    // already refuses.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);
    mac.verify_slice(&expected).is_ok()
}

/// Produces the signature the gateway would attach to `raw_body`.
#[cfg(test)]
pub(crate) fn sign(raw_body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("non-empty secret");
    mac.update(raw_body);
    BASE64.encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "whsec_test";
    const BODY: &[u8] = b"From=%2B15551230000&To=%2B15559998888&Body=1";

    fn headers_with(name: &'static str, value: String) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(&value).unwrap());
        headers
    }

    #[test]
    fn valid_signature_verifies() {
        let headers = headers_with(SIGNATURE_HEADER, sign(BODY, SECRET));
        assert!(verify_signature(&headers, BODY, SECRET));
    }

    #[test]
    fn rotated_secondary_header_verifies() {
        let headers = headers_with(ROTATED_SIGNATURE_HEADER, sign(BODY, SECRET));
        assert!(verify_signature(&headers, BODY, SECRET));
    }

    #[test]
    fn missing_header_fails() {
        assert!(!verify_signature(&HeaderMap::new(), BODY, SECRET));
    }

    #[test]
    fn tampered_body_fails() {
        let headers = headers_with(SIGNATURE_HEADER, sign(BODY, SECRET));
        assert!(!verify_signature(&headers, b"Body=2", SECRET));
    }

    #[test]
    fn wrong_secret_fails() {
        let headers = headers_with(SIGNATURE_HEADER, sign(BODY, "other"));
        assert!(!verify_signature(&headers, BODY, SECRET));
    }

    #[test]
    fn non_base64_header_fails() {
        let headers = headers_with(SIGNATURE_HEADER, "!!not-base64!!".to_string());
        assert!(!verify_signature(&headers, BODY, SECRET));
    }
}
