//! Webhook signature verification (`X-Hub-Signature-256`).
//!
//! GitHub signs every delivery with HMAC-SHA256 over the raw body, keyed by the
//! webhook secret, and sends `sha256=<hex digest>`. The header value is
//! compared case-insensitively and in constant time.

use axum::http::HeaderMap;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::SharedSecret;

pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

/// What a request carries in its signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureHeader<'a> {
    Missing,
    /// Present but not visible ASCII, so it cannot be a hex digest.
    Unreadable,
    Present(&'a str),
}

/// An inbound webhook delivery as received, before any parsing.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub body: Bytes,
    pub headers: HeaderMap,
}

impl WebhookRequest {
    pub fn new(body: impl Into<Bytes>, headers: HeaderMap) -> Self {
        Self {
            body: body.into(),
            headers,
        }
    }

    /// Value of the signature header. Header names are matched
    /// case-insensitively by `HeaderMap`.
    pub fn signature(&self) -> SignatureHeader<'_> {
        match self.headers.get(SIGNATURE_HEADER) {
            None => SignatureHeader::Missing,
            Some(value) => match value.to_str() {
                Ok(value) => SignatureHeader::Present(value),
                Err(_) => SignatureHeader::Unreadable,
            },
        }
    }
}

/// Compute the `sha256=<lowercase hex>` signature GitHub would send for `body`.
pub fn compute_signature(secret: &SharedSecret, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.expose()).ok()?;
    mac.update(body);
    Some(format!(
        "{}{}",
        SIGNATURE_PREFIX,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Check a signature header value against the body. Returns `false` when the
/// header is absent; never panics or errors.
pub fn verify_signature(body: &[u8], header_value: Option<&str>, secret: &SharedSecret) -> bool {
    let Some(header_value) = header_value else {
        tracing::warn!("Webhook missing {} header", SIGNATURE_HEADER);
        return false;
    };

    let Some(expected) = compute_signature(secret, body) else {
        return false;
    };

    let supplied = header_value.to_ascii_lowercase();
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

/// Holds the shared secret and checks whole requests against it.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: SharedSecret,
}

impl SignatureVerifier {
    pub fn new(secret: SharedSecret) -> Self {
        Self { secret }
    }

    pub fn verify(&self, request: &WebhookRequest) -> bool {
        match request.signature() {
            SignatureHeader::Missing => verify_signature(&request.body, None, &self.secret),
            SignatureHeader::Unreadable => {
                tracing::warn!("Webhook {} header is not visible ASCII", SIGNATURE_HEADER);
                false
            }
            SignatureHeader::Present(value) => {
                verify_signature(&request.body, Some(value), &self.secret)
            }
        }
    }
}
