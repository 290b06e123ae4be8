//! Webhook authentication and GitHub App credentials.
//!
//! This module provides:
//! - HMAC-SHA256 verification of `X-Hub-Signature-256`
//! - App JWT signing (RS256) for GitHub App authentication
//! - A single-slot installation access token cache with expiry-aware refresh
//! - [`AuthGate`], which ties the three together for the webhook handler

pub mod clock;
pub mod error;
pub mod gate;
pub mod jwt;
pub mod secrets;
pub mod signature;
pub mod token_cache;

#[cfg(test)]
pub(crate) mod test_support;

pub use clock::{Clock, SystemClock};
pub use error::AuthError;
pub use gate::{AuthGate, Credential, VerifiedRequest};
pub use jwt::{AppJwtIssuer, SignedAppJwt};
pub use secrets::{AppIdentity, SharedSecret};
pub use signature::{
    compute_signature, verify_signature, SignatureHeader, SignatureVerifier, WebhookRequest,
    SIGNATURE_HEADER,
};
pub use token_cache::{
    token_state, InstallationAccessToken, InstallationTokenCache, TokenExchange, TokenState,
};

#[cfg(test)]
pub use clock::ManualClock;
