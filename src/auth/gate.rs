//! Entry point for authenticating a webhook delivery.
//!
//! The signature is always checked first. A [`VerifiedRequest`] can only be
//! obtained from [`AuthGate::verify`], and an installation credential can only
//! be requested with one in hand, so no token is fetched for an unsigned body.

use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

use super::{AuthError, InstallationTokenCache, SignatureVerifier, WebhookRequest};

/// A request whose signature matched the shared secret.
#[derive(Debug, Clone)]
pub struct VerifiedRequest {
    body: Bytes,
}

impl VerifiedRequest {
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Bearer credential for GitHub REST calls made on behalf of the installation.
/// Obtain a new one per request; do not hold on to it.
#[derive(Clone)]
pub struct Credential(String);

impl Credential {
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone)]
pub struct AuthGate {
    verifier: SignatureVerifier,
    tokens: Arc<InstallationTokenCache>,
}

impl AuthGate {
    pub fn new(verifier: SignatureVerifier, tokens: Arc<InstallationTokenCache>) -> Self {
        Self { verifier, tokens }
    }

    /// Check the delivery signature. Fails with [`AuthError::Forbidden`].
    pub fn verify(&self, request: WebhookRequest) -> Result<VerifiedRequest, AuthError> {
        if !self.verifier.verify(&request) {
            tracing::warn!("Webhook signature verification failed");
            return Err(AuthError::Forbidden);
        }
        tracing::debug!("Webhook signature verified");
        Ok(VerifiedRequest { body: request.body })
    }

    /// Fetch a usable installation credential for a verified request.
    pub async fn credential(
        &self,
        _verified: &VerifiedRequest,
        installation_id: u64,
    ) -> Result<Credential, AuthError> {
        let token = self.tokens.get_valid_token(installation_id).await?;
        Ok(Credential::new(token.as_str()))
    }

    /// Verify the request and, only if it is authentic, return a credential.
    pub async fn authenticate(
        &self,
        request: WebhookRequest,
        installation_id: u64,
    ) -> Result<Credential, AuthError> {
        let verified = self.verify(request)?;
        self.credential(&verified, installation_id).await
    }
}
