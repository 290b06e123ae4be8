use thiserror::Error;

/// Failures produced by the webhook authentication core.
///
/// Messages never carry secrets, key material, JWTs or installation tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Signature header absent or not matching the request body.
    #[error("webhook signature missing or invalid")]
    Forbidden,

    /// The app private key could not be parsed or the JWT could not be signed.
    #[error("failed to sign app JWT: {0}")]
    Signing(String),

    /// The installation token endpoint failed or returned something unusable.
    #[error("installation token exchange failed: {0}")]
    TokenExchange(String),
}

impl AuthError {
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing(message.into())
    }

    pub fn token_exchange(message: impl Into<String>) -> Self {
        Self::TokenExchange(message.into())
    }
}
