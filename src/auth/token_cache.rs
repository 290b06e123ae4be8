//! Single-slot cache for the installation access token.
//!
//! The slot is `Empty` until the first request, `Valid` while the held token
//! expires more than [`SAFETY_MARGIN_SECS`] from now, and `Stale` afterwards.
//! The state is recomputed from the stored expiry on every access; nothing
//! runs in the background.
//!
//! Refreshes are serialized: callers that find the slot unusable queue on an
//! async mutex, re-check the slot once they hold it, and only the first one
//! performs the exchange. The slot itself is replaced in a single write, so
//! readers see either the old token or the new one, never a mix. A refresh
//! that fails or is cancelled leaves the slot untouched.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{AppJwtIssuer, AuthError, Clock, SignedAppJwt};

/// Lead time before real expiry at which a cached token stops being handed out.
/// Covers the branch, protection and issue calls made with one token.
pub const SAFETY_MARGIN_SECS: i64 = 60;

/// Token issued by GitHub for one app installation.
#[derive(Clone, PartialEq, Eq)]
pub struct InstallationAccessToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl InstallationAccessToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.token
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl fmt::Debug for InstallationAccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallationAccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// The "create installation access token" call, authenticated with an app JWT.
///
/// Implementations must map transport failures, timeouts, non-2xx statuses and
/// malformed bodies to [`AuthError::TokenExchange`].
#[async_trait]
pub trait TokenExchange: Send + Sync {
    async fn create_installation_token(
        &self,
        app_jwt: &SignedAppJwt,
        installation_id: u64,
    ) -> Result<InstallationAccessToken, AuthError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Empty,
    Valid,
    Stale,
}

/// Classify a slot from its stored expiry. A token is `Valid` only while its
/// expiry is strictly after `now + margin`.
pub fn token_state(
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    margin: Duration,
) -> TokenState {
    match expires_at {
        None => TokenState::Empty,
        Some(expires_at) if expires_at > now + margin => TokenState::Valid,
        Some(_) => TokenState::Stale,
    }
}

struct CachedToken {
    installation_id: u64,
    token: InstallationAccessToken,
}

pub struct InstallationTokenCache {
    issuer: Arc<AppJwtIssuer>,
    exchange: Arc<dyn TokenExchange>,
    clock: Arc<dyn Clock>,
    safety_margin: Duration,
    slot: RwLock<Option<CachedToken>>,
    refresh: Mutex<()>,
}

impl InstallationTokenCache {
    pub fn new(
        issuer: Arc<AppJwtIssuer>,
        exchange: Arc<dyn TokenExchange>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            issuer,
            exchange,
            clock,
            safety_margin: Duration::seconds(SAFETY_MARGIN_SECS),
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    /// State of the slot as seen by a caller asking for `installation_id`.
    /// A token held for a different installation counts as stale.
    pub fn state(&self, installation_id: u64) -> TokenState {
        match self.slot.read().as_ref() {
            None => TokenState::Empty,
            Some(cached) => self.classify(cached, installation_id),
        }
    }

    fn classify(&self, cached: &CachedToken, installation_id: u64) -> TokenState {
        if cached.installation_id != installation_id {
            return TokenState::Stale;
        }
        token_state(
            Some(cached.token.expires_at()),
            self.clock.now(),
            self.safety_margin,
        )
    }

    fn current(&self, installation_id: u64) -> Option<InstallationAccessToken> {
        let slot = self.slot.read();
        let cached = slot.as_ref()?;
        (self.classify(cached, installation_id) == TokenState::Valid).then(|| cached.token.clone())
    }

    /// Return a token that stays valid for at least the safety margin,
    /// exchanging a fresh app JWT for a new one when needed.
    pub async fn get_valid_token(
        &self,
        installation_id: u64,
    ) -> Result<InstallationAccessToken, AuthError> {
        if let Some(token) = self.current(installation_id) {
            tracing::debug!(installation_id, "Using cached installation token");
            return Ok(token);
        }

        let _guard = self.refresh.lock().await;

        // Another caller may have refreshed while we waited.
        if let Some(token) = self.current(installation_id) {
            return Ok(token);
        }

        let app_jwt = self.issuer.issue()?;
        let fresh = self
            .exchange
            .create_installation_token(&app_jwt, installation_id)
            .await?;

        let state = token_state(
            Some(fresh.expires_at()),
            self.clock.now(),
            self.safety_margin,
        );
        if state != TokenState::Valid {
            return Err(AuthError::token_exchange(
                "issued token expires within the safety margin",
            ));
        }

        tracing::info!(
            installation_id,
            expires_at = %fresh.expires_at(),
            "Refreshed installation access token"
        );

        *self.slot.write() = Some(CachedToken {
            installation_id,
            token: fresh.clone(),
        });

        Ok(fresh)
    }
}

impl fmt::Debug for InstallationTokenCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallationTokenCache")
            .field("issuer", &self.issuer)
            .field("safety_margin", &self.safety_margin)
            .finish_non_exhaustive()
    }
}
