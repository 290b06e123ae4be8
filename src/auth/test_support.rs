//! Shared fixtures for tests that need a signing identity or a fake exchange.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{
    AppIdentity, AppJwtIssuer, AuthError, Clock, InstallationAccessToken, SignedAppJwt,
    TokenExchange,
};

pub const TEST_APP_ID: &str = "12345";

pub const TEST_PRIVATE_KEY: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/testdata/app_key.pem"));

pub fn fixed_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn test_identity() -> AppIdentity {
    AppIdentity::from_pem(TEST_APP_ID, TEST_PRIVATE_KEY).unwrap()
}

pub fn test_issuer(clock: Arc<dyn Clock>) -> Arc<AppJwtIssuer> {
    Arc::new(AppJwtIssuer::new(&test_identity(), clock).unwrap())
}

/// Exchange that replays queued results and records every call.
#[derive(Default)]
pub struct ScriptedExchange {
    responses: Mutex<VecDeque<Result<InstallationAccessToken, AuthError>>>,
    installation_ids: Mutex<Vec<u64>>,
    calls: AtomicUsize,
    delay: Option<std::time::Duration>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_ok(&self, token: &str, expires_at: DateTime<Utc>) {
        self.responses
            .lock()
            .push_back(Ok(InstallationAccessToken::new(token, expires_at)));
    }

    pub fn push_err(&self, message: &str) {
        self.responses
            .lock()
            .push_back(Err(AuthError::token_exchange(message)));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn installation_ids(&self) -> Vec<u64> {
        self.installation_ids.lock().clone()
    }
}

#[async_trait]
impl TokenExchange for ScriptedExchange {
    async fn create_installation_token(
        &self,
        _app_jwt: &SignedAppJwt,
        installation_id: u64,
    ) -> Result<InstallationAccessToken, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.installation_ids.lock().push(installation_id);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(AuthError::token_exchange("no scripted response left")))
    }
}
