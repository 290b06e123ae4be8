pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod engine;
pub mod github;
pub mod notifications;

use anyhow::{Context, Result};
use std::sync::Arc;

use auth::{AppJwtIssuer, AuthGate, Clock, InstallationTokenCache, SignatureVerifier, SystemClock};
use config::Config;
use engine::{GitHubRepositoryGuard, RepositoryGuard};
use github::GitHubTokenExchange;
use notifications::Notifier;

pub struct AppState {
    pub config: Config,
    pub gate: AuthGate,
    pub guard: Arc<dyn RepositoryGuard>,
    pub notifier: Arc<dyn Notifier>,
    pub installation_id: u64,
}

impl AppState {
    pub fn new(
        config: Config,
        gate: AuthGate,
        guard: Arc<dyn RepositoryGuard>,
        notifier: Arc<dyn Notifier>,
        installation_id: u64,
    ) -> Self {
        Self {
            config,
            gate,
            guard,
            notifier,
            installation_id,
        }
    }

    /// Wire the production collaborators from a validated configuration.
    pub fn from_config(config: Config) -> Result<Self> {
        let tokens = build_token_cache(&config, Arc::new(SystemClock))?;
        let gate = AuthGate::new(SignatureVerifier::new(config.webhook_secret()?), tokens);
        let guard = Arc::new(GitHubRepositoryGuard::new(
            &config.github,
            config.protection.clone(),
        ));
        let notifier =
            notifications::from_config(&config.notifications, config.github.request_timeout())?;
        let installation_id = config.installation_id()?;

        Ok(Self::new(config, gate, guard, notifier, installation_id))
    }
}

/// Load the app key once and build the installation token cache.
pub fn build_token_cache(
    config: &Config,
    clock: Arc<dyn Clock>,
) -> Result<Arc<InstallationTokenCache>> {
    let identity = config.app_identity()?;
    let issuer = AppJwtIssuer::new(&identity, clock.clone())
        .context("Failed to load GitHub App private key")?;
    let exchange = GitHubTokenExchange::from_config(&config.github)?;

    Ok(Arc::new(InstallationTokenCache::new(
        Arc::new(issuer),
        Arc::new(exchange),
        clock,
    )))
}
