//! Installation access token exchange against the GitHub REST API.
//!
//! GitHub Apps use two types of authentication:
//! 1. App JWT - Short-lived JWT signed with the app's private key (for app-level operations)
//! 2. Installation Access Token - Token for a specific installation (for repo operations)
//!
//! This module performs the second step: it presents an app JWT to
//! `POST /app/installations/{id}/access_tokens` and returns the issued token.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;

use crate::auth::{AuthError, InstallationAccessToken, SignedAppJwt, TokenExchange};
use crate::config::GitHubConfig;

use super::{ACCEPT_HEADER, API_VERSION};

/// Response from GitHub's installation access token endpoint.
#[derive(Debug, Deserialize)]
pub struct InstallationTokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// [`TokenExchange`] backed by the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubTokenExchange {
    client: reqwest::Client,
    api_url: String,
    user_agent: String,
}

impl GitHubTokenExchange {
    pub fn new(api_url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for token exchange")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            user_agent: user_agent.to_string(),
        })
    }

    pub fn from_config(config: &GitHubConfig) -> Result<Self> {
        Self::new(&config.api_url, &config.user_agent, config.request_timeout())
    }
}

#[async_trait]
impl TokenExchange for GitHubTokenExchange {
    async fn create_installation_token(
        &self,
        app_jwt: &SignedAppJwt,
        installation_id: u64,
    ) -> Result<InstallationAccessToken, AuthError> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation_id
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", app_jwt.as_str()))
            .header("Accept", ACCEPT_HEADER)
            .header("User-Agent", &self.user_agent)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AuthError::token_exchange("request to GitHub timed out")
                } else {
                    AuthError::token_exchange(format!("request to GitHub failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::token_exchange(format!(
                "GitHub API error getting installation token: {} - {}",
                status, body
            )));
        }

        let token_response: InstallationTokenResponse = response.json().await.map_err(|e| {
            AuthError::token_exchange(format!(
                "failed to parse installation token response: {}",
                e
            ))
        })?;

        if token_response.token.is_empty() {
            return Err(AuthError::token_exchange(
                "installation token response contained an empty token",
            ));
        }

        Ok(InstallationAccessToken::new(
            token_response.token,
            token_response.expires_at,
        ))
    }
}
