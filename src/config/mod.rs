use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::auth::{AppIdentity, SharedSecret};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub protection: ProtectionConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookConfig {
    /// Secret for verifying GitHub webhook signatures (HMAC-SHA256)
    pub secret: Option<SharedSecret>,
}

/// Configuration value that must never show up in logs.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// GitHub App ID, used as the JWT issuer
    pub app_id: Option<String>,
    /// Base64 of the app private key (DER PKCS#1/PKCS#8, or PEM text)
    pub private_key: Option<SecretValue>,
    /// Path to a PEM private key file (alternative to `private_key`)
    pub private_key_path: Option<PathBuf>,
    /// Installation the app acts as
    pub installation_id: Option<u64>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Timeout for every outbound GitHub request, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            app_id: None,
            private_key: None,
            private_key_path: None,
            installation_id: None,
            api_url: default_api_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_user_agent() -> String {
    "branch-protection-bot".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

impl GitHubConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProtectionConfig {
    #[serde(default = "default_review_count")]
    pub required_approving_review_count: u32,
    #[serde(default = "default_true")]
    pub enforce_admins: bool,
    #[serde(default = "default_issue_title")]
    pub issue_title: String,
    /// Users assigned to the explanatory issue
    #[serde(default)]
    pub issue_assignees: Vec<String>,
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            required_approving_review_count: default_review_count(),
            enforce_admins: default_true(),
            issue_title: default_issue_title(),
            issue_assignees: Vec::new(),
        }
    }
}

fn default_review_count() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_issue_title() -> String {
    "Branch protections enabled for this repo".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Endpoint that receives the repository payload as JSON
    pub url: Option<String>,
    #[serde(default = "default_subject")]
    pub subject: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            subject: default_subject(),
        }
    }
}

fn default_subject() -> String {
    "GitHub Webhook Handler message".to_string()
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            info!("No config file found, using defaults and environment");
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Layer environment-style overrides on top of file values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secret) = lookup("WEBHOOK_SECRET") {
            self.webhook.secret = Some(SharedSecret::from(secret));
        }
        if let Some(app_id) = lookup("GITHUB_APPID").or_else(|| lookup("GITHUB_APP_ID")) {
            self.github.app_id = Some(app_id);
        }
        if let Some(key) = lookup("RSA_PRIVATEKEY") {
            self.github.private_key = Some(SecretValue::new(key));
        }
        if let Some(path) = lookup("GITHUB_PRIVATE_KEY_PATH") {
            self.github.private_key_path = Some(PathBuf::from(path));
        }
        if let Some(id) = lookup("INSTALLATION_ID") {
            let id = id
                .trim()
                .parse()
                .with_context(|| format!("INSTALLATION_ID is not a number: {}", id))?;
            self.github.installation_id = Some(id);
        }
        if let Some(url) = lookup("GITHUB_API_URL") {
            self.github.api_url = url;
        }
        if let Some(enabled) = lookup("NOTIFICATIONS_ENABLED") {
            self.notifications.enabled = enabled
                .trim()
                .parse()
                .with_context(|| format!("NOTIFICATIONS_ENABLED must be true or false: {}", enabled))?;
        }
        if let Some(url) = lookup("NOTIFICATIONS_URL") {
            self.notifications.url = Some(url);
        }
        Ok(())
    }

    /// Check that everything needed to serve webhooks is present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();

        if self.webhook.secret.as_ref().map_or(true, |s| s.is_empty()) {
            missing.push("webhook.secret (WEBHOOK_SECRET)");
        }
        if self.github.app_id.as_deref().map_or(true, str::is_empty) {
            missing.push("github.app_id (GITHUB_APPID)");
        }
        if self.github.installation_id.is_none() {
            missing.push("github.installation_id (INSTALLATION_ID)");
        }
        if self.github.private_key.is_none() && self.github.private_key_path.is_none() {
            missing.push("github.private_key (RSA_PRIVATEKEY) or github.private_key_path");
        }
        if self.notifications.enabled && self.notifications.url.is_none() {
            missing.push("notifications.url (NOTIFICATIONS_URL)");
        }

        if !missing.is_empty() {
            anyhow::bail!("Missing required configuration: {}", missing.join(", "));
        }

        if self.github.private_key.is_some() && self.github.private_key_path.is_some() {
            anyhow::bail!("Set only one of github.private_key and github.private_key_path");
        }
        if self.github.request_timeout_secs == 0 {
            anyhow::bail!("github.request_timeout_secs must be greater than zero");
        }

        Ok(())
    }

    pub fn webhook_secret(&self) -> Result<SharedSecret> {
        self.webhook
            .secret
            .clone()
            .context("webhook.secret is not configured")
    }

    pub fn installation_id(&self) -> Result<u64> {
        self.github
            .installation_id
            .context("github.installation_id is not configured")
    }

    /// Decode the configured private key into the app identity.
    pub fn app_identity(&self) -> Result<AppIdentity> {
        let app_id = self
            .github
            .app_id
            .clone()
            .context("github.app_id is not configured")?;

        if let Some(ref encoded) = self.github.private_key {
            return AppIdentity::from_base64(app_id, encoded.expose())
                .context("Failed to load github.private_key");
        }

        let path = self
            .github
            .private_key_path
            .as_ref()
            .context("No GitHub App private key configured")?;
        let pem_text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read private key: {}", path.display()))?;
        AppIdentity::from_pem(app_id, &pem_text).context("Failed to load github.private_key_path")
    }
}
