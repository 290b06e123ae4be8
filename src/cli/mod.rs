//! Command-line interface.
//!
//! Without a subcommand the binary serves webhooks. Operator subcommands:
//! - `check-config` - Validate configuration and sign a probe app JWT
//! - `token` - Print a fresh installation access token

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{AppJwtIssuer, Clock, SystemClock};
use crate::config::Config;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "branch-warden")]
#[command(author, version, about = "Protects the default branch of newly created GitHub repositories", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "BRANCH_WARDEN_CONFIG", default_value = "branch-warden.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Subcommand to run (if none, starts the server)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Validate configuration and check that the app key can sign a JWT
    CheckConfig,

    /// Fetch an installation access token and print it to stdout
    Token,
}

/// Run a CLI command
pub async fn run_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Some(Commands::CheckConfig) => cmd_check_config(cli),
        Some(Commands::Token) => cmd_token(cli).await,
        None => {
            // No subcommand means start the server - this is handled in main.rs
            Ok(())
        }
    }
}

fn cmd_check_config(cli: &Cli) -> Result<()> {
    println!("Checking configuration: {}", cli.config.display());
    println!();

    let config = match Config::load(&cli.config).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            println!("[!!] Configuration is invalid!");
            println!();
            println!("Error: {:#}", e);
            anyhow::bail!("Invalid configuration");
        }
    };

    let identity = config.app_identity()?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    AppJwtIssuer::new(&identity, clock)
        .and_then(|issuer| issuer.issue())
        .context("GitHub App private key cannot sign a JWT")?;

    println!("[OK] Configuration is valid!");
    println!();
    println!("Server:");
    println!("  Listen:        {}:{}", config.server.host, config.server.port);
    println!();
    println!("GitHub:");
    println!("  API URL:       {}", config.github.api_url);
    println!("  App ID:        {}", identity.issuer());
    println!("  Installation:  {}", config.installation_id()?);
    println!("  Timeout:       {}s", config.github.request_timeout_secs);
    println!();
    println!("Protection:");
    println!(
        "  Reviews:       {}",
        config.protection.required_approving_review_count
    );
    println!(
        "  Admins:        {}",
        if config.protection.enforce_admins {
            "Enforced"
        } else {
            "Not enforced"
        }
    );
    println!();
    println!(
        "Notifications:   {}",
        if config.notifications.enabled {
            "Enabled"
        } else {
            "Disabled"
        }
    );

    Ok(())
}

async fn cmd_token(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    config.validate()?;

    let cache = crate::build_token_cache(&config, Arc::new(SystemClock))?;
    let token = cache
        .get_valid_token(config.installation_id()?)
        .await
        .context("Failed to fetch installation access token")?;

    eprintln!("Token expires at {}", token.expires_at().to_rfc3339());
    println!("{}", token.as_str());
    Ok(())
}
