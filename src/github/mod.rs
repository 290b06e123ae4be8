//! GitHub integration module for GitHub App support.
//!
//! This module provides:
//! - Installation access token exchange (app JWT -> installation token)
//! - GitHub API client for repository operations

pub mod api_client;
pub mod token_manager;

pub use api_client::{BranchProtectionRequest, GitHubClient, NewIssue, RequiredReviews};
pub use token_manager::GitHubTokenExchange;

pub(crate) const ACCEPT_HEADER: &str = "application/vnd.github+json";
pub(crate) const API_VERSION: &str = "2022-11-28";
