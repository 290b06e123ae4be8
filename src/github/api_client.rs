//! GitHub API client for repository setup operations.
//!
//! This client uses an installation access token to list branches, create
//! files, configure branch protection and open issues. Repositories are
//! addressed by numeric id so renames between delivery and handling are
//! harmless.

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auth::Credential;

use super::{ACCEPT_HEADER, API_VERSION};

/// GitHub API client for installation-based operations.
pub struct GitHubClient {
    access_token: String,
    api_url: Url,
    user_agent: String,
    client: reqwest::Client,
}

impl GitHubClient {
    /// Create a new GitHub client with an installation credential.
    pub fn new(
        credential: &Credential,
        api_url: &str,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build GitHub HTTP client")?;
        let api_url = Url::parse(api_url)
            .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;
        if api_url.cannot_be_a_base() {
            anyhow::bail!("GitHub API URL cannot carry a path: {}", api_url);
        }

        Ok(Self {
            access_token: credential.as_str().to_string(),
            api_url,
            user_agent: user_agent.to_string(),
            client,
        })
    }

    /// Append path segments to the API base. Each segment is percent-encoded,
    /// so branch names containing `#`, `?` or `/` stay in the path.
    fn endpoint<I>(&self, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.api_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Accept", ACCEPT_HEADER)
            .header("User-Agent", &self.user_agent)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send<T: for<'de> Deserialize<'de>>(&self, builder: reqwest::RequestBuilder) -> Result<T> {
        let response = builder
            .send()
            .await
            .context("Failed to make GitHub API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("GitHub API error: {} - {}", status, body);
        }

        response.json().await.context("Failed to parse GitHub API response")
    }

    /// List one page of branches for a repository.
    pub async fn list_branches(&self, repo_id: u64, per_page: u32, page: u32) -> Result<Vec<Branch>> {
        let repo = repo_id.to_string();
        let url = self.endpoint(["repositories", repo.as_str(), "branches"]);
        self.send(
            self.request(reqwest::Method::GET, url)
                .query(&[("per_page", per_page), ("page", page)]),
        )
        .await
    }

    /// List all branches (paginated, fetching all pages).
    pub async fn list_all_branches(&self, repo_id: u64) -> Result<Vec<Branch>> {
        let mut all_branches = Vec::new();
        let mut page = 1;
        let per_page = 100;

        loop {
            let branches = self.list_branches(repo_id, per_page, page).await?;
            let last_page = branches.len() < per_page as usize;
            all_branches.extend(branches);
            if last_page {
                break;
            }
            page += 1;
        }

        Ok(all_branches)
    }

    /// Create a file with a single commit. On an empty repository this also
    /// creates `branch`.
    pub async fn create_file(
        &self,
        repo_id: u64,
        file_path: &str,
        message: &str,
        content: &str,
        branch: &str,
    ) -> Result<FileCommitResponse> {
        let request_body = CreateFileRequest {
            message: message.to_string(),
            content: BASE64.encode(content),
            branch: branch.to_string(),
        };

        let repo = repo_id.to_string();
        let url = self.endpoint(
            ["repositories", repo.as_str(), "contents"]
                .into_iter()
                .chain(file_path.split('/')),
        );

        self.send(self.request(reqwest::Method::PUT, url).json(&request_body))
            .await
    }

    /// Replace the protection settings of a branch.
    pub async fn update_branch_protection(
        &self,
        repo_id: u64,
        branch: &str,
        protection: &BranchProtectionRequest,
    ) -> Result<serde_json::Value> {
        let repo = repo_id.to_string();
        let url = self.endpoint([
            "repositories",
            repo.as_str(),
            "branches",
            branch,
            "protection",
        ]);
        self.send(self.request(reqwest::Method::PUT, url).json(protection))
            .await
    }

    /// Open an issue and return it.
    pub async fn create_issue(&self, repo_id: u64, issue: &NewIssue) -> Result<Issue> {
        let repo = repo_id.to_string();
        let url = self.endpoint(["repositories", repo.as_str(), "issues"]);
        self.send(self.request(reqwest::Method::POST, url).json(issue))
            .await
    }
}

/// Branch from GitHub API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Branch {
    pub name: String,
}

#[derive(Debug, Serialize)]
struct CreateFileRequest {
    message: String,
    content: String,
    branch: String,
}

#[derive(Debug, Deserialize)]
pub struct FileCommitResponse {
    pub commit: CommitRef,
}

#[derive(Debug, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

/// Body of `PUT /branches/{branch}/protection`. GitHub requires all four
/// top-level keys to be present, with `null` meaning "not enforced".
#[derive(Debug, Clone, Serialize)]
pub struct BranchProtectionRequest {
    pub required_status_checks: Option<serde_json::Value>,
    pub enforce_admins: bool,
    pub required_pull_request_reviews: Option<RequiredReviews>,
    pub restrictions: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequiredReviews {
    pub dismiss_stale_reviews: bool,
    pub require_code_owner_reviews: bool,
    pub required_approving_review_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewIssue {
    pub title: String,
    pub body: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assignees: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct Issue {
    pub html_url: String,
}
