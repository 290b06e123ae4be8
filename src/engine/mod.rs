//! Repository guard: makes a freshly created repository safe to work in.
//!
//! For each new repository the guard makes sure the default branch exists
//! (committing a blank README to an empty repository), protects it, and opens
//! an issue explaining the rules. Issue creation is best effort.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::auth::Credential;
use crate::config::{GitHubConfig, ProtectionConfig};
use crate::github::{BranchProtectionRequest, GitHubClient, NewIssue, RequiredReviews};

const ISSUE_BODY: &str = include_str!("../../assets/issue_body.md");

const README_PATH: &str = "README.md";
const README_COMMIT_MESSAGE: &str =
    "Automatically creating ReadMe file to create default branch in empty repo";
const README_CONTENT: &str = "## Blank README file";

/// The fields of a `repository.created` delivery the guard needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRepository {
    pub id: u64,
    pub full_name: String,
    pub default_branch: String,
}

/// What the guard did to a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectionOutcome {
    /// The default branch was missing and has been created.
    pub created_default_branch: bool,
    /// URL of the explanatory issue, if it could be opened.
    pub issue_url: Option<String>,
}

#[async_trait]
pub trait RepositoryGuard: Send + Sync {
    async fn protect_repository(
        &self,
        credential: &Credential,
        repo: &CreatedRepository,
    ) -> Result<ProtectionOutcome>;
}

/// [`RepositoryGuard`] that talks to the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubRepositoryGuard {
    api_url: String,
    user_agent: String,
    timeout: Duration,
    protection: ProtectionConfig,
}

impl GitHubRepositoryGuard {
    pub fn new(github: &GitHubConfig, protection: ProtectionConfig) -> Self {
        Self {
            api_url: github.api_url.clone(),
            user_agent: github.user_agent.clone(),
            timeout: github.request_timeout(),
            protection,
        }
    }

    fn protection_request(&self) -> BranchProtectionRequest {
        BranchProtectionRequest {
            required_status_checks: None,
            enforce_admins: self.protection.enforce_admins,
            required_pull_request_reviews: Some(RequiredReviews {
                dismiss_stale_reviews: false,
                require_code_owner_reviews: false,
                required_approving_review_count: self.protection.required_approving_review_count,
            }),
            restrictions: None,
        }
    }

    async fn ensure_default_branch(
        &self,
        client: &GitHubClient,
        repo: &CreatedRepository,
    ) -> Result<bool> {
        let branches = client
            .list_all_branches(repo.id)
            .await
            .with_context(|| format!("Failed to list branches of {}", repo.full_name))?;

        if branches.iter().any(|b| b.name == repo.default_branch) {
            return Ok(false);
        }

        tracing::info!(
            "Default branch {} missing in {}, creating README",
            repo.default_branch,
            repo.full_name
        );
        client
            .create_file(
                repo.id,
                README_PATH,
                README_COMMIT_MESSAGE,
                README_CONTENT,
                &repo.default_branch,
            )
            .await
            .with_context(|| format!("Failed to create README in {}", repo.full_name))?;

        Ok(true)
    }

    async fn open_issue(&self, client: &GitHubClient, repo: &CreatedRepository) -> Option<String> {
        let issue = NewIssue {
            title: self.protection.issue_title.clone(),
            body: ISSUE_BODY.to_string(),
            assignees: self.protection.issue_assignees.clone(),
        };

        match client.create_issue(repo.id, &issue).await {
            Ok(issue) => {
                tracing::info!("Created new issue at {}", issue.html_url);
                Some(issue.html_url)
            }
            Err(e) => {
                tracing::warn!("Error creating issue in {}: {:#}", repo.full_name, e);
                None
            }
        }
    }
}

#[async_trait]
impl RepositoryGuard for GitHubRepositoryGuard {
    async fn protect_repository(
        &self,
        credential: &Credential,
        repo: &CreatedRepository,
    ) -> Result<ProtectionOutcome> {
        let client = GitHubClient::new(credential, &self.api_url, &self.user_agent, self.timeout)?;

        let created_default_branch = self.ensure_default_branch(&client, repo).await?;

        client
            .update_branch_protection(repo.id, &repo.default_branch, &self.protection_request())
            .await
            .with_context(|| {
                format!(
                    "Failed to protect branch {} of {}",
                    repo.default_branch, repo.full_name
                )
            })?;
        tracing::info!(
            "Protected branch {} of {}",
            repo.default_branch,
            repo.full_name
        );

        let issue_url = self.open_issue(&client, repo).await;

        Ok(ProtectionOutcome {
            created_default_branch,
            issue_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn repo() -> CreatedRepository {
        CreatedRepository {
            id: 42,
            full_name: "acme/widgets".to_string(),
            default_branch: "main".to_string(),
        }
    }

    fn guard_for(server: &MockServer) -> GitHubRepositoryGuard {
        let github = GitHubConfig {
            api_url: server.uri(),
            ..GitHubConfig::default()
        };
        let protection = ProtectionConfig {
            issue_assignees: vec!["octocat".to_string()],
            ..ProtectionConfig::default()
        };
        GitHubRepositoryGuard::new(&github, protection)
    }

    async fn mount_protection(server: &MockServer) {
        Mock::given(method("PUT"))
            .and(path("/repositories/42/branches/main/protection"))
            .and(body_partial_json(serde_json::json!({
                "enforce_admins": true,
                "required_pull_request_reviews": {"required_approving_review_count": 1}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(server)
            .await;
    }

    async fn mount_issue(server: &MockServer, status: u16) {
        Mock::given(method("POST"))
            .and(path("/repositories/42/issues"))
            .and(body_partial_json(serde_json::json!({
                "title": "Branch protections enabled for this repo",
                "assignees": ["octocat"]
            })))
            .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                "number": 1,
                "html_url": "https://github.com/acme/widgets/issues/1"
            })))
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_empty_repo_gets_readme_protection_and_issue() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/42/branches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repositories/42/contents/README.md"))
            .and(body_partial_json(serde_json::json!({"branch": "main"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "commit": {"sha": "abc123"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        mount_protection(&server).await;
        mount_issue(&server, 201).await;

        let outcome = guard_for(&server)
            .protect_repository(&Credential::new("ghs_test"), &repo())
            .await
            .unwrap();

        assert!(outcome.created_default_branch);
        assert_eq!(
            outcome.issue_url.as_deref(),
            Some("https://github.com/acme/widgets/issues/1")
        );
    }

    #[tokio::test]
    async fn test_existing_branch_is_not_recreated() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/42/branches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "main", "protected": false}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repositories/42/contents/README.md"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;
        mount_protection(&server).await;
        mount_issue(&server, 201).await;

        let outcome = guard_for(&server)
            .protect_repository(&Credential::new("ghs_test"), &repo())
            .await
            .unwrap();

        assert!(!outcome.created_default_branch);
    }

    #[tokio::test]
    async fn test_issue_failure_is_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/42/branches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "main"}
            ])))
            .mount(&server)
            .await;
        mount_protection(&server).await;
        mount_issue(&server, 422).await;

        let outcome = guard_for(&server)
            .protect_repository(&Credential::new("ghs_test"), &repo())
            .await
            .unwrap();

        assert_eq!(outcome.issue_url, None);
    }

    #[tokio::test]
    async fn test_branch_with_reserved_characters_is_protected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/42/branches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "dev#1"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repositories/42/branches/dev%231/protection"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;
        mount_issue(&server, 201).await;

        let repo = CreatedRepository {
            default_branch: "dev#1".to_string(),
            ..repo()
        };
        let outcome = guard_for(&server)
            .protect_repository(&Credential::new("ghs_test"), &repo)
            .await
            .unwrap();

        assert!(!outcome.created_default_branch);
    }

    #[tokio::test]
    async fn test_protection_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repositories/42/branches"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"name": "main"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repositories/42/branches/main/protection"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Resource not accessible"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repositories/42/issues"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let err = guard_for(&server)
            .protect_repository(&Credential::new("ghs_test"), &repo())
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("403"));
    }
}
