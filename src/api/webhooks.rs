use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde::Deserialize;
use std::sync::Arc;

use super::error::ApiError;
use crate::auth::WebhookRequest;
use crate::engine::CreatedRepository;
use crate::AppState;

/// Envelope of a GitHub `repository` event. Only `created` is acted on.
#[derive(Debug, Deserialize)]
pub struct RepositoryEvent {
    #[serde(default)]
    pub action: String,
    pub repository: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct GitHubRepository {
    pub id: u64,
    pub full_name: String,
    pub default_branch: String,
}

impl From<GitHubRepository> for CreatedRepository {
    fn from(repo: GitHubRepository) -> Self {
        Self {
            id: repo.id,
            full_name: repo.full_name,
            default_branch: repo.default_branch,
        }
    }
}

pub async fn github_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, String), ApiError> {
    let verified = state.gate.verify(WebhookRequest::new(body, headers))?;

    let event: RepositoryEvent = serde_json::from_slice(verified.body()).map_err(|e| {
        tracing::warn!("Failed to parse GitHub webhook payload: {}", e);
        ApiError::bad_request("Invalid JSON payload")
    })?;

    let repo_value = match event.repository {
        Some(repo) if event.action == "created" => repo,
        _ => {
            tracing::debug!(action = %event.action, "Ignoring repository event");
            return Ok((StatusCode::OK, "Ignored".to_string()));
        }
    };

    let repo: CreatedRepository = serde_json::from_value::<GitHubRepository>(repo_value.clone())
        .map_err(|e| {
            tracing::warn!("Repository payload is missing fields: {}", e);
            ApiError::bad_request("Repository payload is missing id, full_name or default_branch")
        })?
        .into();

    tracing::info!(
        "Received repo-created webhook for repo '{}' with id {}",
        repo.full_name,
        repo.id
    );

    if let Err(e) = state
        .notifier
        .publish(&state.config.notifications.subject, &repo_value.to_string())
        .await
    {
        tracing::warn!("Failed to publish notification: {:#}", e);
    }

    let credential = state.gate.credential(&verified, state.installation_id).await?;

    state
        .guard
        .protect_repository(&credential, &repo)
        .await
        .map_err(|e| {
            tracing::error!("Failed to protect {}: {:#}", repo.full_name, e);
            ApiError::external("Failed to configure repository on GitHub")
        })?;

    Ok((StatusCode::OK, repo.full_name))
}
