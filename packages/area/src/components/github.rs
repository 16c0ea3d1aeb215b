use area_types::{ActionResponse, ReactionResponse, TriggerResponse};
use async_trait::async_trait;

use crate::clients::github::GitHubClient;
use crate::registry::{ComponentRegistry, RegistryError};
use crate::schema::{ConfigSchema, FieldKind, FieldSpec, ValidatedConfig};

use super::{passes_filter, render_template, Action, ComponentError, Reaction, Trigger};

pub fn register(registry: &mut ComponentRegistry) -> Result<(), RegistryError> {
    registry.register_trigger(
        "new_push",
        "github",
        ConfigSchema::new().field(FieldSpec::required("repo", FieldKind::String)),
        |config| Ok(Box::new(NewPushTrigger::new(config)?)),
    )?;

    registry.register_action(
        "new_push",
        "github",
        ConfigSchema::new()
            .field(FieldSpec::required("content", FieldKind::String))
            .field(FieldSpec::required("commit_sha", FieldKind::String))
            .field(FieldSpec::required("commit_message", FieldKind::String))
            .field(FieldSpec::required("author", FieldKind::String))
            .field(FieldSpec::required("branch", FieldKind::String))
            .field(FieldSpec::required("commit_url", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(NewPushAction { config })),
    )?;

    registry.register_reaction(
        "create_issue",
        "github",
        ConfigSchema::new()
            .field(FieldSpec::required("repository", FieldKind::String))
            .field(FieldSpec::required("title", FieldKind::String))
            .field(FieldSpec::required("body", FieldKind::String)),
        |config| Ok(Box::new(CreateIssueReaction::new(config)?)),
    )?;

    Ok(())
}

/// Polls the repository's commit list; the cursor is the last seen SHA.
/// The very first poll fires on the current head commit.
pub struct NewPushTrigger {
    client: GitHubClient,
    repo: String,
    last_commit_sha: Option<String>,
}

impl NewPushTrigger {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        Ok(Self {
            client: GitHubClient::new(config.token().map(str::to_string))?,
            repo: config.get_str("repo").unwrap_or_default().to_string(),
            last_commit_sha: None,
        })
    }
}

#[async_trait]
impl Trigger for NewPushTrigger {
    fn name(&self) -> &'static str {
        "new_push"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let commits = self.client.repo_commits(&self.repo).await?;
        let Some(latest) = commits.first() else {
            return Ok(None);
        };

        let latest_sha = latest
            .get("sha")
            .and_then(|s| s.as_str())
            .unwrap_or_default()
            .to_string();
        if Some(&latest_sha) == self.last_commit_sha.as_ref() {
            return Ok(None);
        }
        self.last_commit_sha = Some(latest_sha.clone());

        let commit = latest.get("commit").cloned().unwrap_or_default();
        Ok(Some(
            TriggerResponse::new(latest.to_string())
                .with_detail("event", "new_push")
                .with_detail("repository", self.repo.clone())
                .with_field("commit_sha", latest_sha)
                .with_field(
                    "commit_message",
                    commit
                        .get("message")
                        .and_then(|m| m.as_str())
                        .unwrap_or_default(),
                )
                .with_field(
                    "author",
                    commit
                        .get("author")
                        .and_then(|a| a.get("name"))
                        .and_then(|n| n.as_str())
                        .unwrap_or_default(),
                )
                .with_field(
                    "branch",
                    latest
                        .get("branch")
                        .and_then(|b| b.as_str())
                        .unwrap_or("main"),
                )
                .with_field(
                    "commit_url",
                    latest
                        .get("html_url")
                        .and_then(|u| u.as_str())
                        .unwrap_or_default(),
                ),
        ))
    }
}

/// Passes the commit fields through, optionally gated by a filter
pub struct NewPushAction {
    config: ValidatedConfig,
}

#[async_trait]
impl Action for NewPushAction {
    fn name(&self) -> &'static str {
        "new_push"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        let field = |name: &str| self.config.get_str(name).unwrap_or_default().to_string();

        Ok(Some(
            ActionResponse::ok()
                .with_detail("event", "new_push")
                .with_field("content", field("content"))
                .with_field("commit_sha", field("commit_sha"))
                .with_field("commit_message", field("commit_message"))
                .with_field("author", field("author"))
                .with_field("branch", field("branch"))
                .with_field("commit_url", field("commit_url")),
        ))
    }
}

/// Opens an issue; title and body support `{field}` placeholders filled
/// from the action response (commit_message, author, branch, ...)
#[derive(Debug)]
pub struct CreateIssueReaction {
    client: GitHubClient,
    config: ValidatedConfig,
}

impl CreateIssueReaction {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        let token = config
            .token()
            .map(str::to_string)
            .ok_or(ComponentError::MissingCredential)?;
        Ok(Self {
            client: GitHubClient::new(Some(token))?,
            config,
        })
    }
}

#[async_trait]
impl Reaction for CreateIssueReaction {
    fn name(&self) -> &'static str {
        "create_issue"
    }

    async fn execute(&self, input: &ActionResponse) -> Result<ReactionResponse, ComponentError> {
        let data = input.to_map();
        let repository = self.config.get_str("repository").unwrap_or_default();
        let title = render_template(self.config.get_str("title").unwrap_or_default(), &data);
        let body = render_template(self.config.get_str("body").unwrap_or_default(), &data);

        tracing::info!(repository, title, "Creating issue");
        let issue = self.client.create_issue(repository, &title, &body).await?;

        Ok(ReactionResponse::ok()
            .with_detail("message", "Issue created successfully")
            .with_detail(
                "issue_number",
                issue.get("number").cloned().unwrap_or_default(),
            )
            .with_detail(
                "issue_url",
                issue.get("html_url").cloned().unwrap_or_default(),
            ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{validate, ComponentKind};
    use serde_json::json;

    #[tokio::test]
    async fn action_projects_commit_fields() {
        let schema = ConfigSchema::new()
            .field(FieldSpec::required("content", FieldKind::String))
            .field(FieldSpec::required("commit_sha", FieldKind::String))
            .field(FieldSpec::required("commit_message", FieldKind::String))
            .field(FieldSpec::required("author", FieldKind::String))
            .field(FieldSpec::required("branch", FieldKind::String))
            .field(FieldSpec::required("commit_url", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object));
        let options = json!({
            "content": "{}",
            "commit_sha": "abc123",
            "commit_message": "fix the build",
            "author": "alice",
            "branch": "main",
            "commit_url": "https://example.com/c/abc123",
        })
        .as_object()
        .unwrap()
        .clone();
        let config = validate(ComponentKind::Action, &schema, &options).unwrap();

        let response = NewPushAction { config }.execute().await.unwrap().unwrap();
        assert!(response.success);
        assert_eq!(response.extra["commit_sha"], "abc123");
        assert_eq!(response.extra["author"], "alice");
    }

    #[tokio::test]
    async fn action_filter_can_reject() {
        let schema = ConfigSchema::new()
            .field(FieldSpec::required("commit_message", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object));
        let options = json!({
            "commit_message": "chore: bump deps",
            "filter": {
                "conditions": [
                    {"field": "commit_message", "operator": "starts_with", "value": "fix"}
                ]
            },
        })
        .as_object()
        .unwrap()
        .clone();
        let config = validate(ComponentKind::Action, &schema, &options).unwrap();

        // schema here is a trimmed view; only the filter outcome matters
        let response = NewPushAction { config }.execute().await.unwrap();
        assert!(response.is_none());
    }

    #[test]
    fn create_issue_requires_a_token() {
        let schema = ConfigSchema::new()
            .field(FieldSpec::required("repository", FieldKind::String))
            .field(FieldSpec::required("title", FieldKind::String))
            .field(FieldSpec::required("body", FieldKind::String));
        let options = json!({"repository": "a/b", "title": "t", "body": "b"})
            .as_object()
            .unwrap()
            .clone();
        let config = validate(ComponentKind::Reaction, &schema, &options).unwrap();

        let err = CreateIssueReaction::new(config).unwrap_err();
        assert!(matches!(err, ComponentError::MissingCredential));
    }
}
