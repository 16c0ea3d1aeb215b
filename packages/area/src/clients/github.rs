use serde_json::{json, Value};

use crate::components::ComponentError;

const API_BASE: &str = "https://api.github.com";

/// Stateless GitHub REST wrapper; one instance per component construction,
/// wrapping the bearer token injected into the component's config. The
/// token is optional - public repositories work unauthenticated.
#[derive(Debug)]
pub struct GitHubClient {
    http: reqwest::Client,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self, ComponentError> {
        Ok(Self {
            http: super::http_client()?,
            token,
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", "area-node");
        match &self.token {
            Some(token) => request.header("Authorization", format!("token {token}")),
            None => request,
        }
    }

    async fn get(&self, path: &str) -> Result<Value, ComponentError> {
        let response = self
            .authorize(self.http.get(format!("{API_BASE}/{path}")))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ComponentError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }

        Ok(response.json().await?)
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, ComponentError> {
        let response = self
            .authorize(self.http.post(format!("{API_BASE}/{path}")))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ComponentError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }

        Ok(response.json().await?)
    }

    /// Commits of `owner/repo`, most recent first
    pub async fn repo_commits(&self, repo: &str) -> Result<Vec<Value>, ComponentError> {
        let commits = self.get(&format!("repos/{repo}/commits")).await?;
        Ok(commits.as_array().cloned().unwrap_or_default())
    }

    pub async fn create_issue(
        &self,
        repo: &str,
        title: &str,
        body: &str,
    ) -> Result<Value, ComponentError> {
        self.post(
            &format!("repos/{repo}/issues"),
            json!({"title": title, "body": body}),
        )
        .await
    }
}
