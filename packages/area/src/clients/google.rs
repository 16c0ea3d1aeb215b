use base64::Engine;
use serde_json::{json, Value};

use crate::components::ComponentError;

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail REST wrapper around a user's OAuth access token
#[derive(Debug)]
pub struct GoogleClient {
    http: reqwest::Client,
    token: String,
}

impl GoogleClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ComponentError> {
        Ok(Self {
            http: super::http_client()?,
            token: token.into(),
        })
    }

    async fn check(response: reqwest::Response) -> Result<Value, ComponentError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ComponentError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }
        Ok(response.json().await?)
    }

    /// Message ids matching a gmail search query (e.g. `after:1700000000`),
    /// most recent first
    pub async fn list_messages(&self, query: &str) -> Result<Vec<Value>, ComponentError> {
        let response = self
            .http
            .get(format!("{API_BASE}/users/me/messages"))
            .bearer_auth(&self.token)
            .query(&[("q", query), ("maxResults", "10")])
            .send()
            .await?;

        let body = Self::check(response).await?;
        Ok(body
            .get("messages")
            .and_then(|m| m.as_array())
            .cloned()
            .unwrap_or_default())
    }

    pub async fn get_message(&self, id: &str) -> Result<Value, ComponentError> {
        let response = self
            .http
            .get(format!("{API_BASE}/users/me/messages/{id}"))
            .bearer_auth(&self.token)
            .send()
            .await?;

        Self::check(response).await
    }

    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        cc: &[String],
        bcc: &[String],
    ) -> Result<Value, ComponentError> {
        let mut message = format!("To: {to}\r\n");
        if !cc.is_empty() {
            message.push_str(&format!("Cc: {}\r\n", cc.join(", ")));
        }
        if !bcc.is_empty() {
            message.push_str(&format!("Bcc: {}\r\n", bcc.join(", ")));
        }
        message.push_str(&format!("Subject: {subject}\r\n\r\n{body}"));

        let raw = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(message);

        let response = self
            .http
            .post(format!("{API_BASE}/users/me/messages/send"))
            .bearer_auth(&self.token)
            .json(&json!({"raw": raw}))
            .send()
            .await?;

        Self::check(response).await
    }
}
