use serde_json::{json, Value};

use crate::components::ComponentError;

const API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Microsoft Graph mail wrapper around a user's OAuth access token
pub struct OutlookClient {
    http: reqwest::Client,
    token: String,
}

impl OutlookClient {
    pub fn new(token: impl Into<String>) -> Result<Self, ComponentError> {
        Ok(Self {
            http: super::http_client()?,
            token: token.into(),
        })
    }

    /// Most recent inbox messages, newest first, optionally only those
    /// received after the given ISO-8601 instant
    pub async fn list_messages(&self, since: Option<&str>) -> Result<Vec<Value>, ComponentError> {
        let mut request = self
            .http
            .get(format!("{API_BASE}/me/messages"))
            .bearer_auth(&self.token)
            .query(&[("$top", "10"), ("$orderby", "receivedDateTime desc")]);

        if let Some(since) = since {
            request = request.query(&[("$filter", format!("receivedDateTime gt {since}"))]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ComponentError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }

        let body: Value = response.json().await?;
        Ok(body
            .get("value")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    pub async fn send_mail(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), ComponentError> {
        let message = json!({
            "message": {
                "subject": subject,
                "body": {"contentType": "Text", "content": body},
                "toRecipients": [{"emailAddress": {"address": to}}],
            },
            "saveToSentItems": true,
        });

        let response = self
            .http
            .post(format!("{API_BASE}/me/sendMail"))
            .bearer_auth(&self.token)
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        // Graph replies 202 Accepted with an empty body
        if !status.is_success() {
            return Err(ComponentError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }

        Ok(())
    }
}
