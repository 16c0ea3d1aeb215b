use area_types::{epoch_now, ActionResponse, ReactionResponse, TriggerResponse};
use async_trait::async_trait;

use crate::clients::google::GoogleClient;
use crate::registry::{ComponentRegistry, RegistryError};
use crate::schema::{ConfigSchema, FieldKind, FieldSpec, ValidatedConfig};

use super::{passes_filter, render_template, Action, ComponentError, Reaction, Trigger};

pub fn register(registry: &mut ComponentRegistry) -> Result<(), RegistryError> {
    registry.register_trigger("gmail_receive", "google", ConfigSchema::new(), |config| {
        Ok(Box::new(GmailTrigger::new(config)?))
    })?;

    registry.register_action(
        "gmail_receive",
        "google",
        ConfigSchema::new()
            .field(FieldSpec::required("message_id", FieldKind::String))
            .field(FieldSpec::required("sender", FieldKind::String))
            .field(FieldSpec::required("subject", FieldKind::String))
            .field(FieldSpec::required("snippet", FieldKind::String))
            .field(FieldSpec::required("received_at", FieldKind::String))
            .field(FieldSpec::optional("filter_sender", FieldKind::String))
            .field(FieldSpec::optional("filter_subject", FieldKind::String))
            .field(FieldSpec::optional("filter_content", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(GmailReceiveAction { config })),
    )?;

    registry.register_reaction(
        "send_email",
        "google",
        ConfigSchema::new()
            .field(FieldSpec::required("to", FieldKind::String))
            .field(FieldSpec::required("subject", FieldKind::String))
            .field(FieldSpec::required("body", FieldKind::String))
            .field(FieldSpec::with_default("cc", FieldKind::List, serde_json::json!([])))
            .field(FieldSpec::with_default("bcc", FieldKind::List, serde_json::json!([]))),
        |config| Ok(Box::new(GmailSendReaction::new(config)?)),
    )?;

    Ok(())
}

/// Polls for mail received since the last check; fires on the most recent
/// new message
pub struct GmailTrigger {
    client: GoogleClient,
    last_check: f64,
}

impl GmailTrigger {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        let token = config
            .token()
            .map(str::to_string)
            .ok_or(ComponentError::MissingCredential)?;
        Ok(Self {
            client: GoogleClient::new(token)?,
            last_check: epoch_now(),
        })
    }
}

#[async_trait]
impl Trigger for GmailTrigger {
    fn name(&self) -> &'static str {
        "gmail_receive"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let query = format!("after:{}", self.last_check as i64);
        let messages = self.client.list_messages(&query).await?;

        let Some(message) = messages.first() else {
            return Ok(None);
        };
        let Some(id) = message.get("id").and_then(|id| id.as_str()) else {
            return Ok(None);
        };

        let details = self.client.get_message(id).await?;
        self.last_check = epoch_now();

        let headers = details
            .get("payload")
            .and_then(|p| p.get("headers"))
            .and_then(|h| h.as_array())
            .cloned()
            .unwrap_or_default();
        let header = |name: &str| {
            headers
                .iter()
                .find(|h| {
                    h.get("name")
                        .and_then(|n| n.as_str())
                        .is_some_and(|n| n.eq_ignore_ascii_case(name))
                })
                .and_then(|h| h.get("value"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        Ok(Some(
            TriggerResponse::new(details.to_string())
                .with_detail("event", "mail_received")
                .with_field("message_id", id)
                .with_field("sender", header("From").unwrap_or("Unknown Sender".into()))
                .with_field("subject", header("Subject").unwrap_or("No Subject".into()))
                .with_field(
                    "snippet",
                    details
                        .get("snippet")
                        .and_then(|s| s.as_str())
                        .unwrap_or_default(),
                )
                .with_field(
                    "received_at",
                    details
                        .get("internalDate")
                        .and_then(|d| d.as_str())
                        .unwrap_or_default(),
                ),
        ))
    }
}

/// Evaluates the received mail against the configured filters. A rejected
/// mail yields None: the worker silently skips the reaction.
pub struct GmailReceiveAction {
    config: ValidatedConfig,
}

impl GmailReceiveAction {
    /// Case-insensitive contains, mirroring the mail-specific filters
    fn matches(&self, filter_key: &str, value: &str) -> bool {
        match self.config.get_str(filter_key) {
            Some(needle) => value.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

#[async_trait]
impl Action for GmailReceiveAction {
    fn name(&self) -> &'static str {
        "gmail_receive"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        let field = |name: &str| self.config.get_str(name).unwrap_or_default().to_string();

        let sender = field("sender");
        let subject = field("subject");
        let snippet = field("snippet");

        if !self.matches("filter_sender", &sender)
            || !self.matches("filter_subject", &subject)
            || !self.matches("filter_content", &snippet)
        {
            return Ok(None);
        }
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        Ok(Some(
            ActionResponse::ok()
                .with_field("message_id", field("message_id"))
                .with_field("sender", sender)
                .with_field("subject", subject)
                .with_field("snippet", snippet)
                .with_field("received_at", field("received_at")),
        ))
    }
}

/// Sends a mail; subject and body support `{field}` placeholders filled
/// from the action response
#[derive(Debug)]
pub struct GmailSendReaction {
    client: GoogleClient,
    config: ValidatedConfig,
}

impl GmailSendReaction {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        let token = config
            .token()
            .map(str::to_string)
            .ok_or(ComponentError::MissingCredential)?;
        Ok(Self {
            client: GoogleClient::new(token)?,
            config,
        })
    }

    fn recipients(&self, key: &str) -> Vec<String> {
        self.config
            .get(key)
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Reaction for GmailSendReaction {
    fn name(&self) -> &'static str {
        "send_email"
    }

    async fn execute(&self, input: &ActionResponse) -> Result<ReactionResponse, ComponentError> {
        let data = input.to_map();
        let to = self.config.get_str("to").unwrap_or_default();
        let subject = render_template(self.config.get_str("subject").unwrap_or_default(), &data);
        let body = render_template(self.config.get_str("body").unwrap_or_default(), &data);

        tracing::info!(to, subject, "Sending mail");
        let result = self
            .client
            .send_email(
                to,
                &subject,
                &body,
                &self.recipients("cc"),
                &self.recipients("bcc"),
            )
            .await?;

        Ok(ReactionResponse::ok()
            .with_detail("message_id", result.get("id").cloned().unwrap_or_default())
            .with_detail(
                "thread_id",
                result.get("threadId").cloned().unwrap_or_default(),
            )
            .with_detail("to", to)
            .with_detail("subject", subject))
    }
}
