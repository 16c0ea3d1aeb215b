use area_types::{ActionResponse, ReactionResponse, TriggerResponse};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};

use crate::clients::outlook::OutlookClient;
use crate::registry::{ComponentRegistry, RegistryError};
use crate::schema::{ConfigSchema, FieldKind, FieldSpec, ValidatedConfig};

use super::{passes_filter, render_template, Action, ComponentError, Reaction, Trigger};

pub fn register(registry: &mut ComponentRegistry) -> Result<(), RegistryError> {
    registry.register_trigger(
        "outlook_receive",
        "microsoft",
        ConfigSchema::new(),
        |config| Ok(Box::new(OutlookTrigger::new(config)?)),
    )?;

    registry.register_action(
        "outlook_receive",
        "microsoft",
        ConfigSchema::new()
            .field(FieldSpec::required("message_id", FieldKind::String))
            .field(FieldSpec::required("sender", FieldKind::String))
            .field(FieldSpec::required("subject", FieldKind::String))
            .field(FieldSpec::required("preview", FieldKind::String))
            .field(FieldSpec::required("received_at", FieldKind::String))
            .field(FieldSpec::optional("filter_sender", FieldKind::String))
            .field(FieldSpec::optional("filter_subject", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(OutlookReceiveAction { config })),
    )?;

    registry.register_reaction(
        "send_mail",
        "microsoft",
        ConfigSchema::new()
            .field(FieldSpec::required("to", FieldKind::String))
            .field(FieldSpec::required("subject", FieldKind::String))
            .field(FieldSpec::required("body", FieldKind::String)),
        |config| Ok(Box::new(OutlookSendReaction::new(config)?)),
    )?;

    Ok(())
}

/// Polls the Graph inbox for messages newer than the last check
pub struct OutlookTrigger {
    client: OutlookClient,
    last_check: DateTime<Utc>,
}

impl OutlookTrigger {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        let token = config
            .token()
            .map(str::to_string)
            .ok_or(ComponentError::MissingCredential)?;
        Ok(Self {
            client: OutlookClient::new(token)?,
            last_check: Utc::now(),
        })
    }
}

#[async_trait]
impl Trigger for OutlookTrigger {
    fn name(&self) -> &'static str {
        "outlook_receive"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let since = self.last_check.to_rfc3339_opts(SecondsFormat::Secs, true);
        let messages = self.client.list_messages(Some(&since)).await?;

        let Some(message) = messages.first() else {
            return Ok(None);
        };
        self.last_check = Utc::now();

        let text = |pointer: &str| {
            message
                .pointer(pointer)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        Ok(Some(
            TriggerResponse::new(message.to_string())
                .with_detail("event", "mail_received")
                .with_field("message_id", text("/id"))
                .with_field("sender", text("/from/emailAddress/address"))
                .with_field("subject", text("/subject"))
                .with_field("preview", text("/bodyPreview"))
                .with_field("received_at", text("/receivedDateTime")),
        ))
    }
}

/// Mirror of the gmail receive action for the Graph mail shape
pub struct OutlookReceiveAction {
    config: ValidatedConfig,
}

impl OutlookReceiveAction {
    fn matches(&self, filter_key: &str, value: &str) -> bool {
        match self.config.get_str(filter_key) {
            Some(needle) => value.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

#[async_trait]
impl Action for OutlookReceiveAction {
    fn name(&self) -> &'static str {
        "outlook_receive"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        let field = |name: &str| self.config.get_str(name).unwrap_or_default().to_string();

        let sender = field("sender");
        let subject = field("subject");

        if !self.matches("filter_sender", &sender) || !self.matches("filter_subject", &subject) {
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
                .with_field("preview", field("preview"))
                .with_field("received_at", field("received_at")),
        ))
    }
}

pub struct OutlookSendReaction {
    client: OutlookClient,
    config: ValidatedConfig,
}

impl OutlookSendReaction {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        let token = config
            .token()
            .map(str::to_string)
            .ok_or(ComponentError::MissingCredential)?;
        Ok(Self {
            client: OutlookClient::new(token)?,
            config,
        })
    }
}

#[async_trait]
impl Reaction for OutlookSendReaction {
    fn name(&self) -> &'static str {
        "send_mail"
    }

    async fn execute(&self, input: &ActionResponse) -> Result<ReactionResponse, ComponentError> {
        let data = input.to_map();
        let to = self.config.get_str("to").unwrap_or_default();
        let subject = render_template(self.config.get_str("subject").unwrap_or_default(), &data);
        let body = render_template(self.config.get_str("body").unwrap_or_default(), &data);

        tracing::info!(to, subject, "Sending mail via Graph");
        self.client.send_mail(to, &subject, &body).await?;

        Ok(ReactionResponse::ok()
            .with_detail("to", to)
            .with_detail("subject", subject))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{validate, ComponentKind};
    use serde_json::json;

    #[tokio::test]
    async fn subject_filter_applies_case_insensitively() {
        let schema = ConfigSchema::new()
            .field(FieldSpec::required("message_id", FieldKind::String))
            .field(FieldSpec::required("sender", FieldKind::String))
            .field(FieldSpec::required("subject", FieldKind::String))
            .field(FieldSpec::required("preview", FieldKind::String))
            .field(FieldSpec::required("received_at", FieldKind::String))
            .field(FieldSpec::optional("filter_subject", FieldKind::String));
        let options = json!({
            "message_id": "m1",
            "sender": "alice@example.com",
            "subject": "URGENT: prod is down",
            "preview": "...",
            "received_at": "2024-01-01T00:00:00Z",
            "filter_subject": "urgent",
        })
        .as_object()
        .unwrap()
        .clone();
        let config = validate(ComponentKind::Action, &schema, &options).unwrap();

        let response = OutlookReceiveAction { config }
            .execute()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.extra["sender"], "alice@example.com");
    }
}
