use area_types::{ActionResponse, ReactionResponse, TriggerResponse};
use async_trait::async_trait;
use serde_json::Value;

use crate::clients::discord::{DiscordGateway, DiscordRest};
use crate::registry::{ComponentRegistry, RegistryError};
use crate::schema::{ConfigSchema, FieldKind, FieldSpec, ValidatedConfig};

use super::{passes_filter, render_template, Action, ComponentError, Reaction, Trigger};

pub fn register(registry: &mut ComponentRegistry) -> Result<(), RegistryError> {
    registry.register_trigger(
        "new_message_in_channel",
        "discord",
        ConfigSchema::new().field(FieldSpec::required("channel_id", FieldKind::String)),
        |config| Ok(Box::new(NewMessageInChannelTrigger::new(config)?)),
    )?;

    registry.register_trigger(
        "message_updated",
        "discord",
        ConfigSchema::new().field(FieldSpec::required("channel_id", FieldKind::String)),
        |config| Ok(Box::new(MessageUpdatedTrigger::new(config)?)),
    )?;

    registry.register_trigger(
        "channel_created",
        "discord",
        ConfigSchema::new().field(FieldSpec::required("guild_id", FieldKind::String)),
        |config| Ok(Box::new(ChannelCreatedTrigger::new(config)?)),
    )?;

    registry.register_trigger(
        "channel_deleted",
        "discord",
        ConfigSchema::new().field(FieldSpec::required("guild_id", FieldKind::String)),
        |config| Ok(Box::new(ChannelDeletedTrigger::new(config)?)),
    )?;

    registry.register_trigger(
        "user_joins_guild",
        "discord",
        ConfigSchema::new().field(FieldSpec::required("guild_id", FieldKind::String)),
        |config| Ok(Box::new(UserJoinsGuildTrigger::new(config)?)),
    )?;

    registry.register_action(
        "new_message_in_channel",
        "discord",
        ConfigSchema::new()
            .field(FieldSpec::required("content", FieldKind::String))
            .field(FieldSpec::required("author", FieldKind::Object))
            .field(FieldSpec::required("channel_id", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(NewMessageInChannelAction { config })),
    )?;

    registry.register_action(
        "message_updated",
        "discord",
        ConfigSchema::new()
            .field(FieldSpec::required("content", FieldKind::String))
            .field(FieldSpec::required("author", FieldKind::Object))
            .field(FieldSpec::required("channel_id", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(MessageUpdatedAction { config })),
    )?;

    registry.register_action(
        "channel_created",
        "discord",
        ConfigSchema::new()
            .field(FieldSpec::required("channel_id", FieldKind::String))
            .field(FieldSpec::required("channel_name", FieldKind::String))
            .field(FieldSpec::optional("content", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(ChannelCreatedAction { config })),
    )?;

    registry.register_action(
        "channel_deleted",
        "discord",
        ConfigSchema::new()
            .field(FieldSpec::optional("channel_name", FieldKind::String))
            .field(FieldSpec::optional("content", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(ChannelDeletedAction { config })),
    )?;

    registry.register_action(
        "user_joins_guild",
        "discord",
        ConfigSchema::new()
            .field(FieldSpec::required("content", FieldKind::String))
            .field(FieldSpec::required("user_id", FieldKind::String))
            .field(FieldSpec::required("user_name", FieldKind::String))
            .field(FieldSpec::required("joined_at", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(UserJoinsGuildAction { config })),
    )?;

    registry.register_reaction(
        "send_message",
        "discord",
        ConfigSchema::new()
            .field(FieldSpec::required("channel_id", FieldKind::String))
            .field(FieldSpec::required("content", FieldKind::String)),
        |config| Ok(Box::new(SendMessageReaction::new(config)?)),
    )?;

    registry.register_reaction(
        "edit_message",
        "discord",
        ConfigSchema::new()
            .field(FieldSpec::required("channel_id", FieldKind::String))
            .field(FieldSpec::required("message_id", FieldKind::String))
            .field(FieldSpec::required("content", FieldKind::String)),
        |config| Ok(Box::new(EditMessageReaction::new(config)?)),
    )?;

    registry.register_reaction(
        "delete_message",
        "discord",
        ConfigSchema::new()
            .field(FieldSpec::required("channel_id", FieldKind::String))
            .field(FieldSpec::required("message_id", FieldKind::String)),
        |config| Ok(Box::new(DeleteMessageReaction::new(config)?)),
    )?;

    registry.register_reaction(
        "add_reaction",
        "discord",
        ConfigSchema::new()
            .field(FieldSpec::required("channel_id", FieldKind::String))
            .field(FieldSpec::required("message_id", FieldKind::String))
            .field(FieldSpec::with_default("emoji", FieldKind::String, "👍")),
        |config| Ok(Box::new(AddReactionReaction::new(config)?)),
    )?;

    Ok(())
}

/// Shared by the event-driven triggers: one lazy gateway connection per
/// trigger instance. Connects on first use; a dead connection is dropped
/// so the next evaluation reconnects (the evaluator's error back-off
/// paces the retries).
#[derive(Debug)]
struct GatewayHandle {
    token: String,
    gateway: Option<DiscordGateway>,
}

impl GatewayHandle {
    fn new(config: &ValidatedConfig) -> Result<Self, ComponentError> {
        let token = config
            .token()
            .map(str::to_string)
            .ok_or(ComponentError::MissingCredential)?;
        Ok(Self {
            token,
            gateway: None,
        })
    }

    async fn next_event<F>(&mut self, kind: &str, filter: F) -> Result<Value, ComponentError>
    where
        F: Fn(&Value) -> bool,
    {
        if self.gateway.is_none() {
            self.gateway = Some(DiscordGateway::connect(&self.token).await?);
        }
        let Some(gateway) = self.gateway.as_mut() else {
            return Err(ComponentError::Gateway("gateway unavailable".to_string()));
        };

        match gateway.wait_for_event(kind, filter).await {
            Ok(payload) => Ok(payload),
            Err(err) => {
                // connection died: drop it so the next evaluation reconnects
                self.gateway = None;
                Err(err)
            }
        }
    }

    fn close(&mut self) {
        if let Some(gateway) = self.gateway.take() {
            gateway.close();
        }
    }
}

/// Event-driven: suspends inside `evaluate` until a matching
/// MESSAGE_CREATE arrives on the gateway
#[derive(Debug)]
pub struct NewMessageInChannelTrigger {
    handle: GatewayHandle,
    channel_id: String,
}

impl NewMessageInChannelTrigger {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        Ok(Self {
            handle: GatewayHandle::new(&config)?,
            channel_id: config.get_str("channel_id").unwrap_or_default().to_string(),
        })
    }
}

#[async_trait]
impl Trigger for NewMessageInChannelTrigger {
    fn name(&self) -> &'static str {
        "new_message_in_channel"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let channel_id = self.channel_id.as_str();
        let message = self
            .handle
            .next_event("MESSAGE_CREATE", |m| {
                m.get("channel_id").and_then(|c| c.as_str()) == Some(channel_id)
            })
            .await?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default();
        tracing::info!(channel_id = %self.channel_id, "New message received");

        Ok(Some(
            TriggerResponse::new(content)
                .with_detail("event", "new_message")
                .with_detail("channel_id", self.channel_id.clone())
                .with_field("content", content)
                .with_field("author", message.get("author").cloned().unwrap_or(Value::Null))
                .with_field("channel_id", self.channel_id.clone()),
        ))
    }

    async fn shutdown(&mut self) {
        self.handle.close();
    }
}

/// Event-driven: fires when a message in the channel is edited
pub struct MessageUpdatedTrigger {
    handle: GatewayHandle,
    channel_id: String,
}

impl MessageUpdatedTrigger {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        Ok(Self {
            handle: GatewayHandle::new(&config)?,
            channel_id: config.get_str("channel_id").unwrap_or_default().to_string(),
        })
    }
}

#[async_trait]
impl Trigger for MessageUpdatedTrigger {
    fn name(&self) -> &'static str {
        "message_updated"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let channel_id = self.channel_id.as_str();
        let message = self
            .handle
            .next_event("MESSAGE_UPDATE", |m| {
                m.get("channel_id").and_then(|c| c.as_str()) == Some(channel_id)
            })
            .await?;

        let content = message
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or_default();
        tracing::info!(channel_id = %self.channel_id, "Message updated");

        Ok(Some(
            TriggerResponse::new(content)
                .with_detail("event", "message_updated")
                .with_detail("channel_id", self.channel_id.clone())
                .with_field("content", content)
                .with_field("author", message.get("author").cloned().unwrap_or(Value::Null))
                .with_field("channel_id", self.channel_id.clone()),
        ))
    }

    async fn shutdown(&mut self) {
        self.handle.close();
    }
}

/// Event-driven: fires when a channel is created in the guild
pub struct ChannelCreatedTrigger {
    handle: GatewayHandle,
    guild_id: String,
}

impl ChannelCreatedTrigger {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        Ok(Self {
            handle: GatewayHandle::new(&config)?,
            guild_id: config.get_str("guild_id").unwrap_or_default().to_string(),
        })
    }
}

#[async_trait]
impl Trigger for ChannelCreatedTrigger {
    fn name(&self) -> &'static str {
        "channel_created"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let guild_id = self.guild_id.as_str();
        let channel = self
            .handle
            .next_event("CHANNEL_CREATE", |c| {
                c.get("guild_id").and_then(|g| g.as_str()) == Some(guild_id)
            })
            .await?;

        let text = |key: &str| {
            channel
                .get(key)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        tracing::info!(guild_id = %self.guild_id, channel = %text("name"), "Channel created");

        Ok(Some(
            TriggerResponse::new(channel.to_string())
                .with_detail("event", "channel_created")
                .with_detail("guild_id", self.guild_id.clone())
                .with_field("channel_id", text("id"))
                .with_field("channel_name", text("name")),
        ))
    }

    async fn shutdown(&mut self) {
        self.handle.close();
    }
}

/// Event-driven: fires when a channel is deleted from the guild
pub struct ChannelDeletedTrigger {
    handle: GatewayHandle,
    guild_id: String,
}

impl ChannelDeletedTrigger {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        Ok(Self {
            handle: GatewayHandle::new(&config)?,
            guild_id: config.get_str("guild_id").unwrap_or_default().to_string(),
        })
    }
}

#[async_trait]
impl Trigger for ChannelDeletedTrigger {
    fn name(&self) -> &'static str {
        "channel_deleted"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let guild_id = self.guild_id.as_str();
        let channel = self
            .handle
            .next_event("CHANNEL_DELETE", |c| {
                c.get("guild_id").and_then(|g| g.as_str()) == Some(guild_id)
            })
            .await?;

        let channel_name = channel
            .get("name")
            .and_then(|n| n.as_str())
            .unwrap_or_default();
        tracing::info!(guild_id = %self.guild_id, channel = channel_name, "Channel deleted");

        Ok(Some(
            TriggerResponse::new(channel.to_string())
                .with_detail("event", "channel_deleted")
                .with_detail("guild_id", self.guild_id.clone())
                .with_field("channel_name", channel_name),
        ))
    }

    async fn shutdown(&mut self) {
        self.handle.close();
    }
}

/// Event-driven: fires when a member joins the configured guild
pub struct UserJoinsGuildTrigger {
    handle: GatewayHandle,
    guild_id: String,
}

impl UserJoinsGuildTrigger {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        Ok(Self {
            handle: GatewayHandle::new(&config)?,
            guild_id: config.get_str("guild_id").unwrap_or_default().to_string(),
        })
    }
}

#[async_trait]
impl Trigger for UserJoinsGuildTrigger {
    fn name(&self) -> &'static str {
        "user_joins_guild"
    }

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError> {
        let guild_id = self.guild_id.as_str();
        let member = self
            .handle
            .next_event("GUILD_MEMBER_ADD", |m| {
                m.get("guild_id").and_then(|g| g.as_str()) == Some(guild_id)
            })
            .await?;

        let text = |pointer: &str| {
            member
                .pointer(pointer)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };
        tracing::info!(guild_id = %self.guild_id, user = %text("/user/username"), "Member joined");

        Ok(Some(
            TriggerResponse::new(member.to_string())
                .with_detail("event", "user_joins_guild")
                .with_detail("guild_id", self.guild_id.clone())
                .with_field("user_id", text("/user/id"))
                .with_field("user_name", text("/user/username"))
                .with_field(
                    "joined_at",
                    member
                        .get("joined_at")
                        .and_then(|j| j.as_str())
                        .unwrap_or_default(),
                )
                .with_field("guild_id", self.guild_id.clone()),
        ))
    }

    async fn shutdown(&mut self) {
        self.handle.close();
    }
}

/// Projects the message fields, optionally gated by a filter
pub struct NewMessageInChannelAction {
    config: ValidatedConfig,
}

#[async_trait]
impl Action for NewMessageInChannelAction {
    fn name(&self) -> &'static str {
        "new_message_in_channel"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        let content = self.config.get_str("content").unwrap_or_default();
        let channel_id = self.config.get_str("channel_id").unwrap_or_default();
        let author = self
            .config
            .get("author")
            .cloned()
            .unwrap_or(Value::Null);

        tracing::info!(channel_id, "Processing channel message");

        Ok(Some(
            ActionResponse::ok()
                .with_detail("processed", true)
                .with_field("content", content)
                .with_field("author", author)
                .with_field("channel_id", channel_id),
        ))
    }
}

/// Same shape as the new-message action, for edits
pub struct MessageUpdatedAction {
    config: ValidatedConfig,
}

#[async_trait]
impl Action for MessageUpdatedAction {
    fn name(&self) -> &'static str {
        "message_updated"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        let content = self.config.get_str("content").unwrap_or_default();
        let channel_id = self.config.get_str("channel_id").unwrap_or_default();
        let author = self
            .config
            .get("author")
            .cloned()
            .unwrap_or(Value::Null);

        tracing::info!(channel_id, "Processing message edit");

        Ok(Some(
            ActionResponse::ok()
                .with_detail("event", "message_updated")
                .with_field("content", content)
                .with_field("author", author)
                .with_field("channel_id", channel_id),
        ))
    }
}

pub struct ChannelCreatedAction {
    config: ValidatedConfig,
}

#[async_trait]
impl Action for ChannelCreatedAction {
    fn name(&self) -> &'static str {
        "channel_created"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        let field = |name: &str| self.config.get_str(name).unwrap_or_default().to_string();

        tracing::info!(channel = %field("channel_name"), "Processing channel creation");

        Ok(Some(
            ActionResponse::ok()
                .with_detail("event", "channel_created")
                .with_field("channel_id", field("channel_id"))
                .with_field("channel_name", field("channel_name"))
                .with_field("content", field("content")),
        ))
    }
}

pub struct ChannelDeletedAction {
    config: ValidatedConfig,
}

#[async_trait]
impl Action for ChannelDeletedAction {
    fn name(&self) -> &'static str {
        "channel_deleted"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        let field = |name: &str| self.config.get_str(name).unwrap_or_default().to_string();

        tracing::info!(channel = %field("channel_name"), "Processing channel deletion");

        Ok(Some(
            ActionResponse::ok()
                .with_detail("event", "channel_deleted")
                .with_field("channel_name", field("channel_name"))
                .with_field("content", field("content")),
        ))
    }
}

/// Passes the joined member's details through, optionally gated by a filter
pub struct UserJoinsGuildAction {
    config: ValidatedConfig,
}

#[async_trait]
impl Action for UserJoinsGuildAction {
    fn name(&self) -> &'static str {
        "user_joins_guild"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        let field = |name: &str| self.config.get_str(name).unwrap_or_default().to_string();

        tracing::info!(user = %field("user_name"), "Processing guild join");

        Ok(Some(
            ActionResponse::ok()
                .with_detail("event", "user_joins_guild")
                .with_field("content", field("content"))
                .with_field("user_id", field("user_id"))
                .with_field("user_name", field("user_name"))
                .with_field("joined_at", field("joined_at")),
        ))
    }
}

fn rest_client(config: &ValidatedConfig) -> Result<DiscordRest, ComponentError> {
    let token = config
        .token()
        .map(str::to_string)
        .ok_or(ComponentError::MissingCredential)?;
    DiscordRest::new(token)
}

pub struct SendMessageReaction {
    client: DiscordRest,
    config: ValidatedConfig,
}

impl SendMessageReaction {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        Ok(Self {
            client: rest_client(&config)?,
            config,
        })
    }
}

#[async_trait]
impl Reaction for SendMessageReaction {
    fn name(&self) -> &'static str {
        "send_message"
    }

    async fn execute(&self, input: &ActionResponse) -> Result<ReactionResponse, ComponentError> {
        let channel_id = self.config.get_str("channel_id").unwrap_or_default();
        let content = render_template(
            self.config.get_str("content").unwrap_or_default(),
            &input.to_map(),
        );

        let message = self.client.send_message(channel_id, &content).await?;

        Ok(ReactionResponse::ok()
            .with_detail("channel_id", channel_id)
            .with_detail("message", content)
            .with_detail(
                "message_id",
                message.get("id").cloned().unwrap_or_default(),
            ))
    }
}

pub struct EditMessageReaction {
    client: DiscordRest,
    config: ValidatedConfig,
}

impl EditMessageReaction {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        Ok(Self {
            client: rest_client(&config)?,
            config,
        })
    }
}

#[async_trait]
impl Reaction for EditMessageReaction {
    fn name(&self) -> &'static str {
        "edit_message"
    }

    async fn execute(&self, input: &ActionResponse) -> Result<ReactionResponse, ComponentError> {
        let channel_id = self.config.get_str("channel_id").unwrap_or_default();
        let message_id = self.config.get_str("message_id").unwrap_or_default();
        let content = render_template(
            self.config.get_str("content").unwrap_or_default(),
            &input.to_map(),
        );

        self.client
            .edit_message(channel_id, message_id, &content)
            .await?;

        Ok(ReactionResponse::ok()
            .with_detail("channel_id", channel_id)
            .with_detail("message_id", message_id))
    }
}

pub struct DeleteMessageReaction {
    client: DiscordRest,
    config: ValidatedConfig,
}

impl DeleteMessageReaction {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        Ok(Self {
            client: rest_client(&config)?,
            config,
        })
    }
}

#[async_trait]
impl Reaction for DeleteMessageReaction {
    fn name(&self) -> &'static str {
        "delete_message"
    }

    async fn execute(&self, _input: &ActionResponse) -> Result<ReactionResponse, ComponentError> {
        let channel_id = self.config.get_str("channel_id").unwrap_or_default();
        let message_id = self.config.get_str("message_id").unwrap_or_default();

        self.client.delete_message(channel_id, message_id).await?;

        Ok(ReactionResponse::ok()
            .with_detail("channel_id", channel_id)
            .with_detail("deleted_message_id", message_id))
    }
}

pub struct AddReactionReaction {
    client: DiscordRest,
    config: ValidatedConfig,
}

impl AddReactionReaction {
    fn new(config: ValidatedConfig) -> Result<Self, ComponentError> {
        Ok(Self {
            client: rest_client(&config)?,
            config,
        })
    }
}

#[async_trait]
impl Reaction for AddReactionReaction {
    fn name(&self) -> &'static str {
        "add_reaction"
    }

    async fn execute(&self, _input: &ActionResponse) -> Result<ReactionResponse, ComponentError> {
        let channel_id = self.config.get_str("channel_id").unwrap_or_default();
        let message_id = self.config.get_str("message_id").unwrap_or_default();
        let emoji = self.config.get_str("emoji").unwrap_or_default();

        self.client
            .add_reaction(channel_id, message_id, emoji)
            .await?;

        Ok(ReactionResponse::ok()
            .with_detail("channel_id", channel_id)
            .with_detail("message_id", message_id)
            .with_detail("emoji", emoji))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{validate, ComponentKind};
    use serde_json::{json, Map};

    /// Evaluator-style projection: copy the schema's declared fields out of
    /// a trigger response, validate, construct, execute
    async fn drive_action(
        name: &str,
        response: &TriggerResponse,
    ) -> Option<ActionResponse> {
        let mut registry = ComponentRegistry::new();
        register(&mut registry).unwrap();
        let entry = registry.action(name).unwrap();

        let event = response.to_map();
        let mut params = Map::new();
        for field in entry.schema.field_names() {
            if let Some(value) = event.get(field) {
                params.insert(field.to_string(), value.clone());
            }
        }

        let config = validate(ComponentKind::Action, &entry.schema, &params).unwrap();
        let action = (entry.ctor)(config).unwrap();
        action.execute().await.unwrap()
    }

    #[tokio::test]
    async fn message_action_projects_and_filters() {
        let schema = ConfigSchema::new()
            .field(FieldSpec::required("content", FieldKind::String))
            .field(FieldSpec::required("author", FieldKind::Object))
            .field(FieldSpec::required("channel_id", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object));
        let options = json!({
            "content": "deploy finished",
            "author": {"username": "alice", "id": "1"},
            "channel_id": "42",
        })
        .as_object()
        .unwrap()
        .clone();
        let config = validate(ComponentKind::Action, &schema, &options).unwrap();

        let response = NewMessageInChannelAction { config }
            .execute()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.extra["channel_id"], "42");
        assert_eq!(response.extra["author"]["username"], "alice");
    }

    #[tokio::test]
    async fn message_action_filter_rejects_other_channels() {
        let schema = ConfigSchema::new()
            .field(FieldSpec::required("content", FieldKind::String))
            .field(FieldSpec::required("author", FieldKind::Object))
            .field(FieldSpec::required("channel_id", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object));
        let options = json!({
            "content": "hello",
            "author": {"username": "bob"},
            "channel_id": "43",
            "filter": {
                "conditions": [
                    {"field": "channel_id", "operator": "equals", "value": "42"}
                ]
            },
        })
        .as_object()
        .unwrap()
        .clone();
        let config = validate(ComponentKind::Action, &schema, &options).unwrap();

        let response = NewMessageInChannelAction { config }.execute().await.unwrap();
        assert!(response.is_none());
    }

    #[tokio::test]
    async fn user_join_response_drives_its_action() {
        // shaped exactly like UserJoinsGuildTrigger's firing
        let response = TriggerResponse::new(r#"{"guild_id":"g1"}"#)
            .with_detail("event", "user_joins_guild")
            .with_detail("guild_id", "g1")
            .with_field("user_id", "100")
            .with_field("user_name", "alice")
            .with_field("joined_at", "2024-06-01T12:00:00Z")
            .with_field("guild_id", "g1");

        let out = drive_action("user_joins_guild", &response)
            .await
            .expect("join event passes with no filter");
        assert!(out.success);
        assert_eq!(out.extra["user_id"], "100");
        assert_eq!(out.extra["user_name"], "alice");
        assert_eq!(out.extra["joined_at"], "2024-06-01T12:00:00Z");
    }

    #[tokio::test]
    async fn channel_created_response_drives_its_action() {
        let response = TriggerResponse::new(r#"{"id":"55","name":"incidents"}"#)
            .with_detail("event", "channel_created")
            .with_detail("guild_id", "g1")
            .with_field("channel_id", "55")
            .with_field("channel_name", "incidents");

        let out = drive_action("channel_created", &response)
            .await
            .expect("creation event passes with no filter");
        assert_eq!(out.extra["channel_id"], "55");
        assert_eq!(out.extra["channel_name"], "incidents");
    }

    #[tokio::test]
    async fn updated_message_response_can_be_filtered_out() {
        // a filter carried in the action's option map rejects edits that
        // don't mention the keyword
        let mut registry = ComponentRegistry::new();
        register(&mut registry).unwrap();
        let entry = registry.action("message_updated").unwrap();

        let options = json!({
            "content": "typo fix",
            "author": {"username": "bob"},
            "channel_id": "42",
            "filter": {
                "conditions": [
                    {"field": "content", "operator": "contains", "value": "urgent"}
                ]
            },
        })
        .as_object()
        .unwrap()
        .clone();
        let config = validate(ComponentKind::Action, &entry.schema, &options).unwrap();
        let action = (entry.ctor)(config).unwrap();

        assert!(action.execute().await.unwrap().is_none());
    }

    #[test]
    fn gateway_triggers_require_a_token() {
        let schema =
            ConfigSchema::new().field(FieldSpec::required("channel_id", FieldKind::String));
        let options = json!({"channel_id": "42"}).as_object().unwrap().clone();
        let config = validate(ComponentKind::Trigger, &schema, &options).unwrap();

        let err = NewMessageInChannelTrigger::new(config).unwrap_err();
        assert!(matches!(err, ComponentError::MissingCredential));
    }

    #[test]
    fn every_discord_trigger_has_a_matching_action() {
        let mut registry = ComponentRegistry::new();
        register(&mut registry).unwrap();

        for trigger in registry.list(ComponentKind::Trigger) {
            assert!(
                registry.action(trigger).is_ok(),
                "trigger `{trigger}` has no action counterpart"
            );
        }
    }
}
