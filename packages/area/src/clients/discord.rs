use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use crate::components::ComponentError;

pub const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
const API_BASE: &str = "https://discord.com/api/v10";

// all standard intents plus MESSAGE_CONTENT
const GATEWAY_INTENTS: u32 = 32767 | (1 << 15);

/// One dispatch frame from the gateway: the event name (`MESSAGE_CREATE`,
/// `GUILD_MEMBER_ADD`, ...) and its payload
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    pub kind: String,
    pub data: Value,
}

/// A single persistent gateway connection. An event-driven trigger holds
/// exactly one of these for its whole lifetime; the read and heartbeat
/// tasks it spawns are tied to a cancellation token so that dropping or
/// closing the gateway releases the socket promptly.
#[derive(Debug)]
pub struct DiscordGateway {
    events: mpsc::UnboundedReceiver<GatewayEvent>,
    shutdown: CancellationToken,
}

impl DiscordGateway {
    pub async fn connect(token: &str) -> Result<Self, ComponentError> {
        Self::connect_to(GATEWAY_URL, token).await
    }

    pub async fn connect_to(endpoint: &str, token: &str) -> Result<Self, ComponentError> {
        let (ws, _response) = connect_async(endpoint)
            .await
            .map_err(|e| ComponentError::Gateway(format!("connect failed: {e}")))?;
        let (mut write, mut read) = ws.split();

        let identify = json!({
            "op": 2,
            "d": {
                "token": token,
                "intents": GATEWAY_INTENTS,
                "properties": {"os": "linux", "browser": "area", "device": "area"},
            }
        });
        write
            .send(Message::Text(identify.to_string().into()))
            .await
            .map_err(|e| ComponentError::Gateway(format!("identify failed: {e}")))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        // HELLO supplies the heartbeat cadence; the heartbeat task idles
        // until it arrives
        let (interval_tx, mut interval_rx) = mpsc::channel::<u64>(1);
        let sequence = Arc::new(AtomicI64::new(-1));
        let shutdown = CancellationToken::new();

        // read task: routes frames until the socket drops or we shut down
        tokio::spawn({
            let shutdown = shutdown.clone();
            let sequence = sequence.clone();
            async move {
                loop {
                    let message = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        message = read.next() => message,
                    };
                    let Some(message) = message else {
                        tracing::warn!("Gateway socket closed by upstream");
                        break;
                    };

                    match message {
                        Ok(Message::Text(text)) => {
                            handle_frame(&text, &sequence, &event_tx, &interval_tx);
                        }
                        Ok(Message::Close(frame)) => {
                            tracing::warn!("Gateway close frame: {frame:?}");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!("Gateway read error: {e}");
                            break;
                        }
                    }
                }
                // receiver side sees the channel close and errors out
            }
        });

        // heartbeat task: owns the write half after identify
        tokio::spawn({
            let shutdown = shutdown.clone();
            let sequence = sequence.clone();
            async move {
                let Some(interval_ms) = (tokio::select! {
                    _ = shutdown.cancelled() => None,
                    interval = interval_rx.recv() => interval,
                }) else {
                    return;
                };

                let interval = std::time::Duration::from_millis(interval_ms);
                loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(interval) => {}
                    }

                    let seq = sequence.load(Ordering::SeqCst);
                    let heartbeat = json!({
                        "op": 1,
                        "d": if seq >= 0 { Value::from(seq) } else { Value::Null },
                    });
                    if let Err(e) = write.send(Message::Text(heartbeat.to_string().into())).await {
                        tracing::warn!("Gateway heartbeat failed, stopping: {e}");
                        break;
                    }
                }
                // closing the write half tears the connection down
                let _ = write.close().await;
            }
        });

        Ok(Self {
            events: event_rx,
            shutdown,
        })
    }

    /// The next dispatch event of the given kind that passes the filter.
    /// Suspends until one arrives; callers race this against their own
    /// cancellation. Errors once the connection is gone.
    pub async fn wait_for_event<F>(&mut self, kind: &str, filter: F) -> Result<Value, ComponentError>
    where
        F: Fn(&Value) -> bool,
    {
        while let Some(event) = self.events.recv().await {
            if event.kind == kind && filter(&event.data) {
                return Ok(event.data);
            }
        }

        Err(ComponentError::Gateway(
            "gateway connection closed".to_string(),
        ))
    }

    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for DiscordGateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

fn handle_frame(
    text: &str,
    sequence: &AtomicI64,
    event_tx: &mpsc::UnboundedSender<GatewayEvent>,
    interval_tx: &mpsc::Sender<u64>,
) {
    let frame: Value = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!("Undecodable gateway frame: {e}");
            return;
        }
    };

    if let Some(seq) = frame.get("s").and_then(|s| s.as_i64()) {
        sequence.store(seq, Ordering::SeqCst);
    }

    match frame.get("op").and_then(|op| op.as_u64()) {
        // HELLO
        Some(10) => {
            if let Some(interval) = frame
                .get("d")
                .and_then(|d| d.get("heartbeat_interval"))
                .and_then(|i| i.as_u64())
            {
                let _ = interval_tx.try_send(interval);
            }
        }
        // DISPATCH
        Some(0) => {
            let Some(kind) = frame.get("t").and_then(|t| t.as_str()) else {
                return;
            };
            let data = frame.get("d").cloned().unwrap_or(Value::Null);
            let _ = event_tx.send(GatewayEvent {
                kind: kind.to_string(),
                data,
            });
        }
        // heartbeat ACKs and requests need no handling here
        _ => {}
    }
}

/// Per-operation REST calls; stateless, one per reaction execution
pub struct DiscordRest {
    http: reqwest::Client,
    token: String,
}

impl DiscordRest {
    pub fn new(token: impl Into<String>) -> Result<Self, ComponentError> {
        Ok(Self {
            http: super::http_client()?,
            token: token.into(),
        })
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn check(response: reqwest::Response) -> Result<Value, ComponentError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ComponentError::from_status(
                status,
                response.text().await.unwrap_or_default(),
            ));
        }
        if status == reqwest::StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        Ok(response.json().await.unwrap_or(Value::Null))
    }

    pub async fn send_message(
        &self,
        channel_id: &str,
        content: &str,
    ) -> Result<Value, ComponentError> {
        let response = self
            .http
            .post(format!("{API_BASE}/channels/{channel_id}/messages"))
            .header("Authorization", self.auth())
            .json(&json!({"content": content}))
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<Value, ComponentError> {
        let response = self
            .http
            .patch(format!(
                "{API_BASE}/channels/{channel_id}/messages/{message_id}"
            ))
            .header("Authorization", self.auth())
            .json(&json!({"content": content}))
            .send()
            .await?;
        Self::check(response).await
    }

    pub async fn delete_message(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), ComponentError> {
        let response = self
            .http
            .delete(format!(
                "{API_BASE}/channels/{channel_id}/messages/{message_id}"
            ))
            .header("Authorization", self.auth())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    pub async fn add_reaction(
        &self,
        channel_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<(), ComponentError> {
        let emoji: String = url::form_urlencoded::byte_serialize(emoji.as_bytes()).collect();
        let response = self
            .http
            .put(format!(
                "{API_BASE}/channels/{channel_id}/messages/{message_id}/reactions/{emoji}/@me"
            ))
            .header("Authorization", self.auth())
            .header("Content-Length", "0")
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
