use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::epoch_now;

/// Produced by a trigger when it fires. `content` carries the raw upstream
/// payload as a JSON string; kind-specific fields ride in the flattened
/// `extra` map so the envelope stays stable across trigger kinds.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TriggerResponse {
    pub content: String,
    /// Seconds since the Unix epoch
    pub triggered_at: f64,
    pub details: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TriggerResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            triggered_at: epoch_now(),
            details: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// The flat key/value view used for param projection and `event_data`
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // a struct with named fields always serializes to an object
            _ => Map::new(),
        }
    }
}

/// Produced by an action. Consumed by the reaction.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ActionResponse {
    pub success: bool,
    pub details: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            details: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            details: Map::new(),
            extra: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Produced by a reaction, for logging only - nothing downstream consumes it
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ReactionResponse {
    pub success: bool,
    pub details: Map<String, Value>,
}

impl ReactionResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            details: Map::new(),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            details: Map::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_response_flattens_extra_fields() {
        let response = TriggerResponse::new("{}")
            .with_detail("event", "new_push")
            .with_field("commit_sha", "abc123");

        let map = response.to_map();
        assert_eq!(map["commit_sha"], "abc123");
        assert_eq!(map["details"]["event"], "new_push");
        assert!(map["triggered_at"].as_f64().is_some());
    }

    #[test]
    fn action_response_round_trip() {
        let response = ActionResponse::ok()
            .with_detail("processed", true)
            .with_field("sender", "alice@example.com");

        let encoded = serde_json::to_string(&response).unwrap();
        let decoded: ActionResponse = serde_json::from_str(&encoded).unwrap();
        assert_eq!(response, decoded);
        assert_eq!(decoded.extra["sender"], "alice@example.com");
    }
}
