use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{ComponentName, Credential};

/// The serialized unit of work enqueued by an evaluator and drained by a
/// worker. The JSON shape is stable: producers and consumers on different
/// nodes must agree on it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Job {
    pub trigger: JobTrigger,
    pub action: JobStep,
    pub reaction: JobStep,
    /// The serialized trigger response, untouched
    pub event_data: Value,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JobTrigger {
    pub name: ComponentName,
}

/// One side of the job: the action or the reaction to run.
/// `params` are event-derived inputs; `config` is the area's option map
/// with the per-service `token` injected at enqueue time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct JobStep {
    pub name: ComponentName,
    #[serde(default)]
    pub params: Map<String, Value>,
    #[serde(default)]
    pub config: Map<String, Value>,
}

impl JobStep {
    pub fn new(name: ComponentName) -> Self {
        Self {
            name,
            params: Map::new(),
            config: Map::new(),
        }
    }

    /// Overlay the resolved credential onto the config map.
    /// An absent credential is forwarded as an explicit null - components
    /// decide for themselves whether that is fatal.
    pub fn with_token(mut self, token: Option<&Credential>) -> Self {
        self.config.insert(
            "token".to_string(),
            match token {
                Some(token) => Value::String(token.as_str().to_string()),
                None => Value::Null,
            },
        );
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.config.get("token").and_then(|v| v.as_str())
    }
}

impl Job {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_job() -> Job {
        let mut action = JobStep::new(ComponentName::new("time_action").unwrap());
        action.params.insert("event_time".into(), json!(1234.5));
        let action = action.with_token(Some(&Credential::new("A-TOK".into())));

        let reaction = JobStep::new(ComponentName::new("print_reaction").unwrap()).with_token(None);

        Job {
            trigger: JobTrigger {
                name: ComponentName::new("time_trigger").unwrap(),
            },
            action,
            reaction,
            event_data: json!({"triggered_at": 1234.5, "content": "{}"}),
        }
    }

    #[test]
    fn envelope_round_trip() {
        let job = sample_job();
        let decoded = Job::decode(&job.encode().unwrap()).unwrap();
        assert_eq!(job, decoded);
    }

    #[test]
    fn token_injection_is_explicit() {
        let job = sample_job();
        assert_eq!(job.action.token(), Some("A-TOK"));
        // absent credential serializes as null, not as a missing key
        assert_eq!(job.reaction.config.get("token"), Some(&Value::Null));
        assert_eq!(job.reaction.token(), None);
    }

    #[test]
    fn wire_shape_is_stable() {
        let encoded = serde_json::to_value(sample_job()).unwrap();
        assert_eq!(encoded["trigger"]["name"], "time_trigger");
        assert_eq!(encoded["action"]["name"], "time_action");
        assert_eq!(encoded["action"]["config"]["token"], "A-TOK");
        assert_eq!(encoded["reaction"]["name"], "print_reaction");
        assert!(encoded["event_data"]["triggered_at"].is_f64());
    }
}
