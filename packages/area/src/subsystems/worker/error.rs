use thiserror::Error;

use crate::components::ComponentError;
use crate::queue::QueueError;
use crate::registry::RegistryError;
use crate::schema::ConfigError;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("malformed job: {0}")]
    MalformedJob(serde_json::Error),

    #[error("{0}")]
    UnknownComponent(#[from] RegistryError),

    #[error("invalid action config: {0}")]
    InvalidActionConfig(ConfigError),

    #[error("invalid reaction config: {0}")]
    InvalidReactionConfig(ConfigError),

    #[error("action failed: {0}")]
    Action(ComponentError),

    #[error("reaction failed: {0}")]
    Reaction(ComponentError),

    #[error("queue: {0}")]
    Queue(#[from] QueueError),
}
