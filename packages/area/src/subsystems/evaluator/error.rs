use thiserror::Error;

use crate::queue::QueueError;
use crate::registry::RegistryError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("credentials: {0}")]
    Credentials(#[from] StoreError),

    #[error("queue: {0}")]
    Queue(#[from] QueueError),

    #[error("encode job: {0}")]
    Encode(#[from] serde_json::Error),
}
