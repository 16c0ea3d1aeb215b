use thiserror::Error;

use crate::components::ComponentError;
use crate::registry::RegistryError;
use crate::schema::ConfigError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("invalid config: {0}")]
    Config(#[from] ConfigError),

    #[error("component: {0}")]
    Component(#[from] ComponentError),
}
