use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AreaId, ComponentName, UserId};

/// The binding unit: one action, one reaction, at most one trigger, each
/// with its own untyped option map. Rows are owned by the HTTP API; the
/// core only ever reads them on the supervisor's poll cycle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Area {
    pub id: AreaId,
    pub user_id: UserId,
    pub action: ComponentName,
    pub reaction: ComponentName,
    pub trigger: Option<ComponentName>,
    #[serde(default)]
    pub action_config: Map<String, Value>,
    #[serde(default)]
    pub reaction_config: Map<String, Value>,
    #[serde(default)]
    pub trigger_config: Map<String, Value>,
}

impl Area {
    pub fn new(
        id: impl Into<AreaId>,
        user_id: impl Into<UserId>,
        action: ComponentName,
        reaction: ComponentName,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            action,
            reaction,
            trigger: None,
            action_config: Map::new(),
            reaction_config: Map::new(),
            trigger_config: Map::new(),
        }
    }

    pub fn with_trigger(mut self, trigger: ComponentName, config: Map<String, Value>) -> Self {
        self.trigger = Some(trigger);
        self.trigger_config = config;
        self
    }

    pub fn with_action_config(mut self, config: Map<String, Value>) -> Self {
        self.action_config = config;
        self
    }

    pub fn with_reaction_config(mut self, config: Map<String, Value>) -> Self {
        self.reaction_config = config;
        self
    }
}
