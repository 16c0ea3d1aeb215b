use std::collections::HashMap;
use std::sync::Arc;

use area_types::ComponentName;
use thiserror::Error;

use crate::components::{Action, ComponentError, Reaction, Trigger};
use crate::schema::{ComponentKind, ConfigSchema, ValidatedConfig};

pub type TriggerCtor =
    Arc<dyn Fn(ValidatedConfig) -> Result<Box<dyn Trigger>, ComponentError> + Send + Sync>;
pub type ActionCtor =
    Arc<dyn Fn(ValidatedConfig) -> Result<Box<dyn Action>, ComponentError> + Send + Sync>;
pub type ReactionCtor =
    Arc<dyn Fn(ValidatedConfig) -> Result<Box<dyn Reaction>, ComponentError> + Send + Sync>;

/// One registered component kind: its stable name, the service slug its
/// credential is looked up under, its declared config schema, and the
/// constructor that turns a validated config into an instance.
pub struct ComponentEntry<C> {
    pub name: ComponentName,
    pub service: &'static str,
    pub schema: ConfigSchema,
    pub ctor: C,
}

impl<C> std::fmt::Debug for ComponentEntry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentEntry")
            .field("name", &self.name)
            .field("service", &self.service)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

/// The catalog of triggers, actions, and reactions, keyed by name within
/// each kind. Populated once at startup by the component manifest, then
/// frozen behind an Arc - after that, reads need no locks.
#[derive(Default)]
pub struct ComponentRegistry {
    triggers: HashMap<ComponentName, ComponentEntry<TriggerCtor>>,
    actions: HashMap<ComponentName, ComponentEntry<ActionCtor>>,
    reactions: HashMap<ComponentName, ComponentEntry<ReactionCtor>>,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{kind} `{name}` is already registered")]
    DuplicateName {
        kind: ComponentKind,
        name: ComponentName,
    },

    #[error("unknown {kind} `{name}`")]
    NotFound { kind: ComponentKind, name: String },

    #[error("invalid component name: {0}")]
    Name(#[from] area_types::NameError),
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_trigger(
        &mut self,
        name: &str,
        service: &'static str,
        schema: ConfigSchema,
        ctor: impl Fn(ValidatedConfig) -> Result<Box<dyn Trigger>, ComponentError>
            + Send
            + Sync
            + 'static,
    ) -> Result<(), RegistryError> {
        let name = ComponentName::new(name)?;
        if self.triggers.contains_key(&name) {
            return Err(RegistryError::DuplicateName {
                kind: ComponentKind::Trigger,
                name,
            });
        }
        self.triggers.insert(
            name.clone(),
            ComponentEntry {
                name,
                service,
                schema,
                ctor: Arc::new(ctor),
            },
        );
        Ok(())
    }

    pub fn register_action(
        &mut self,
        name: &str,
        service: &'static str,
        schema: ConfigSchema,
        ctor: impl Fn(ValidatedConfig) -> Result<Box<dyn Action>, ComponentError>
            + Send
            + Sync
            + 'static,
    ) -> Result<(), RegistryError> {
        let name = ComponentName::new(name)?;
        if self.actions.contains_key(&name) {
            return Err(RegistryError::DuplicateName {
                kind: ComponentKind::Action,
                name,
            });
        }
        self.actions.insert(
            name.clone(),
            ComponentEntry {
                name,
                service,
                schema,
                ctor: Arc::new(ctor),
            },
        );
        Ok(())
    }

    pub fn register_reaction(
        &mut self,
        name: &str,
        service: &'static str,
        schema: ConfigSchema,
        ctor: impl Fn(ValidatedConfig) -> Result<Box<dyn Reaction>, ComponentError>
            + Send
            + Sync
            + 'static,
    ) -> Result<(), RegistryError> {
        let name = ComponentName::new(name)?;
        if self.reactions.contains_key(&name) {
            return Err(RegistryError::DuplicateName {
                kind: ComponentKind::Reaction,
                name,
            });
        }
        self.reactions.insert(
            name.clone(),
            ComponentEntry {
                name,
                service,
                schema,
                ctor: Arc::new(ctor),
            },
        );
        Ok(())
    }

    pub fn trigger(&self, name: &str) -> Result<&ComponentEntry<TriggerCtor>, RegistryError> {
        lookup(&self.triggers, ComponentKind::Trigger, name)
    }

    pub fn action(&self, name: &str) -> Result<&ComponentEntry<ActionCtor>, RegistryError> {
        lookup(&self.actions, ComponentKind::Action, name)
    }

    pub fn reaction(&self, name: &str) -> Result<&ComponentEntry<ReactionCtor>, RegistryError> {
        lookup(&self.reactions, ComponentKind::Reaction, name)
    }

    pub fn list(&self, kind: ComponentKind) -> Vec<&ComponentName> {
        let mut names: Vec<&ComponentName> = match kind {
            ComponentKind::Trigger => self.triggers.keys().collect(),
            ComponentKind::Action => self.actions.keys().collect(),
            ComponentKind::Reaction => self.reactions.keys().collect(),
        };
        names.sort();
        names
    }
}

fn lookup<'a, C>(
    map: &'a HashMap<ComponentName, ComponentEntry<C>>,
    kind: ComponentKind,
    name: &str,
) -> Result<&'a ComponentEntry<C>, RegistryError> {
    let key = ComponentName::new(name).map_err(|_| RegistryError::NotFound {
        kind,
        name: name.to_string(),
    })?;
    map.get(&key).ok_or_else(|| RegistryError::NotFound {
        kind,
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components;

    #[test]
    fn builtins_register_cleanly() {
        let mut registry = ComponentRegistry::new();
        components::register_builtins(&mut registry).unwrap();

        registry.trigger("time_trigger").unwrap();
        registry.action("time_action").unwrap();
        registry.reaction("print_reaction").unwrap();

        // trigger and action namespaces are disjoint: the same name can
        // appear in both
        registry.trigger("new_message_in_channel").unwrap();
        registry.action("new_message_in_channel").unwrap();
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = ComponentRegistry::new();
        components::register_builtins(&mut registry).unwrap();

        let err = registry
            .register_reaction(
                "print_reaction",
                "core",
                crate::schema::ConfigSchema::new(),
                |_| unreachable!(),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName { .. }));
    }

    #[test]
    fn unknown_lookup_fails() {
        let registry = ComponentRegistry::new();
        let err = registry.action("does_not_exist").unwrap_err();
        assert!(matches!(err, RegistryError::NotFound { .. }));
    }

    #[test]
    fn list_is_sorted() {
        let mut registry = ComponentRegistry::new();
        components::register_builtins(&mut registry).unwrap();

        let names = registry.list(ComponentKind::Reaction);
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(!names.is_empty());
    }
}
