pub mod discord;
pub mod error;
pub mod github;
pub mod gmail;
pub mod http;
pub mod outlook;
pub mod print;
pub mod spotify;
pub mod time;

use area_types::{ActionResponse, ReactionResponse, TriggerResponse};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub use error::ComponentError;

use crate::filter::FilterConfig;
use crate::registry::{ComponentRegistry, RegistryError};
use crate::schema::ValidatedConfig;

/// A component that decides whether an event has occurred. One instance
/// lives for the whole lifetime of its evaluator and may hold cursors
/// (timestamps, sequence numbers, last identifiers) or an open gateway.
///
/// `evaluate` may return immediately (polling kinds) or suspend on an
/// upstream socket (event-driven kinds) - the evaluator loop is indifferent,
/// it just races the call against cancellation.
#[async_trait]
pub trait Trigger: Send + Sync {
    fn name(&self) -> &'static str;

    async fn evaluate(&mut self) -> Result<Option<TriggerResponse>, ComponentError>;

    /// Release any upstream connection. Runs on evaluator cancellation.
    async fn shutdown(&mut self) {}
}

/// A component that extracts typed parameters from a trigger response.
/// Stateless, constructed per job. Returning `Ok(None)` means the action's
/// filter rejected the event and the reaction must not run.
#[async_trait]
pub trait Action: Send {
    fn name(&self) -> &'static str;

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError>;
}

/// A component that performs an external side effect with the action's
/// output. Stateless, constructed per job.
#[async_trait]
pub trait Reaction: Send {
    fn name(&self) -> &'static str;

    async fn execute(&self, input: &ActionResponse) -> Result<ReactionResponse, ComponentError>;
}

/// The manifest: every built-in component self-registers here, called once
/// from the composition root before the registry is frozen.
pub fn register_builtins(registry: &mut ComponentRegistry) -> Result<(), RegistryError> {
    time::register(registry)?;
    http::register(registry)?;
    print::register(registry)?;
    discord::register(registry)?;
    github::register(registry)?;
    gmail::register(registry)?;
    outlook::register(registry)?;
    spotify::register(registry)?;

    Ok(())
}

/// Evaluate the generic `filter` option an action may carry against its
/// own (event-derived) config view. No filter means pass.
pub(crate) fn passes_filter(
    config: &ValidatedConfig,
    data: &Map<String, Value>,
) -> Result<bool, ComponentError> {
    match config.get("filter") {
        Some(value) if !value.is_null() => {
            let filter: FilterConfig = serde_json::from_value(value.clone())?;
            Ok(filter.evaluate(data)?)
        }
        _ => Ok(true),
    }
}

/// `{field}` substitution against an action response, for reaction options
/// like issue titles and mail bodies. Unknown placeholders are left as-is.
pub(crate) fn render_template(template: &str, data: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                match data.get(key) {
                    Some(Value::String(s)) => out.push_str(s),
                    Some(value) => out.push_str(&value.to_string()),
                    None => {
                        out.push('{');
                        out.push_str(key);
                        out.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn template_substitutes_known_fields() {
        let data = json!({"author": "alice", "count": 3})
            .as_object()
            .unwrap()
            .clone();
        assert_eq!(
            render_template("New push by {author} ({count} commits)", &data),
            "New push by alice (3 commits)"
        );
    }

    #[test]
    fn template_leaves_unknown_placeholders() {
        let data = Map::new();
        assert_eq!(render_template("hello {who}", &data), "hello {who}");
        assert_eq!(render_template("dangling {brace", &data), "dangling {brace");
    }
}
