use area_types::{ActionResponse, ReactionResponse};
use async_trait::async_trait;

use crate::registry::{ComponentRegistry, RegistryError};
use crate::schema::ConfigSchema;

use super::{ComponentError, Reaction};

pub fn register(registry: &mut ComponentRegistry) -> Result<(), RegistryError> {
    registry.register_reaction("print_reaction", "core", ConfigSchema::new(), |_config| {
        Ok(Box::new(PrintReaction))
    })?;

    Ok(())
}

/// Logs the action's result. The simplest possible side effect, mostly
/// useful for wiring checks and as the reaction half of test areas.
pub struct PrintReaction;

#[async_trait]
impl Reaction for PrintReaction {
    fn name(&self) -> &'static str {
        "print_reaction"
    }

    async fn execute(&self, input: &ActionResponse) -> Result<ReactionResponse, ComponentError> {
        tracing::info!(
            success = input.success,
            details = %serde_json::to_string(&input.details).unwrap_or_default(),
            "print_reaction"
        );

        Ok(ReactionResponse::ok()
            .with_detail("printed", "true")
            .with_detail("success", input.success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{validate, ComponentKind};

    #[tokio::test]
    async fn print_reaction_reports_success() {
        // the empty schema accepts an empty option map
        validate(
            ComponentKind::Reaction,
            &ConfigSchema::new(),
            &serde_json::Map::new(),
        )
        .unwrap();
        let reaction = PrintReaction;

        let result = reaction
            .execute(&ActionResponse::ok().with_detail("message", "hi"))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.details["printed"], "true");
    }
}
