use area_types::ActionResponse;
use async_trait::async_trait;

use crate::clients;
use crate::registry::{ComponentRegistry, RegistryError};
use crate::schema::{ConfigSchema, FieldKind, FieldSpec, ValidatedConfig};

use super::{passes_filter, Action, ComponentError};

pub fn register(registry: &mut ComponentRegistry) -> Result<(), RegistryError> {
    registry.register_action(
        "http_get",
        "core",
        ConfigSchema::new()
            .field(FieldSpec::required("url", FieldKind::String))
            .field(FieldSpec::optional("filter", FieldKind::Object)),
        |config| Ok(Box::new(HttpGetAction { config })),
    )?;

    Ok(())
}

/// Fetches a URL and reports the body; success mirrors the HTTP status
pub struct HttpGetAction {
    config: ValidatedConfig,
}

#[async_trait]
impl Action for HttpGetAction {
    fn name(&self) -> &'static str {
        "http_get"
    }

    async fn execute(&self) -> Result<Option<ActionResponse>, ComponentError> {
        if !passes_filter(&self.config, self.config.as_map())? {
            return Ok(None);
        }

        // required by schema, so present after validation
        let url = self.config.get_str("url").unwrap_or_default();

        let response = clients::http_client()?.get(url).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        tracing::info!(url, status = status.as_u16(), "http_get finished");

        let response = if status.is_success() {
            ActionResponse::ok()
        } else {
            ActionResponse::failed()
        };

        Ok(Some(
            response
                .with_detail("status", status.as_u16())
                .with_detail("url", url)
                .with_field("body", body),
        ))
    }
}
