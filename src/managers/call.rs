use crate::errors::ToolError;
use crate::services::client::MoldClient;
use crate::services::logger::Logger;
use crate::services::tool_registry::ToolHandler;
use crate::services::validation::Validation;
use crate::utils::params::{flatten_params, stringify_flat_params};
use serde_json::Value;

/// `mold_call`: any platform command with caller-supplied params.
pub struct CallManager {
    logger: Logger,
    validation: Validation,
    client: MoldClient,
}

impl CallManager {
    pub fn new(logger: Logger, validation: Validation, client: MoldClient) -> Self {
        Self {
            logger: logger.child("call"),
            validation,
            client,
        }
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let command = self.validation.ensure_command(args.get("command"))?;
        let params = self
            .validation
            .ensure_optional_object(args.get("params"), "params")?;
        let already_flat = self
            .validation
            .ensure_optional_bool(args.get("flat"), "flat")?
            .unwrap_or(false);

        let flat = if already_flat {
            stringify_flat_params(&params)
        } else {
            flatten_params(&params)
        };
        self.logger.debug(
            "invoke",
            Some(&serde_json::json!({"command": command, "param_count": flat.len()})),
        );
        Ok(self.client.call_flat(&command, &flat).await?)
    }
}

#[async_trait::async_trait]
impl ToolHandler for CallManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.call(args).await
    }
}
