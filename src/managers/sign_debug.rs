use crate::constants::platform::DEFAULT_API_KEY_FIELD;
use crate::errors::ToolError;
use crate::services::client::MoldClient;
use crate::services::logger::Logger;
use crate::services::signer::SignOptions;
use crate::services::tool_registry::ToolHandler;
use crate::services::validation::Validation;
use crate::utils::params::stringify_flat_params;
use serde_json::Value;

const API_KEY_FIELDS: &[&str] = &["apiKey", "apikey"];

/// `mold_signDebug`: shows every signing intermediate without sending a request.
pub struct SignDebugManager {
    logger: Logger,
    validation: Validation,
    client: MoldClient,
}

impl SignDebugManager {
    pub fn new(logger: Logger, validation: Validation, client: MoldClient) -> Self {
        Self {
            logger: logger.child("sign_debug"),
            validation,
            client,
        }
    }

    fn sign_debug(&self, args: Value) -> Result<Value, ToolError> {
        let command = self.validation.ensure_command(args.get("command"))?;
        let params = self
            .validation
            .ensure_optional_object(args.get("params"), "params")?;
        let include_response = self
            .validation
            .ensure_optional_bool(args.get("includeResponse"), "includeResponse")?
            .unwrap_or(true);
        let api_key_field = self
            .validation
            .ensure_optional_string(args.get("apiKeyField"), "apiKeyField", true)?
            .unwrap_or_else(|| DEFAULT_API_KEY_FIELD.to_string());
        if !API_KEY_FIELDS.contains(&api_key_field.as_str()) {
            return Err(ToolError::invalid_params(format!(
                "apiKeyField must be one of {}",
                API_KEY_FIELDS.join(", ")
            )));
        }

        let options = SignOptions {
            include_response,
            api_key_field,
        };
        Ok(self
            .client
            .sign_debug(&command, &stringify_flat_params(&params), &options)?)
    }
}

#[async_trait::async_trait]
impl ToolHandler for SignDebugManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle", args.get("command"));
        self.sign_debug(args)
    }
}
