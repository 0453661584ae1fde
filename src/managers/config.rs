use crate::errors::ToolError;
use crate::services::config::{ConfigPatch, ConfigService};
use crate::services::logger::Logger;
use crate::services::tool_registry::ToolHandler;
use crate::services::validation::Validation;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigAction {
    Get,
    Set,
}

pub struct ConfigManager {
    logger: Logger,
    validation: Validation,
    config: Arc<ConfigService>,
    action: ConfigAction,
}

impl ConfigManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        config: Arc<ConfigService>,
        action: ConfigAction,
    ) -> Self {
        Self {
            logger: logger.child("config"),
            validation,
            config,
            action,
        }
    }

    fn read_field(&self, args: &Value, key: &str) -> Result<Option<String>, ToolError> {
        match args.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(text)) => Ok(Some(text.clone())),
            Some(_) => Err(ToolError::invalid_params(format!("{} must be a string", key))),
        }
    }

    fn set(&self, args: Value) -> Result<Value, ToolError> {
        let patch = ConfigPatch {
            endpoint: self.read_field(&args, "endpoint")?,
            api_key: self.read_field(&args, "apiKey")?,
            secret: self.read_field(&args, "secret")?,
            algo: self.read_field(&args, "algo")?,
        };
        let persist = self
            .validation
            .ensure_optional_bool(args.get("persist"), "persist")?
            .unwrap_or(true);
        let view = self.config.update(&patch, persist)?;
        serde_json::to_value(view).map_err(|err| ToolError::internal(err.to_string()))
    }

    fn get(&self) -> Result<Value, ToolError> {
        serde_json::to_value(self.config.redacted())
            .map_err(|err| ToolError::internal(err.to_string()))
    }
}

#[async_trait::async_trait]
impl ToolHandler for ConfigManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle", None);
        match self.action {
            ConfigAction::Get => self.get(),
            ConfigAction::Set => self.set(args),
        }
    }
}
