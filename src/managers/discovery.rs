use crate::errors::ToolError;
use crate::services::client::MoldClient;
use crate::services::discovery::fetch_method_metadata;
use crate::services::logger::Logger;
use crate::services::tool_builder::{AutoRegisterOptions, ToolBuilder};
use crate::services::tool_registry::ToolHandler;
use crate::services::validation::Validation;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryAction {
    ListMeta,
    AutoRegister,
}

pub struct DiscoveryManager {
    logger: Logger,
    validation: Validation,
    client: MoldClient,
    builder: ToolBuilder,
    action: DiscoveryAction,
}

impl DiscoveryManager {
    pub fn new(
        logger: Logger,
        validation: Validation,
        client: MoldClient,
        builder: ToolBuilder,
        action: DiscoveryAction,
    ) -> Self {
        Self {
            logger: logger.child("discovery"),
            validation,
            client,
            builder,
            action,
        }
    }

    async fn list_meta(&self, args: Value) -> Result<Value, ToolError> {
        let name = self
            .validation
            .ensure_optional_string(args.get("name"), "name", true)?;
        let methods = fetch_method_metadata(&self.client, name.as_deref()).await?;
        serde_json::to_value(methods).map_err(|err| ToolError::internal(err.to_string()))
    }

    async fn auto_register(&self, args: Value) -> Result<Value, ToolError> {
        let options = AutoRegisterOptions {
            include: self
                .validation
                .ensure_optional_string(args.get("include"), "include", false)?,
            exclude: self
                .validation
                .ensure_optional_string(args.get("exclude"), "exclude", false)?,
            limit: self
                .validation
                .ensure_optional_limit(args.get("limit"), "limit")?,
            namespace: match args.get("namespace") {
                None | Some(Value::Null) => None,
                Some(Value::String(text)) => Some(text.clone()),
                Some(_) => return Err(ToolError::invalid_params("namespace must be a string")),
            },
        };
        let summary = self.builder.auto_register(options).await?;
        serde_json::to_value(summary).map_err(|err| ToolError::internal(err.to_string()))
    }
}

#[async_trait::async_trait]
impl ToolHandler for DiscoveryManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle", None);
        match self.action {
            DiscoveryAction::ListMeta => self.list_meta(args).await,
            DiscoveryAction::AutoRegister => self.auto_register(args).await,
        }
    }
}
