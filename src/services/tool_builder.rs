//! Turns platform method descriptors into registered tools.

use crate::constants::tools::{DEFAULT_NAMESPACE, INTERVAL_PARAM, TIMEOUT_PARAM, WAIT_PARAM};
use crate::errors::{MoldError, ToolError};
use crate::mcp::catalog::ToolDef;
use crate::services::client::MoldClient;
use crate::services::discovery::{fetch_method_metadata, MethodDescriptor};
use crate::services::job_poller::{extract_job_id, JobPoller, PollOptions};
use crate::services::logger::Logger;
use crate::services::tool_registry::{ToolHandler, ToolRegistry};
use crate::utils::feature_flags::is_wait_requested;
use crate::utils::params::{flatten_params, normalize_param_value, sanitize_tool_name};
use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Accepted argument shapes for a declared platform type. Shape only; the
/// platform owns the semantics.
pub fn schema_for_type(declared: &str) -> Value {
    match declared.trim().to_lowercase().as_str() {
        "boolean" => json!({"type": ["boolean", "string"]}),
        "short" | "integer" | "int" | "long" => json!({"type": ["number", "string"]}),
        "uuid" | "tz" | "date" | "string" | "" => json!({"type": "string"}),
        _ => json!({
            "anyOf": [
                {"type": "string"},
                {"type": "array", "items": {"type": ["string", "number", "boolean"]}},
                {"type": "object", "additionalProperties": {"type": ["string", "number", "boolean"]}}
            ]
        }),
    }
}

pub fn build_schema(descriptor: &MethodDescriptor) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in &descriptor.parameters {
        let mut schema = schema_for_type(&param.param_type);
        if let (Some(obj), Some(text)) = (schema.as_object_mut(), param.description.as_ref()) {
            if !text.trim().is_empty() {
                obj.insert("description".to_string(), Value::String(text.trim().to_string()));
            }
        }
        properties.insert(param.name.clone(), schema);
        if param.required && !required.contains(&param.name) {
            required.push(param.name.clone());
        }
    }
    if descriptor.is_async {
        properties.insert(
            WAIT_PARAM.to_string(),
            json!({"type": ["boolean", "string"], "description": "Wait for the async job to finish"}),
        );
        properties.insert(
            TIMEOUT_PARAM.to_string(),
            json!({"type": ["number", "string"], "description": "Wait timeout in ms (default 60000)"}),
        );
        properties.insert(
            INTERVAL_PARAM.to_string(),
            json!({"type": ["number", "string"], "description": "Poll interval in ms (default 2000)"}),
        );
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    schema.insert("additionalProperties".to_string(), Value::Bool(true));
    Value::Object(schema)
}

pub fn tool_def_for(descriptor: &MethodDescriptor, namespace: &str) -> ToolDef {
    let title = if descriptor.is_async {
        format!("{} (async)", descriptor.name)
    } else {
        descriptor.name.clone()
    };
    let description = match descriptor.description.trim() {
        "" => format!("Invoke {}", descriptor.name),
        text => text.to_string(),
    };
    ToolDef {
        name: sanitize_tool_name(&format!("{}{}", namespace, descriptor.name)),
        title: Some(title),
        description,
        input_schema: build_schema(descriptor),
    }
}

/// Handler behind every generated tool, also reused by the fixed VM tools.
pub struct ApiToolHandler {
    descriptor: MethodDescriptor,
    client: MoldClient,
    poller: JobPoller,
}

impl ApiToolHandler {
    pub fn new(descriptor: MethodDescriptor, client: MoldClient, poller: JobPoller) -> Self {
        Self {
            descriptor,
            client,
            poller,
        }
    }
}

#[async_trait]
impl ToolHandler for ApiToolHandler {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        let mut domain = match args {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            _ => return Err(ToolError::invalid_params("arguments must be an object")),
        };
        let wait = domain.remove(WAIT_PARAM);
        let timeout = domain.remove(TIMEOUT_PARAM);
        let interval = domain.remove(INTERVAL_PARAM);

        let normalized: Map<String, Value> = domain
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), normalize_param_value(value)))
            .collect();
        let command = self.descriptor.name.as_str();
        let response = self
            .client
            .call_flat(command, &flatten_params(&normalized))
            .await?;

        if !(self.descriptor.is_async && is_wait_requested(wait.as_ref())) {
            return Ok(response);
        }
        let Some(job_id) = extract_job_id(command, &response) else {
            return Ok(response);
        };
        let options = PollOptions::from_values(timeout.as_ref(), interval.as_ref());
        let handle = self.poller.wait_tracked(&job_id, options).await?;
        Ok(handle.raw_result)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AutoRegisterOptions {
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub limit: Option<usize>,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AutoRegisterSummary {
    pub total: usize,
    pub registered: usize,
    pub namespace: String,
}

fn compile_filter(pattern: Option<&str>, field: &str) -> Result<Option<Regex>, MoldError> {
    let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(Some)
        .map_err(|err| MoldError::InvalidParams(format!("{}: invalid regular expression: {}", field, err)))
}

/// Keeps descriptors matching `include` and not matching `exclude`, then the
/// first `limit` of them.
pub fn filter_descriptors(
    descriptors: Vec<MethodDescriptor>,
    options: &AutoRegisterOptions,
) -> Result<Vec<MethodDescriptor>, MoldError> {
    let include = compile_filter(options.include.as_deref(), "include")?;
    let exclude = compile_filter(options.exclude.as_deref(), "exclude")?;
    Ok(descriptors
        .into_iter()
        .filter(|d| include.as_ref().map_or(true, |re| re.is_match(&d.name)))
        .filter(|d| exclude.as_ref().map_or(true, |re| !re.is_match(&d.name)))
        .take(options.limit.unwrap_or(usize::MAX))
        .collect())
}

#[derive(Clone)]
pub struct ToolBuilder {
    logger: Logger,
    client: MoldClient,
    poller: JobPoller,
    registry: Arc<ToolRegistry>,
}

impl ToolBuilder {
    pub fn new(
        logger: Logger,
        client: MoldClient,
        poller: JobPoller,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            logger: logger.child("builder"),
            client,
            poller,
            registry,
        }
    }

    pub fn handler_for(&self, descriptor: MethodDescriptor) -> Arc<dyn ToolHandler> {
        Arc::new(ApiToolHandler::new(
            descriptor,
            self.client.clone(),
            self.poller.clone(),
        ))
    }

    /// `false` when a tool with the sanitized name already exists.
    pub fn register(&self, descriptor: &MethodDescriptor, namespace: &str) -> Result<bool, ToolError> {
        let def = tool_def_for(descriptor, namespace);
        if self.registry.has_tool(&def.name) {
            return Ok(false);
        }
        self.registry
            .register_tool(def, self.handler_for(descriptor.clone()))
    }

    pub async fn auto_register(&self, options: AutoRegisterOptions) -> Result<AutoRegisterSummary, ToolError> {
        let namespace = options
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        let descriptors = fetch_method_metadata(&self.client, None).await?;
        let discovered = descriptors.len();
        let selected = filter_descriptors(descriptors, &options)?;

        let mut registered = 0;
        for descriptor in &selected {
            if self.register(descriptor, &namespace)? {
                registered += 1;
            }
        }
        self.logger.info(
            "platform commands registered",
            Some(&json!({
                "discovered": discovered,
                "selected": selected.len(),
                "registered": registered,
                "namespace": namespace,
            })),
        );
        Ok(AutoRegisterSummary {
            total: selected.len(),
            registered,
            namespace,
        })
    }
}
