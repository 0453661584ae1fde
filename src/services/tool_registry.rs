use crate::errors::ToolError;
use crate::mcp::catalog::{compile_schema, format_schema_errors, normalize_input_schema, ToolDef};
use crate::services::logger::Logger;
use crate::utils::suggest::suggest;
use async_trait::async_trait;
use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value, ToolError>;
}

struct RegisteredTool {
    def: ToolDef,
    validator: Arc<JSONSchema>,
    handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
struct RegistryInner {
    order: Vec<String>,
    tools: HashMap<String, RegisteredTool>,
}

/// Name-keyed set of callable tools. A name is registered at most once.
pub struct ToolRegistry {
    logger: Logger,
    inner: RwLock<RegistryInner>,
    generation: AtomicU64,
}

impl ToolRegistry {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger: logger.child("registry"),
            inner: RwLock::new(RegistryInner::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Returns `Ok(false)` without touching the existing entry when the name
    /// is taken.
    pub fn register_tool(&self, def: ToolDef, handler: Arc<dyn ToolHandler>) -> Result<bool, ToolError> {
        if self.has_tool(&def.name) {
            return Ok(false);
        }
        let validator = compile_schema(&def.input_schema).map_err(|err| {
            ToolError::internal(format!("Invalid input schema for {}: {}", def.name, err))
        })?;

        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if guard.tools.contains_key(&def.name) {
            return Ok(false);
        }
        let name = def.name.clone();
        guard.order.push(name.clone());
        guard.tools.insert(
            name.clone(),
            RegisteredTool {
                def,
                validator: Arc::new(validator),
                handler,
            },
        );
        drop(guard);

        self.generation.fetch_add(1, Ordering::SeqCst);
        self.logger
            .debug("tool registered", Some(&serde_json::json!({"tool": name})));
        Ok(true)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .tools
            .contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bumped on every successful registration.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn names(&self) -> Vec<String> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .order
            .clone()
    }

    pub fn tool_def(&self, name: &str) -> Option<ToolDef> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .tools
            .get(name)
            .map(|tool| tool.def.clone())
    }

    /// Tool definitions in registration order, schemas normalised for hosts.
    pub fn list(&self) -> Vec<ToolDef> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard
            .order
            .iter()
            .filter_map(|name| guard.tools.get(name))
            .map(|tool| ToolDef {
                input_schema: normalize_input_schema(&tool.def.input_schema),
                ..tool.def.clone()
            })
            .collect()
    }

    fn lookup(&self, name: &str) -> Result<(ToolDef, Arc<JSONSchema>, Arc<dyn ToolHandler>), ToolError> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        if let Some(tool) = guard.tools.get(name) {
            return Ok((tool.def.clone(), tool.validator.clone(), tool.handler.clone()));
        }
        let suggestions = suggest(name, &guard.order, 5);
        let hint = if suggestions.is_empty() {
            "Call tools/list to see available tools, or mold_autoRegisterApis to add platform commands."
                .to_string()
        } else {
            format!("Did you mean: {}", suggestions.join(", "))
        };
        Err(ToolError::invalid_params(format!("Unknown tool: {}", name)).with_hint(hint))
    }

    /// Validates, runs the handler, and wraps the result with call metadata.
    pub async fn execute(&self, name: &str, args: Value) -> Result<Value, ToolError> {
        let (def, validator, handler) = self.lookup(name)?;
        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };
        if let Err(errors) = validator.validate(&args) {
            let message = format_schema_errors(name, &args, errors, &def.input_schema);
            return Err(ToolError::invalid_params(message));
        }
        drop(validator);

        let trace_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        self.logger.debug(
            "tool call",
            Some(&serde_json::json!({"tool": name, "trace_id": trace_id})),
        );
        let outcome = handler.handle(args).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => Ok(serde_json::json!({
                "ok": true,
                "result": result,
                "meta": {
                    "tool": name,
                    "trace_id": trace_id,
                    "duration_ms": duration_ms,
                },
            })),
            Err(err) => {
                self.logger.warn(
                    "tool call failed",
                    Some(&serde_json::json!({
                        "tool": name,
                        "trace_id": trace_id,
                        "code": err.code,
                        "duration_ms": duration_ms,
                    })),
                );
                Err(err)
            }
        }
    }
}
