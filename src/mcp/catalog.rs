use crate::utils::suggest::suggest;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static TOOL_CATALOG: Lazy<Vec<ToolDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/tool_catalog.json"));
    serde_json::from_str(raw).expect("tool_catalog.json must be valid JSON")
});

/// Fixed tools published at startup.
pub fn tool_catalog() -> &'static [ToolDef] {
    &TOOL_CATALOG
}

pub fn compile_schema(schema: &Value) -> Result<JSONSchema, String> {
    JSONSchema::compile(schema).map_err(|err| err.to_string())
}

pub fn format_schema_errors(
    tool_name: &str,
    args: &Value,
    errors: jsonschema::ErrorIterator,
    schema: &Value,
) -> String {
    let header = format!("Invalid arguments for {}", tool_name);
    let mut rendered = Vec::new();
    let mut did_you_means = Vec::new();

    for err in errors.take(10) {
        let instance_path = if err.instance_path.to_string().is_empty() {
            "(root)".to_string()
        } else {
            err.instance_path.to_string()
        };
        match &err.kind {
            jsonschema::error::ValidationErrorKind::AdditionalProperties { unexpected } => {
                if unexpected.is_empty() {
                    rendered.push(format!("{}: unknown field", instance_path));
                }
                for unknown in unexpected {
                    rendered.push(format!("{}: unknown field '{}'", instance_path, unknown));
                    if let Some(parent) = schema_parent_at(schema, err.schema_path.to_string()) {
                        let props: Vec<String> = parent
                            .get("properties")
                            .and_then(|v| v.as_object())
                            .map(|map| map.keys().cloned().collect())
                            .unwrap_or_default();
                        let suggestions = suggest(unknown, &props, 3);
                        if !suggestions.is_empty() {
                            did_you_means.push(format!(
                                "field '{}': {}",
                                unknown,
                                suggestions.join(", ")
                            ));
                        }
                    }
                }
            }
            jsonschema::error::ValidationErrorKind::Enum { options } => {
                let allowed_list: Vec<String> = options
                    .as_array()
                    .map(|arr| {
                        arr.iter()
                            .map(|v| {
                                v.as_str()
                                    .map(|s| s.to_string())
                                    .unwrap_or_else(|| v.to_string())
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                if allowed_list.is_empty() {
                    rendered.push(format!("{}: invalid value", instance_path));
                } else {
                    rendered.push(format!(
                        "{}: expected one of {}",
                        instance_path,
                        allowed_list.join(", ")
                    ));
                    let received = value_at(args, &err.instance_path.to_string());
                    let suggestions = suggest(received.as_str().unwrap_or(""), &allowed_list, 3);
                    if !suggestions.is_empty() {
                        did_you_means.push(format!(
                            "{}: {}",
                            instance_path,
                            suggestions.join(", ")
                        ));
                    }
                }
            }
            jsonschema::error::ValidationErrorKind::Required { property } => {
                let prop = property
                    .as_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| property.to_string());
                rendered.push(format!(
                    "{}: missing required field '{}'",
                    instance_path, prop
                ));
            }
            jsonschema::error::ValidationErrorKind::Type { kind } => {
                rendered.push(format!(
                    "{}: expected {}",
                    instance_path,
                    format_type_kind(kind)
                ));
            }
            // anyOf failures carry no useful detail of their own.
            jsonschema::error::ValidationErrorKind::AnyOf => {
                rendered.push(format!(
                    "{}: value does not match any accepted shape",
                    instance_path
                ));
            }
            _ => {
                rendered.push(format!("{}: {}", instance_path, err));
            }
        }
    }

    let mut lines = vec![header];
    lines.extend(rendered.iter().map(|line| format!("- {}", line)));
    if !did_you_means.is_empty() {
        lines.push(format!(
            "Did you mean: {}",
            did_you_means
                .iter()
                .take(3)
                .cloned()
                .collect::<Vec<_>>()
                .join(" | ")
        ));
    }
    lines.push(format!(
        "Hint: tools/list shows the input schema of '{}'",
        tool_name
    ));
    lines.join("\n")
}

fn format_type_kind(kind: &jsonschema::error::TypeKind) -> String {
    match kind {
        jsonschema::error::TypeKind::Single(primitive) => primitive.to_string(),
        jsonschema::error::TypeKind::Multiple(types) => {
            let list: Vec<String> = (*types).into_iter().map(|t| t.to_string()).collect();
            if list.is_empty() {
                "unknown".to_string()
            } else {
                list.join(" | ")
            }
        }
    }
}

/// Object schema that owns the keyword at `schema_path`. A trailing
/// `additionalProperties` segment is dropped so the result carries `properties`.
fn schema_parent_at(schema: &Value, schema_path: String) -> Option<Value> {
    let owner = schema_path
        .trim_end_matches('/')
        .strip_suffix("additionalProperties")
        .unwrap_or(&schema_path);
    let mut current = schema;
    for segment in owner.split('/') {
        if segment.is_empty() {
            continue;
        }
        if let Some(obj) = current.as_object() {
            current = obj.get(segment)?;
        } else if let Some(arr) = current.as_array() {
            let idx = segment.parse::<usize>().ok()?;
            current = arr.get(idx)?;
        }
    }
    Some(current.clone())
}

fn value_at(root: &Value, instance_path: &str) -> Value {
    let mut current = root;
    for segment in instance_path.trim_start_matches('/').split('/') {
        if segment.is_empty() {
            continue;
        }
        if let Some(obj) = current.as_object() {
            current = obj.get(segment).unwrap_or(&Value::Null);
        } else if let Some(arr) = current.as_array() {
            let idx = segment.parse::<usize>().unwrap_or(0);
            current = arr.get(idx).unwrap_or(&Value::Null);
        }
    }
    current.clone()
}

/// Rewrites `type` arrays into `anyOf` branches; some tool hosts reject the
/// array form.
pub fn normalize_input_schema(schema: &Value) -> Value {
    match schema {
        Value::Null => Value::Null,
        Value::Array(items) => {
            Value::Array(items.iter().map(normalize_input_schema).collect())
        }
        Value::Object(map) => {
            let mut out = map.clone();
            if let Some(props) = out.get("properties").and_then(|v| v.as_object()) {
                let mut normalized = serde_json::Map::new();
                for (key, value) in props {
                    normalized.insert(key.clone(), normalize_input_schema(value));
                }
                out.insert("properties".to_string(), Value::Object(normalized));
            }
            if let Some(items) = out.get("items") {
                out.insert("items".to_string(), normalize_input_schema(items));
            }
            if let Some(additional) = out.get("additionalProperties") {
                if additional.is_object() {
                    out.insert(
                        "additionalProperties".to_string(),
                        normalize_input_schema(additional),
                    );
                }
            }
            for keyword in ["anyOf", "oneOf", "allOf"] {
                if let Some(arr) = out.get(keyword).and_then(|v| v.as_array()) {
                    out.insert(
                        keyword.to_string(),
                        Value::Array(arr.iter().map(normalize_input_schema).collect()),
                    );
                }
            }
            if let Some(types) = out.get("type").and_then(|v| v.as_array()) {
                let mut shared = out.clone();
                shared.remove("type");
                let items = shared.remove("items");
                let any_of = types
                    .iter()
                    .filter_map(|t| t.as_str())
                    .map(|t| {
                        if t == "array" {
                            serde_json::json!({"type": "array", "items": items.clone().unwrap_or(Value::Object(Default::default()))})
                        } else {
                            serde_json::json!({"type": t})
                        }
                    })
                    .collect();
                shared.insert("anyOf".to_string(), Value::Array(any_of));
                return Value::Object(shared);
            }
            if out.get("type").and_then(|v| v.as_str()) == Some("array")
                && !out.contains_key("items")
            {
                out.insert("items".to_string(), Value::Object(Default::default()));
            }
            Value::Object(out)
        }
        _ => schema.clone(),
    }
}
