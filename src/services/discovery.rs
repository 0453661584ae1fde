use crate::constants::platform::LIST_METHODS_COMMAND;
use crate::errors::MoldError;
use crate::services::client::MoldClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterMeta {
    pub name: String,
    #[serde(rename = "type", default)]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "isasync", default)]
    pub is_async: bool,
    #[serde(rename = "params", default)]
    pub parameters: Vec<ParameterMeta>,
}

/// Outer envelope keys, tried in order. `None` means the payload itself.
const ENVELOPE_KEYS: &[Option<&str>] = &[
    Some("listapisresponse"),
    Some("listApisResponse"),
    Some("listapis"),
    None,
];

/// Keys of the method list inside the envelope. `None` means the envelope itself.
const LIST_KEYS: &[Option<&str>] = &[Some("api"), Some("apis"), None];

fn lookup<'a>(value: &'a Value, key: Option<&str>) -> Option<&'a Value> {
    match key {
        Some(key) => value.get(key),
        None => Some(value),
    }
}

/// First envelope that yields a method array wins.
pub fn extract_method_list(payload: &Value) -> Result<&Vec<Value>, MoldError> {
    let envelope = ENVELOPE_KEYS
        .iter()
        .find_map(|key| lookup(payload, *key).filter(|v| v.is_object() || v.is_array()))
        .ok_or_else(|| MoldError::Discovery("response is not a JSON object".to_string()))?;
    LIST_KEYS
        .iter()
        .find_map(|key| lookup(envelope, *key).and_then(Value::as_array))
        .ok_or_else(|| MoldError::Discovery("no api array found in listApis response".to_string()))
}

fn read_flag(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text.eq_ignore_ascii_case("true"),
        Some(Value::Number(num)) => num.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

fn read_text(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(|s| s.to_string())
}

fn read_length(value: Option<&Value>) -> Option<u64> {
    match value {
        Some(Value::Number(num)) => num.as_u64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    }
}

fn normalize_parameter(raw: &Map<String, Value>) -> Option<ParameterMeta> {
    let name = read_text(raw.get("name")).filter(|n| !n.is_empty())?;
    Some(ParameterMeta {
        name,
        param_type: read_text(raw.get("type")).unwrap_or_default(),
        required: read_flag(raw.get("required")),
        description: read_text(raw.get("description")),
        length: read_length(raw.get("length")),
    })
}

/// Keeps name, description, async flag and parameter metadata; everything
/// else the platform reports is dropped. Entries without a name are skipped.
pub fn normalize_descriptor(raw: &Value) -> Option<MethodDescriptor> {
    let obj = raw.as_object()?;
    let name = read_text(obj.get("name")).filter(|n| !n.is_empty())?;
    let parameters = obj
        .get("params")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(normalize_parameter)
                .collect()
        })
        .unwrap_or_default();
    Some(MethodDescriptor {
        name,
        description: read_text(obj.get("description")).unwrap_or_default(),
        is_async: read_flag(obj.get("isasync")),
        parameters,
    })
}

pub fn parse_method_list(payload: &Value) -> Result<Vec<MethodDescriptor>, MoldError> {
    Ok(extract_method_list(payload)?
        .iter()
        .filter_map(normalize_descriptor)
        .collect())
}

pub async fn fetch_method_metadata(
    client: &MoldClient,
    name_filter: Option<&str>,
) -> Result<Vec<MethodDescriptor>, MoldError> {
    let mut params = Map::new();
    if let Some(name) = name_filter.map(str::trim).filter(|n| !n.is_empty()) {
        params.insert("name".to_string(), Value::String(name.to_string()));
    }
    let payload = client.call(LIST_METHODS_COMMAND, &params).await?;
    parse_method_list(&payload)
}
