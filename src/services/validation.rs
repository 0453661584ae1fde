use crate::errors::ToolError;
use serde_json::{Map, Value};

#[derive(Clone)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(
        &self,
        value: &Value,
        label: &str,
        trim: bool,
    ) -> Result<String, ToolError> {
        let text = value.as_str().ok_or_else(|| {
            ToolError::invalid_params(format!("{} must be a non-empty string", label))
        })?;
        let normalized = text.trim();
        if normalized.is_empty() {
            return Err(ToolError::invalid_params(format!(
                "{} must be a non-empty string",
                label
            )));
        }
        Ok(if trim {
            normalized.to_string()
        } else {
            text.to_string()
        })
    }

    pub fn ensure_optional_string(
        &self,
        value: Option<&Value>,
        label: &str,
        trim: bool,
    ) -> Result<Option<String>, ToolError> {
        match value {
            None => Ok(None),
            Some(val) if val.is_null() => Ok(None),
            Some(val) => self.ensure_string(val, label, trim).map(Some),
        }
    }

    /// Platform command names are plain ASCII identifiers (`listVirtualMachines`).
    pub fn ensure_command(&self, value: Option<&Value>) -> Result<String, ToolError> {
        let command = self.ensure_string(value.unwrap_or(&Value::Null), "command", true)?;
        if !command.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ToolError::invalid_params(format!(
                "command '{}' must contain only ASCII letters and digits",
                command
            ))
            .with_hint("Use the platform command name, e.g. listVirtualMachines."));
        }
        Ok(command)
    }

    pub fn ensure_optional_bool(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<bool>, ToolError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(flag)) => Ok(Some(*flag)),
            Some(_) => Err(ToolError::invalid_params(format!("{} must be a boolean", label))),
        }
    }

    pub fn ensure_optional_limit(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<usize>, ToolError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(val) => val
                .as_u64()
                .map(|n| Some(n as usize))
                .ok_or_else(|| {
                    ToolError::invalid_params(format!("{} must be a non-negative integer", label))
                }),
        }
    }

    pub fn ensure_object(&self, value: &Value, label: &str) -> Result<Map<String, Value>, ToolError> {
        value
            .as_object()
            .cloned()
            .ok_or_else(|| ToolError::invalid_params(format!("{} must be an object", label)))
    }

    pub fn ensure_optional_object(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Map<String, Value>, ToolError> {
        match value {
            None => Ok(Map::new()),
            Some(val) if val.is_null() => Ok(Map::new()),
            Some(val) => self.ensure_object(val, label),
        }
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn command_must_be_identifier() {
        let v = Validation::new();
        assert_eq!(
            v.ensure_command(Some(&json!(" listZones "))).unwrap(),
            "listZones"
        );
        assert!(v.ensure_command(Some(&json!("list zones"))).is_err());
        assert!(v.ensure_command(Some(&json!(""))).is_err());
        assert!(v.ensure_command(None).is_err());
    }

    #[test]
    fn optional_values_accept_null() {
        let v = Validation::new();
        assert_eq!(v.ensure_optional_bool(Some(&Value::Null), "flat").unwrap(), None);
        assert_eq!(v.ensure_optional_limit(Some(&json!(3)), "limit").unwrap(), Some(3));
        assert!(v.ensure_optional_limit(Some(&json!(-1)), "limit").is_err());
        assert!(v.ensure_optional_object(None, "params").unwrap().is_empty());
        assert!(v.ensure_optional_object(Some(&json!([])), "params").is_err());
    }
}
