use serde_json::Value;

pub fn is_truthy(value: impl AsRef<str>) -> bool {
    matches!(
        value.as_ref().trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// `MOLD_AUTOREGISTER=all` registers every discovered method before serving.
pub fn is_startup_autoregister_enabled() -> bool {
    std::env::var("MOLD_AUTOREGISTER")
        .map(|raw| raw.trim().eq_ignore_ascii_case("all"))
        .unwrap_or(false)
}

/// The `_wait` control accepts only boolean `true` or the exact string `"true"`.
pub fn is_wait_requested(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => text == "true",
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wait_flag_is_strict() {
        assert!(is_wait_requested(Some(&json!(true))));
        assert!(is_wait_requested(Some(&json!("true"))));
        assert!(!is_wait_requested(Some(&json!("TRUE"))));
        assert!(!is_wait_requested(Some(&json!(1))));
        assert!(!is_wait_requested(None));
    }

    #[test]
    fn truthy_values() {
        assert!(is_truthy(" Yes "));
        assert!(!is_truthy("0"));
    }
}
