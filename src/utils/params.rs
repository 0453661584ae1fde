//! Conversion of nested tool arguments into the platform's flat query parameters.
//!
//! The platform only understands `key=value` pairs. Nested structures are encoded
//! with bracket/dot keys (`disks[0].size=10`), primitive lists as CSV
//! (`tags=a,b,c`).

use crate::constants::tools::MAX_TOOL_NAME_LEN;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Flat parameter set sent to the platform. Keys are unique; on collision the
/// entry written last wins.
pub type FlatParams = BTreeMap<String, String>;

/// Keys containing `.` or `[` were flattened by the caller and are kept verbatim.
pub fn is_preflattened_key(key: &str) -> bool {
    key.contains('.') || key.contains('[')
}

fn is_object_list(items: &[Value]) -> bool {
    matches!(items.first(), Some(Value::Object(_)))
}

/// Plain string form of a leaf value. Lists render as CSV, objects as JSON text.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(num) => stringify_number(num),
        Value::Array(items) => join_csv(items),
        Value::Object(_) => value.to_string(),
    }
}

/// Whole-valued floats (`2.0`) go out as integers (`2`).
fn stringify_number(num: &serde_json::Number) -> String {
    match num.as_f64() {
        Some(float) if num.is_f64() && float.is_finite() && float.fract() == 0.0 => {
            if float == 0.0 {
                "0".to_string()
            } else {
                format!("{:.0}", float)
            }
        }
        _ => num.to_string(),
    }
}

fn join_csv(items: &[Value]) -> String {
    items
        .iter()
        .filter(|item| !item.is_null())
        .map(stringify_value)
        .collect::<Vec<_>>()
        .join(",")
}

fn put(out: &mut FlatParams, key: String, value: &Value) {
    if value.is_null() {
        return;
    }
    out.insert(key, stringify_value(value));
}

fn walk(out: &mut FlatParams, base: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::Array(items) if is_object_list(items) => {
            for (idx, item) in items.iter().enumerate() {
                walk(out, &format!("{}[{}]", base, idx), item);
            }
        }
        Value::Array(items) => {
            out.insert(base.to_string(), join_csv(items));
        }
        Value::Object(map) => {
            for (sub_key, sub_value) in map {
                walk(out, &format!("{}.{}", base, sub_key), sub_value);
            }
        }
        _ => put(out, base.to_string(), value),
    }
}

/// Flattens top-level tool arguments into platform query parameters.
///
/// * `null` values are dropped.
/// * keys already in bracket/dot form are copied verbatim.
/// * lists of objects expand to `key[i].field`, recursively.
/// * lists of primitives join to CSV.
/// * a bare object is treated as a one-element list (`key[0].field`).
/// * primitives are stringified.
pub fn flatten_params(params: &Map<String, Value>) -> FlatParams {
    let mut out = FlatParams::new();
    for (key, value) in params {
        if value.is_null() {
            continue;
        }
        if is_preflattened_key(key) {
            put(&mut out, key.clone(), value);
            continue;
        }
        match value {
            Value::Array(items) if is_object_list(items) => {
                for (idx, item) in items.iter().enumerate() {
                    walk(&mut out, &format!("{}[{}]", key, idx), item);
                }
            }
            Value::Array(items) => {
                out.insert(key.clone(), join_csv(items));
            }
            Value::Object(_) => walk(&mut out, &format!("{}[0]", key), value),
            _ => put(&mut out, key.clone(), value),
        }
    }
    out
}

/// Copies arguments the caller declared as already flat, stringifying values.
pub fn stringify_flat_params(params: &Map<String, Value>) -> FlatParams {
    params
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| (key.clone(), stringify_value(value)))
        .collect()
}

fn is_primitive(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Transport form of one generated-tool argument.
///
/// Primitive lists join to CSV, primitive maps to `k=v;k=v` and booleans to
/// `"true"`/`"false"`. Anything nested deeper is left untouched so that
/// [`flatten_params`] can expand it.
pub fn normalize_param_value(value: &Value) -> Value {
    match value {
        Value::Bool(flag) => Value::String(flag.to_string()),
        Value::Array(items) if items.iter().all(is_primitive) => Value::String(join_csv(items)),
        Value::Object(map) if map.values().all(is_primitive) => Value::String(
            map.iter()
                .map(|(k, v)| format!("{}={}", k, stringify_value(v)))
                .collect::<Vec<_>>()
                .join(";"),
        ),
        _ => value.clone(),
    }
}

/// Maps any string onto `[A-Za-z0-9_-]{0,64}`.
pub fn sanitize_tool_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(MAX_TOOL_NAME_LEN)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn flat(value: Value) -> FlatParams {
        flatten_params(value.as_object().expect("object"))
    }

    fn expected(pairs: &[(&str, &str)]) -> FlatParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn primitive_lists_become_csv() {
        assert_eq!(
            flat(json!({"tags": ["a", "b", "c"]})),
            expected(&[("tags", "a,b,c")])
        );
    }

    #[test]
    fn whole_floats_are_sent_as_integers() {
        assert_eq!(
            flat(json!({"size": 2.0, "ratio": 1.5, "ids": [1.0, 3.25], "zero": -0.0})),
            expected(&[("size", "2"), ("ratio", "1.5"), ("ids", "1,3.25"), ("zero", "0")])
        );
    }

    #[test]
    fn object_lists_expand_with_index() {
        assert_eq!(
            flat(json!({"disks": [{"size": 10}, {"size": 20}]})),
            expected(&[("disks[0].size", "10"), ("disks[1].size", "20")])
        );
    }

    #[test]
    fn bare_object_expands_under_index_zero() {
        assert_eq!(
            flat(json!({"details": {"cpu": 2, "mem": 4096}})),
            expected(&[("details[0].cpu", "2"), ("details[0].mem", "4096")])
        );
    }

    #[test]
    fn preflattened_keys_pass_through() {
        assert_eq!(
            flat(json!({"details[0].cpu": 2, "a.b": true})),
            expected(&[("details[0].cpu", "2"), ("a.b", "true")])
        );
    }

    #[test]
    fn nulls_are_dropped_at_every_level() {
        assert_eq!(
            flat(json!({"skip": null, "nic": [{"ip": null, "net": "n1"}]})),
            expected(&[("nic[0].net", "n1")])
        );
    }

    #[test]
    fn nested_objects_walk_with_dotted_prefix() {
        assert_eq!(
            flat(json!({
                "vm": [{
                    "boot": {"mode": {"secure": true}, "order": ["disk", "net"]},
                    "nics": [{"id": "a"}, {"id": "b"}]
                }]
            })),
            expected(&[
                ("vm[0].boot.mode.secure", "true"),
                ("vm[0].boot.order", "disk,net"),
                ("vm[0].nics[0].id", "a"),
                ("vm[0].nics[1].id", "b"),
            ])
        );
    }

    #[test]
    fn flattening_is_deterministic() {
        let input = json!({
            "zeta": [1, 2],
            "alpha": {"x": {"y": 1}},
            "mid": [{"k": "v"}],
            "name": "vm-1"
        });
        let first = flat(input.clone());
        let second = flat(input);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_list_yields_empty_string() {
        assert_eq!(flat(json!({"ids": []})), expected(&[("ids", "")]));
    }

    #[test]
    fn normalize_param_value_handles_transport_shapes() {
        assert_eq!(normalize_param_value(&json!(["a", 1, true])), json!("a,1,true"));
        assert_eq!(
            normalize_param_value(&json!({"cpu": 2, "ram": "4G"})),
            json!("cpu=2;ram=4G")
        );
        assert_eq!(normalize_param_value(&json!(false)), json!("false"));
        assert_eq!(normalize_param_value(&json!(12)), json!(12));
        assert_eq!(
            normalize_param_value(&json!([{"size": 1}])),
            json!([{"size": 1}])
        );
    }

    #[test]
    fn sanitize_replaces_disallowed_chars_and_truncates() {
        assert_eq!(sanitize_tool_name("mold_list VMs!"), "mold_list_VMs_");
        assert_eq!(sanitize_tool_name("ns.dé-ploy"), "ns_d_-ploy");
        let long = format!("mold_{}", "x".repeat(100));
        let sanitized = sanitize_tool_name(&long);
        assert_eq!(sanitized.len(), 64);
        assert_eq!(sanitized, sanitize_tool_name(&long));
        assert!(sanitized.starts_with("mold_xxx"));
    }
}
