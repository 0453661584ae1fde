use serde_json::Value;

const JOB_ID_KEYS: &[&str] = &["jobid", "jobId"];

fn job_id_in(obj: &serde_json::Map<String, Value>) -> Option<String> {
    if obj.contains_key("jobstatus") {
        return None;
    }
    JOB_ID_KEYS
        .iter()
        .find_map(|key| obj.get(*key))
        .and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Job id of an async command that was started but not waited for. Looks at
/// the payload and one level of `<command>response` envelope.
fn pending_job_id(result: &Value) -> Option<String> {
    let obj = result.as_object()?;
    job_id_in(obj).or_else(|| {
        obj.iter()
            .filter(|(key, _)| key.ends_with("response"))
            .filter_map(|(_, value)| value.as_object())
            .find_map(job_id_in)
    })
}

fn build_job_next_actions(job_id: Option<&str>) -> Vec<Value> {
    let Some(job_id) = job_id else {
        return Vec::new();
    };
    vec![serde_json::json!({
        "tool": "mold_waitForJob",
        "args": {"jobid": job_id},
    })]
}

pub fn build_generic_envelope(tool_name: &str, tool_result: &Value, meta: Option<&Value>) -> Value {
    let duration_ms = meta
        .and_then(|m| m.get("duration_ms").and_then(|v| v.as_i64()))
        .unwrap_or(0);
    let trace = serde_json::json!({
        "trace_id": meta.and_then(|m| m.get("trace_id")).cloned().unwrap_or(Value::Null),
    });
    let mut envelope = serde_json::json!({
        "success": true,
        "tool": tool_name,
        "result": tool_result,
        "duration_ms": duration_ms,
        "trace": trace,
    });
    let next_actions = build_job_next_actions(pending_job_id(tool_result).as_deref());
    if !next_actions.is_empty() {
        if let Some(obj) = envelope.as_object_mut() {
            obj.insert("next_actions".to_string(), Value::Array(next_actions));
        }
    }
    envelope
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn started_jobs_suggest_a_wait() {
        let result = json!({"stopvirtualmachineresponse": {"jobid": "j-9"}});
        let envelope = build_generic_envelope(
            "mold_stopVirtualMachine",
            &result,
            Some(&json!({"duration_ms": 12, "trace_id": "t"})),
        );
        assert_eq!(envelope["duration_ms"], 12);
        assert_eq!(envelope["trace"]["trace_id"], "t");
        assert_eq!(envelope["result"], result);
        assert_eq!(envelope["next_actions"][0]["args"]["jobid"], "j-9");
    }

    #[test]
    fn finished_jobs_have_no_next_actions() {
        let result = json!({"queryasyncjobresultresponse": {"jobid": "j-9", "jobstatus": 1}});
        let envelope = build_generic_envelope("mold_waitForJob", &result, None);
        assert!(envelope.get("next_actions").is_none());
        assert_eq!(envelope["duration_ms"], 0);
    }
}
