use crate::errors::MoldError;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidParams,
    Denied,
    NotFound,
    Conflict,
    Timeout,
    Retryable,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            details: None,
            retryable: matches!(kind, ToolErrorKind::Timeout | ToolErrorKind::Retryable),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidParams, "INVALID_PARAMS", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, "INTERNAL", message)
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ToolError {}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::internal(err.to_string())
    }
}

impl From<MoldError> for ToolError {
    fn from(err: MoldError) -> Self {
        let code = err.code();
        let message = err.to_string();
        match err {
            MoldError::Configuration(_) => {
                ToolError::new(ToolErrorKind::InvalidParams, code, message)
                    .with_hint("Set endpoint/apiKey/secret with mold_setConfig (or MOLD_ENDPOINT, MOLD_API_KEY, MOLD_SECRET_KEY).")
            }
            MoldError::ApiHttp { status, body, url } => {
                let kind = match status {
                    401 | 403 => ToolErrorKind::Denied,
                    404 => ToolErrorKind::NotFound,
                    400..=499 => ToolErrorKind::InvalidParams,
                    _ => ToolErrorKind::Internal,
                };
                let mut error = ToolError::new(kind, code, message).with_details(
                    serde_json::json!({"status": status, "body": body, "url": url}),
                );
                if status == 401 {
                    error = error.with_hint(
                        "Signature or credentials rejected; inspect the request with mold_signDebug.",
                    );
                }
                error
            }
            MoldError::Discovery(_) | MoldError::InvalidResponse(_) => {
                ToolError::new(ToolErrorKind::Internal, code, message)
            }
            MoldError::JobTimeout { job_id, timeout_ms } => {
                ToolError::new(ToolErrorKind::Timeout, code, message)
                    .with_hint(format!(
                        "The job may still finish; poll again with mold_waitForJob {{ jobid: \"{}\" }}.",
                        job_id
                    ))
                    .with_details(serde_json::json!({"job_id": job_id, "timeout_ms": timeout_ms}))
            }
            MoldError::JobCanceled { job_id } => {
                ToolError::new(ToolErrorKind::Conflict, code, message)
                    .with_details(serde_json::json!({"job_id": job_id}))
            }
            MoldError::Transport { timed_out, .. } => {
                let kind = if timed_out {
                    ToolErrorKind::Timeout
                } else {
                    ToolErrorKind::Retryable
                };
                ToolError::new(kind, code, message)
            }
            MoldError::InvalidParams(_) => {
                ToolError::new(ToolErrorKind::InvalidParams, code, message)
            }
        }
    }
}
