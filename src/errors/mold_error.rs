use thiserror::Error;

/// Failures raised by the request-construction core.
#[derive(Debug, Error)]
pub enum MoldError {
    #[error("connection settings are incomplete: {0}")]
    Configuration(String),

    #[error("HTTP {status} from platform: {body}")]
    ApiHttp {
        status: u16,
        body: String,
        /// Requested URL with credentials masked.
        url: String,
    },

    #[error("could not parse method listing: {0}")]
    Discovery(String),

    #[error("timeout waiting for job {job_id} after {timeout_ms}ms")]
    JobTimeout { job_id: String, timeout_ms: u64 },

    #[error("wait for job {job_id} was canceled")]
    JobCanceled { job_id: String },

    #[error("transport failure: {message}")]
    Transport { message: String, timed_out: bool },

    #[error("platform returned an unreadable response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    InvalidParams(String),
}

impl MoldError {
    pub fn code(&self) -> &'static str {
        match self {
            MoldError::Configuration(_) => "CONFIGURATION",
            MoldError::ApiHttp { .. } => "API_HTTP",
            MoldError::Discovery(_) => "DISCOVERY",
            MoldError::JobTimeout { .. } => "JOB_TIMEOUT",
            MoldError::JobCanceled { .. } => "JOB_WAIT_CANCELED",
            MoldError::Transport { .. } => "TRANSPORT",
            MoldError::InvalidResponse(_) => "INVALID_RESPONSE",
            MoldError::InvalidParams(_) => "INVALID_PARAMS",
        }
    }
}
