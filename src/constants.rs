pub mod network {
    pub const TIMEOUT_API_REQUEST_MS: u64 = 30_000;
    /// Error bodies are cut to this size in logs only.
    pub const MAX_LOGGED_BODY_BYTES: usize = 16 * 1024;
}

pub mod platform {
    pub const RESPONSE_FORMAT: &str = "json";
    pub const LIST_METHODS_COMMAND: &str = "listApis";
    pub const JOB_STATUS_COMMAND: &str = "queryAsyncJobResult";
    pub const JOB_ID_PARAM: &str = "jobid";
    pub const DEFAULT_API_KEY_FIELD: &str = "apiKey";
}

pub mod jobs {
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
    pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
    pub const STATUS_SUCCEEDED: i64 = 1;
    pub const STATUS_FAILED: i64 = 2;
}

pub mod tools {
    pub const DEFAULT_NAMESPACE: &str = "mold_";
    pub const MAX_TOOL_NAME_LEN: usize = 64;
    pub const WAIT_PARAM: &str = "_wait";
    pub const TIMEOUT_PARAM: &str = "_timeoutMs";
    pub const INTERVAL_PARAM: &str = "_intervalMs";
    pub const CONTROL_PARAMS: &[&str] = &[WAIT_PARAM, TIMEOUT_PARAM, INTERVAL_PARAM];
}

pub mod server {
    pub const PROTOCOL_VERSION: &str = "2025-06-18";
    pub const SERVER_NAME: &str = "mold-mcp";
    pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
}
