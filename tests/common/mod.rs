#![allow(dead_code)]

use async_trait::async_trait;
use mold_mcp::app::App;
use mold_mcp::errors::MoldError;
use mold_mcp::services::client::{HttpResponse, HttpTransport};
use mold_mcp::services::config::{ConfigService, Credentials, SigningAlgorithm};
use mold_mcp::services::logger::{LogLevel, Logger};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use url::Url;

pub static ENV_LOCK: Lazy<tokio::sync::Mutex<()>> = Lazy::new(|| tokio::sync::Mutex::new(()));

pub const ENDPOINT: &str = "https://mold.test/client/api";

pub fn credentials() -> Credentials {
    Credentials::new(ENDPOINT, "test-api-key", "test-secret", SigningAlgorithm::Sha1)
}

pub fn quiet_logger() -> Logger {
    Logger::new("test").with_level(LogLevel::Error)
}

/// Replays queued responses in order; once the queue is drained the last
/// response repeats. Every requested URL is recorded.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    last: Mutex<Option<HttpResponse>>,
    urls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, body: Value) {
        self.push(200, body.to_string());
    }

    pub fn push(&self, status: u16, body: impl Into<String>) {
        self.responses.lock().unwrap().push_back(HttpResponse {
            status,
            body: body.into(),
        });
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.urls()
            .iter()
            .filter_map(|raw| query_param(raw, "command"))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, MoldError> {
        self.urls.lock().unwrap().push(url.to_string());
        let next = self.responses.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(response) = next {
            *last = Some(response);
        }
        last.clone().ok_or_else(|| MoldError::Transport {
            message: "no scripted response".to_string(),
            timed_out: false,
        })
    }
}

pub fn query_param(raw: &str, key: &str) -> Option<String> {
    Url::parse(raw)
        .ok()?
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

pub struct TestApp {
    pub app: Arc<App>,
    pub transport: Arc<ScriptedTransport>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_credentials(credentials())
    }

    pub fn with_credentials(creds: Credentials) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path: PathBuf = dir.path().join("mold-config.json");
        let logger = quiet_logger();
        let config = Arc::new(ConfigService::with_path(logger.clone(), path, creds));
        let transport = ScriptedTransport::new();
        let app = App::with_parts(logger, config, transport.clone()).expect("app wiring");
        Self {
            app: Arc::new(app),
            transport,
            _dir: dir,
        }
    }
}

pub fn list_apis_payload() -> Value {
    serde_json::json!({
        "listapisresponse": {
            "count": 4,
            "api": [
                {
                    "name": "listZones",
                    "description": "Lists zones",
                    "isasync": false,
                    "params": [{"name": "available", "type": "boolean", "required": false}]
                },
                {
                    "name": "deployVirtualMachine",
                    "description": "Creates and deploys a VM",
                    "isasync": true,
                    "params": [
                        {"name": "zoneid", "type": "uuid", "required": true},
                        {"name": "details", "type": "map", "required": false}
                    ]
                },
                {
                    "name": "listHosts",
                    "isasync": false,
                    "params": []
                },
                {
                    "name": "destroyVirtualMachine",
                    "isasync": "true",
                    "params": [{"name": "id", "type": "uuid", "required": true}]
                }
            ]
        }
    })
}
