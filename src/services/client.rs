use crate::constants::network::{MAX_LOGGED_BODY_BYTES, TIMEOUT_API_REQUEST_MS};
use crate::errors::MoldError;
use crate::services::config::CredentialsProvider;
use crate::services::logger::Logger;
use crate::services::signer::{sign, sign_with, SignOptions};
use crate::utils::params::{flatten_params, FlatParams};
use crate::utils::redact::{mask_secret, redact_signed_url};
use crate::utils::text::preview;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Single HTTP GET. Implementations never retry.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<HttpResponse, MoldError>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(timeout_ms: u64) -> Result<Self, MoldError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| MoldError::Transport {
                message: format!("failed to build HTTP client: {}", err),
                timed_out: false,
            })?;
        Ok(Self { client })
    }

    /// Timeout from `MOLD_HTTP_TIMEOUT_MS`, falling back to the default.
    pub fn from_env() -> Result<Self, MoldError> {
        let timeout_ms = std::env::var("MOLD_HTTP_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(TIMEOUT_API_REQUEST_MS);
        Self::new(timeout_ms)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> MoldError {
    MoldError::Transport {
        timed_out: err.is_timeout(),
        // reqwest errors embed the URL, which carries the api key.
        message: redact_signed_url(&err.without_url().to_string()),
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, MoldError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;
        Ok(HttpResponse { status, body })
    }
}

/// Invoker: flatten, sign, GET, parse.
#[derive(Clone)]
pub struct MoldClient {
    logger: Logger,
    credentials: Arc<dyn CredentialsProvider>,
    transport: Arc<dyn HttpTransport>,
}

impl MoldClient {
    pub fn new(
        logger: Logger,
        credentials: Arc<dyn CredentialsProvider>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            logger: logger.child("client"),
            credentials,
            transport,
        }
    }

    pub async fn call(&self, command: &str, params: &Map<String, Value>) -> Result<Value, MoldError> {
        self.call_flat(command, &flatten_params(params)).await
    }

    pub async fn call_flat(&self, command: &str, params: &FlatParams) -> Result<Value, MoldError> {
        let credentials = self.credentials.credentials();
        let signed = sign(command, params, &credentials)?;
        let safe_url = redact_signed_url(&signed.final_url);

        self.logger.debug(
            "platform request",
            Some(&serde_json::json!({"command": command, "url": safe_url})),
        );
        let started = Instant::now();
        let response = self.transport.get(&signed.final_url).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        if !response.is_success() {
            self.logger.warn(
                "platform returned an error status",
                Some(&serde_json::json!({
                    "command": command,
                    "status": response.status,
                    "duration_ms": duration_ms,
                    "body": preview(&response.body, MAX_LOGGED_BODY_BYTES),
                })),
            );
            return Err(MoldError::ApiHttp {
                status: response.status,
                body: response.body,
                url: safe_url,
            });
        }

        self.logger.debug(
            "platform response",
            Some(&serde_json::json!({
                "command": command,
                "status": response.status,
                "duration_ms": duration_ms,
            })),
        );
        serde_json::from_str(&response.body).map_err(|err| {
            MoldError::InvalidResponse(format!(
                "{} (command {}, body {})",
                err,
                command,
                preview(&response.body, 256)
            ))
        })
    }

    /// Signing walkthrough for diagnosing rejected signatures. Nothing is sent.
    pub fn sign_debug(
        &self,
        command: &str,
        params: &FlatParams,
        options: &SignOptions,
    ) -> Result<Value, MoldError> {
        let credentials = self.credentials.credentials();
        let signed = sign_with(command, params, &credentials, options)?;
        let effective: Map<String, Value> = signed
            .effective_params
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        self.logger.debug(
            "signature debug requested",
            Some(&serde_json::json!({
                "command": command,
                "api_key": mask_secret(&credentials.api_key),
            })),
        );
        Ok(serde_json::json!({
            "endpoint": credentials.endpoint,
            "algo": credentials.algorithm,
            "apiKeyFieldUsed": options.api_key_field,
            "includeResponse": options.include_response,
            "canonicalString": signed.canonical_string,
            "signatureBase64": signed.signature_base64,
            "signatureEncoded": signed.signature_encoded,
            "finalUrl": signed.final_url,
            "effectiveParams": effective,
        }))
    }
}
