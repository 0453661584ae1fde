use crate::errors::{MoldError, ToolError};
use crate::services::logger::Logger;
use crate::utils::fs_atomic::atomic_write_text_file;
use crate::utils::paths::resolve_config_path;
use crate::utils::redact::mask_secret;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::RwLock;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningAlgorithm {
    Sha1,
    #[default]
    Sha256,
}

impl SigningAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            SigningAlgorithm::Sha1 => "sha1",
            SigningAlgorithm::Sha256 => "sha256",
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = MoldError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "sha1" => Ok(SigningAlgorithm::Sha1),
            "sha256" => Ok(SigningAlgorithm::Sha256),
            other => Err(MoldError::InvalidParams(format!(
                "unsupported signing algorithm '{}', expected sha1 or sha256",
                other
            ))),
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection settings read once per platform call.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub endpoint: String,
    pub api_key: String,
    pub secret_key: String,
    pub algorithm: SigningAlgorithm,
}

impl Credentials {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        algorithm: SigningAlgorithm,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            algorithm,
        }
    }

    pub fn ensure_complete(&self) -> Result<(), MoldError> {
        let missing: Vec<&str> = [
            ("endpoint", &self.endpoint),
            ("apiKey", &self.api_key),
            ("secret", &self.secret_key),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(MoldError::Configuration(format!(
            "missing {}",
            missing.join(", ")
        )))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("endpoint", &self.endpoint)
            .field("api_key", &mask_secret(&self.api_key))
            .field("secret_key", &"***")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}

/// Source of credentials for the request core. Implementations hand out a
/// snapshot; callers never hold a lock across a platform call.
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self) -> Credentials;
}

impl CredentialsProvider for Credentials {
    fn credentials(&self) -> Credentials {
        self.clone()
    }
}

/// On-disk shape, also accepted by `mold_setConfig`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedConfig {
    pub endpoint: String,
    pub api_key: String,
    pub has_secret: bool,
    pub algo: SigningAlgorithm,
    pub config_file: PathBuf,
}

pub struct ConfigService {
    logger: Logger,
    file_path: PathBuf,
    current: RwLock<Credentials>,
}

impl ConfigService {
    /// Environment first, then the config file on top of it.
    pub fn new(logger: Logger) -> Self {
        Self::with_path(logger, resolve_config_path(), Self::credentials_from_env())
    }

    pub fn with_path(logger: Logger, file_path: PathBuf, initial: Credentials) -> Self {
        let service = Self {
            logger: logger.child("config"),
            file_path,
            current: RwLock::new(initial),
        };
        service.load_from_disk();
        service
    }

    pub fn credentials_from_env() -> Credentials {
        let read = |key: &str| std::env::var(key).unwrap_or_default().trim().to_string();
        let algorithm = std::env::var("MOLD_SIG_ALGO")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default();
        Credentials::new(
            read("MOLD_ENDPOINT"),
            read("MOLD_API_KEY"),
            read("MOLD_SECRET_KEY"),
            algorithm,
        )
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    fn load_from_disk(&self) {
        let raw = match std::fs::read_to_string(&self.file_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
            Err(err) => {
                self.logger.warn(
                    "config file unreadable, ignoring",
                    Some(&serde_json::json!({"path": self.file_path, "error": err.to_string()})),
                );
                return;
            }
        };
        let patch: ConfigPatch = match serde_json::from_str(&raw) {
            Ok(patch) => patch,
            Err(err) => {
                self.logger.warn(
                    "config file is not valid JSON, ignoring",
                    Some(&serde_json::json!({"path": self.file_path, "error": err.to_string()})),
                );
                return;
            }
        };
        let patch = self.drop_invalid_fields(patch);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        if let Err(err) = apply_patch(&mut guard, &patch) {
            self.logger.warn(
                "config file rejected",
                Some(&serde_json::json!({"path": self.file_path, "error": err.to_string()})),
            );
        }
    }

    /// Invalid fields in the file keep their previous value; the rest still apply.
    fn drop_invalid_fields(&self, mut patch: ConfigPatch) -> ConfigPatch {
        if let Some(Err(err)) = patch.algo.as_deref().map(str::parse::<SigningAlgorithm>) {
            self.logger.warn(
                "config file has an invalid algorithm, keeping previous value",
                Some(&serde_json::json!({"error": err.to_string()})),
            );
            patch.algo = None;
        }
        if let Some(Err(err)) = patch.endpoint.as_deref().map(validate_endpoint) {
            self.logger.warn(
                "config file has an invalid endpoint, keeping previous value",
                Some(&serde_json::json!({"error": err.to_string()})),
            );
            patch.endpoint = None;
        }
        patch
    }

    fn persist(&self, snapshot: &Credentials) -> Result<(), ToolError> {
        let stored = ConfigPatch {
            endpoint: Some(snapshot.endpoint.clone()),
            api_key: Some(snapshot.api_key.clone()),
            secret: Some(snapshot.secret_key.clone()),
            algo: Some(snapshot.algorithm.as_str().to_string()),
        };
        let data = serde_json::to_string_pretty(&stored)
            .map_err(|err| ToolError::internal(format!("Failed to serialize config: {}", err)))?;
        atomic_write_text_file(&self.file_path, &format!("{}\n", data), 0o600).map_err(|err| {
            ToolError::internal(format!("Failed to save config: {}", err))
                .with_details(serde_json::json!({"path": self.file_path}))
        })
    }

    /// Merges the provided fields; blank strings are kept (they clear a value).
    pub fn update(&self, patch: &ConfigPatch, persist: bool) -> Result<RedactedConfig, ToolError> {
        let snapshot = {
            let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
            let mut next = guard.clone();
            apply_patch(&mut next, patch)?;
            *guard = next.clone();
            next
        };
        if persist {
            self.persist(&snapshot)?;
        }
        self.logger.info(
            "connection settings updated",
            Some(&serde_json::json!({
                "endpoint": snapshot.endpoint,
                "algo": snapshot.algorithm,
                "persisted": persist,
            })),
        );
        Ok(self.redacted())
    }

    pub fn redacted(&self) -> RedactedConfig {
        let snapshot = self.credentials();
        RedactedConfig {
            endpoint: snapshot.endpoint,
            api_key: mask_secret(&snapshot.api_key),
            has_secret: !snapshot.secret_key.is_empty(),
            algo: snapshot.algorithm,
            config_file: self.file_path.clone(),
        }
    }
}

impl CredentialsProvider for ConfigService {
    fn credentials(&self) -> Credentials {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

/// Blank clears the endpoint; anything else must be an absolute http(s) URL.
fn validate_endpoint(raw: &str) -> Result<(), MoldError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    let parsed = Url::parse(trimmed)
        .map_err(|err| MoldError::InvalidParams(format!("endpoint is not a valid URL: {}", err)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(MoldError::InvalidParams(format!(
            "endpoint must use http or https, got '{}'",
            other
        ))),
    }
}

fn apply_patch(target: &mut Credentials, patch: &ConfigPatch) -> Result<(), MoldError> {
    let algorithm = match patch.algo.as_deref() {
        Some(raw) => Some(raw.parse::<SigningAlgorithm>()?),
        None => None,
    };
    if let Some(endpoint) = patch.endpoint.as_deref() {
        validate_endpoint(endpoint)?;
    }
    if let Some(endpoint) = &patch.endpoint {
        target.endpoint = endpoint.trim().to_string();
    }
    if let Some(api_key) = &patch.api_key {
        target.api_key = api_key.trim().to_string();
    }
    if let Some(secret) = &patch.secret {
        target.secret_key = secret.trim().to_string();
    }
    if let Some(algorithm) = algorithm {
        target.algorithm = algorithm;
    }
    Ok(())
}
