mod common;
use common::{credentials, quiet_logger, ENV_LOCK};

use mold_mcp::services::config::{
    ConfigPatch, ConfigService, Credentials, CredentialsProvider, SigningAlgorithm,
};
use std::path::PathBuf;

fn restore_env(key: &str, previous: Option<String>) {
    match previous {
        Some(value) => std::env::set_var(key, value),
        None => std::env::remove_var(key),
    }
}

fn service_at(path: PathBuf, initial: Credentials) -> ConfigService {
    ConfigService::with_path(quiet_logger(), path, initial)
}

#[tokio::test]
async fn update_persists_and_reloads() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("config.json");
    let service = service_at(path.clone(), Credentials::default());

    let view = service
        .update(
            &ConfigPatch {
                endpoint: Some(" https://mold.example/client/api ".to_string()),
                api_key: Some("ABCDEFGHIJKL".to_string()),
                secret: Some("s3cr3t".to_string()),
                algo: Some("SHA1".to_string()),
            },
            true,
        )
        .expect("update");
    assert_eq!(view.endpoint, "https://mold.example/client/api");
    assert_eq!(view.api_key, "ABCD***IJKL");
    assert!(view.has_secret);
    assert_eq!(view.algo, SigningAlgorithm::Sha1);

    let stored = std::fs::read_to_string(&path).expect("saved file");
    let stored: serde_json::Value = serde_json::from_str(&stored).expect("json");
    assert_eq!(stored["apiKey"], "ABCDEFGHIJKL");
    assert_eq!(stored["algo"], "sha1");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let reloaded = service_at(path, Credentials::default());
    assert_eq!(
        reloaded.credentials(),
        Credentials::new(
            "https://mold.example/client/api",
            "ABCDEFGHIJKL",
            "s3cr3t",
            SigningAlgorithm::Sha1
        )
    );
}

#[tokio::test]
async fn update_without_persist_leaves_disk_alone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    let service = service_at(path.clone(), credentials());
    service
        .update(
            &ConfigPatch {
                secret: Some("rotated".to_string()),
                ..Default::default()
            },
            false,
        )
        .expect("update");
    assert_eq!(service.credentials().secret_key, "rotated");
    assert_eq!(service.credentials().api_key, "test-api-key");
    assert!(!path.exists());
}

#[tokio::test]
async fn rejected_algorithm_changes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let service = service_at(dir.path().join("config.json"), credentials());
    let err = service
        .update(
            &ConfigPatch {
                endpoint: Some("https://elsewhere".to_string()),
                algo: Some("md5".to_string()),
                ..Default::default()
            },
            true,
        )
        .expect_err("bad algo");
    assert_eq!(err.code, "INVALID_PARAMS");
    assert_eq!(service.credentials(), credentials());
}

#[tokio::test]
async fn file_values_override_initial_values() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{"endpoint": "https://from-file/client/api", "algo": "bogus"}"#,
    )
    .expect("write");

    let service = service_at(path, credentials());
    let creds = service.credentials();
    assert_eq!(creds.endpoint, "https://from-file/client/api");
    assert_eq!(creds.api_key, "test-api-key");
    assert_eq!(creds.algorithm, SigningAlgorithm::Sha1);
}

#[tokio::test]
async fn corrupt_file_is_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").expect("write");
    let service = service_at(path, credentials());
    assert_eq!(service.credentials(), credentials());
}

#[tokio::test]
async fn environment_supplies_defaults() {
    let _guard = ENV_LOCK.lock().await;
    let keys = ["MOLD_ENDPOINT", "MOLD_API_KEY", "MOLD_SECRET_KEY", "MOLD_SIG_ALGO"];
    let previous: Vec<Option<String>> = keys.iter().map(|k| std::env::var(k).ok()).collect();

    std::env::set_var("MOLD_ENDPOINT", "https://env/client/api");
    std::env::set_var("MOLD_API_KEY", " env-key ");
    std::env::set_var("MOLD_SECRET_KEY", "env-secret");
    std::env::set_var("MOLD_SIG_ALGO", "sha1");
    let from_env = ConfigService::credentials_from_env();

    std::env::set_var("MOLD_SIG_ALGO", "whirlpool");
    let fallback_algo = ConfigService::credentials_from_env().algorithm;

    for (key, value) in keys.iter().zip(previous) {
        restore_env(key, value);
    }

    assert_eq!(from_env.endpoint, "https://env/client/api");
    assert_eq!(from_env.api_key, "env-key");
    assert_eq!(from_env.algorithm, SigningAlgorithm::Sha1);
    assert_eq!(fallback_algo, SigningAlgorithm::Sha256);
}
