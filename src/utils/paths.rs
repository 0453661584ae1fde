use std::env;
use std::path::PathBuf;

const CONFIG_DIR_NAME: &str = "mcp-mold";
const CONFIG_FILE_NAME: &str = "config.json";

fn normalize_env_path(value: Option<String>) -> Option<PathBuf> {
    let raw = value?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    if lowered == "undefined" || lowered == "null" {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

fn resolve_xdg_config_dir() -> Option<PathBuf> {
    if let Some(path) = normalize_env_path(env::var("XDG_CONFIG_HOME").ok()) {
        return Some(path);
    }
    env::var("HOME")
        .ok()
        .map(|home| PathBuf::from(home).join(".config"))
}

pub fn resolve_config_dir() -> PathBuf {
    resolve_xdg_config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(CONFIG_DIR_NAME))
}

/// `MOLD_CONFIG_PATH` wins, then `$XDG_CONFIG_HOME/mcp-mold/config.json`,
/// then `~/.config/mcp-mold/config.json`.
pub fn resolve_config_path() -> PathBuf {
    if let Some(path) = normalize_env_path(env::var("MOLD_CONFIG_PATH").ok()) {
        return path;
    }
    resolve_config_dir().join(CONFIG_FILE_NAME)
}
