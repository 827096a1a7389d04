//! Action logging for `bt` commands.
//!
//! Every CLI invocation is appended as one JSON line to the action log
//! (`<data dir>/action.log` unless the repository sets `action_log_path`).
//! Logging never fails a command: problems are reported through `tracing`.

use crate::storage::{Storage, data_root};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

const MAX_STRING_LEN: usize = 100;
const MAX_ARRAY_LEN: usize = 10;

/// Represents a single action log entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionLog {
    /// When the command finished
    pub timestamp: DateTime<Utc>,

    /// Repository the command ran against
    pub repo_path: String,

    /// Command name (e.g., "manager assign", "tester resolve")
    pub command: String,

    /// Canonical identity of the caller
    pub actor: String,

    /// Command arguments as JSON
    pub args: serde_json::Value,

    /// Whether the command succeeded
    pub success: bool,

    /// Stable error code if the command failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,

    /// Error message if the command failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Command execution duration in milliseconds
    pub duration_ms: u64,
}

/// Where and how to write the action log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionLogSettings {
    pub enabled: bool,
    pub sanitize: bool,
    pub path: PathBuf,
}

impl ActionLogSettings {
    /// Read settings from the repository's config table, falling back to defaults.
    ///
    /// Keys: `action_log_enabled`, `action_log_sanitize`, `action_log_path`.
    pub fn load(storage: Option<&Storage>) -> Self {
        let get = |key: &str| storage.and_then(|s| s.get_config(key).ok().flatten());

        let enabled = get("action_log_enabled").map(|v| parse_bool(&v)).unwrap_or(true);
        let sanitize = get("action_log_sanitize").map(|v| parse_bool(&v)).unwrap_or(true);
        let path = match get("action_log_path") {
            Some(custom) => expand_home(Path::new(&custom)),
            None => default_log_path(),
        };

        Self {
            enabled,
            sanitize,
            path,
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn default_log_path() -> PathBuf {
    match data_root() {
        Ok(root) => root.join("action.log"),
        Err(_) => PathBuf::from("action.log"),
    }
}

/// Expand ~ in path to home directory.
fn expand_home(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

/// Append an entry to the action log. Never fails.
pub fn log_action(settings: &ActionLogSettings, mut entry: ActionLog) {
    if !settings.enabled {
        return;
    }

    if settings.sanitize {
        entry.args = sanitize_args(&entry.args);
    }

    if let Err(e) = write_log_entry(&settings.path, &entry) {
        tracing::warn!(path = %settings.path.display(), error = %e, "failed to write action log");
    }
}

/// Write a log entry to the log file.
fn write_log_entry(path: &Path, entry: &ActionLog) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", json)?;

    Ok(())
}

fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_lowercase();
    ["password", "token", "secret", "api_key", "apikey"]
        .iter()
        .any(|word| key.contains(word))
}

/// A single whitespace-free token with a path separator.
fn looks_like_path(s: &str) -> bool {
    (s.contains('/') || s.contains('\\')) && !s.chars().any(char::is_whitespace)
}

/// Sanitize arguments to remove sensitive data.
///
/// Secret-looking keys are redacted, paths are reduced to their basename,
/// long strings are truncated and large arrays summarized.
pub fn sanitize_args(args: &serde_json::Value) -> serde_json::Value {
    match args {
        serde_json::Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                if is_sensitive_key(key) {
                    sanitized.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    sanitized.insert(key.clone(), sanitize_args(value));
                }
            }
            serde_json::Value::Object(sanitized)
        }
        serde_json::Value::Array(arr) => {
            if arr.len() > MAX_ARRAY_LEN {
                serde_json::Value::String(format!("[Array with {} items]", arr.len()))
            } else {
                serde_json::Value::Array(arr.iter().map(sanitize_args).collect())
            }
        }
        serde_json::Value::String(s) => {
            let sanitized = if looks_like_path(s) {
                s.rsplit(['/', '\\']).next().unwrap_or(s.as_str())
            } else {
                s.as_str()
            };

            let char_count = sanitized.chars().count();
            if char_count > MAX_STRING_LEN {
                let head: String = sanitized.chars().take(MAX_STRING_LEN - 3).collect();
                serde_json::Value::String(format!("{}... ({} chars)", head, char_count))
            } else {
                serde_json::Value::String(sanitized.to_string())
            }
        }
        _ => args.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;

    fn entry(args: serde_json::Value) -> ActionLog {
        ActionLog {
            timestamp: Utc::now(),
            repo_path: "/tmp/repo".to_string(),
            command: "manager assign".to_string(),
            actor: "mona".to_string(),
            args,
            success: true,
            error_code: None,
            error: None,
            duration_ms: 3,
        }
    }

    #[test]
    fn test_sanitize_file_path() {
        let value = serde_json::json!("/very/long/path/to/shot.png");
        assert_eq!(sanitize_args(&value), serde_json::json!("shot.png"));

        let value = serde_json::json!("C:\\Users\\test\\shot.png");
        assert_eq!(sanitize_args(&value), serde_json::json!("shot.png"));
    }

    #[test]
    fn test_sanitize_keeps_prose_with_slashes() {
        let value = serde_json::json!("crashes on /login and/or /signup");
        assert_eq!(sanitize_args(&value), value);
    }

    #[test]
    fn test_sanitize_long_string() {
        let value = serde_json::json!("é".repeat(150));
        let sanitized = sanitize_args(&value);
        let s = sanitized.as_str().unwrap();
        assert!(s.ends_with("... (150 chars)"));
        assert_eq!(s.chars().take_while(|c| *c == 'é').count(), 97);
    }

    #[test]
    fn test_sanitize_sensitive_keys() {
        let value = serde_json::json!({
            "assignee": "dave",
            "password": "secret123",
            "api_token": "abc123",
            "key": "action_log_path",
            "title": "Login crash"
        });
        let sanitized = sanitize_args(&value);

        assert_eq!(sanitized["assignee"], "dave");
        assert_eq!(sanitized["password"], "[REDACTED]");
        assert_eq!(sanitized["api_token"], "[REDACTED]");
        assert_eq!(sanitized["key"], "action_log_path");
        assert_eq!(sanitized["title"], "Login crash");
    }

    #[test]
    fn test_sanitize_arrays() {
        let ids: Vec<String> = (0..15).map(|i| format!("bug-{:08x}", i)).collect();
        assert_eq!(
            sanitize_args(&serde_json::json!(ids)),
            serde_json::json!("[Array with 15 items]")
        );
        let small = serde_json::json!(["bug-00000001", "bug-00000002"]);
        assert_eq!(sanitize_args(&small), small);
    }

    #[test]
    fn test_settings_from_config_table() {
        let env = TestEnv::new();
        let mut storage = env.init_storage();
        let log_path = env.data_path().join("custom.log");
        storage
            .set_config("action_log_path", log_path.to_str().unwrap())
            .unwrap();
        storage.set_config("action_log_sanitize", "no").unwrap();

        let settings = ActionLogSettings::load(Some(&storage));
        assert!(settings.enabled);
        assert!(!settings.sanitize);
        assert_eq!(settings.path, log_path);
    }

    #[test]
    fn test_log_action_appends_lines() {
        let env = TestEnv::new();
        let settings = ActionLogSettings {
            enabled: true,
            sanitize: true,
            path: env.data_path().join("logs").join("action.log"),
        };

        log_action(&settings, entry(serde_json::json!({"screenshot": "/a/b/c.png"})));
        log_action(&settings, entry(serde_json::json!({})));

        let content = fs::read_to_string(&settings.path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: ActionLog = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.command, "manager assign");
        assert_eq!(first.args["screenshot"], "c.png");
    }

    #[test]
    fn test_disabled_log_writes_nothing() {
        let env = TestEnv::new();
        let settings = ActionLogSettings {
            enabled: false,
            sanitize: true,
            path: env.data_path().join("action.log"),
        };
        log_action(&settings, entry(serde_json::json!({})));
        assert!(!settings.path.exists());
    }
}
