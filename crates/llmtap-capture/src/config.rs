//! Capture configuration

use crate::extract::DEFAULT_TAG_NAMESPACE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Enable call capture
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// `providerOptions` namespace that carries per-call tags
    #[serde(default = "default_tag_namespace")]
    pub tag_namespace: String,

    /// Persist an "aborted" row for streams that end without a finish chunk
    #[serde(default)]
    pub persist_incomplete_streams: bool,

    /// JSONL writer configuration
    #[serde(default)]
    pub jsonl: Option<JsonlConfig>,

    /// SQLite writer configuration
    #[serde(default = "default_sqlite")]
    pub sqlite: Option<SqliteConfig>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tag_namespace: default_tag_namespace(),
            persist_incomplete_streams: false,
            jsonl: None,
            sqlite: default_sqlite(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonlConfig {
    /// Enable JSONL writer
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory for daily `calls-YYYY-MM-DD.jsonl` files
    #[serde(default = "default_jsonl_directory")]
    pub directory: PathBuf,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: default_jsonl_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Enable SQLite writer
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to SQLite database
    #[serde(default = "default_sqlite_path")]
    pub path: PathBuf,

    /// Maximum database connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_sqlite_path(),
            max_connections: default_max_connections(),
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_tag_namespace() -> String {
    DEFAULT_TAG_NAMESPACE.to_string()
}

fn default_sqlite() -> Option<SqliteConfig> {
    Some(SqliteConfig::default())
}

fn default_max_connections() -> u32 {
    5
}

fn default_sqlite_path() -> PathBuf {
    default_data_dir().join("calls.db")
}

fn default_jsonl_directory() -> PathBuf {
    default_data_dir().join("calls")
}

/// `~/.llmtap`, or `.llmtap` when no home directory is known
pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".llmtap"))
        .unwrap_or_else(|| PathBuf::from(".llmtap"))
}

impl CaptureConfig {
    /// Check if JSONL writer is enabled
    pub fn is_jsonl_enabled(&self) -> bool {
        self.enabled && self.jsonl.as_ref().is_some_and(|c| c.enabled)
    }

    /// Check if SQLite writer is enabled
    pub fn is_sqlite_enabled(&self) -> bool {
        self.enabled && self.sqlite.as_ref().is_some_and(|c| c.enabled)
    }

    /// Check if any writer is enabled
    pub fn has_writers(&self) -> bool {
        self.is_jsonl_enabled() || self.is_sqlite_enabled()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.tag_namespace.trim().is_empty() {
            return Err("tag_namespace must not be empty".to_string());
        }

        if let Some(sqlite) = &self.sqlite
            && sqlite.enabled
        {
            if sqlite.path.as_os_str().is_empty() {
                return Err("sqlite.path must not be empty".to_string());
            }
            if sqlite.max_connections == 0 {
                return Err("sqlite.max_connections must be at least 1".to_string());
            }
        }

        if let Some(jsonl) = &self.jsonl
            && jsonl.enabled
            && jsonl.directory.as_os_str().is_empty()
        {
            return Err("jsonl.directory must not be empty".to_string());
        }

        Ok(())
    }
}
