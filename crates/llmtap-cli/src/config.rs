use llmtap_capture::config::{JsonlConfig, SqliteConfig, default_data_dir};
use llmtap_capture::CaptureConfig;
use llmtap_observability::{LogFormat, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub capture: CaptureConfig,
}

impl CliConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)?
        };

        Ok(config)
    }

    /// Load `path` if given, else `~/.llmtap/config.yaml` when it exists,
    /// else defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(expand(path)),
            None => {
                let default_path = default_data_dir().join("config.yaml");
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    fn merge_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Logging settings
        if let Some(val) = var("LLMTAP_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Some(val) = var("LLMTAP_LOG_FORMAT") {
            match val.to_lowercase().as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "pretty" => self.logging.format = LogFormat::Pretty,
                _ => eprintln!("Warning: Invalid LLMTAP_LOG_FORMAT '{}', using default", val),
            }
        }

        if let Some(val) = var("LLMTAP_LOG_SQL_QUERIES")
            && let Ok(enabled) = val.parse::<bool>()
        {
            self.logging.log_sql_queries = enabled;
        }

        // Capture settings
        if let Some(val) = var("LLMTAP_CAPTURE_ENABLED")
            && let Ok(enabled) = val.parse::<bool>()
        {
            self.capture.enabled = enabled;
        }

        if let Some(val) = var("LLMTAP_TAG_NAMESPACE") {
            self.capture.tag_namespace = val;
        }

        if let Some(val) = var("LLMTAP_DB_PATH") {
            self.capture
                .sqlite
                .get_or_insert_with(SqliteConfig::default)
                .path = PathBuf::from(val);
        }

        if let Some(val) = var("LLMTAP_JSONL_DIR") {
            self.capture
                .jsonl
                .get_or_insert_with(JsonlConfig::default)
                .directory = PathBuf::from(val);
        }
    }

    /// Expand `~` in every configured path
    pub fn expand_paths(&mut self) {
        if let Some(sqlite) = &mut self.capture.sqlite {
            sqlite.path = expand(&sqlite.path);
        }
        if let Some(jsonl) = &mut self.capture.jsonl {
            jsonl.directory = expand(&jsonl.directory);
        }
    }

    /// Database the inspection commands read from
    pub fn db_path(&self) -> PathBuf {
        self.capture
            .sqlite
            .as_ref()
            .map(|sqlite| sqlite.path.clone())
            .unwrap_or_else(|| SqliteConfig::default().path)
    }
}

pub fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())
}
