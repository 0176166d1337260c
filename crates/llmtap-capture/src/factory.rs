//! Sink factory
//!
//! Builds the row sink described by a [`CaptureConfig`].

use crate::config::CaptureConfig;
use crate::jsonl_writer::JsonlWriter;
use crate::writer::{MultiWriterBuilder, RowSink, WriterError, WriterResult};
use std::sync::Arc;

/// Create the sink for `config`.
///
/// Returns `None` when capture is disabled or no writer is enabled. A single
/// enabled writer is returned as is; several are wrapped in a
/// [`MultiWriter`](crate::writer::MultiWriter).
///
/// # Errors
/// - `WriterError::InvalidData` if the configuration fails validation
/// - `WriterError::Database` if the SQLite store cannot be opened
pub async fn build_sink(config: &CaptureConfig) -> WriterResult<Option<Arc<dyn RowSink>>> {
    config.validate().map_err(WriterError::InvalidData)?;

    let mut writers: Vec<Arc<dyn RowSink>> = Vec::new();

    if config.is_jsonl_enabled()
        && let Some(jsonl) = &config.jsonl
    {
        tracing::info!("Initializing JSONL call writer at {:?}", jsonl.directory);
        writers.push(Arc::new(JsonlWriter::new(&jsonl.directory)));
    }

    #[cfg(feature = "sqlite-writer")]
    if config.is_sqlite_enabled()
        && let Some(sqlite) = &config.sqlite
    {
        tracing::info!("Initializing SQLite call writer at {:?}", sqlite.path);
        let writer = crate::sqlite_writer::SqliteWriter::from_config(sqlite).await?;
        writers.push(Arc::new(writer));
    }

    #[cfg(not(feature = "sqlite-writer"))]
    if config.is_sqlite_enabled() {
        tracing::warn!("SQLite writer enabled in configuration but the sqlite-writer feature is off");
    }

    Ok(match writers.len() {
        0 => None,
        1 => writers.pop(),
        _ => {
            let multi = writers
                .into_iter()
                .fold(MultiWriterBuilder::new(), |builder, writer| {
                    builder.add_writer(writer)
                })
                .build();
            Some(Arc::new(multi))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{JsonlConfig, SqliteConfig};
    use chrono::Utc;
    use llmtap_core::CallRow;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_disabled_config_builds_no_sink() {
        let config = CaptureConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(build_sink(&config).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = CaptureConfig {
            tag_namespace: " ".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_sink(&config).await,
            Err(WriterError::InvalidData(_))
        ));
    }

    #[tokio::test]
    async fn test_jsonl_only() {
        let dir = tempdir().unwrap();
        let config = CaptureConfig {
            jsonl: Some(JsonlConfig {
                enabled: true,
                directory: dir.path().to_path_buf(),
            }),
            sqlite: None,
            ..Default::default()
        };

        let sink = build_sink(&config).await.unwrap().unwrap();
        assert_eq!(sink.name(), "jsonl");
    }

    #[tokio::test]
    #[cfg(feature = "sqlite-writer")]
    async fn test_jsonl_and_sqlite_fan_out() {
        let dir = tempdir().unwrap();
        let config = CaptureConfig {
            jsonl: Some(JsonlConfig {
                enabled: true,
                directory: dir.path().join("calls"),
            }),
            sqlite: Some(SqliteConfig {
                enabled: true,
                path: dir.path().join("calls.db"),
                max_connections: 2,
            }),
            ..Default::default()
        };

        let sink = build_sink(&config).await.unwrap().unwrap();
        assert_eq!(sink.name(), "multi");

        let row = CallRow::new("fan-out", Utc::now(), "gpt-4o");
        sink.save(&row).await.unwrap();

        let jsonl = JsonlWriter::new(dir.path().join("calls"));
        assert!(jsonl.file_path(&row.timestamp).exists());
        let sqlite = crate::sqlite_writer::SqliteWriter::new(&dir.path().join("calls.db"))
            .await
            .unwrap();
        assert!(sqlite.get_call("fan-out").await.unwrap().is_some());
    }
}
