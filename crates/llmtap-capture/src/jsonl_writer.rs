//! JSONL call row writer

use crate::writer::{RowSink, WriterResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use llmtap_core::CallRow;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends one JSON line per row to a daily file, `calls-YYYY-MM-DD.jsonl`,
/// dated by the call's start timestamp
pub struct JsonlWriter {
    directory: PathBuf,
    /// Serializes appends so concurrent saves never interleave lines
    write_lock: Mutex<()>,
}

impl JsonlWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Get the file that holds rows started at `timestamp`
    pub fn file_path(&self, timestamp: &DateTime<Utc>) -> PathBuf {
        self.directory
            .join(format!("calls-{}.jsonl", timestamp.format("%Y-%m-%d")))
    }
}

#[async_trait]
impl RowSink for JsonlWriter {
    async fn save(&self, row: &CallRow) -> WriterResult<()> {
        let json = serde_json::to_string(row)?;
        let path = self.file_path(&row.timestamp);

        let _guard = self.write_lock.lock().await;

        // Create directory if needed
        tokio::fs::create_dir_all(&self.directory).await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let mut line = json.into_bytes();
        line.push(b'\n');
        file.write_all(&line).await?;
        file.flush().await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
