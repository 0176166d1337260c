//! Row sink trait and multi-writer fan-out

use async_trait::async_trait;
use llmtap_core::CallRow;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Writer not initialized")]
    NotInitialized,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("All {0} writers failed")]
    AllWritersFailed(usize),
}

pub type WriterResult<T> = Result<T, WriterError>;

/// Append-only destination for call rows.
///
/// Implementations serialize their physical writes internally, so `save` may
/// be called concurrently for different calls.
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Persist one finalized row
    async fn save(&self, row: &CallRow) -> WriterResult<()>;

    /// Flush any pending writes
    async fn flush(&self) -> WriterResult<()> {
        Ok(())
    }

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Fans each row out to several sinks in parallel
pub struct MultiWriter {
    writers: Vec<Arc<dyn RowSink>>,
}

impl MultiWriter {
    pub fn new(writers: Vec<Arc<dyn RowSink>>) -> Self {
        Self { writers }
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }
}

#[async_trait]
impl RowSink for MultiWriter {
    /// Succeeds when at least one writer accepted the row; individual
    /// failures are logged.
    async fn save(&self, row: &CallRow) -> WriterResult<()> {
        if self.writers.is_empty() {
            return Ok(());
        }

        let results =
            futures::future::join_all(self.writers.iter().map(|writer| writer.save(row))).await;

        let mut failures = 0;
        for (writer, result) in self.writers.iter().zip(results) {
            if let Err(e) = result {
                failures += 1;
                tracing::error!(
                    writer = writer.name(),
                    call_id = %row.id,
                    error = %e,
                    "Failed to write call row"
                );
            }
        }

        if failures == self.writers.len() {
            return Err(WriterError::AllWritersFailed(failures));
        }
        Ok(())
    }

    async fn flush(&self) -> WriterResult<()> {
        let results = futures::future::join_all(self.writers.iter().map(|w| w.flush())).await;
        for (writer, result) in self.writers.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(writer = writer.name(), error = %e, "Failed to flush writer");
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "multi"
    }
}

/// Builder for [`MultiWriter`]
#[derive(Default)]
pub struct MultiWriterBuilder {
    writers: Vec<Arc<dyn RowSink>>,
}

impl MultiWriterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_writer(mut self, writer: Arc<dyn RowSink>) -> Self {
        self.writers.push(writer);
        self
    }

    pub fn build(self) -> MultiWriter {
        MultiWriter::new(self.writers)
    }
}
