//! In-process row sink

use crate::writer::{RowSink, WriterResult};
use async_trait::async_trait;
use llmtap_core::CallRow;
use tokio::sync::Mutex;

/// Keeps every saved row in memory, in save order
#[derive(Debug, Default)]
pub struct MemoryWriter {
    rows: Mutex<Vec<CallRow>>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the rows saved so far
    pub async fn rows(&self) -> Vec<CallRow> {
        self.rows.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    /// Remove and return all saved rows
    pub async fn take(&self) -> Vec<CallRow> {
        std::mem::take(&mut *self.rows.lock().await)
    }
}

#[async_trait]
impl RowSink for MemoryWriter {
    async fn save(&self, row: &CallRow) -> WriterResult<()> {
        self.rows.lock().await.push(row.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
