//! llmtap Call Capture
//!
//! This crate records every model invocation as one flat call row:
//! - Field extraction and usage normalization from provider payloads
//! - Row building for one-shot calls and chunk aggregation for streams
//! - Interception middleware and a recording model wrapper
//! - Append-only sinks (SQLite, JSONL, in-memory) and their read side

pub mod aggregator;
pub mod builder;
pub mod config;
pub mod extract;
pub mod factory;
pub mod jsonl_writer;
pub mod memory_writer;
pub mod middleware;
pub mod query;
pub mod recording_model;
pub mod sqlite_writer;
pub mod usage;
pub mod writer;

pub use aggregator::StreamAggregator;
pub use builder::{CallStart, RowBuilder};
pub use config::{CaptureConfig, JsonlConfig, SqliteConfig};
pub use factory::build_sink;
pub use jsonl_writer::JsonlWriter;
pub use memory_writer::MemoryWriter;
pub use middleware::CaptureMiddleware;
pub use query::{CallAggregates, CallFilter, CallSummary, JsonColumn, SearchResults, StoredCall};
pub use recording_model::RecordingModel;
#[cfg(feature = "sqlite-writer")]
pub use sqlite_writer::SqliteWriter;
pub use usage::normalize_usage;
pub use writer::{MultiWriter, MultiWriterBuilder, RowSink, WriterError, WriterResult};
