//! llmtap Core Types and Traits
//!
//! This crate provides the fundamental types shared throughout llmtap:
//! - The optional field bag used to read provider payloads of unknown shape
//! - The model-invocation capability (client trait, call parameters, stream chunks)
//! - The flat call row persisted for every logical call
//! - Core error types

pub mod chunk;
pub mod error;
pub mod fields;
pub mod model;
pub mod row;

pub use chunk::StreamChunk;
pub use error::{Error, Result};
pub use fields::FieldBag;
pub use model::{CallParams, ChunkStream, ModelClient, ModelInfo, ModelResponse, StreamResult};
pub use row::{CallRow, ColumnValue, ErrorPayload, TokenUsage};
