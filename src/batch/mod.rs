//! Atomic batch mutations
//!
//! This module provides batch construction (one partition, ordered
//! operations), deterministic wire serialization, and response
//! demultiplexing back into per-operation results.

mod builder;
mod response;
mod serializer;
mod types;

// Re-export all public types
pub use builder::Batch;
pub use response::parse_batch_response;
pub use serializer::{SerializedBatch, serialize_batch};
pub use types::{Operation, OperationKind};
