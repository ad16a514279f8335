//! # tablestore-rs
//!
//! The batch-entity mutation core of a table-storage client: group multiple
//! entity operations addressed to one partition into a single atomic
//! request, track optimistic-concurrency tokens (ETags), and map service
//! responses back into typed per-operation results.
//!
//! ## Features
//!
//! - **Atomic batches**: insert, update (replace), merge, delete,
//!   insert-or-replace and insert-or-merge executed as one all-or-nothing
//!   transaction
//! - **Optimistic concurrency**: ETag preconditions per operation, `*`
//!   wildcard for unconditional mutations
//! - **Typed properties**: string, integer, boolean, floating point,
//!   timestamp, binary and explicit-null values with per-variant wire
//!   encoding
//! - **Early validation**: malformed table names and keys are rejected at
//!   construction/append time, before anything goes on the wire
//! - **Retry-safe serialization**: identical batches serialize to identical
//!   bytes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tablestore_rs::{Batch, ConfigBuilder, EntityValue, Properties, TableClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigBuilder::new()
//!         .endpoint("https://account.table.example.net/")
//!         .build()?;
//!     let client = TableClient::new(config)?;
//!
//!     let mut properties = Properties::new();
//!     properties.insert("Status".to_string(), EntityValue::from("active"));
//!
//!     let mut batch = Batch::new("mytable", "partition-1")?;
//!     batch
//!         .update("row-1", properties)?
//!         .delete("row-2", "*")?;
//!
//!     let etags = client.execute_batch(batch).await?;
//!     println!("new etag: {:?}", etags[0]);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod batch;
pub mod client;
pub mod config;
pub mod entity;
pub mod errors;
pub mod validation;

// Re-export main types
pub use batch::{Batch, Operation, OperationKind, SerializedBatch};
pub use client::{AnonymousSigner, RequestSigner, TableClient};
pub use config::{ClientConfig, ClientSettings, ConfigBuilder};
pub use entity::{Entity, EntityValue, Properties};
pub use errors::{Result, TableError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging with sensible defaults
pub fn init() {
    tracing_subscriber::fmt::init();
}
