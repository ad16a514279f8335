//! Batch accumulation
//!
//! A [`Batch`] collects operations scoped to one table and one partition key.
//! Appends validate their arguments immediately so misuse surfaces where it
//! happens, not at execute time; nothing touches the network until the batch
//! is handed to the executor.

use crate::batch::types::{Operation, OperationKind};
use crate::entity::{EntityValue, Properties};
use crate::errors::{Result, TableError};
use crate::validation::{is_valid_key, is_valid_table_name};

/// An ordered set of mutations executed as one atomic server-side
/// transaction.
///
/// Append order is significant: it is the in-transaction execution order and
/// the order responses are correlated against. A batch is single-use; the
/// executor consumes it by value.
#[derive(Debug, Clone)]
pub struct Batch {
    table: String,
    partition_key: String,
    operations: Vec<Operation>,
}

impl Batch {
    /// Create an empty batch scoped to one table and partition.
    ///
    /// Fails with [`TableError::InvalidArgument`] if the table name or the
    /// partition key is empty or syntactically invalid.
    pub fn new(table_name: &str, partition_key: &str) -> Result<Self> {
        if !is_valid_table_name(table_name) {
            return Err(TableError::InvalidArgument(format!(
                "invalid table name: {:?}",
                table_name
            )));
        }
        if !is_valid_key(partition_key) {
            return Err(TableError::InvalidArgument(format!(
                "invalid partition key: {:?}",
                partition_key
            )));
        }
        Ok(Self {
            table: table_name.to_string(),
            partition_key: partition_key.to_string(),
            operations: Vec::new(),
        })
    }

    /// Owning table name
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Partition key shared by every operation in this batch
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Accumulated operations, in append order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Number of accumulated operations
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether no operations have been appended yet
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Append an insert; the transaction fails if the row already exists
    pub fn insert(&mut self, row_key: &str, properties: Properties) -> Result<&mut Self> {
        self.push(OperationKind::Insert, row_key, Some(properties), None)
    }

    /// Append an unconditional full replace of an existing entity.
    ///
    /// Properties of the stored entity that are absent from `properties` are
    /// deleted server-side; an explicitly [`EntityValue::Null`] property is
    /// stored as a null-valued property, not deleted.
    pub fn update(&mut self, row_key: &str, properties: Properties) -> Result<&mut Self> {
        self.push(OperationKind::UpdateReplace, row_key, Some(properties), None)
    }

    /// Append a full replace guarded by an ETag precondition
    pub fn update_if_match(
        &mut self,
        row_key: &str,
        properties: Properties,
        etag: &str,
    ) -> Result<&mut Self> {
        let etag = Self::require_etag(etag)?;
        self.push(
            OperationKind::UpdateReplace,
            row_key,
            Some(properties),
            Some(etag),
        )
    }

    /// Append an unconditional partial update of an existing entity.
    ///
    /// Only the supplied properties are added or overwritten; the rest of the
    /// stored entity is left untouched. A [`EntityValue::Null`] value sets
    /// that property to null.
    pub fn merge(&mut self, row_key: &str, properties: Properties) -> Result<&mut Self> {
        self.push(OperationKind::UpdateMerge, row_key, Some(properties), None)
    }

    /// Append a partial update guarded by an ETag precondition
    pub fn merge_if_match(
        &mut self,
        row_key: &str,
        properties: Properties,
        etag: &str,
    ) -> Result<&mut Self> {
        let etag = Self::require_etag(etag)?;
        self.push(
            OperationKind::UpdateMerge,
            row_key,
            Some(properties),
            Some(etag),
        )
    }

    /// Append a delete; pass `"*"` to delete regardless of the stored ETag
    pub fn delete(&mut self, row_key: &str, if_match: &str) -> Result<&mut Self> {
        let etag = Self::require_etag(if_match)?;
        self.push(OperationKind::Delete, row_key, None, Some(etag))
    }

    /// Append a full replace that creates the entity when it does not exist
    pub fn insert_or_replace(&mut self, row_key: &str, properties: Properties) -> Result<&mut Self> {
        self.push(OperationKind::InsertOrReplace, row_key, Some(properties), None)
    }

    /// Append a partial update that creates the entity when it does not exist
    pub fn insert_or_merge(&mut self, row_key: &str, properties: Properties) -> Result<&mut Self> {
        self.push(OperationKind::InsertOrMerge, row_key, Some(properties), None)
    }

    fn require_etag(etag: &str) -> Result<String> {
        if etag.is_empty() {
            return Err(TableError::InvalidArgument(
                "empty ETag; use \"*\" for an unconditional match".to_string(),
            ));
        }
        Ok(etag.to_string())
    }

    fn push(
        &mut self,
        kind: OperationKind,
        row_key: &str,
        payload: Option<Properties>,
        if_match: Option<String>,
    ) -> Result<&mut Self> {
        if !is_valid_key(row_key) {
            return Err(TableError::InvalidArgument(format!(
                "invalid row key: {:?}",
                row_key
            )));
        }
        let payload = match payload {
            Some(properties) => Some(self.check_addressing(row_key, properties)?),
            None => None,
        };
        self.operations.push(Operation {
            kind,
            row_key: row_key.to_string(),
            payload,
            if_match,
        });
        Ok(self)
    }

    /// `PartitionKey` / `RowKey` in a payload are addressing, not data: they
    /// must match the operation's target and are stripped here (the
    /// serializer re-injects them where the wire format needs them).
    fn check_addressing(&self, row_key: &str, mut properties: Properties) -> Result<Properties> {
        if let Some(value) = properties.remove("PartitionKey") {
            match value {
                EntityValue::String(s) if s == self.partition_key => {}
                other => {
                    return Err(TableError::InvalidArgument(format!(
                        "payload PartitionKey {:?} does not match batch partition key {:?}",
                        other, self.partition_key
                    )));
                }
            }
        }
        if let Some(value) = properties.remove("RowKey") {
            match value {
                EntityValue::String(s) if s == row_key => {}
                other => {
                    return Err(TableError::InvalidArgument(format!(
                        "payload RowKey {:?} does not match operation row key {:?}",
                        other, row_key
                    )));
                }
            }
        }
        Ok(properties)
    }
}
