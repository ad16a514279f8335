//! Batch operation descriptors

use crate::entity::Properties;

/// The kind of mutation one operation performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Create a new entity; fails if the row already exists
    Insert,
    /// Replace the entire property set of an existing entity
    UpdateReplace,
    /// Overlay properties onto an existing entity, leaving the rest untouched
    UpdateMerge,
    /// Delete an existing entity
    Delete,
    /// Replace the entity, creating it if it does not exist
    InsertOrReplace,
    /// Merge into the entity, creating it if it does not exist
    InsertOrMerge,
}

impl OperationKind {
    /// HTTP method of this operation's part on the wire
    pub fn http_method(&self) -> &'static str {
        match self {
            OperationKind::Insert => "POST",
            OperationKind::UpdateReplace | OperationKind::InsertOrReplace => "PUT",
            OperationKind::UpdateMerge | OperationKind::InsertOrMerge => "MERGE",
            OperationKind::Delete => "DELETE",
        }
    }

    /// Whether the wire part carries an `If-Match` precondition header.
    ///
    /// Only operations that require the row to exist are conditional; the
    /// insert-or-* upserts and plain inserts are not.
    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            OperationKind::UpdateReplace | OperationKind::UpdateMerge | OperationKind::Delete
        )
    }

    /// Whether this operation carries an entity payload
    pub fn has_payload(&self) -> bool {
        !matches!(self, OperationKind::Delete)
    }
}

/// One pending mutation within a batch.
///
/// Created by the batch append methods, consumed once at serialization time,
/// never mutated afterward. The partition key is implicit: every operation
/// shares its batch's partition key.
#[derive(Debug, Clone)]
pub struct Operation {
    /// What to do
    pub kind: OperationKind,
    /// Target row key within the batch's partition
    pub row_key: String,
    /// Full or partial property mapping; `None` only for [`OperationKind::Delete`]
    pub payload: Option<Properties>,
    /// Concurrency precondition; `None` on a conditional kind means
    /// unconditional (`If-Match: *` on the wire)
    pub if_match: Option<String>,
}
