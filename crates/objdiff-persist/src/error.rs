use objdiff_types::{ObjectId, PropertyKey};
use serde_json::Value;

/// Errors from persistence sink operations.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// A mutating call arrived outside `begin()` / `commit()`.
    #[error("no transaction in progress")]
    NoTransaction,

    /// `begin()` was called while a transaction was already open.
    #[error("a transaction is already in progress")]
    TransactionInProgress,

    /// An object with this id already exists.
    #[error("object already exists: {0}")]
    DuplicateObject(ObjectId),

    /// The referenced object does not exist.
    #[error("unknown object: {0}")]
    UnknownObject(ObjectId),

    /// A removal named a parent that does not own the object.
    #[error("object {id} has parent {actual:?}, not {expected:?}")]
    ParentMismatch {
        id: ObjectId,
        expected: Option<ObjectId>,
        actual: Option<ObjectId>,
    },

    /// A conditional property update found a different current value.
    #[error("conflicting value for {key}: expected {expected}, found {actual}")]
    PropertyConflict {
        key: PropertyKey,
        expected: Value,
        actual: Value,
    },

    /// The sink only records additions.
    #[error("removal of {0} is not supported by this sink")]
    RemovalUnsupported(ObjectId),
}

/// Result alias for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;
