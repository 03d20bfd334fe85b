//! Error types for the diff crate.

use objdiff_types::ObjectId;

/// Errors that can occur while computing, replaying or rendering a diff.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// `compute` was already called on this differ, successfully or not.
    #[error("this differ has already been used to compute a diff")]
    AlreadyComputed,

    /// The operation needs a computed diff.
    #[error("no diff has been computed yet")]
    NotComputed,

    /// An object referenced by a change is in neither snapshot.
    #[error("object not found in either snapshot: {0}")]
    UnresolvedObject(ObjectId),

    /// Walking parent pointers from this object revisited an object.
    #[error("cyclic parent chain involving object {0}")]
    AncestryCycle(ObjectId),

    /// The persistence sink rejected a replayed call.
    #[error("sink error: {0}")]
    Sink(#[from] objdiff_persist::SinkError),

    /// Configuration could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
