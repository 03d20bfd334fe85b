use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("object record has an empty id")]
    EmptyObjectId,

    #[error("property {name:?} has an empty object id")]
    EmptyPropertyOwner { name: String },

    #[error("object {0} has an empty property name")]
    EmptyPropertyName(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}
