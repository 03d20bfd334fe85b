//! Foundation types for object graph differencing.
//!
//! A workspace is persisted as a flat list of objects (each pointing at its
//! parent) and a flat list of property values. This crate defines those
//! records and the identities that stay stable from one snapshot to the next.
//!
//! # Key Types
//!
//! - [`ObjectId`] -- Stable identifier of a persisted object
//! - [`ObjectRecord`] -- One node: id, parent, type tag, sibling index
//! - [`PropertyKey`] -- `(object id, property name)` identity of a property
//! - [`PropertyRecord`] -- A property value, raw or synthesized by a diff
//! - [`Snapshot`] -- A full point-in-time state and its JSON form

pub mod error;
pub mod object;
pub mod property;
pub mod snapshot;

pub use error::TypeError;
pub use object::{simple_type_name, ObjectId, ObjectRecord};
pub use property::{display_value, DataType, PropertyKey, PropertyRecord};
pub use snapshot::Snapshot;
