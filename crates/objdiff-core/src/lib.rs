//! Differencing engine for persisted object graphs.
//!
//! Compares two flat snapshots of the same object graph and computes the
//! minimal change set (objects to add, objects to remove, property updates)
//! that turns the old snapshot into the new one. The change set can be
//! replayed transactionally into any [`objdiff_persist::PersistenceSink`],
//! or rendered as a human-readable tree.
//!
//! # Key Types
//!
//! - [`Differ`] -- computes one diff and answers lookups about both snapshots
//! - [`ChangeSet`] -- the computed additions, removals and property changes
//! - [`ObjectTree`] -- children index rebuilt from parent pointers
//! - [`ReplayOrder`] -- parent-before-child ordering for additions
//! - [`DisplayEntry`] / [`ChangeKind`] -- display tree rows
//! - [`DiffConfig`] -- display root, replay mode and interesting properties
//!
//! # Replay Rules
//!
//! 1. Removals are replayed before additions; a moved object is in both.
//! 2. Removing an object removes its descendants, so only the topmost
//!    removal of each cluster is listed.
//! 3. Every property of a moved object and its new subtree is re-emitted.

pub mod changeset;
pub mod config;
pub mod differ;
pub mod error;
pub mod index;
pub mod order;
pub mod render;
pub mod replay;
pub mod tree;

pub use changeset::ChangeSet;
pub use config::{DiffConfig, InterestingProperties};
pub use differ::Differ;
pub use error::{DiffError, DiffResult};
pub use index::{index_objects, index_properties, SnapshotIndex};
pub use order::{sort_for_replay, ReplayOrder};
pub use render::{render_text, AllProperties, ChangeKind, DisplayEntry, PropertyChange, PropertyFilter};
pub use replay::{ReplayMode, ReplayStats};
pub use tree::ObjectTree;
