//! Persistence sinks for replaying object graph diffs.
//!
//! A diff is applied by replaying it as a batch of persist calls: removals,
//! then additions in parent-before-child order, then property updates, all
//! inside one `begin()` / `commit()` pair. Anything able to receive those
//! calls implements [`PersistenceSink`].
//!
//! # Sinks
//!
//! - [`InMemoryWorkspace`] -- transactional workspace with cascading removal
//! - [`RecordingSink`] -- keeps every call, for inspection and output
//! - [`SnapshotCollector`] -- captures a stream of additions as a snapshot
//!
//! # Design Rules
//!
//! 1. Removing an object removes its subtree and their properties.
//! 2. A null property value means "no value".
//! 3. Failed batches are rolled back by the caller, never half-applied.

pub mod collector;
pub mod error;
pub mod memory;
pub mod recording;
pub mod traits;

pub use collector::SnapshotCollector;
pub use error::{SinkError, SinkResult};
pub use memory::InMemoryWorkspace;
pub use recording::{PersistCall, RecordingSink};
pub use traits::PersistenceSink;
