use objdiff_types::{DataType, ObjectId};
use serde_json::Value;

use crate::error::SinkResult;

/// A persistence target that object graph changes can be replayed into.
///
/// Implementations must satisfy these invariants:
/// - All mutating calls happen between `begin()` and `commit()`; a failed
///   batch is abandoned with `rollback()`.
/// - Removing an object removes its whole subtree and every property of
///   every removed object.
/// - Setting a property to `Value::Null` clears it.
///
/// Callers replaying a diff must send removals before additions: a moved
/// object appears in both lists and would otherwise exist twice.
pub trait PersistenceSink: Send + Sync {
    /// Open a batch of changes.
    fn begin(&self) -> SinkResult<()>;

    /// Make the open batch permanent.
    fn commit(&self) -> SinkResult<()>;

    /// Discard the open batch.
    fn rollback(&self) -> SinkResult<()>;

    /// Create an object under `parent_id` at `sibling_index`.
    fn add_object(
        &self,
        parent_id: Option<&ObjectId>,
        type_tag: &str,
        id: &ObjectId,
        sibling_index: i32,
    ) -> SinkResult<()>;

    /// Remove an object together with its descendants.
    fn remove_object(&self, parent_id: Option<&ObjectId>, id: &ObjectId) -> SinkResult<()>;

    /// Set a property unconditionally.
    fn set_property(
        &self,
        id: &ObjectId,
        name: &str,
        data_type: DataType,
        new_value: &Value,
    ) -> SinkResult<()>;

    /// Set a property, letting the sink check that the current value is
    /// still `old_value`.
    ///
    /// The default implementation ignores `old_value`.
    fn set_property_conditional(
        &self,
        id: &ObjectId,
        name: &str,
        data_type: DataType,
        old_value: &Value,
        new_value: &Value,
    ) -> SinkResult<()> {
        let _ = old_value;
        self.set_property(id, name, data_type, new_value)
    }
}
