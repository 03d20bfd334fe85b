use std::sync::Mutex;

use objdiff_types::{DataType, ObjectId, ObjectRecord, PropertyRecord, Snapshot};
use serde_json::Value;
use tracing::error;

use crate::error::{SinkError, SinkResult};
use crate::traits::PersistenceSink;

/// Sink that captures a stream of persist calls as a [`Snapshot`].
///
/// Used to snapshot a revision by having its owner persist everything it
/// holds into the collector. Only additions make sense for that, so
/// removals are rejected.
#[derive(Debug, Default)]
pub struct SnapshotCollector {
    snapshot: Mutex<Snapshot>,
}

impl SnapshotCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume the collector, returning the captured snapshot.
    pub fn into_snapshot(self) -> Snapshot {
        self.snapshot.into_inner().expect("lock poisoned")
    }
}

impl PersistenceSink for SnapshotCollector {
    fn begin(&self) -> SinkResult<()> {
        Ok(())
    }

    fn commit(&self) -> SinkResult<()> {
        Ok(())
    }

    fn rollback(&self) -> SinkResult<()> {
        error!("snapshot source rolled back while being collected");
        Ok(())
    }

    fn add_object(
        &self,
        parent_id: Option<&ObjectId>,
        type_tag: &str,
        id: &ObjectId,
        sibling_index: i32,
    ) -> SinkResult<()> {
        self.snapshot
            .lock()
            .expect("lock poisoned")
            .objects
            .push(ObjectRecord::new(
                parent_id.cloned(),
                type_tag,
                id.clone(),
                sibling_index,
            ));
        Ok(())
    }

    fn remove_object(&self, _parent_id: Option<&ObjectId>, id: &ObjectId) -> SinkResult<()> {
        Err(SinkError::RemovalUnsupported(id.clone()))
    }

    fn set_property(
        &self,
        id: &ObjectId,
        name: &str,
        data_type: DataType,
        new_value: &Value,
    ) -> SinkResult<()> {
        self.snapshot
            .lock()
            .expect("lock poisoned")
            .properties
            .push(PropertyRecord::snapshot(
                id.clone(),
                name,
                data_type,
                new_value.clone(),
            ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collects_objects_and_point_in_time_properties() {
        let collector = SnapshotCollector::new();
        let id = ObjectId::new("t");
        collector.begin().unwrap();
        collector
            .add_object(Some(&ObjectId::new("ws")), "Table", &id, 0)
            .unwrap();
        collector
            .set_property_conditional(&id, "name", DataType::String, &json!("a"), &json!("b"))
            .unwrap();
        collector.commit().unwrap();

        let snapshot = collector.into_snapshot();
        assert_eq!(snapshot.objects.len(), 1);
        let property = &snapshot.properties[0];
        assert_eq!(property.old_value, json!("b"));
        assert_eq!(property.new_value, json!("b"));
        assert!(!property.from_diff);
    }

    #[test]
    fn removal_is_rejected() {
        let collector = SnapshotCollector::new();
        let err = collector
            .remove_object(None, &ObjectId::new("t"))
            .unwrap_err();
        assert!(matches!(err, SinkError::RemovalUnsupported(_)));
    }
}
