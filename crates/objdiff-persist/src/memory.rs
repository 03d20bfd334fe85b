//! Transactional in-memory workspace.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use objdiff_types::{DataType, ObjectId, ObjectRecord, PropertyKey, PropertyRecord, Snapshot};
use serde_json::Value;
use tracing::debug;

use crate::error::{SinkError, SinkResult};
use crate::traits::PersistenceSink;

#[derive(Clone, Debug, Default, PartialEq)]
struct WorkspaceState {
    objects: BTreeMap<ObjectId, ObjectRecord>,
    properties: BTreeMap<PropertyKey, PropertyRecord>,
}

impl WorkspaceState {
    /// `id` and all of its transitive children.
    fn subtree(&self, id: &ObjectId) -> Vec<ObjectId> {
        let mut children: HashMap<&ObjectId, Vec<&ObjectId>> = HashMap::new();
        for object in self.objects.values() {
            if let Some(parent) = object.parent() {
                children.entry(parent).or_default().push(&object.id);
            }
        }

        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            result.push(current.clone());
            if let Some(kids) = children.get(current) {
                stack.extend(kids.iter().copied());
            }
        }
        result
    }

    /// Number of ancestors present in the workspace.
    fn depth(&self, record: &ObjectRecord) -> usize {
        let mut depth = 0;
        let mut current = record;
        while let Some(parent) = current.parent().and_then(|p| self.objects.get(p)) {
            depth += 1;
            // Parent chains in a workspace cannot be longer than the workspace.
            if depth > self.objects.len() {
                break;
            }
            current = parent;
        }
        depth
    }

    fn current_value(&self, key: &PropertyKey) -> Value {
        self.properties
            .get(key)
            .map(|p| p.new_value.clone())
            .unwrap_or(Value::Null)
    }

    fn set(&mut self, id: &ObjectId, name: &str, data_type: DataType, value: &Value) {
        let key = PropertyKey::new(id.clone(), name);
        if value.is_null() {
            self.properties.remove(&key);
        } else {
            self.properties.insert(
                key,
                PropertyRecord::snapshot(id.clone(), name, data_type, value.clone()),
            );
        }
    }
}

struct Transaction {
    state: WorkspaceState,
    /// Objects created inside this transaction. They have no prior values,
    /// so conditional updates on them are not checked.
    created: HashSet<ObjectId>,
}

/// In-memory, transactional workspace.
///
/// Intended for tests, previews and verifying that a diff replays cleanly.
/// Committed state sits behind a `RwLock`; an open transaction works on a
/// private copy that replaces the committed state on `commit()`.
pub struct InMemoryWorkspace {
    committed: RwLock<WorkspaceState>,
    pending: Mutex<Option<Transaction>>,
}

impl InMemoryWorkspace {
    /// Create an empty workspace.
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(WorkspaceState::default()),
            pending: Mutex::new(None),
        }
    }

    /// Load a workspace from a snapshot. Null property values are dropped.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut state = WorkspaceState::default();
        for object in &snapshot.objects {
            state.objects.insert(object.id.clone(), object.clone());
        }
        for property in &snapshot.properties {
            state.set(
                &property.object_id,
                &property.name,
                property.data_type,
                &property.new_value,
            );
        }
        Self {
            committed: RwLock::new(state),
            pending: Mutex::new(None),
        }
    }

    /// The committed state as a normalized snapshot.
    pub fn snapshot(&self) -> Snapshot {
        let state = self.committed.read().expect("lock poisoned");
        Snapshot {
            objects: state.objects.values().cloned().collect(),
            properties: state.properties.values().cloned().collect(),
        }
    }

    /// Number of committed objects.
    pub fn len(&self) -> usize {
        self.committed.read().expect("lock poisoned").objects.len()
    }

    /// Returns `true` if no objects are committed.
    pub fn is_empty(&self) -> bool {
        self.committed.read().expect("lock poisoned").objects.is_empty()
    }

    /// The committed record for `id`.
    pub fn object(&self, id: &ObjectId) -> Option<ObjectRecord> {
        self.committed
            .read()
            .expect("lock poisoned")
            .objects
            .get(id)
            .cloned()
    }

    /// The committed value of a property, `Value::Null` when unset.
    pub fn property_value(&self, id: &ObjectId, name: &str) -> Value {
        self.committed
            .read()
            .expect("lock poisoned")
            .current_value(&PropertyKey::new(id.clone(), name))
    }

    /// Returns `true` while a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.pending.lock().expect("lock poisoned").is_some()
    }

    /// Stream the committed state into another sink, parents before
    /// children and siblings in index order, followed by every property.
    pub fn export_to(&self, sink: &dyn PersistenceSink) -> SinkResult<()> {
        let (objects, properties) = {
            let state = self.committed.read().expect("lock poisoned");
            let mut objects: Vec<(usize, ObjectRecord)> = state
                .objects
                .values()
                .map(|o| (state.depth(o), o.clone()))
                .collect();
            objects.sort_by(|(da, a), (db, b)| {
                da.cmp(db)
                    .then_with(|| a.parent_id.cmp(&b.parent_id))
                    .then_with(|| a.sibling_index.cmp(&b.sibling_index))
                    .then_with(|| a.id.cmp(&b.id))
            });
            let properties: Vec<PropertyRecord> = state.properties.values().cloned().collect();
            (objects, properties)
        };

        sink.begin()?;
        for (_, object) in &objects {
            sink.add_object(
                object.parent(),
                &object.type_tag,
                &object.id,
                object.sibling_index,
            )?;
        }
        for property in &properties {
            sink.set_property(
                &property.object_id,
                &property.name,
                property.data_type,
                &property.new_value,
            )?;
        }
        sink.commit()
    }

    fn with_transaction<T>(
        &self,
        f: impl FnOnce(&mut Transaction) -> SinkResult<T>,
    ) -> SinkResult<T> {
        let mut pending = self.pending.lock().expect("lock poisoned");
        let tx = pending.as_mut().ok_or(SinkError::NoTransaction)?;
        f(tx)
    }
}

impl Default for InMemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceSink for InMemoryWorkspace {
    fn begin(&self) -> SinkResult<()> {
        let mut pending = self.pending.lock().expect("lock poisoned");
        if pending.is_some() {
            return Err(SinkError::TransactionInProgress);
        }
        let state = self.committed.read().expect("lock poisoned").clone();
        *pending = Some(Transaction {
            state,
            created: HashSet::new(),
        });
        Ok(())
    }

    fn commit(&self) -> SinkResult<()> {
        let tx = self
            .pending
            .lock()
            .expect("lock poisoned")
            .take()
            .ok_or(SinkError::NoTransaction)?;
        let mut committed = self.committed.write().expect("lock poisoned");
        *committed = tx.state;
        debug!(objects = committed.objects.len(), "workspace committed");
        Ok(())
    }

    fn rollback(&self) -> SinkResult<()> {
        self.pending
            .lock()
            .expect("lock poisoned")
            .take()
            .ok_or(SinkError::NoTransaction)?;
        debug!("workspace transaction rolled back");
        Ok(())
    }

    fn add_object(
        &self,
        parent_id: Option<&ObjectId>,
        type_tag: &str,
        id: &ObjectId,
        sibling_index: i32,
    ) -> SinkResult<()> {
        self.with_transaction(|tx| {
            if tx.state.objects.contains_key(id) {
                return Err(SinkError::DuplicateObject(id.clone()));
            }
            let record = ObjectRecord::new(parent_id.cloned(), type_tag, id.clone(), sibling_index);
            tx.state.objects.insert(id.clone(), record);
            tx.created.insert(id.clone());
            Ok(())
        })
    }

    fn remove_object(&self, parent_id: Option<&ObjectId>, id: &ObjectId) -> SinkResult<()> {
        self.with_transaction(|tx| {
            let record = tx
                .state
                .objects
                .get(id)
                .ok_or_else(|| SinkError::UnknownObject(id.clone()))?;
            if record.parent() != parent_id {
                return Err(SinkError::ParentMismatch {
                    id: id.clone(),
                    expected: parent_id.cloned(),
                    actual: record.parent_id.clone(),
                });
            }

            let removed: HashSet<ObjectId> = tx.state.subtree(id).into_iter().collect();
            tx.state.objects.retain(|oid, _| !removed.contains(oid));
            tx.state
                .properties
                .retain(|key, _| !removed.contains(&key.object_id));
            tx.created.retain(|oid| !removed.contains(oid));
            debug!(object = %id, cascaded = removed.len(), "removed object subtree");
            Ok(())
        })
    }

    fn set_property(
        &self,
        id: &ObjectId,
        name: &str,
        data_type: DataType,
        new_value: &Value,
    ) -> SinkResult<()> {
        self.with_transaction(|tx| {
            if !tx.state.objects.contains_key(id) {
                return Err(SinkError::UnknownObject(id.clone()));
            }
            tx.state.set(id, name, data_type, new_value);
            Ok(())
        })
    }

    fn set_property_conditional(
        &self,
        id: &ObjectId,
        name: &str,
        data_type: DataType,
        old_value: &Value,
        new_value: &Value,
    ) -> SinkResult<()> {
        self.with_transaction(|tx| {
            if !tx.state.objects.contains_key(id) {
                return Err(SinkError::UnknownObject(id.clone()));
            }
            if !tx.created.contains(id) {
                let key = PropertyKey::new(id.clone(), name);
                let actual = tx.state.current_value(&key);
                if actual != *old_value {
                    return Err(SinkError::PropertyConflict {
                        key,
                        expected: old_value.clone(),
                        actual,
                    });
                }
            }
            tx.state.set(id, name, data_type, new_value);
            Ok(())
        })
    }
}

impl std::fmt::Debug for InMemoryWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryWorkspace")
            .field("object_count", &self.len())
            .field("in_transaction", &self.in_transaction())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::SnapshotCollector;
    use serde_json::json;

    fn oid(s: &str) -> ObjectId {
        ObjectId::new(s)
    }

    fn sample() -> Snapshot {
        Snapshot::new()
            .with_object(ObjectRecord::child_of("ws", "Folder", "f", 0))
            .with_object(ObjectRecord::child_of("f", "Table", "t", 0))
            .with_object(ObjectRecord::child_of("t", "Column", "c", 0))
            .with_object(ObjectRecord::child_of("ws", "Folder", "g", 1))
            .with_property("f", "name", DataType::String, json!("Sales"))
            .with_property("t", "name", DataType::String, json!("orders"))
            .with_property("c", "nullable", DataType::Boolean, json!(false))
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    #[test]
    fn mutations_require_a_transaction() {
        let ws = InMemoryWorkspace::new();
        let err = ws.add_object(None, "Folder", &oid("x"), 0).unwrap_err();
        assert!(matches!(err, SinkError::NoTransaction));
    }

    #[test]
    fn nested_begin_is_rejected() {
        let ws = InMemoryWorkspace::new();
        ws.begin().unwrap();
        assert!(matches!(ws.begin(), Err(SinkError::TransactionInProgress)));
        assert!(ws.in_transaction());
    }

    #[test]
    fn changes_are_invisible_until_commit() {
        let ws = InMemoryWorkspace::new();
        ws.begin().unwrap();
        ws.add_object(None, "Folder", &oid("x"), 0).unwrap();
        assert!(ws.is_empty());
        ws.commit().unwrap();
        assert_eq!(ws.len(), 1);
        assert!(!ws.in_transaction());
    }

    #[test]
    fn rollback_discards_changes() {
        let ws = InMemoryWorkspace::from_snapshot(&sample());
        ws.begin().unwrap();
        ws.remove_object(Some(&oid("ws")), &oid("f")).unwrap();
        ws.rollback().unwrap();
        assert_eq!(ws.len(), 4);
        assert!(matches!(ws.rollback(), Err(SinkError::NoTransaction)));
    }

    // -----------------------------------------------------------------------
    // Objects
    // -----------------------------------------------------------------------

    #[test]
    fn duplicate_add_is_rejected() {
        let ws = InMemoryWorkspace::from_snapshot(&sample());
        ws.begin().unwrap();
        let err = ws.add_object(Some(&oid("ws")), "Folder", &oid("f"), 2).unwrap_err();
        assert!(matches!(err, SinkError::DuplicateObject(id) if id == oid("f")));
    }

    #[test]
    fn removal_cascades_to_descendants_and_properties() {
        let ws = InMemoryWorkspace::from_snapshot(&sample());
        ws.begin().unwrap();
        ws.remove_object(Some(&oid("ws")), &oid("f")).unwrap();
        ws.commit().unwrap();

        assert_eq!(ws.len(), 1);
        assert!(ws.object(&oid("g")).is_some());
        assert!(ws.object(&oid("c")).is_none());
        assert_eq!(ws.property_value(&oid("c"), "nullable"), Value::Null);
        assert!(ws.snapshot().properties.is_empty());
    }

    #[test]
    fn removal_checks_parent() {
        let ws = InMemoryWorkspace::from_snapshot(&sample());
        ws.begin().unwrap();
        let err = ws.remove_object(Some(&oid("g")), &oid("t")).unwrap_err();
        assert!(matches!(err, SinkError::ParentMismatch { .. }));
        let err = ws.remove_object(None, &oid("missing")).unwrap_err();
        assert!(matches!(err, SinkError::UnknownObject(_)));
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    #[test]
    fn setting_null_clears_property() {
        let ws = InMemoryWorkspace::from_snapshot(&sample());
        ws.begin().unwrap();
        ws.set_property(&oid("t"), "name", DataType::String, &Value::Null)
            .unwrap();
        ws.commit().unwrap();
        assert_eq!(ws.property_value(&oid("t"), "name"), Value::Null);
        assert_eq!(ws.snapshot().properties.len(), 2);
    }

    #[test]
    fn property_on_unknown_object_is_rejected() {
        let ws = InMemoryWorkspace::new();
        ws.begin().unwrap();
        let err = ws
            .set_property(&oid("nope"), "name", DataType::String, &json!("x"))
            .unwrap_err();
        assert!(matches!(err, SinkError::UnknownObject(_)));
    }

    #[test]
    fn conditional_update_detects_conflicts() {
        let ws = InMemoryWorkspace::from_snapshot(&sample());
        ws.begin().unwrap();
        ws.set_property_conditional(
            &oid("t"),
            "name",
            DataType::String,
            &json!("orders"),
            &json!("purchases"),
        )
        .unwrap();
        let err = ws
            .set_property_conditional(
                &oid("f"),
                "name",
                DataType::String,
                &json!("Marketing"),
                &json!("Ops"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            SinkError::PropertyConflict { actual, .. } if actual == json!("Sales")
        ));
    }

    #[test]
    fn conditional_update_skips_objects_created_in_transaction() {
        let ws = InMemoryWorkspace::from_snapshot(&sample());
        ws.begin().unwrap();
        ws.remove_object(Some(&oid("ws")), &oid("f")).unwrap();
        ws.add_object(Some(&oid("g")), "Folder", &oid("f"), 0).unwrap();
        ws.set_property_conditional(
            &oid("f"),
            "name",
            DataType::String,
            &json!("Sales"),
            &json!("Sales"),
        )
        .unwrap();
        ws.commit().unwrap();
        assert_eq!(ws.property_value(&oid("f"), "name"), json!("Sales"));
        assert!(ws.object(&oid("f")).unwrap().is_child_of(&oid("g")));
    }

    // -----------------------------------------------------------------------
    // Export
    // -----------------------------------------------------------------------

    #[test]
    fn export_reproduces_the_snapshot() {
        let ws = InMemoryWorkspace::from_snapshot(&sample());
        let collector = SnapshotCollector::new();
        ws.export_to(&collector).unwrap();
        assert_eq!(
            collector.into_snapshot().normalized(),
            sample().normalized()
        );
    }

    #[test]
    fn export_into_workspace_copies_it() {
        let source = InMemoryWorkspace::from_snapshot(&sample());
        let target = InMemoryWorkspace::new();
        source.export_to(&target).unwrap();
        assert_eq!(target.snapshot(), source.snapshot());
    }
}
