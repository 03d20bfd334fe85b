//! Replaying a computed diff into a persistence sink.

use objdiff_persist::PersistenceSink;
use objdiff_types::ObjectRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::differ::Differ;
use crate::error::DiffResult;

/// How property changes are sent to the sink.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayMode {
    /// `set_property(id, name, type, new)`.
    #[default]
    NewValuesOnly,
    /// `set_property_conditional(id, name, type, old, new)`, so the sink can
    /// check that nothing changed the value since the old snapshot.
    Conditional,
}

/// Counts of the calls made by a successful replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    pub removed: usize,
    pub added: usize,
    pub properties: usize,
}

impl Differ {
    /// Replay the diff into `sink` as a single transaction.
    ///
    /// Calls `begin`, every removal, every addition in replay order, every
    /// property change, then `commit`. If anything after `begin` fails the
    /// sink is rolled back and the failing call's error is returned.
    pub fn persist_to(
        &self,
        sink: &dyn PersistenceSink,
        mode: ReplayMode,
    ) -> DiffResult<ReplayStats> {
        self.ensure_computed()?;
        let additions = self.replay_order()?;

        sink.begin()?;
        let result = self
            .replay_calls(sink, mode, &additions)
            .and_then(|stats| {
                sink.commit()?;
                Ok(stats)
            });

        match result {
            Ok(stats) => {
                info!(
                    removed = stats.removed,
                    added = stats.added,
                    properties = stats.properties,
                    ?mode,
                    "diff replayed"
                );
                Ok(stats)
            }
            Err(e) => {
                if let Err(rollback) = sink.rollback() {
                    error!(error = %rollback, "rollback after failed replay also failed");
                }
                error!(error = %e, "diff replay rolled back");
                Err(e)
            }
        }
    }

    fn replay_calls(
        &self,
        sink: &dyn PersistenceSink,
        mode: ReplayMode,
        additions: &[&ObjectRecord],
    ) -> DiffResult<ReplayStats> {
        let mut stats = ReplayStats::default();

        for record in self.to_remove() {
            debug!(object = %record.id, "remove");
            sink.remove_object(record.parent(), &record.id)?;
            stats.removed += 1;
        }

        for record in additions {
            debug!(object = %record.id, type_tag = %record.type_tag, "add");
            sink.add_object(
                record.parent(),
                &record.type_tag,
                &record.id,
                record.sibling_index,
            )?;
            stats.added += 1;
        }

        for change in self.property_changes() {
            match mode {
                ReplayMode::NewValuesOnly => sink.set_property(
                    &change.object_id,
                    &change.name,
                    change.data_type,
                    &change.new_value,
                )?,
                ReplayMode::Conditional => sink.set_property_conditional(
                    &change.object_id,
                    &change.name,
                    change.data_type,
                    &change.old_value,
                    &change.new_value,
                )?,
            }
            stats.properties += 1;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiffError;
    use objdiff_persist::{
        InMemoryWorkspace, PersistCall, RecordingSink, SinkError, SinkResult,
    };
    use objdiff_types::{DataType, ObjectId, Snapshot};
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn oid(s: &str) -> ObjectId {
        ObjectId::new(s)
    }

    fn old_workspace() -> Snapshot {
        Snapshot::new()
            .with_object(ObjectRecord::child_of("ws", "db.Folder", "f", 0))
            .with_object(ObjectRecord::child_of("f", "db.Table", "t", 0))
            .with_object(ObjectRecord::child_of("t", "db.Column", "c", 0))
            .with_object(ObjectRecord::child_of("ws", "db.Folder", "g", 1))
            .with_object(ObjectRecord::child_of("g", "db.Table", "old", 0))
            .with_property("t", "name", DataType::String, json!("orders"))
            .with_property("c", "name", DataType::String, json!("id"))
            .with_property("g", "name", DataType::String, json!("Archive"))
    }

    fn new_workspace() -> Snapshot {
        Snapshot::new()
            .with_object(ObjectRecord::child_of("ws", "db.Folder", "f", 0))
            .with_object(ObjectRecord::child_of("g", "db.Table", "t", 0))
            .with_object(ObjectRecord::child_of("t", "db.Column", "c", 0))
            .with_object(ObjectRecord::child_of("t", "db.Column", "c2", 1))
            .with_object(ObjectRecord::child_of("ws", "db.Folder", "g", 1))
            .with_property("t", "name", DataType::String, json!("orders"))
            .with_property("c", "name", DataType::String, json!("order_id"))
            .with_property("c2", "name", DataType::String, json!("total"))
            .with_property("g", "name", DataType::String, json!("Archive"))
    }

    // ---------------------------------------------------------------
    // Call order
    // ---------------------------------------------------------------

    #[test]
    fn calls_follow_transaction_order() {
        let differ = Differ::diff(&old_workspace(), &new_workspace()).unwrap();
        let sink = RecordingSink::new();
        let stats = differ.persist_to(&sink, ReplayMode::NewValuesOnly).unwrap();
        let calls = sink.into_calls();

        assert_eq!(calls.first(), Some(&PersistCall::Begin));
        assert_eq!(calls.last(), Some(&PersistCall::Commit));
        let last_removal = calls.iter().rposition(PersistCall::is_removal).unwrap();
        let first_addition = calls.iter().position(PersistCall::is_addition).unwrap();
        let last_addition = calls.iter().rposition(PersistCall::is_addition).unwrap();
        let first_property = calls.iter().position(PersistCall::is_property).unwrap();
        assert!(last_removal < first_addition);
        assert!(last_addition < first_property);

        assert_eq!(stats.removed, differ.to_remove().len());
        assert_eq!(stats.added, differ.to_add().len());
        assert_eq!(stats.properties, differ.property_changes().len());
    }

    #[test]
    fn moved_parent_is_added_before_its_children() {
        let differ = Differ::diff(&old_workspace(), &new_workspace()).unwrap();
        let sink = RecordingSink::new();
        differ.persist_to(&sink, ReplayMode::NewValuesOnly).unwrap();

        let added: Vec<ObjectId> = sink
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                PersistCall::AddObject { id, .. } => Some(id),
                _ => None,
            })
            .collect();
        assert_eq!(added, vec![oid("t"), oid("c"), oid("c2")]);
    }

    #[test]
    fn conditional_mode_sends_old_values() {
        let differ = Differ::diff(&old_workspace(), &new_workspace()).unwrap();
        let sink = RecordingSink::new();
        differ.persist_to(&sink, ReplayMode::Conditional).unwrap();

        let conditional = sink.calls().into_iter().find_map(|call| match call {
            PersistCall::SetProperty { id, old_value, new_value, .. } if id == oid("c") => {
                Some((old_value, new_value))
            }
            _ => None,
        });
        assert_eq!(
            conditional,
            Some((Some(json!("id")), json!("order_id")))
        );
    }

    #[test]
    fn replay_before_compute_fails() {
        let differ = Differ::new();
        let sink = RecordingSink::new();
        assert!(matches!(
            differ.persist_to(&sink, ReplayMode::NewValuesOnly),
            Err(DiffError::NotComputed)
        ));
        assert!(sink.calls().is_empty());
    }

    #[test]
    fn replay_after_failed_compute_fails() {
        let old = Snapshot::new()
            .with_object(ObjectRecord::child_of("ws", "Folder", "x", 0))
            .with_object(ObjectRecord::child_of("x", "Folder", "y", 0));
        let new = Snapshot::new()
            .with_object(ObjectRecord::child_of("ws", "Folder", "a", 0))
            .with_object(ObjectRecord::child_of("y", "Folder", "x", 0))
            .with_object(ObjectRecord::child_of("x", "Folder", "y", 0));
        let mut differ = Differ::new();
        assert!(differ.compute_snapshots(&old, &new).is_err());

        let sink = RecordingSink::new();
        assert!(matches!(
            differ.persist_to(&sink, ReplayMode::NewValuesOnly),
            Err(DiffError::NotComputed)
        ));
        assert!(sink.calls().is_empty());

        let workspace = InMemoryWorkspace::from_snapshot(&old);
        assert!(differ.persist_to(&workspace, ReplayMode::Conditional).is_err());
        assert_eq!(workspace.snapshot(), old.normalized());
    }

    // ---------------------------------------------------------------
    // Applying to a workspace
    // ---------------------------------------------------------------

    #[test]
    fn replay_turns_old_workspace_into_new() {
        let differ = Differ::diff(&old_workspace(), &new_workspace()).unwrap();
        for mode in [ReplayMode::NewValuesOnly, ReplayMode::Conditional] {
            let workspace = InMemoryWorkspace::from_snapshot(&old_workspace());
            differ.persist_to(&workspace, mode).unwrap();
            assert_eq!(workspace.snapshot(), new_workspace().normalized());
        }
    }

    fn rename(mut snapshot: Snapshot, id: &str, name: &str) -> Snapshot {
        for p in &mut snapshot.properties {
            if p.object_id.as_str() == id && p.name == "name" {
                p.old_value = json!(name);
                p.new_value = json!(name);
            }
        }
        snapshot
    }

    #[test]
    fn conditional_conflict_rolls_back() {
        let new = rename(new_workspace(), "g", "Attic");
        let differ = Differ::diff(&old_workspace(), &new).unwrap();
        // Someone renamed `g` after the old snapshot was taken.
        let drifted = rename(old_workspace(), "g", "Lumber");
        let workspace = InMemoryWorkspace::from_snapshot(&drifted);

        let err = differ
            .persist_to(&workspace, ReplayMode::Conditional)
            .unwrap_err();
        assert!(matches!(
            err,
            DiffError::Sink(SinkError::PropertyConflict { .. })
        ));
        assert!(!workspace.in_transaction());
        assert_eq!(workspace.snapshot(), drifted.clone().normalized());

        // The unconditional form overwrites the drifted value.
        let workspace = InMemoryWorkspace::from_snapshot(&drifted);
        differ.persist_to(&workspace, ReplayMode::NewValuesOnly).unwrap();
        assert_eq!(workspace.snapshot(), new.normalized());
    }

    /// Sink that fails on the first addition.
    #[derive(Default)]
    struct FailingSink {
        calls: Mutex<Vec<&'static str>>,
    }

    impl FailingSink {
        fn log(&self, call: &'static str) -> SinkResult<()> {
            self.calls.lock().unwrap().push(call);
            Ok(())
        }
    }

    impl PersistenceSink for FailingSink {
        fn begin(&self) -> SinkResult<()> {
            self.log("begin")
        }
        fn commit(&self) -> SinkResult<()> {
            self.log("commit")
        }
        fn rollback(&self) -> SinkResult<()> {
            self.log("rollback")
        }
        fn add_object(
            &self,
            _parent_id: Option<&ObjectId>,
            _type_tag: &str,
            id: &ObjectId,
            _sibling_index: i32,
        ) -> SinkResult<()> {
            Err(SinkError::DuplicateObject(id.clone()))
        }
        fn remove_object(&self, _parent_id: Option<&ObjectId>, _id: &ObjectId) -> SinkResult<()> {
            self.log("remove")
        }
        fn set_property(
            &self,
            _id: &ObjectId,
            _name: &str,
            _data_type: DataType,
            _new_value: &Value,
        ) -> SinkResult<()> {
            self.log("set")
        }
    }

    #[test]
    fn sink_failure_triggers_rollback() {
        let differ = Differ::diff(&old_workspace(), &new_workspace()).unwrap();
        let sink = FailingSink::default();
        let err = differ
            .persist_to(&sink, ReplayMode::NewValuesOnly)
            .unwrap_err();
        assert!(matches!(err, DiffError::Sink(SinkError::DuplicateObject(_))));
        let calls = sink.calls.lock().unwrap().clone();
        assert_eq!(calls.first(), Some(&"begin"));
        assert_eq!(calls.last(), Some(&"rollback"));
        assert!(!calls.contains(&"commit"));
        assert!(!calls.contains(&"set"));
    }

    // ---------------------------------------------------------------
    // Generated snapshots
    // ---------------------------------------------------------------

    const NODES: usize = 12;

    /// One revision of a workspace over the ids `n0..n11`. Each present
    /// node hangs off an earlier present node or the workspace, so the
    /// parent chain of every record is acyclic and fully resolvable.
    fn revision() -> impl Strategy<Value = Snapshot> {
        let node = (
            any::<bool>(),
            any::<prop::sample::Index>(),
            prop::sample::select(vec!["db.Folder", "db.Table"]),
            prop::option::of(0..3i64),
            prop::option::of(prop::sample::select(vec!["a", "b"])),
        );
        prop::collection::vec(node, NODES).prop_map(|nodes| {
            let mut snapshot = Snapshot::new();
            let mut present: Vec<String> = Vec::new();
            let mut next_index: std::collections::HashMap<String, i32> = Default::default();
            for (i, (keep, pick, type_tag, size, label)) in nodes.into_iter().enumerate() {
                if !keep {
                    continue;
                }
                let slot = pick.index(present.len() + 1);
                let parent = if slot == 0 {
                    "ws".to_string()
                } else {
                    present[slot - 1].clone()
                };
                let index = next_index.entry(parent.clone()).or_insert(0);
                let id = format!("n{i}");
                snapshot = snapshot.with_object(ObjectRecord::child_of(parent, type_tag, id.clone(), *index));
                *index += 1;
                if let Some(size) = size {
                    snapshot = snapshot.with_property(id.as_str(), "size", DataType::Integer, json!(size));
                }
                if let Some(label) = label {
                    snapshot = snapshot.with_property(id.as_str(), "name", DataType::String, json!(label));
                }
                present.push(id);
            }
            snapshot
        })
    }

    proptest! {
        #[test]
        fn replay_reproduces_new_snapshot(old in revision(), new in revision()) {
            let differ = Differ::diff(&old, &new).unwrap();
            let workspace = InMemoryWorkspace::from_snapshot(&old);
            differ.persist_to(&workspace, ReplayMode::Conditional).unwrap();
            prop_assert_eq!(workspace.snapshot(), new.normalized());
        }

        #[test]
        fn identical_revisions_have_empty_diff(snapshot in revision()) {
            let differ = Differ::diff(&snapshot, &snapshot).unwrap();
            prop_assert!(differ.change_set().is_empty());
        }

        #[test]
        fn additions_are_never_duplicated(old in revision(), new in revision()) {
            let differ = Differ::diff(&old, &new).unwrap();
            let mut ids: Vec<&ObjectId> = differ.to_add().iter().map(|o| &o.id).collect();
            let total = ids.len();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), total);
        }
    }
}
