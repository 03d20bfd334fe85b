//! The diff calculator.
//!
//! A [`Differ`] compares an old and a new snapshot of the same object graph
//! and produces the [`ChangeSet`] that turns the old one into the new one.
//! Each differ computes exactly one diff.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use objdiff_types::{
    ObjectId, ObjectRecord, PropertyKey, PropertyRecord, Snapshot,
};
use serde_json::Value;
use tracing::debug;

use crate::changeset::ChangeSet;
use crate::error::{DiffError, DiffResult};
use crate::index::SnapshotIndex;
use crate::order::{sort_for_replay, ReplayOrder};
use crate::tree::TreeState;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum DiffState {
    #[default]
    Fresh,
    Computed,
    /// `compute` returned an error. Results were discarded.
    Failed,
}

/// Computes and holds the difference between two snapshots.
#[derive(Debug, Default)]
pub struct Differ {
    old: SnapshotIndex,
    new: SnapshotIndex,
    changes: ChangeSet,
    /// Moved objects and their new descendants. Every property of these
    /// is re-emitted so that replaying the diff fully rebuilds them.
    needs_all_properties: HashSet<ObjectId>,
    tree: TreeState,
    state: DiffState,
}

impl Differ {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a differ and compute the diff between two snapshots.
    pub fn diff(old: &Snapshot, new: &Snapshot) -> DiffResult<Self> {
        let mut differ = Self::new();
        differ.compute_snapshots(old, new)?;
        Ok(differ)
    }

    /// [`compute`](Self::compute) over two [`Snapshot`]s.
    pub fn compute_snapshots(&mut self, old: &Snapshot, new: &Snapshot) -> DiffResult<()> {
        self.compute(&old.objects, &new.objects, &old.properties, &new.properties)
    }

    /// Compute the changes that turn the old snapshot into the new one.
    ///
    /// Fails with [`DiffError::AlreadyComputed`] on a second call. If this
    /// call fails the differ stays spent and holds no changes.
    pub fn compute(
        &mut self,
        old_objects: &[ObjectRecord],
        new_objects: &[ObjectRecord],
        old_properties: &[PropertyRecord],
        new_properties: &[PropertyRecord],
    ) -> DiffResult<()> {
        if self.state != DiffState::Fresh {
            return Err(DiffError::AlreadyComputed);
        }

        self.old = SnapshotIndex::build(old_objects, old_properties);
        self.new = SnapshotIndex::build(new_objects, new_properties);

        if let Err(err) = self.compute_object_diff() {
            self.changes = ChangeSet::default();
            self.needs_all_properties.clear();
            self.tree = TreeState::default();
            self.state = DiffState::Failed;
            debug!(error = %err, "diff computation failed");
            return Err(err);
        }
        self.compute_property_diff();
        self.state = DiffState::Computed;

        debug!(
            old_objects = old_objects.len(),
            new_objects = new_objects.len(),
            to_add = self.changes.to_add().len(),
            to_remove = self.changes.to_remove().len(),
            property_changes = self.changes.property_changes().len(),
            tree_built = self.tree.is_built(),
            "diff computed"
        );
        Ok(())
    }

    fn compute_object_diff(&mut self) -> DiffResult<()> {
        let keys: BTreeSet<&ObjectId> = self
            .old
            .objects()
            .keys()
            .chain(self.new.objects().keys())
            .collect();

        let mut removed: BTreeMap<ObjectId, ObjectRecord> = BTreeMap::new();
        let mut moved: Vec<ObjectRecord> = Vec::new();

        for id in keys {
            match (self.old.object(id), self.new.object(id)) {
                (None, Some(new)) => {
                    // May already be queued as part of a moved parent's subtree.
                    self.changes.queue_addition(new.clone());
                }
                (Some(old), None) => {
                    removed.insert(id.clone(), old.clone());
                }
                (Some(old), Some(new)) if old != new => {
                    moved.push(old.clone());
                    let tree = self.tree.get_or_build(self.new.objects())?;
                    for descendant in tree.subtree(&new.id)? {
                        if let Some(record) = self.new.object(&descendant) {
                            self.changes.queue_addition(record.clone());
                        }
                        self.needs_all_properties.insert(descendant);
                    }
                }
                _ => {}
            }
        }

        // Removing an object takes its whole old subtree with it, so only the
        // topmost removal of each cluster is emitted.
        let cascading: HashSet<&ObjectId> =
            removed.keys().chain(moved.iter().map(|o| &o.id)).collect();
        for record in moved.iter().chain(removed.values()) {
            if !self.has_cascading_ancestor(record, &cascading)? {
                self.changes.queue_removal(record.clone());
            }
        }
        Ok(())
    }

    /// Whether any old-snapshot ancestor of `record` is in `cascading`.
    fn has_cascading_ancestor(
        &self,
        record: &ObjectRecord,
        cascading: &HashSet<&ObjectId>,
    ) -> DiffResult<bool> {
        let mut visited: HashSet<&ObjectId> = HashSet::new();
        visited.insert(&record.id);
        let mut parent = record.parent();
        while let Some(id) = parent {
            if cascading.contains(id) {
                return Ok(true);
            }
            if !visited.insert(id) {
                return Err(DiffError::AncestryCycle(id.clone()));
            }
            parent = self.old.object(id).and_then(ObjectRecord::parent);
        }
        Ok(false)
    }

    fn compute_property_diff(&mut self) {
        let keys: BTreeSet<&PropertyKey> = self
            .old
            .properties()
            .keys()
            .chain(self.new.properties().keys())
            .collect();

        for key in keys {
            match (self.old.property(key), self.new.property(key)) {
                (None, Some(new)) => {
                    self.changes.push_property_change(PropertyRecord::change(
                        new.object_id.clone(),
                        new.name.clone(),
                        new.data_type,
                        Value::Null,
                        new.new_value.clone(),
                    ));
                }
                (Some(old), None) => {
                    // Properties of deleted objects disappear with them.
                    if self.new.contains_object(&old.object_id) {
                        self.changes.push_property_change(PropertyRecord::change(
                            old.object_id.clone(),
                            old.name.clone(),
                            old.data_type,
                            old.new_value.clone(),
                            Value::Null,
                        ));
                    }
                }
                (Some(old), Some(new)) if !old.same_value(new) => {
                    self.changes.push_property_change(PropertyRecord::change(
                        new.object_id.clone(),
                        new.name.clone(),
                        new.data_type,
                        old.new_value.clone(),
                        new.new_value.clone(),
                    ));
                }
                (Some(_), Some(new)) if self.needs_all_properties.contains(&new.object_id) => {
                    self.changes.push_property_change(PropertyRecord::change(
                        new.object_id.clone(),
                        new.name.clone(),
                        new.data_type,
                        new.new_value.clone(),
                        new.new_value.clone(),
                    ));
                }
                _ => {}
            }
        }
    }

    pub(crate) fn ensure_computed(&self) -> DiffResult<()> {
        if self.state == DiffState::Computed {
            Ok(())
        } else {
            Err(DiffError::NotComputed)
        }
    }

    /// Whether [`compute`](Self::compute) has succeeded.
    pub fn is_computed(&self) -> bool {
        self.state == DiffState::Computed
    }

    // ---------------------------------------------------------------
    // Results
    // ---------------------------------------------------------------

    /// Objects to add. Empty before computing.
    pub fn to_add(&self) -> &[ObjectRecord] {
        self.changes.to_add()
    }

    /// Objects to remove. Empty before computing.
    pub fn to_remove(&self) -> &[ObjectRecord] {
        self.changes.to_remove()
    }

    /// Property updates. Empty before computing.
    pub fn property_changes(&self) -> &[PropertyRecord] {
        self.changes.property_changes()
    }

    pub fn change_set(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn into_change_set(self) -> ChangeSet {
        self.changes
    }

    /// Sort the additions into replay order in place.
    pub fn sort_for_replay(&mut self) -> DiffResult<()> {
        self.ensure_computed()?;
        sort_for_replay(self.changes.additions_mut(), self.new.objects())
    }

    /// The additions in replay order, without reordering the change set.
    pub fn replay_order(&self) -> DiffResult<Vec<&ObjectRecord>> {
        self.ensure_computed()?;
        let order = ReplayOrder::new(self.changes.to_add(), self.new.objects())?;
        Ok(order.ordered(self.changes.to_add()))
    }

    /// See [`ChangeSet::omit_root_object`].
    pub fn omit_root_object(
        &mut self,
        workspace_id: &ObjectId,
        new_root_id: Option<&ObjectId>,
    ) -> DiffResult<bool> {
        self.ensure_computed()?;
        Ok(self.changes.omit_root_object(workspace_id, new_root_id))
    }

    // ---------------------------------------------------------------
    // Snapshot lookups
    // ---------------------------------------------------------------

    pub fn old_snapshot(&self) -> &SnapshotIndex {
        &self.old
    }

    pub fn new_snapshot(&self) -> &SnapshotIndex {
        &self.new
    }

    /// Value of a property in the old snapshot.
    pub fn old_property_value(&self, id: &ObjectId, name: &str) -> Option<&Value> {
        self.old.property_value(id, name)
    }

    /// Value of a property in the new snapshot.
    pub fn new_property_value(&self, id: &ObjectId, name: &str) -> Option<&Value> {
        self.new.property_value(id, name)
    }

    /// The object's name in the old snapshot.
    pub fn old_object_name(&self, id: &ObjectId) -> Option<String> {
        self.old.object_name(id)
    }

    /// The object's name in the new snapshot.
    pub fn new_object_name(&self, id: &ObjectId) -> Option<String> {
        self.new.object_name(id)
    }

    /// Simple type name of an object, looked up in the old snapshot first.
    pub fn object_type(&self, id: &ObjectId) -> DiffResult<&str> {
        self.old
            .object(id)
            .or_else(|| self.new.object(id))
            .map(ObjectRecord::simple_type)
            .ok_or_else(|| DiffError::UnresolvedObject(id.clone()))
    }
}
