//! The result of a diff: additions, removals and property changes.

use std::collections::HashSet;

use objdiff_types::{ObjectId, ObjectRecord, PropertyRecord};
use serde::Serialize;

/// The calculated difference between two snapshots.
///
/// - `to_add`: objects to create, including every moved object and its whole
///   new subtree. Each id appears at most once.
/// - `to_remove`: the topmost object of each removed or moved cluster; its
///   descendants go with it.
/// - `property_changes`: synthesized property records (`from_diff == true`).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    to_add: Vec<ObjectRecord>,
    to_remove: Vec<ObjectRecord>,
    property_changes: Vec<PropertyRecord>,
    #[serde(skip)]
    queued_additions: HashSet<ObjectId>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects to add, in the order they were queued.
    pub fn to_add(&self) -> &[ObjectRecord] {
        &self.to_add
    }

    /// Objects to remove.
    pub fn to_remove(&self) -> &[ObjectRecord] {
        &self.to_remove
    }

    /// Property updates.
    pub fn property_changes(&self) -> &[PropertyRecord] {
        &self.property_changes
    }

    /// Returns `true` if the snapshots were identical.
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty() && self.property_changes.is_empty()
    }

    /// Whether `id` is queued for addition.
    pub fn is_queued_for_addition(&self, id: &ObjectId) -> bool {
        self.queued_additions.contains(id)
    }

    /// Queue `record` for addition unless its id is already queued.
    /// Returns `true` if it was added.
    pub(crate) fn queue_addition(&mut self, record: ObjectRecord) -> bool {
        if !self.queued_additions.insert(record.id.clone()) {
            return false;
        }
        self.to_add.push(record);
        true
    }

    pub(crate) fn queue_removal(&mut self, record: ObjectRecord) {
        self.to_remove.push(record);
    }

    pub(crate) fn push_property_change(&mut self, change: PropertyRecord) {
        self.property_changes.push(change);
    }

    pub(crate) fn additions_mut(&mut self) -> &mut [ObjectRecord] {
        &mut self.to_add
    }

    /// Drop the workspace root object from the additions.
    ///
    /// Finds the first queued addition whose parent is `workspace_id`, drops
    /// it and its property changes, and re-parents its queued children onto
    /// `new_root_id` when one is given. Children keep their position in the
    /// addition order. Returns `false` if no such root is queued.
    pub fn omit_root_object(&mut self, workspace_id: &ObjectId, new_root_id: Option<&ObjectId>) -> bool {
        let Some(position) = self.to_add.iter().position(|o| o.is_child_of(workspace_id)) else {
            return false;
        };
        let root = self.to_add.remove(position);
        self.queued_additions.remove(&root.id);
        self.property_changes.retain(|p| p.object_id != root.id);

        if let Some(new_root) = new_root_id {
            for child in self.to_add.iter_mut().filter(|o| o.is_child_of(&root.id)) {
                child.parent_id = Some(new_root.clone());
            }
        }
        true
    }
}
