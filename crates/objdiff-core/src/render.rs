//! Human-readable display tree of a computed diff.
//!
//! [`Differ::display_tree`] classifies every changed object, fills in its
//! unchanged ancestors, and returns the result as a pre-order list rooted
//! at a chosen object. [`render_text`] turns that list into an indented
//! summary.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use objdiff_types::{ObjectId, PropertyRecord};
use serde::Serialize;
use tracing::{debug, warn};

use crate::differ::Differ;
use crate::error::{DiffError, DiffResult};
use crate::index::SnapshotIndex;

/// How an object differs between the two snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Unchanged, shown only because a descendant changed.
    Same,
    /// Only in the old snapshot.
    LeftOnly,
    /// Only in the new snapshot, or moved to a new place in it.
    RightOnly,
    /// In both, with changed properties.
    Modified,
}

impl ChangeKind {
    pub fn marker(self) -> char {
        match self {
            ChangeKind::Same => ' ',
            ChangeKind::LeftOnly => '-',
            ChangeKind::RightOnly => '+',
            ChangeKind::Modified => '~',
        }
    }
}

/// A formatted old/new pair for one property.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PropertyChange {
    pub name: String,
    pub old_value: String,
    pub new_value: String,
}

impl PropertyChange {
    fn from_record(record: &PropertyRecord) -> Self {
        Self {
            name: record.name.clone(),
            old_value: record.old_value_text(),
            new_value: record.new_value_text(),
        }
    }
}

impl fmt::Display for PropertyChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.name, self.old_value, self.new_value)
    }
}

/// One object in the display tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DisplayEntry {
    pub id: ObjectId,
    pub kind: ChangeKind,
    /// Simple type name.
    pub type_name: String,
    /// The object's `name` property, if it has one.
    pub name: Option<String>,
    /// Distance from the display root; direct children are at depth 0.
    pub depth: usize,
    pub property_changes: Vec<PropertyChange>,
}

impl fmt::Display for DisplayEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.marker(), self.type_name)?;
        match &self.name {
            Some(name) => write!(f, " {name}"),
            None => write!(f, " [{}]", self.id),
        }
    }
}

/// Decides which property changes are shown next to a modified object.
pub trait PropertyFilter {
    /// `type_tag` is the object's full type tag.
    fn is_interesting(&self, type_tag: &str, property: &str) -> bool;
}

impl<F> PropertyFilter for F
where
    F: Fn(&str, &str) -> bool,
{
    fn is_interesting(&self, type_tag: &str, property: &str) -> bool {
        self(type_tag, property)
    }
}

/// Shows every property change.
#[derive(Clone, Copy, Debug, Default)]
pub struct AllProperties;

impl PropertyFilter for AllProperties {
    fn is_interesting(&self, _type_tag: &str, _property: &str) -> bool {
        true
    }
}

#[derive(Debug)]
struct Classified {
    kind: ChangeKind,
    type_name: String,
    name: Option<String>,
    property_changes: Vec<PropertyChange>,
}

impl Differ {
    /// Build the display tree below `root_id`.
    ///
    /// Removed objects are labelled from the old snapshot and placed by
    /// their old parent; added and moved objects are labelled from the new
    /// snapshot and placed by their new parent. Objects with property
    /// changes are `Modified` unless already classified. Unchanged
    /// ancestors on the way up to `root_id` are filled in as `Same`.
    ///
    /// Fails with [`DiffError::UnresolvedObject`] if a change refers to an
    /// object in neither snapshot. Objects that cannot be connected to
    /// `root_id` are left out.
    pub fn display_tree(
        &self,
        root_id: &ObjectId,
        filter: &dyn PropertyFilter,
    ) -> DiffResult<Vec<DisplayEntry>> {
        self.ensure_computed()?;
        let old = self.old_snapshot();
        let new = self.new_snapshot();

        let mut entries: BTreeMap<ObjectId, Classified> = BTreeMap::new();
        let mut parents: HashMap<ObjectId, ObjectId> = HashMap::new();

        for record in self.to_remove() {
            // A moved object is shown once, under its new parent.
            if self.change_set().is_queued_for_addition(&record.id) {
                continue;
            }
            entries.insert(
                record.id.clone(),
                Classified {
                    kind: ChangeKind::LeftOnly,
                    type_name: self.object_type(&record.id)?.to_owned(),
                    name: self.old_object_name(&record.id),
                    property_changes: Vec::new(),
                },
            );
            record_ancestry(&record.id, root_id, old, &mut parents);
        }

        for record in self.to_add() {
            entries.insert(
                record.id.clone(),
                Classified {
                    kind: ChangeKind::RightOnly,
                    type_name: self.object_type(&record.id)?.to_owned(),
                    name: self.new_object_name(&record.id),
                    property_changes: Vec::new(),
                },
            );
            record_ancestry(&record.id, root_id, new, &mut parents);
        }

        for change in self.property_changes() {
            let id = &change.object_id;
            if !entries.contains_key(id) {
                entries.insert(
                    id.clone(),
                    Classified {
                        kind: ChangeKind::Modified,
                        type_name: self.object_type(id)?.to_owned(),
                        name: self.old_object_name(id),
                        property_changes: Vec::new(),
                    },
                );
                let index = if old.contains_object(id) { old } else { new };
                record_ancestry(id, root_id, index, &mut parents);
            }

            let Some(entry) = entries.get_mut(id) else {
                continue;
            };
            if entry.kind != ChangeKind::Modified {
                continue;
            }
            let type_tag = old
                .object(id)
                .or_else(|| new.object(id))
                .map(|o| o.type_tag.as_str())
                .ok_or_else(|| DiffError::UnresolvedObject(id.clone()))?;
            if filter.is_interesting(type_tag, &change.name) {
                let formatted = PropertyChange::from_record(change);
                debug!(object = %id, change = %formatted, "property change");
                entry.property_changes.push(formatted);
            }
        }

        entries.remove(root_id);
        parents.remove(root_id);

        self.fill_unchanged_ancestors(root_id, &mut entries, &mut parents);

        Ok(self.assemble(root_id, entries, &parents))
    }

    /// Add a `Same` entry for every ancestor between a changed object and
    /// the root that is not itself changed.
    fn fill_unchanged_ancestors(
        &self,
        root_id: &ObjectId,
        entries: &mut BTreeMap<ObjectId, Classified>,
        parents: &mut HashMap<ObjectId, ObjectId>,
    ) {
        let old = self.old_snapshot();
        let new = self.new_snapshot();
        let mut leaves: Vec<ObjectId> = parents.keys().cloned().collect();
        leaves.sort();

        for leaf in leaves {
            let Some(mut next) = parents.get(&leaf).cloned() else {
                continue;
            };
            while &next != root_id && !entries.contains_key(&next) {
                let Some(record) = old.object(&next).or_else(|| new.object(&next)) else {
                    break;
                };
                entries.insert(
                    next.clone(),
                    Classified {
                        kind: ChangeKind::Same,
                        type_name: record.simple_type().to_owned(),
                        name: old.object_name(&next).or_else(|| new.object_name(&next)),
                        property_changes: Vec::new(),
                    },
                );
                let Some(parent) = record.parent().cloned() else {
                    break;
                };
                parents.insert(next, parent.clone());
                next = parent;
            }
        }
    }

    /// Pre-order walk from `root_id` over the classified entries.
    fn assemble(
        &self,
        root_id: &ObjectId,
        mut entries: BTreeMap<ObjectId, Classified>,
        parents: &HashMap<ObjectId, ObjectId>,
    ) -> Vec<DisplayEntry> {
        let mut children: HashMap<&ObjectId, Vec<&ObjectId>> = HashMap::new();
        for id in entries.keys() {
            if let Some(parent) = parents.get(id) {
                children.entry(parent).or_default().push(id);
            }
        }
        for siblings in children.values_mut() {
            siblings.sort_by_key(|id| (self.display_index(id), *id));
        }

        let mut order: Vec<(ObjectId, usize)> = Vec::new();
        let mut stack: Vec<(&ObjectId, usize)> = children
            .get(root_id)
            .map(|kids| kids.iter().rev().map(|id| (*id, 0)).collect())
            .unwrap_or_default();
        while let Some((id, depth)) = stack.pop() {
            order.push((id.clone(), depth));
            if let Some(kids) = children.get(id) {
                stack.extend(kids.iter().rev().map(|kid| (*kid, depth + 1)));
            }
        }

        let mut result = Vec::with_capacity(order.len());
        for (id, depth) in order {
            if let Some(entry) = entries.remove(&id) {
                result.push(DisplayEntry {
                    id,
                    kind: entry.kind,
                    type_name: entry.type_name,
                    name: entry.name,
                    depth,
                    property_changes: entry.property_changes,
                });
            }
        }
        for id in entries.keys() {
            warn!(object = %id, root = %root_id, "changed object is not below the display root");
        }
        result
    }

    /// Sibling index for display ordering: new snapshot first, then old.
    fn display_index(&self, id: &ObjectId) -> i32 {
        self.new_snapshot()
            .object(id)
            .or_else(|| self.old_snapshot().object(id))
            .map(|o| o.sibling_index)
            .unwrap_or(i32::MAX)
    }
}

/// Record the parent of `id` and of each ancestor not yet recorded, up to
/// `root_id`. The parent of `id` itself is always overwritten so that an
/// object classified twice is placed by its last classification.
fn record_ancestry(
    id: &ObjectId,
    root_id: &ObjectId,
    index: &SnapshotIndex,
    parents: &mut HashMap<ObjectId, ObjectId>,
) {
    if id == root_id {
        return;
    }
    let Some(mut next) = index.object(id).and_then(|o| o.parent()).cloned() else {
        return;
    };
    parents.insert(id.clone(), next.clone());
    while &next != root_id && !parents.contains_key(&next) {
        let Some(parent) = index.object(&next).and_then(|o| o.parent()).cloned() else {
            break;
        };
        parents.insert(next, parent.clone());
        next = parent;
    }
}

/// Render display entries as indented lines with property changes below
/// their object.
pub fn render_text(entries: &[DisplayEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let indent = "  ".repeat(entry.depth);
        out.push_str(&format!("{indent}{entry}\n"));
        for change in &entry.property_changes {
            out.push_str(&format!("{indent}    {change}\n"));
        }
    }
    out
}
