//! Replay ordering for object additions.
//!
//! A sink can only create an object once its parent exists, and sibling
//! indices must be filled in ascending order. [`ReplayOrder`] sorts
//! additions by how many of their ancestors are also being added, then by
//! sibling index.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use objdiff_types::{ObjectId, ObjectRecord};

use crate::error::{DiffError, DiffResult};

/// Sort key for a batch of additions.
///
/// `compare` returns `Ordering::Equal` for different objects at the same
/// depth and index, so it is not consistent with equality. Use it for
/// sorting only; it guarantees parents before children and siblings in index
/// order, nothing more.
#[derive(Clone, Debug, Default)]
pub struct ReplayOrder {
    depths: HashMap<ObjectId, usize>,
}

impl ReplayOrder {
    /// Compute the depth of every addition.
    ///
    /// The depth of a record is 0 if its parent is not being added, otherwise
    /// one more than its parent's depth. Parents are resolved through
    /// `new_objects`.
    pub fn new(
        additions: &[ObjectRecord],
        new_objects: &HashMap<ObjectId, ObjectRecord>,
    ) -> DiffResult<Self> {
        let adding: HashSet<&ObjectId> = additions.iter().map(|o| &o.id).collect();
        let mut order = Self::default();
        for record in additions {
            order.resolve_depth(record, &adding, new_objects)?;
        }
        Ok(order)
    }

    fn resolve_depth<'a>(
        &mut self,
        record: &'a ObjectRecord,
        adding: &HashSet<&ObjectId>,
        new_objects: &'a HashMap<ObjectId, ObjectRecord>,
    ) -> DiffResult<usize> {
        if let Some(&depth) = self.depths.get(&record.id) {
            return Ok(depth);
        }

        // Walk up until an ancestor with a known depth or the top of the
        // batch, remembering the unresolved ids on the way.
        let mut pending: Vec<&ObjectId> = Vec::new();
        let mut seen: HashSet<&ObjectId> = HashSet::new();
        let mut current = record;
        let mut depth = loop {
            if let Some(&known) = self.depths.get(&current.id) {
                break known;
            }
            if !seen.insert(&current.id) {
                return Err(DiffError::AncestryCycle(current.id.clone()));
            }
            let parent = current
                .parent()
                .filter(|p| adding.contains(*p))
                .and_then(|p| new_objects.get(p));
            match parent {
                Some(parent) => {
                    pending.push(&current.id);
                    current = parent;
                }
                None => {
                    self.depths.insert(current.id.clone(), 0);
                    break 0;
                }
            }
        };

        while let Some(id) = pending.pop() {
            depth += 1;
            self.depths.insert(id.clone(), depth);
        }
        Ok(depth)
    }

    /// Depth of `id` within the batch, 0 if unknown.
    pub fn depth(&self, id: &ObjectId) -> usize {
        self.depths.get(id).copied().unwrap_or(0)
    }

    /// Fewer ancestors in the batch first, then lower sibling index.
    pub fn compare(&self, a: &ObjectRecord, b: &ObjectRecord) -> Ordering {
        self.depth(&a.id)
            .cmp(&self.depth(&b.id))
            .then(a.sibling_index.cmp(&b.sibling_index))
    }

    /// References to `records` in replay order.
    pub fn ordered<'a>(&self, records: &'a [ObjectRecord]) -> Vec<&'a ObjectRecord> {
        let mut ordered: Vec<&ObjectRecord> = records.iter().collect();
        ordered.sort_by(|a, b| self.compare(a, b));
        ordered
    }
}

/// Sort `records` in place into replay order.
pub fn sort_for_replay(
    records: &mut [ObjectRecord],
    new_objects: &HashMap<ObjectId, ObjectRecord>,
) -> DiffResult<()> {
    let order = ReplayOrder::new(records, new_objects)?;
    records.sort_by(|a, b| order.compare(a, b));
    Ok(())
}
