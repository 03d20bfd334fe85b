//! Parent/child structure of a snapshot, rebuilt from parent pointers.
//!
//! Records only know their parent. [`ObjectTree::build`] inverts that into a
//! children index so that subtrees can be enumerated. Records whose parent
//! is not part of the snapshot become top-level roots.

use std::collections::{HashMap, HashSet};

use objdiff_types::{ObjectId, ObjectRecord};
use tracing::debug;

use crate::error::{DiffError, DiffResult};

/// Children index over one snapshot.
#[derive(Clone, Debug, Default)]
pub struct ObjectTree {
    /// Records with no resolvable parent, in discovery order.
    roots: Vec<ObjectId>,
    /// parent -> children, each list ordered by sibling index.
    children: HashMap<ObjectId, Vec<ObjectId>>,
    registered: HashSet<ObjectId>,
}

impl ObjectTree {
    /// Build the tree for every record in `objects`.
    ///
    /// The first root is found by walking up from an arbitrary record. Then
    /// each record's chain of unregistered ancestors is attached, closest to
    /// the root first, under its already registered parent. Fails with
    /// [`DiffError::AncestryCycle`] if a parent chain loops.
    pub fn build(objects: &HashMap<ObjectId, ObjectRecord>) -> DiffResult<Self> {
        let mut tree = Self::default();

        let mut ids: Vec<&ObjectId> = objects.keys().collect();
        ids.sort();

        let Some(first) = ids.first().and_then(|id| objects.get(*id)) else {
            return Ok(tree);
        };
        let root = Self::top_of(first, objects)?;
        tree.registered.insert(root.id.clone());
        tree.roots.push(root.id.clone());

        for id in ids {
            let record = &objects[id];
            let chain = tree.unregistered_chain(record, objects)?;
            for ancestor in chain.into_iter().rev() {
                tree.attach(ancestor);
            }
        }

        for siblings in tree.children.values_mut() {
            siblings.sort_by(|a, b| {
                let ia = objects.get(a).map(|o| o.sibling_index);
                let ib = objects.get(b).map(|o| o.sibling_index);
                ia.cmp(&ib).then_with(|| a.cmp(b))
            });
        }

        debug!(
            objects = objects.len(),
            roots = tree.roots.len(),
            "object tree built"
        );
        Ok(tree)
    }

    /// Walk parent pointers from `record` up to a record with no resolvable
    /// parent.
    fn top_of<'a>(
        record: &'a ObjectRecord,
        objects: &'a HashMap<ObjectId, ObjectRecord>,
    ) -> DiffResult<&'a ObjectRecord> {
        let mut visited = HashSet::new();
        let mut current = record;
        visited.insert(&current.id);
        while let Some(parent) = current.parent().and_then(|p| objects.get(p)) {
            if !visited.insert(&parent.id) {
                return Err(DiffError::AncestryCycle(parent.id.clone()));
            }
            current = parent;
        }
        Ok(current)
    }

    /// `record` and its ancestors up to (not including) the first one
    /// already in the tree, nearest first.
    fn unregistered_chain<'a>(
        &self,
        record: &'a ObjectRecord,
        objects: &'a HashMap<ObjectId, ObjectRecord>,
    ) -> DiffResult<Vec<&'a ObjectRecord>> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(record);
        while let Some(node) = current {
            if self.registered.contains(&node.id) {
                break;
            }
            if !visited.insert(&node.id) {
                return Err(DiffError::AncestryCycle(node.id.clone()));
            }
            chain.push(node);
            current = node.parent().and_then(|p| objects.get(p));
        }
        Ok(chain)
    }

    fn attach(&mut self, record: &ObjectRecord) {
        match record.parent().filter(|p| self.registered.contains(*p)) {
            Some(parent) => self
                .children
                .entry(parent.clone())
                .or_default()
                .push(record.id.clone()),
            None => self.roots.push(record.id.clone()),
        }
        self.registered.insert(record.id.clone());
    }

    /// Top-level records of the snapshot.
    pub fn roots(&self) -> &[ObjectId] {
        &self.roots
    }

    /// Direct children of `id`, in sibling order.
    pub fn children(&self, id: &ObjectId) -> &[ObjectId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.registered.contains(id)
    }

    /// Number of records in the tree.
    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// `id` followed by all of its descendants, parents before children.
    pub fn subtree(&self, id: &ObjectId) -> DiffResult<Vec<ObjectId>> {
        if !self.contains(id) {
            return Err(DiffError::UnresolvedObject(id.clone()));
        }
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            result.push(current.clone());
            stack.extend(self.children(current).iter().rev());
        }
        Ok(result)
    }
}

/// The lazily built tree of a differ's new snapshot.
#[derive(Debug, Default)]
pub(crate) enum TreeState {
    #[default]
    Unbuilt,
    Built(ObjectTree),
}

impl TreeState {
    /// Build the tree on first use and return it.
    pub(crate) fn get_or_build(
        &mut self,
        objects: &HashMap<ObjectId, ObjectRecord>,
    ) -> DiffResult<&ObjectTree> {
        if let TreeState::Unbuilt = self {
            *self = TreeState::Built(ObjectTree::build(objects)?);
        }
        match &*self {
            TreeState::Built(tree) => Ok(tree),
            TreeState::Unbuilt => unreachable!("tree state is built above"),
        }
    }

    pub(crate) fn is_built(&self) -> bool {
        matches!(self, TreeState::Built(_))
    }
}
