use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Stable identifier of a persisted object.
///
/// Ids are opaque strings (typically UUIDs) that stay the same across
/// snapshots, which is what lets two snapshots be compared object by object.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(String);

impl ObjectId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty identifier.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for ObjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// One persisted node of a snapshot.
///
/// Two records are equal only when id, parent, type and sibling index all
/// match. A record whose parent or index differs between two snapshots is a
/// move, not an unchanged object.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Owning object, `None` for a top-level object.
    #[serde(default, deserialize_with = "empty_parent_as_none")]
    pub parent_id: Option<ObjectId>,
    /// Fully qualified kind of the object, e.g. `"db.Table"`.
    pub type_tag: String,
    pub id: ObjectId,
    /// Position among the children of `parent_id`.
    pub sibling_index: i32,
}

impl ObjectRecord {
    /// Create a record. An empty parent id is treated as "no parent".
    pub fn new(
        parent_id: Option<ObjectId>,
        type_tag: impl Into<String>,
        id: impl Into<ObjectId>,
        sibling_index: i32,
    ) -> Self {
        Self {
            parent_id: parent_id.filter(|p| !p.is_empty()),
            type_tag: type_tag.into(),
            id: id.into(),
            sibling_index,
        }
    }

    /// Convenience constructor for a record with a parent.
    pub fn child_of(
        parent_id: impl Into<ObjectId>,
        type_tag: impl Into<String>,
        id: impl Into<ObjectId>,
        sibling_index: i32,
    ) -> Self {
        Self::new(Some(parent_id.into()), type_tag, id, sibling_index)
    }

    /// The parent id, if any.
    pub fn parent(&self) -> Option<&ObjectId> {
        self.parent_id.as_ref()
    }

    /// Returns `true` if `parent` is this record's parent.
    pub fn is_child_of(&self, parent: &ObjectId) -> bool {
        self.parent_id.as_ref() == Some(parent)
    }

    /// The last dotted segment of the type tag (`"db.Table"` -> `"Table"`).
    pub fn simple_type(&self) -> &str {
        simple_type_name(&self.type_tag)
    }
}

/// The last dotted segment of a fully qualified type tag.
pub fn simple_type_name(type_tag: &str) -> &str {
    type_tag.rsplit('.').next().unwrap_or(type_tag)
}

fn empty_parent_as_none<'de, D>(deserializer: D) -> Result<Option<ObjectId>, D::Error>
where
    D: Deserializer<'de>,
{
    let parent = Option::<ObjectId>::deserialize(deserializer)?;
    Ok(parent.filter(|p| !p.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_parent_is_normalized() {
        let record = ObjectRecord::new(Some(ObjectId::new("")), "Folder", "1", 0);
        assert_eq!(record.parent(), None);
    }

    #[test]
    fn records_differing_only_by_index_are_unequal() {
        let a = ObjectRecord::child_of("root", "Folder", "1", 0);
        let b = ObjectRecord::child_of("root", "Folder", "1", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn simple_type_strips_namespace() {
        let record = ObjectRecord::child_of("root", "ca.example.db.Table", "t", 0);
        assert_eq!(record.simple_type(), "Table");
        assert_eq!(simple_type_name("Column"), "Column");
    }

    #[test]
    fn deserializes_empty_parent_as_none() {
        let json = r#"{"parent_id":"","type_tag":"Folder","id":"1","sibling_index":0}"#;
        let record: ObjectRecord = serde_json::from_str(json).unwrap();
        assert!(record.parent_id.is_none());

        let json = r#"{"type_tag":"Folder","id":"2","sibling_index":3}"#;
        let record: ObjectRecord = serde_json::from_str(json).unwrap();
        assert!(record.parent_id.is_none());
        assert_eq!(record.sibling_index, 3);
    }

    #[test]
    fn object_id_displays_raw_value() {
        let id = ObjectId::from("abc-123");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(format!("{id:?}"), "ObjectId(abc-123)");
    }
}
