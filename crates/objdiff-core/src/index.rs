//! Identity maps over flat snapshot lists.

use std::collections::HashMap;

use objdiff_types::{ObjectId, ObjectRecord, PropertyKey, PropertyRecord};
use serde_json::Value;

/// Map each object record by its id. Later records win on duplicate ids.
pub fn index_objects(objects: &[ObjectRecord]) -> HashMap<ObjectId, ObjectRecord> {
    objects.iter().map(|o| (o.id.clone(), o.clone())).collect()
}

/// Map each property record by its `(object id, name)` key. Later records
/// win on duplicate keys.
pub fn index_properties(properties: &[PropertyRecord]) -> HashMap<PropertyKey, PropertyRecord> {
    properties.iter().map(|p| (p.key(), p.clone())).collect()
}

/// Object and property lookup for one snapshot.
#[derive(Clone, Debug, Default)]
pub struct SnapshotIndex {
    objects: HashMap<ObjectId, ObjectRecord>,
    properties: HashMap<PropertyKey, PropertyRecord>,
}

impl SnapshotIndex {
    pub fn build(objects: &[ObjectRecord], properties: &[PropertyRecord]) -> Self {
        Self {
            objects: index_objects(objects),
            properties: index_properties(properties),
        }
    }

    pub fn objects(&self) -> &HashMap<ObjectId, ObjectRecord> {
        &self.objects
    }

    pub fn properties(&self) -> &HashMap<PropertyKey, PropertyRecord> {
        &self.properties
    }

    pub fn object(&self, id: &ObjectId) -> Option<&ObjectRecord> {
        self.objects.get(id)
    }

    pub fn contains_object(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn property(&self, key: &PropertyKey) -> Option<&PropertyRecord> {
        self.properties.get(key)
    }

    /// The value of property `name` on object `id`.
    pub fn property_value(&self, id: &ObjectId, name: &str) -> Option<&Value> {
        self.properties
            .get(&PropertyKey::new(id.clone(), name))
            .map(|p| &p.new_value)
    }

    /// The object's `name` property as text.
    pub fn object_name(&self, id: &ObjectId) -> Option<String> {
        match self.property_value(id, "name")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use objdiff_types::DataType;
    use serde_json::json;

    #[test]
    fn later_duplicates_overwrite_earlier_ones() {
        let objects = vec![
            ObjectRecord::child_of("ws", "Folder", "1", 0),
            ObjectRecord::child_of("ws", "Folder", "1", 5),
        ];
        let map = index_objects(&objects);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&ObjectId::new("1")].sibling_index, 5);

        let properties = vec![
            PropertyRecord::snapshot("1", "name", DataType::String, json!("a")),
            PropertyRecord::snapshot("1", "name", DataType::String, json!("b")),
        ];
        let map = index_properties(&properties);
        assert_eq!(map.len(), 1);
        assert_eq!(map[&PropertyKey::new("1", "name")].new_value, json!("b"));
    }

    #[test]
    fn property_keys_do_not_collide_on_concatenation() {
        let properties = vec![
            PropertyRecord::snapshot("ab", "c", DataType::String, json!("first")),
            PropertyRecord::snapshot("a", "bc", DataType::String, json!("second")),
        ];
        assert_eq!(index_properties(&properties).len(), 2);
    }

    #[test]
    fn object_name_reads_name_property() {
        let index = SnapshotIndex::build(
            &[ObjectRecord::child_of("ws", "Table", "t", 0)],
            &[
                PropertyRecord::snapshot("t", "name", DataType::String, json!("orders")),
                PropertyRecord::snapshot("n", "name", DataType::Integer, json!(7)),
            ],
        );
        assert_eq!(index.object_name(&ObjectId::new("t")).as_deref(), Some("orders"));
        assert_eq!(index.object_name(&ObjectId::new("n")).as_deref(), Some("7"));
        assert_eq!(index.object_name(&ObjectId::new("missing")), None);
        assert!(index.contains_object(&ObjectId::new("t")));
    }
}
