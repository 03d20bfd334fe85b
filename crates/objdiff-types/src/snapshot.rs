//! Flat point-in-time snapshots of an object graph and their JSON form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::object::{ObjectId, ObjectRecord};
use crate::property::{DataType, PropertyRecord};

/// One point-in-time state of a workspace: its objects and property values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    pub objects: Vec<ObjectRecord>,
    pub properties: Vec<PropertyRecord>,
}

/// On-disk shape of a snapshot. Properties carry a single `value`.
#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    #[serde(default)]
    objects: Vec<ObjectRecord>,
    #[serde(default)]
    properties: Vec<SnapshotProperty>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotProperty {
    object_id: ObjectId,
    name: String,
    data_type: DataType,
    #[serde(default)]
    value: Value,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, object: ObjectRecord) -> Self {
        self.objects.push(object);
        self
    }

    pub fn with_property(
        mut self,
        object_id: impl Into<ObjectId>,
        name: impl Into<String>,
        data_type: DataType,
        value: Value,
    ) -> Self {
        self.properties
            .push(PropertyRecord::snapshot(object_id, name, data_type, value));
        self
    }

    /// Returns `true` if the snapshot holds no objects and no properties.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.properties.is_empty()
    }

    /// Sort objects by id and properties by key so that snapshots with the
    /// same content compare equal regardless of record order.
    pub fn normalized(mut self) -> Self {
        self.objects.sort_by(|a, b| a.id.cmp(&b.id));
        self.properties
            .sort_by(|a, b| (&a.object_id, &a.name).cmp(&(&b.object_id, &b.name)));
        self
    }

    /// Reject records with empty ids or property names.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.objects.iter().any(|o| o.id.is_empty()) {
            return Err(TypeError::EmptyObjectId);
        }
        for p in &self.properties {
            if p.object_id.is_empty() {
                return Err(TypeError::EmptyPropertyOwner {
                    name: p.name.clone(),
                });
            }
            if p.name.is_empty() {
                return Err(TypeError::EmptyPropertyName(p.object_id.to_string()));
            }
        }
        Ok(())
    }

    /// Parse and validate a snapshot from its JSON form.
    pub fn from_json_str(json: &str) -> Result<Self, TypeError> {
        let file: SnapshotFile =
            serde_json::from_str(json).map_err(|e| TypeError::Serialization(e.to_string()))?;
        let snapshot = Self {
            objects: file.objects,
            properties: file
                .properties
                .into_iter()
                .map(|p| PropertyRecord::snapshot(p.object_id, p.name, p.data_type, p.value))
                .collect(),
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Pretty-printed JSON form. Properties are written with their new value.
    pub fn to_json_string(&self) -> Result<String, TypeError> {
        let file = SnapshotFile {
            objects: self.objects.clone(),
            properties: self
                .properties
                .iter()
                .map(|p| SnapshotProperty {
                    object_id: p.object_id.clone(),
                    name: p.name.clone(),
                    data_type: p.data_type,
                    value: p.new_value.clone(),
                })
                .collect(),
        };
        serde_json::to_string_pretty(&file).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
