use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::object::ObjectId;

/// Semantic type of a property value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Integer,
    Long,
    Double,
    Boolean,
    /// Id of another persisted object.
    Reference,
    /// Base64-encoded image data.
    PngImage,
    Null,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Long => "long",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Reference => "reference",
            Self::PngImage => "png_image",
            Self::Null => "null",
        };
        f.write_str(s)
    }
}

/// Identity of a property: the owning object plus the property name.
///
/// Kept as a pair so that no combination of id and name can collide with
/// another.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PropertyKey {
    pub object_id: ObjectId,
    pub name: String,
}

impl PropertyKey {
    pub fn new(object_id: impl Into<ObjectId>, name: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.object_id, self.name)
    }
}

/// One named property value of one object.
///
/// Records read from a snapshot carry a single point-in-time value
/// (`old_value == new_value`, `from_diff == false`). Records produced by the
/// differ carry distinct before/after values and have `from_diff == true`.
/// `Value::Null` stands for an absent value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub object_id: ObjectId,
    pub name: String,
    pub data_type: DataType,
    pub old_value: Value,
    pub new_value: Value,
    pub from_diff: bool,
}

impl PropertyRecord {
    /// A raw snapshot value.
    pub fn snapshot(
        object_id: impl Into<ObjectId>,
        name: impl Into<String>,
        data_type: DataType,
        value: Value,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            name: name.into(),
            data_type,
            old_value: value.clone(),
            new_value: value,
            from_diff: false,
        }
    }

    /// A synthesized change from `old_value` to `new_value`.
    pub fn change(
        object_id: impl Into<ObjectId>,
        name: impl Into<String>,
        data_type: DataType,
        old_value: Value,
        new_value: Value,
    ) -> Self {
        Self {
            object_id: object_id.into(),
            name: name.into(),
            data_type,
            old_value,
            new_value,
            from_diff: true,
        }
    }

    /// The identity of this property.
    pub fn key(&self) -> PropertyKey {
        PropertyKey::new(self.object_id.clone(), self.name.clone())
    }

    /// Whether two point-in-time records hold the same typed value.
    pub fn same_value(&self, other: &PropertyRecord) -> bool {
        self.data_type == other.data_type && self.new_value == other.new_value
    }

    /// Human-readable rendering of the old value.
    pub fn old_value_text(&self) -> String {
        display_value(self.data_type, &self.old_value)
    }

    /// Human-readable rendering of the new value.
    pub fn new_value_text(&self) -> String {
        display_value(self.data_type, &self.new_value)
    }
}

/// Render a property value for people: `null` for absent values, string
/// typed values in double quotes, everything else in its JSON form.
pub fn display_value(data_type: DataType, value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::String(s) if data_type == DataType::String => format!("\"{s}\""),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
