use std::sync::Mutex;

use objdiff_types::{DataType, ObjectId};
use serde::Serialize;
use serde_json::Value;

use crate::error::SinkResult;
use crate::traits::PersistenceSink;

/// One call received by a [`RecordingSink`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PersistCall {
    Begin,
    Commit,
    Rollback,
    AddObject {
        parent_id: Option<ObjectId>,
        type_tag: String,
        id: ObjectId,
        sibling_index: i32,
    },
    RemoveObject {
        parent_id: Option<ObjectId>,
        id: ObjectId,
    },
    SetProperty {
        id: ObjectId,
        name: String,
        data_type: DataType,
        #[serde(skip_serializing_if = "Option::is_none")]
        old_value: Option<Value>,
        new_value: Value,
    },
}

impl PersistCall {
    /// Returns `true` for object removals.
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::RemoveObject { .. })
    }

    /// Returns `true` for object additions.
    pub fn is_addition(&self) -> bool {
        matches!(self, Self::AddObject { .. })
    }

    /// Returns `true` for property updates.
    pub fn is_property(&self) -> bool {
        matches!(self, Self::SetProperty { .. })
    }
}

/// Sink that accepts every call and keeps them in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<PersistCall>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The calls received so far.
    pub fn calls(&self) -> Vec<PersistCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Consume the sink, returning every call received.
    pub fn into_calls(self) -> Vec<PersistCall> {
        self.calls.into_inner().expect("lock poisoned")
    }

    fn push(&self, call: PersistCall) -> SinkResult<()> {
        self.calls.lock().expect("lock poisoned").push(call);
        Ok(())
    }
}

impl PersistenceSink for RecordingSink {
    fn begin(&self) -> SinkResult<()> {
        self.push(PersistCall::Begin)
    }

    fn commit(&self) -> SinkResult<()> {
        self.push(PersistCall::Commit)
    }

    fn rollback(&self) -> SinkResult<()> {
        self.push(PersistCall::Rollback)
    }

    fn add_object(
        &self,
        parent_id: Option<&ObjectId>,
        type_tag: &str,
        id: &ObjectId,
        sibling_index: i32,
    ) -> SinkResult<()> {
        self.push(PersistCall::AddObject {
            parent_id: parent_id.cloned(),
            type_tag: type_tag.to_owned(),
            id: id.clone(),
            sibling_index,
        })
    }

    fn remove_object(&self, parent_id: Option<&ObjectId>, id: &ObjectId) -> SinkResult<()> {
        self.push(PersistCall::RemoveObject {
            parent_id: parent_id.cloned(),
            id: id.clone(),
        })
    }

    fn set_property(
        &self,
        id: &ObjectId,
        name: &str,
        data_type: DataType,
        new_value: &Value,
    ) -> SinkResult<()> {
        self.push(PersistCall::SetProperty {
            id: id.clone(),
            name: name.to_owned(),
            data_type,
            old_value: None,
            new_value: new_value.clone(),
        })
    }

    fn set_property_conditional(
        &self,
        id: &ObjectId,
        name: &str,
        data_type: DataType,
        old_value: &Value,
        new_value: &Value,
    ) -> SinkResult<()> {
        self.push(PersistCall::SetProperty {
            id: id.clone(),
            name: name.to_owned(),
            data_type,
            old_value: Some(old_value.clone()),
            new_value: new_value.clone(),
        })
    }
}
