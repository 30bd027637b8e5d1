//! Documents, field values, and atomic write batches.

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::path::DocPath;

/// A stored document: its path plus a flat JSON object of fields.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(path: DocPath, data: Map<String, Value>) -> Self {
        Self { path, data }
    }

    /// The document ID (last path segment).
    pub fn id(&self) -> &str {
        self.path.id()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Decode into a typed record. Unknown fields are ignored.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.data.clone())).map_err(|e| StoreError::Decode {
            path: self.path.to_string(),
            message: e.to_string(),
        })
    }
}

/// A value in a write: a literal, or one of the store's sentinels.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Replaced by the store's clock (Unix millis) when the write commits.
    ServerTimestamp,
    /// Removes the field.
    Delete,
}

/// Field map for a write.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fields(BTreeMap<String, FieldValue>);

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field to a serializable value.
    ///
    /// Values that fail to serialize (non-string map keys) are stored as null.
    pub fn set(mut self, field: &str, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.0.insert(field.to_string(), FieldValue::Value(value));
        self
    }

    pub fn server_timestamp(mut self, field: &str) -> Self {
        self.0.insert(field.to_string(), FieldValue::ServerTimestamp);
        self
    }

    pub fn delete(mut self, field: &str) -> Self {
        self.0.insert(field.to_string(), FieldValue::Delete);
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// Apply these fields onto `target`, resolving sentinels with `now_ms`.
    pub fn apply_to(&self, target: &mut Map<String, Value>, now_ms: u64) {
        for (field, value) in &self.0 {
            match value {
                FieldValue::Value(v) => {
                    target.insert(field.clone(), v.clone());
                }
                FieldValue::ServerTimestamp => {
                    target.insert(field.clone(), Value::from(now_ms));
                }
                FieldValue::Delete => {
                    target.remove(field);
                }
            }
        }
    }
}

/// How a `set` treats existing fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetMode {
    /// Replace the whole document.
    Replace,
    /// Create if absent, otherwise overwrite only the given fields.
    Merge,
}

/// One write inside a batch.
#[derive(Clone, Debug, PartialEq)]
pub enum WriteOp {
    Set { path: DocPath, fields: Fields, mode: SetMode },
    /// Fails the whole batch with `NotFound` if the document is absent.
    Update { path: DocPath, fields: Fields },
    Delete { path: DocPath },
}

impl WriteOp {
    pub fn path(&self) -> &DocPath {
        match self {
            Self::Set { path, .. } | Self::Update { path, .. } | Self::Delete { path } => path,
        }
    }
}

/// An atomic multi-document write: all operations apply, or none do.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, path: DocPath, fields: Fields, mode: SetMode) -> &mut Self {
        self.ops.push(WriteOp::Set { path, fields, mode });
        self
    }

    pub fn update(&mut self, path: DocPath, fields: Fields) -> &mut Self {
        self.ops.push(WriteOp::Update { path, fields });
        self
    }

    pub fn delete(&mut self, path: DocPath) -> &mut Self {
        self.ops.push(WriteOp::Delete { path });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::CollectionPath;

    #[test]
    fn test_apply_resolves_sentinels() {
        let mut target = Map::new();
        target.insert("lockedBy".into(), Value::from("u1"));
        target.insert("title".into(), Value::from("old"));

        Fields::new()
            .set("title", "new")
            .server_timestamp("updatedAt")
            .delete("lockedBy")
            .apply_to(&mut target, 42);

        assert_eq!(target.get("title"), Some(&Value::from("new")));
        assert_eq!(target.get("updatedAt"), Some(&Value::from(42u64)));
        assert!(!target.contains_key("lockedBy"));
    }

    #[test]
    fn test_decode_reports_path() {
        let path = CollectionPath::root("boards").doc("b1");
        let doc = Document::new(path, Map::new());
        #[derive(serde::Deserialize, Debug)]
        #[allow(dead_code)]
        struct NeedsName {
            name: String,
        }
        let err = doc.decode::<NeedsName>().unwrap_err();
        assert!(matches!(err, StoreError::Decode { ref path, .. } if path == "boards/b1"));
    }
}
