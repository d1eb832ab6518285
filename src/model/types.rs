use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};

use crate::backend::record::encode_date;
use crate::backend::Record;
use crate::types::DataType;

/// One field of a collection's model definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    /// Target collection; only meaningful for `Pointer` fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self { name: name.into(), data_type, collection: None }
    }

    pub fn pointer(name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self { name: name.into(), data_type: DataType::Pointer, collection: Some(collection.into()) }
    }
}

/// Where model definitions are looked up, by collection name
pub trait SchemaRegistry {
    fn definition(&self, collection: &str) -> Option<&[FieldDefinition]>;
}

impl SchemaRegistry for HashMap<String, Vec<FieldDefinition>> {
    fn definition(&self, collection: &str) -> Option<&[FieldDefinition]> {
        self.get(collection).map(Vec::as_slice)
    }
}

impl SchemaRegistry for BTreeMap<String, Vec<FieldDefinition>> {
    fn definition(&self, collection: &str) -> Option<&[FieldDefinition]> {
        self.get(collection).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// An expanded pointer
    Model(Box<Model>),
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<Model> for FieldValue {
    fn from(model: Model) -> Self {
        FieldValue::Model(Box::new(model))
    }
}

/// Plain data view of a record: identity, timestamps and defined fields.
///
/// `object` keeps the record the model was mapped from, so it can be
/// written back with only the changed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub collection: String,
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub fields: BTreeMap<String, FieldValue>,
    pub object: Option<Record>,
}

impl Model {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: None,
            created_at: None,
            updated_at: None,
            fields: BTreeMap::new(),
            object: None,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Raw value of a field, `None` for missing fields and nested models
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.fields.get(name)? {
            FieldValue::Value(v) => Some(v),
            FieldValue::Model(_) => None,
        }
    }

    pub fn nested(&self, name: &str) -> Option<&Model> {
        match self.fields.get(name)? {
            FieldValue::Model(m) => Some(m),
            FieldValue::Value(_) => None,
        }
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        if let Some(id) = &self.id {
            out.insert("id".to_string(), json!(id));
        }
        if let Some(created_at) = self.created_at {
            out.insert("createdAt".to_string(), json!(encode_date(created_at)));
        }
        if let Some(updated_at) = self.updated_at {
            out.insert("updatedAt".to_string(), json!(encode_date(updated_at)));
        }
        for (name, value) in &self.fields {
            let value = match value {
                FieldValue::Value(v) => v.clone(),
                FieldValue::Model(m) => m.to_json(),
            };
            out.insert(name.clone(), value);
        }
        Value::Object(out)
    }
}
