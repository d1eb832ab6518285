use serde_json::Value;

use super::types::{FieldDefinition, FieldValue, Model, SchemaRegistry};
use crate::backend::Record;

/// Maps records of one collection to plain `Model`s and back, guided by
/// the field definitions in a schema registry.
pub struct ModelMapper<'a> {
    collection: String,
    registry: &'a dyn SchemaRegistry,
}

impl<'a> ModelMapper<'a> {
    pub fn new(collection: impl Into<String>, registry: &'a dyn SchemaRegistry) -> Self {
        Self { collection: collection.into(), registry }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn definition(&self) -> &'a [FieldDefinition] {
        match self.registry.definition(&self.collection) {
            Some(fields) => fields,
            None => {
                tracing::warn!("No model definition for {}, mapping identity only", self.collection);
                &[]
            }
        }
    }

    /// Copy identity, timestamps and every defined field present on `record`.
    ///
    /// Pointer fields holding a full object are mapped one level deeper with
    /// their own collection's definition; bare ids pass through unchanged.
    pub fn to_plain_object(&self, record: &Record) -> Model {
        let mut model = Model::new(self.collection.clone());
        model.id = record.id().map(str::to_string);
        model.created_at = record.created_at();
        model.updated_at = record.updated_at();

        for field in self.definition() {
            let Some(value) = record.get(&field.name) else { continue };
            let mapped = if field.data_type.is_pointer() {
                self.expand_pointer(field, value)
            } else {
                FieldValue::Value(value.clone())
            };
            model.fields.insert(field.name.clone(), mapped);
        }
        model.object = Some(record.clone());
        model
    }

    fn expand_pointer(&self, field: &FieldDefinition, value: &Value) -> FieldValue {
        if !value.is_object() {
            return FieldValue::Value(value.clone());
        }
        let target = field
            .collection
            .as_deref()
            .or_else(|| value.get("className").and_then(Value::as_str));
        let Some(target) = target else {
            tracing::warn!("Pointer field {} has no target collection", field.name);
            return FieldValue::Value(value.clone());
        };
        match Record::from_json_as(value, target) {
            Some(nested) => ModelMapper::new(target, self.registry).to_plain_object(&nested).into(),
            None => FieldValue::Value(value.clone()),
        }
    }

    /// Write `model` back into a record.
    ///
    /// Starts from the record the model was mapped from, or a new one.
    /// Only defined fields present on the model are set; a pointer is set
    /// only when its nested model still carries its record.
    pub fn from_plain_object(&self, model: &Model) -> Record {
        let mut record = model.object.clone().unwrap_or_else(|| Record::new(self.collection.clone()));

        for field in self.definition() {
            let Some(value) = model.get(&field.name) else { continue };
            match (field.data_type.is_pointer(), value) {
                (true, FieldValue::Model(nested)) => {
                    if let Some(object) = &nested.object {
                        record.set_record(field.name.clone(), object);
                    }
                }
                (true, FieldValue::Value(_)) => {}
                (false, FieldValue::Value(v)) => {
                    record.set(field.name.clone(), v.clone());
                }
                (false, FieldValue::Model(nested)) => {
                    record.set(field.name.clone(), nested.to_json());
                }
            }
        }
        record
    }
}
