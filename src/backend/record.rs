use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Number, Value};
use std::collections::BTreeMap;

use crate::backend::acl::Acl;

/// Keys that belong to the object envelope rather than its field map
const ENVELOPE_KEYS: &[&str] = &["__type", "className", "objectId", "createdAt", "updatedAt", "ACL"];

/// Change waiting to be saved for one field.
///
/// `Set` sends the record's local value. The others are applied by the
/// backend to the value it has stored, and fail there when that value has
/// the wrong type.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set,
    Unset,
    Increment(Number),
    Add(Vec<Value>),
    AddUnique(Vec<Value>),
    Remove(Vec<Value>),
}

/// A backend-native object with change tracking.
///
/// Field values are plain JSON in the backend's REST encoding. Every mutation
/// records a pending `FieldOp` for its key so a save only has to send what
/// changed. Array and counter mutations on a local value of the wrong type
/// leave the value alone; the save is then rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    class_name: String,
    id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    fields: Map<String, Value>,
    ops: BTreeMap<String, FieldOp>,
    acl: Option<Acl>,
    acl_dirty: bool,
}

impl Record {
    /// Create a new, unsaved record in a collection
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            id: None,
            created_at: None,
            updated_at: None,
            fields: Map::new(),
            ops: BTreeMap::new(),
            acl: None,
            acl_dirty: false,
        }
    }

    /// Reference an existing object by id without any of its data
    pub fn with_id(class_name: impl Into<String>, id: impl Into<String>) -> Self {
        let mut record = Self::new(class_name);
        record.id = Some(id.into());
        record
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn acl(&self) -> Option<&Acl> {
        self.acl.as_ref()
    }

    // ========================================
    // Field mutations
    // ========================================

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        let key = key.into();
        self.fields.insert(key.clone(), value.into());
        self.ops.insert(key, FieldOp::Set);
        self
    }

    /// Point a field at another record, keeping its encoded data inline
    pub fn set_record(&mut self, key: impl Into<String>, record: &Record) -> &mut Self {
        self.set(key, record.to_json())
    }

    /// Add 1 to a numeric field; a missing field becomes 1
    pub fn increment(&mut self, key: &str) -> &mut Self {
        self.increment_by(key, 1)
    }

    pub fn increment_by(&mut self, key: &str, amount: i64) -> &mut Self {
        let amount = Number::from(amount);
        let next = match self.fields.get(key) {
            None | Some(Value::Null) => Some(Value::Number(amount.clone())),
            Some(Value::Number(n)) => Some(add_numbers(n, &amount)),
            Some(_) => None,
        };
        let op = match (self.ops.get(key), &next) {
            (Some(FieldOp::Increment(pending)), _) => FieldOp::Increment(number(add_numbers(pending, &amount))),
            (Some(FieldOp::Set | FieldOp::Unset), Some(_)) => FieldOp::Set,
            _ => FieldOp::Increment(amount),
        };
        if let Some(next) = next {
            self.fields.insert(key.to_string(), next);
        }
        self.ops.insert(key.to_string(), op);
        self
    }

    /// Append an item to an array field
    pub fn add(&mut self, key: &str, item: impl Into<Value>) -> &mut Self {
        let item = item.into();
        let next = self.local_array(key).map(|mut items| {
            items.push(item.clone());
            items
        });
        self.record_array_op(key, next, FieldOp::Add(vec![item]))
    }

    /// Append an item to an array field unless an equal item is present
    pub fn add_unique(&mut self, key: &str, item: impl Into<Value>) -> &mut Self {
        let item = item.into();
        let next = self.local_array(key).map(|mut items| {
            if !items.contains(&item) {
                items.push(item.clone());
            }
            items
        });
        self.record_array_op(key, next, FieldOp::AddUnique(vec![item]))
    }

    /// Drop every occurrence of an item from an array field
    pub fn remove(&mut self, key: &str, item: impl Into<Value>) -> &mut Self {
        let item = item.into();
        let next = self.local_array(key).map(|mut items| {
            items.retain(|existing| existing != &item);
            items
        });
        self.record_array_op(key, next, FieldOp::Remove(vec![item]))
    }

    pub fn unset(&mut self, key: &str) -> &mut Self {
        self.fields.remove(key);
        self.ops.insert(key.to_string(), FieldOp::Unset);
        self
    }

    pub fn set_acl(&mut self, acl: Acl) -> &mut Self {
        self.acl = Some(acl);
        self.acl_dirty = true;
        self
    }

    /// Local array value; a missing field counts as empty, other types as `None`
    fn local_array(&self, key: &str) -> Option<Vec<Value>> {
        match self.fields.get(key) {
            None | Some(Value::Null) => Some(Vec::new()),
            Some(Value::Array(items)) => Some(items.clone()),
            Some(_) => None,
        }
    }

    /// Same-kind array ops accumulate; after any other change the local
    /// value is sent as a whole
    fn record_array_op(&mut self, key: &str, next: Option<Vec<Value>>, op: FieldOp) -> &mut Self {
        let op = match (self.ops.remove(key), op, &next) {
            (Some(FieldOp::Add(mut pending)), FieldOp::Add(items), _) => {
                pending.extend(items);
                FieldOp::Add(pending)
            }
            (Some(FieldOp::AddUnique(mut pending)), FieldOp::AddUnique(items), _) => {
                pending.extend(items);
                FieldOp::AddUnique(pending)
            }
            (Some(FieldOp::Remove(mut pending)), FieldOp::Remove(items), _) => {
                pending.extend(items);
                FieldOp::Remove(pending)
            }
            (Some(_), _, Some(_)) => FieldOp::Set,
            (_, op, _) => op,
        };
        if let Some(next) = next {
            self.fields.insert(key.to_string(), Value::Array(next));
        }
        self.ops.insert(key.to_string(), op);
        self
    }

    // ========================================
    // Change tracking
    // ========================================

    pub fn is_dirty(&self) -> bool {
        !self.ops.is_empty() || self.acl_dirty
    }

    pub fn dirty_keys(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }

    pub fn pending_op(&self, key: &str) -> Option<&FieldOp> {
        self.ops.get(key)
    }

    pub fn pending_ops(&self) -> impl Iterator<Item = (&str, &FieldOp)> {
        self.ops.iter().map(|(key, op)| (key.as_str(), op))
    }

    pub fn is_acl_dirty(&self) -> bool {
        self.acl_dirty
    }

    /// Stamp identity after the backend persisted the record
    pub(crate) fn mark_saved(&mut self, id: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) {
        self.id = Some(id);
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
        self.ops.clear();
        self.acl_dirty = false;
    }

    // ========================================
    // Encoding
    // ========================================

    /// Full object encoding, as the backend returns it for included pointers
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("__type".to_string(), json!("Object"));
        out.insert("className".to_string(), json!(self.class_name));
        if let Some(id) = &self.id {
            out.insert("objectId".to_string(), json!(id));
        }
        if let Some(created_at) = self.created_at {
            out.insert("createdAt".to_string(), json!(encode_date(created_at)));
        }
        if let Some(updated_at) = self.updated_at {
            out.insert("updatedAt".to_string(), json!(encode_date(updated_at)));
        }
        if let Some(acl) = &self.acl {
            out.insert("ACL".to_string(), acl.to_json());
        }
        for (key, value) in &self.fields {
            out.insert(key.clone(), value.clone());
        }
        Value::Object(out)
    }

    /// Pointer encoding; `None` until the record has an id
    pub fn to_pointer(&self) -> Option<Value> {
        self.id.as_ref().map(|id| {
            json!({ "__type": "Pointer", "className": self.class_name, "objectId": id })
        })
    }

    /// Decode an object or pointer encoding. Requires `className`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let class_name = value.get("className")?.as_str()?;
        Self::from_json_as(value, class_name)
    }

    /// Decode any JSON object as a record, using `class_name` when the
    /// encoding carries none. Accepts `objectId` or `id` for the identifier.
    /// Returns `None` for primitives and arrays.
    pub fn from_json_as(value: &Value, class_name: &str) -> Option<Self> {
        let obj = value.as_object()?;
        let class_name = obj.get("className").and_then(Value::as_str).unwrap_or(class_name);
        let id_key = if obj.contains_key("objectId") { "objectId" } else { "id" };
        let mut record = Self::new(class_name);
        record.id = obj.get(id_key).and_then(Value::as_str).map(str::to_string);
        record.created_at = obj.get("createdAt").and_then(decode_date);
        record.updated_at = obj.get("updatedAt").and_then(decode_date);
        record.acl = obj.get("ACL").and_then(|acl| serde_json::from_value(acl.clone()).ok());

        for (key, value) in obj {
            if key == id_key || ENVELOPE_KEYS.contains(&key.as_str()) {
                continue;
            }
            record.fields.insert(key.clone(), value.clone());
        }
        Some(record)
    }
}

/// Integer sum when both sides are integers, float sum otherwise
pub(crate) fn add_numbers(a: &Number, b: &Number) -> Value {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => json!(x.saturating_add(y)),
        _ => json!(a.as_f64().unwrap_or(0.0) + b.as_f64().unwrap_or(0.0)),
    }
}

fn number(value: Value) -> Number {
    match value {
        Value::Number(n) => n,
        _ => Number::from(0),
    }
}

pub(crate) fn encode_date(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Accepts both a bare ISO string and the `{"__type": "Date", "iso": ..}` form
pub(crate) fn decode_date(value: &Value) -> Option<DateTime<Utc>> {
    let iso = match value {
        Value::String(s) => s.as_str(),
        Value::Object(obj) => obj.get("iso")?.as_str()?,
        _ => return None,
    };
    DateTime::parse_from_rfc3339(iso).ok().map(|dt| dt.with_timezone(&Utc))
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record({}, id: {:?}, fields: {}, dirty: {})",
            self.class_name,
            self.id,
            self.fields.len(),
            self.is_dirty()
        )
    }
}
