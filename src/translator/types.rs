use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// How a filter combines with its siblings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    And,
    Or,
    /// Missing or unknown `type`: the filter is not applied
    #[default]
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")] Eq,
    #[serde(rename = ">")] Gt,
    #[serde(rename = ">=")] Gte,
    #[serde(rename = "<")] Lt,
    #[serde(rename = "<=")] Lte,
    #[serde(rename = "!=")] Ne,
    #[serde(rename = "containsAll")] ContainsAll,
    #[serde(rename = "startsWith")] StartsWith,
    /// Any other operator string; applied as equality
    #[serde(other)] Unrecognized,
}

impl Default for FilterOperator {
    fn default() -> Self {
        FilterOperator::Eq
    }
}

/// One filter of a request.
///
/// `value` distinguishes an absent key (`None`) from an explicit JSON null
/// (`Some(Value::Null)`); only `!=` treats the two differently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(rename = "type", default)]
    pub kind: FilterKind,
    #[serde(default)]
    pub operator: FilterOperator,
    /// Missing `field` reads as empty; the backend rejects it
    #[serde(default)]
    pub field: String,
    #[serde(default, deserialize_with = "deserialize_some", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl FilterSpec {
    pub fn and(operator: FilterOperator, field: impl Into<String>, value: Option<Value>) -> Self {
        Self { kind: FilterKind::And, operator, field: field.into(), value }
    }

    pub fn or(operator: FilterOperator, field: impl Into<String>, value: Option<Value>) -> Self {
        Self { kind: FilterKind::Or, operator, field: field.into(), value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    #[serde(default)]
    pub field: String,
    #[serde(default = "default_ascending")]
    pub ascending: bool,
}

fn default_ascending() -> bool {
    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateOperator {
    Set,
    Increment,
    Add,
    AddUnique,
    Remove,
    Unset,
    /// Any other operator string; applied as `set`
    #[serde(other)]
    Unrecognized,
}

impl Default for UpdateOperator {
    fn default() -> Self {
        UpdateOperator::Set
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSpec {
    #[serde(default)]
    pub operator: UpdateOperator,
    #[serde(default)]
    pub field: String,
    #[serde(default, deserialize_with = "deserialize_some", skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl UpdateSpec {
    pub fn new(operator: UpdateOperator, field: impl Into<String>, value: Option<Value>) -> Self {
        Self { operator, field: field.into(), value }
    }
}

/// A grant to a role (`is_role`, by `role` name) or to a user (by `id`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionSpec {
    pub is_role: bool,
    pub role: Option<String>,
    pub id: Option<String>,
    pub allow_read: bool,
    pub allow_write: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AclSpec {
    pub current_user: bool,
    pub allow_public_read: bool,
    pub allow_public_write: bool,
    pub permissions: Vec<PermissionSpec>,
}

/// Declarative description of one data request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestParams {
    pub filters: Vec<FilterSpec>,
    pub orders: Vec<OrderSpec>,
    pub includes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub updated_fields: Vec<UpdateSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<AclSpec>,
}

impl RequestParams {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()), ..Self::default() }
    }
}

/// Present-but-null deserializes to `Some(Value::Null)` instead of `None`
fn deserialize_some<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
