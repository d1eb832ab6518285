use serde_json::{json, Map, Value};

/// A single predicate on one field
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    EqualTo(Value),
    NotEqualTo(Value),
    GreaterThan(Value),
    GreaterThanOrEqualTo(Value),
    LessThan(Value),
    LessThanOrEqualTo(Value),
    Exists,
    ContainsAll(Value),
    StartsWith(Value),
}

/// One conjunct of a query's where clause
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Field { field: String, predicate: Predicate },
    /// Matches when any of the branches matches
    Or(Vec<Vec<Constraint>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

/// Backend-native query over one collection.
///
/// Constraints, sort keys and includes are kept in the order they were added.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    class_name: String,
    constraints: Vec<Constraint>,
    order: Vec<SortKey>,
    include: Vec<String>,
}

impl Query {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            constraints: vec![],
            order: vec![],
            include: vec![],
        }
    }

    /// Disjunction of the where clauses of `queries`.
    /// Orders and includes on the branches are not carried over.
    pub fn or(class_name: impl Into<String>, queries: impl IntoIterator<Item = Query>) -> Self {
        let branches = queries.into_iter().map(|q| q.constraints).collect();
        let mut query = Self::new(class_name);
        query.constraints.push(Constraint::Or(branches));
        query
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn order(&self) -> &[SortKey] {
        &self.order
    }

    pub fn includes(&self) -> &[String] {
        &self.include
    }

    // ========================================
    // Predicates
    // ========================================

    pub fn equal_to(&mut self, field: &str, value: Value) -> &mut Self {
        self.add(field, Predicate::EqualTo(value))
    }

    pub fn not_equal_to(&mut self, field: &str, value: Value) -> &mut Self {
        self.add(field, Predicate::NotEqualTo(value))
    }

    pub fn greater_than(&mut self, field: &str, value: Value) -> &mut Self {
        self.add(field, Predicate::GreaterThan(value))
    }

    pub fn greater_than_or_equal_to(&mut self, field: &str, value: Value) -> &mut Self {
        self.add(field, Predicate::GreaterThanOrEqualTo(value))
    }

    pub fn less_than(&mut self, field: &str, value: Value) -> &mut Self {
        self.add(field, Predicate::LessThan(value))
    }

    pub fn less_than_or_equal_to(&mut self, field: &str, value: Value) -> &mut Self {
        self.add(field, Predicate::LessThanOrEqualTo(value))
    }

    pub fn exists(&mut self, field: &str) -> &mut Self {
        self.add(field, Predicate::Exists)
    }

    pub fn contains_all(&mut self, field: &str, values: Value) -> &mut Self {
        self.add(field, Predicate::ContainsAll(values))
    }

    pub fn starts_with(&mut self, field: &str, prefix: Value) -> &mut Self {
        self.add(field, Predicate::StartsWith(prefix))
    }

    fn add(&mut self, field: &str, predicate: Predicate) -> &mut Self {
        self.constraints.push(Constraint::Field { field: field.to_string(), predicate });
        self
    }

    // ========================================
    // Sorting and expansion
    // ========================================

    pub fn add_ascending(&mut self, field: &str) -> &mut Self {
        self.order.push(SortKey { field: field.to_string(), direction: SortDirection::Asc });
        self
    }

    pub fn add_descending(&mut self, field: &str) -> &mut Self {
        self.order.push(SortKey { field: field.to_string(), direction: SortDirection::Desc });
        self
    }

    pub fn include(&mut self, field: &str) -> &mut Self {
        self.include.push(field.to_string());
        self
    }

    // ========================================
    // REST encoding
    // ========================================

    /// Encode as REST query parameters: `where`, `order` (`a,-b`), `include` (`x,y`)
    pub fn to_json(&self) -> Value {
        let mut out = Map::new();
        out.insert("className".to_string(), json!(self.class_name));
        out.insert("where".to_string(), encode_where(&self.constraints));
        if !self.order.is_empty() {
            let keys: Vec<String> = self
                .order
                .iter()
                .map(|k| match k.direction {
                    SortDirection::Asc => k.field.clone(),
                    SortDirection::Desc => format!("-{}", k.field),
                })
                .collect();
            out.insert("order".to_string(), json!(keys.join(",")));
        }
        if !self.include.is_empty() {
            out.insert("include".to_string(), json!(self.include.join(",")));
        }
        Value::Object(out)
    }
}

fn encode_where(constraints: &[Constraint]) -> Value {
    let mut clause = Map::new();
    for constraint in constraints {
        match constraint {
            Constraint::Or(branches) => {
                let encoded = Value::Array(branches.iter().map(|b| encode_where(b)).collect());
                if clause.contains_key("$or") {
                    push_and(&mut clause, single("$or", encoded));
                } else {
                    clause.insert("$or".to_string(), encoded);
                }
            }
            Constraint::Field { field, predicate } => {
                let (op, value) = match predicate {
                    Predicate::EqualTo(v) => ("$eq", v.clone()),
                    Predicate::NotEqualTo(v) => ("$ne", v.clone()),
                    Predicate::GreaterThan(v) => ("$gt", v.clone()),
                    Predicate::GreaterThanOrEqualTo(v) => ("$gte", v.clone()),
                    Predicate::LessThan(v) => ("$lt", v.clone()),
                    Predicate::LessThanOrEqualTo(v) => ("$lte", v.clone()),
                    Predicate::Exists => ("$exists", json!(true)),
                    Predicate::ContainsAll(v) => ("$all", v.clone()),
                    Predicate::StartsWith(v) => ("$regex", json!(format!("^{}", quote_regex(v)))),
                };
                merge_condition(&mut clause, field, op, value);
            }
        }
    }
    Value::Object(clause)
}

/// Adds `op` to the conditions on `field` without dropping earlier ones.
/// A lone equality stays a plain value; a repeated operator goes to `$and`.
fn merge_condition(clause: &mut Map<String, Value>, field: &str, op: &str, value: Value) {
    let Some(existing) = clause.get_mut(field) else {
        clause.insert(field.to_string(), condition(op, value));
        return;
    };
    if !is_condition_map(existing) {
        let equal = existing.take();
        *existing = single("$eq", equal);
    }
    if let Value::Object(conditions) = existing {
        if !conditions.contains_key(op) {
            conditions.insert(op.to_string(), value);
            return;
        }
    }
    push_and(clause, single(field, condition(op, value)));
}

fn condition(op: &str, value: Value) -> Value {
    if op == "$eq" {
        value
    } else {
        single(op, value)
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn push_and(clause: &mut Map<String, Value>, condition: Value) {
    match clause.entry("$and").or_insert_with(|| Value::Array(Vec::new())) {
        Value::Array(all) => all.push(condition),
        other => *other = Value::Array(vec![other.take(), condition]),
    }
}

/// `{"$gt": 1, ...}`; pointer and date literals carry `__type` instead
fn is_condition_map(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && map.keys().all(|key| key.starts_with('$')),
        _ => false,
    }
}

/// Literal match for a prefix: `\Q...\E`, splitting any embedded `\E`
fn quote_regex(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("\\Q{}\\E", text.replace("\\E", "\\E\\\\E\\Q"))
}
