// In-process backend: evaluates queries, records and sessions against memory
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::backend::query::{Constraint, Predicate, Query, SortDirection, SortKey};
use crate::backend::record::{add_numbers, decode_date, encode_date, FieldOp, Record};
use crate::backend::traits::Backend;
use crate::backend::user::{User, USER_COLLECTION};
use crate::error::{codes, BackendError, BackendResult};

struct Account {
    user: User,
    password_hash: String,
}

#[derive(Default)]
struct State {
    application_id: Option<String>,
    server_url: Option<String>,
    collections: HashMap<String, BTreeMap<String, Record>>,
    accounts: HashMap<String, Account>,
    sessions: HashSet<String>,
    current: Option<User>,
}

/// Backend that keeps every collection in memory.
///
/// Honours the same query, record, ACL and session rules the bridge relies
/// on: read/write ACLs are checked against the signed-in user (roles are not
/// resolved), and every call fails with `INVALID_SESSION_TOKEN` once the
/// current session has been revoked server-side.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn application_id(&self) -> Option<String> {
        self.read().application_id.clone()
    }

    pub fn server_url(&self) -> Option<String> {
        self.read().server_url.clone()
    }

    /// Insert already-encoded objects into a collection, bypassing ACLs.
    /// Objects without an `objectId` get one.
    pub fn seed(&self, collection: &str, objects: &[Value]) -> BackendResult<Vec<Record>> {
        let mut state = self.write();
        let mut seeded = Vec::with_capacity(objects.len());
        for object in objects {
            let mut record = Record::from_json_as(object, collection).ok_or_else(|| {
                BackendError::incorrect_type(format!("Seed data for {} must be objects", collection))
            })?;
            let id = record.id().map(str::to_string).unwrap_or_else(new_object_id);
            let now = Utc::now();
            let created_at = record.created_at().unwrap_or(now);
            let updated_at = record.updated_at().unwrap_or(created_at);
            record.mark_saved(id.clone(), created_at, updated_at);
            state
                .collections
                .entry(collection.to_string())
                .or_default()
                .insert(id, record.clone());
            seeded.push(record);
        }
        tracing::debug!("Seeded {} objects into {}", seeded.len(), collection);
        Ok(seeded)
    }

    /// Seed several collections from `{ "<collection>": [objects...] }`
    pub fn seed_fixture(&self, fixture: &Value) -> BackendResult<usize> {
        let collections = fixture
            .as_object()
            .ok_or_else(|| BackendError::incorrect_type("Fixture must be an object of collections"))?;
        let mut total = 0;
        for (collection, objects) in collections {
            let objects = objects.as_array().ok_or_else(|| {
                BackendError::incorrect_type(format!("Fixture collection {} must be an array", collection))
            })?;
            total += self.seed(collection, objects)?.len();
        }
        Ok(total)
    }

    /// Revoke every session server-side; the local current user is kept,
    /// so the next call made with it fails with `INVALID_SESSION_TOKEN`.
    pub fn expire_sessions(&self) {
        let mut state = self.write();
        state.sessions.clear();
        tracing::info!("All sessions expired");
    }

    pub fn len(&self, collection: &str) -> usize {
        self.read().collections.get(collection).map_or(0, BTreeMap::len)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn initialize(&self, application_id: &str, server_url: &str) {
        let mut state = self.write();
        state.application_id = Some(application_id.to_string());
        state.server_url = Some(server_url.to_string());
        tracing::info!("Memory backend initialized for application {}", application_id);
    }

    async fn count(&self, query: &Query) -> BackendResult<u64> {
        validate_query(query)?;
        let state = self.read();
        let user = state.session_user()?;
        Ok(state.matching(query, user.as_deref()).count() as u64)
    }

    async fn find(&self, query: &Query) -> BackendResult<Vec<Record>> {
        validate_query(query)?;
        let state = self.read();
        let user = state.session_user()?;
        let mut records: Vec<Record> = state.matching(query, user.as_deref()).cloned().collect();
        sort_records(&mut records, query.order());
        for record in records.iter_mut() {
            state.expand_includes(record, query.includes(), user.as_deref());
        }
        Ok(records)
    }

    async fn get(&self, query: &Query, id: Option<&str>) -> BackendResult<Record> {
        let id = id.ok_or_else(BackendError::missing_object_id)?;
        validate_query(query)?;
        let state = self.read();
        let user = state.session_user()?;
        let mut record = state
            .matching(query, user.as_deref())
            .find(|r| r.id() == Some(id))
            .cloned()
            .ok_or_else(|| BackendError::object_not_found("Object not found."))?;
        state.expand_includes(&mut record, query.includes(), user.as_deref());
        Ok(record)
    }

    async fn save(&self, record: Record) -> BackendResult<Record> {
        let mut state = self.write();
        let user = state.session_user()?;
        state.persist(record, user.as_deref())
    }

    async fn destroy(&self, record: Record) -> BackendResult<Record> {
        let mut state = self.write();
        let user = state.session_user()?;
        let Some(id) = record.id().map(str::to_string) else {
            // Never saved: nothing to delete on the server
            return Ok(record);
        };
        let stored = state
            .collections
            .get(record.class_name())
            .and_then(|objects| objects.get(&id))
            .ok_or_else(|| BackendError::object_not_found("Object not found."))?;
        if !writable(stored, user.as_deref()) {
            return Err(BackendError::object_not_found("Object not found."));
        }
        if let Some(objects) = state.collections.get_mut(record.class_name()) {
            objects.remove(&id);
        }
        tracing::debug!("Destroyed {}/{}", record.class_name(), id);
        Ok(record)
    }

    async fn log_in(&self, username: &str, password: &str) -> BackendResult<User> {
        if username.is_empty() {
            return Err(BackendError::new(codes::USERNAME_MISSING, "username/email is required."));
        }
        if password.is_empty() {
            return Err(BackendError::new(codes::PASSWORD_MISSING, "password is required."));
        }
        let mut state = self.write();
        let user = match state.accounts.get(username) {
            Some(account) if account.password_hash == hash_password(username, password) => account.user.clone(),
            _ => return Err(BackendError::object_not_found("Invalid username/password.")),
        };
        Ok(state.open_session(user))
    }

    async fn sign_up(&self, user: Record) -> BackendResult<User> {
        let username = user.get("username").and_then(Value::as_str).unwrap_or_default().to_string();
        let password = user.get("password").and_then(Value::as_str).unwrap_or_default().to_string();
        let email = user.get("email").and_then(Value::as_str).map(str::to_string);

        if username.is_empty() {
            return Err(BackendError::new(codes::USERNAME_MISSING, "Cannot sign up user with an empty username."));
        }
        if password.is_empty() {
            return Err(BackendError::new(codes::PASSWORD_MISSING, "Cannot sign up user with an empty password."));
        }

        let mut state = self.write();
        if state.accounts.contains_key(&username) {
            return Err(BackendError::new(codes::USERNAME_TAKEN, "Account already exists for this username."));
        }
        if let Some(email) = &email {
            if state.accounts.values().any(|a| a.user.email.as_ref() == Some(email)) {
                return Err(BackendError::new(codes::EMAIL_TAKEN, "Account already exists for this email address."));
            }
        }

        let id = new_object_id();
        let now = Utc::now();
        let mut stored = Record::new(USER_COLLECTION);
        stored.set("username", username.clone());
        if let Some(email) = &email {
            stored.set("email", email.clone());
        }
        stored.mark_saved(id.clone(), now, now);
        state
            .collections
            .entry(USER_COLLECTION.to_string())
            .or_default()
            .insert(id.clone(), stored);

        let mut new_user = User::new(id, username.clone());
        new_user.email = email;
        state.accounts.insert(
            username.clone(),
            Account { user: new_user.clone(), password_hash: hash_password(&username, &password) },
        );
        Ok(state.open_session(new_user))
    }

    fn log_out(&self) {
        let mut state = self.write();
        if let Some(user) = state.current.take() {
            if let Some(token) = &user.session_token {
                state.sessions.remove(token);
            }
            tracing::info!("Logged out {}", user.username);
        }
    }

    fn current_user(&self) -> Option<User> {
        self.read().current.clone()
    }
}

impl State {
    /// Id of the signed-in user, or an error if their session was revoked
    fn session_user(&self) -> BackendResult<Option<String>> {
        match &self.current {
            None => Ok(None),
            Some(user) => match &user.session_token {
                Some(token) if self.sessions.contains(token) => Ok(Some(user.id.clone())),
                _ => Err(BackendError::invalid_session()),
            },
        }
    }

    fn open_session(&mut self, user: User) -> User {
        let token = format!("r:{}", Uuid::new_v4().simple());
        self.sessions.insert(token.clone());
        let user = user.with_session_token(token);
        self.current = Some(user.clone());
        tracing::info!("Opened session for {}", user.username);
        user
    }

    fn matching<'a>(&'a self, query: &'a Query, user: Option<&'a str>) -> impl Iterator<Item = &'a Record> + 'a {
        self.collections
            .get(query.class_name())
            .into_iter()
            .flat_map(|objects| objects.values())
            .filter(move |r| readable(r, user) && matches_all(r, query.constraints()))
    }

    fn expand_includes(&self, record: &mut Record, includes: &[String], user: Option<&str>) {
        for field in includes {
            let Some(pointer) = record.get(field) else { continue };
            let (Some(class_name), Some(id)) = (
                pointer.get("className").and_then(Value::as_str),
                pointer.get("objectId").and_then(Value::as_str),
            ) else {
                continue;
            };
            let target = self
                .collections
                .get(class_name)
                .and_then(|objects| objects.get(id))
                .filter(|target| readable(target, user));
            if let Some(target) = target {
                let expanded = target.to_json();
                record.set(field.clone(), expanded);
            }
        }
        // Expansion is a read-side view, not a pending change
        if let (Some(id), Some(created), Some(updated)) =
            (record.id().map(str::to_string), record.created_at(), record.updated_at())
        {
            record.mark_saved(id, created, updated);
        }
    }

    fn persist(&mut self, mut record: Record, user: Option<&str>) -> BackendResult<Record> {
        let ops: Vec<(String, FieldOp)> = record.pending_ops().map(|(key, op)| (key.to_string(), op.clone())).collect();
        for (key, op) in &ops {
            if !is_valid_key(key) {
                return Err(BackendError::invalid_key_name(key));
            }
            // A mutation that did not fit the local value is rejected outright
            apply_op(key, op, record.get(key), record.get(key))?;
            if *op == FieldOp::Set {
                if let Some(value) = record.get(key).cloned() {
                    let normalized = self.store_reference(value, user)?;
                    record.set(key.clone(), normalized);
                }
            }
        }

        let now = Utc::now();
        match record.id().map(str::to_string) {
            None => {
                let id = new_object_id();
                record.mark_saved(id.clone(), now, now);
                self.collections
                    .entry(record.class_name().to_string())
                    .or_default()
                    .insert(id.clone(), record.clone());
                tracing::debug!("Created {}/{}", record.class_name(), id);
                Ok(record)
            }
            Some(id) => {
                let stored = self
                    .collections
                    .get_mut(record.class_name())
                    .and_then(|objects| objects.get_mut(&id))
                    .ok_or_else(|| BackendError::object_not_found("Object not found."))?;
                if !writable(stored, user) {
                    return Err(BackendError::object_not_found("Object not found."));
                }
                let mut changes = Vec::with_capacity(ops.len());
                for (key, op) in &ops {
                    changes.push((key, apply_op(key, op, stored.get(key), record.get(key))?));
                }
                for (key, value) in changes {
                    match value {
                        Some(value) => {
                            stored.set(key.clone(), value);
                        }
                        None => {
                            stored.unset(key);
                        }
                    }
                }
                if record.is_acl_dirty() {
                    if let Some(acl) = record.acl() {
                        stored.set_acl(acl.clone());
                    }
                }
                let created_at = stored.created_at().unwrap_or(now);
                stored.mark_saved(id.clone(), created_at, now);
                tracing::debug!("Updated {}/{} ({} fields)", record.class_name(), id, ops.len());
                Ok(stored.clone())
            }
        }
    }

    /// Nested object encodings are stored as pointers; unsaved ones are created first
    fn store_reference(&mut self, value: Value, user: Option<&str>) -> BackendResult<Value> {
        if value.get("__type").and_then(Value::as_str) != Some("Object") {
            return Ok(value);
        }
        let nested = Record::from_json(&value)
            .ok_or_else(|| BackendError::incorrect_type("Nested object is missing className"))?;
        let nested = if nested.is_new() || nested.is_dirty() {
            self.persist(nested, user)?
        } else {
            nested
        };
        nested
            .to_pointer()
            .ok_or_else(|| BackendError::other("Nested object was not assigned an id"))
    }
}

fn new_object_id() -> String {
    Uuid::new_v4().simple().to_string()[..10].to_string()
}

fn hash_password(username: &str, password: &str) -> String {
    let digest = Sha256::new()
        .chain_update(username.as_bytes())
        .chain_update(b":")
        .chain_update(password.as_bytes())
        .finalize();
    format!("{:x}", digest)
}

fn is_valid_key(key: &str) -> bool {
    let mut chars = key.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// New value of a field after `op` runs against `stored`; `None` unsets it
fn apply_op(key: &str, op: &FieldOp, stored: Option<&Value>, local: Option<&Value>) -> BackendResult<Option<Value>> {
    let mismatch = |expected: &str| {
        BackendError::incorrect_type(format!("Cannot apply {} to {}: field is not {}", op_name(op), key, expected))
    };
    let value = match op {
        FieldOp::Set => local.cloned(),
        FieldOp::Unset => None,
        FieldOp::Increment(amount) => Some(match stored {
            None | Some(Value::Null) => Value::Number(amount.clone()),
            Some(Value::Number(current)) => add_numbers(current, amount),
            Some(_) => return Err(mismatch("a number")),
        }),
        FieldOp::Add(items) | FieldOp::AddUnique(items) | FieldOp::Remove(items) => {
            let mut current = match stored {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(current)) => current.clone(),
                Some(_) => return Err(mismatch("an array")),
            };
            match op {
                FieldOp::Add(_) => current.extend(items.iter().cloned()),
                FieldOp::AddUnique(_) => {
                    for item in items {
                        if !current.contains(item) {
                            current.push(item.clone());
                        }
                    }
                }
                _ => current.retain(|existing| !items.contains(existing)),
            }
            Some(Value::Array(current))
        }
    };
    Ok(value)
}

fn op_name(op: &FieldOp) -> &'static str {
    match op {
        FieldOp::Set => "set",
        FieldOp::Unset => "unset",
        FieldOp::Increment(_) => "increment",
        FieldOp::Add(_) => "add",
        FieldOp::AddUnique(_) => "addUnique",
        FieldOp::Remove(_) => "remove",
    }
}

/// Every field a query names must be a valid key path or an envelope key
fn validate_query(query: &Query) -> BackendResult<()> {
    fn check(field: &str) -> BackendResult<()> {
        let envelope = matches!(field, "objectId" | "createdAt" | "updatedAt");
        if envelope || (!field.is_empty() && field.split('.').all(is_valid_key)) {
            Ok(())
        } else {
            Err(BackendError::invalid_query(format!("Invalid field name in query: {:?}", field)))
        }
    }
    fn check_constraints(constraints: &[Constraint]) -> BackendResult<()> {
        for constraint in constraints {
            match constraint {
                Constraint::Field { field, .. } => check(field)?,
                Constraint::Or(branches) => {
                    for branch in branches {
                        check_constraints(branch)?;
                    }
                }
            }
        }
        Ok(())
    }

    check_constraints(query.constraints())?;
    for key in query.order() {
        check(&key.field)?;
    }
    for field in query.includes() {
        check(field)?;
    }
    Ok(())
}

fn readable(record: &Record, user: Option<&str>) -> bool {
    record.acl().map_or(true, |acl| acl.can_read(user))
}

fn writable(record: &Record, user: Option<&str>) -> bool {
    record.acl().map_or(true, |acl| acl.can_write(user))
}

// ========================================
// Constraint evaluation
// ========================================

fn matches_all(record: &Record, constraints: &[Constraint]) -> bool {
    constraints.iter().all(|c| matches_constraint(record, c))
}

fn matches_constraint(record: &Record, constraint: &Constraint) -> bool {
    match constraint {
        Constraint::Or(branches) => branches.iter().any(|b| matches_all(record, b)),
        Constraint::Field { field, predicate } => {
            let value = field_value(record, field);
            let value = value.as_ref();
            match predicate {
                Predicate::EqualTo(expected) => equals(value, expected),
                Predicate::NotEqualTo(expected) => !equals(value, expected),
                Predicate::GreaterThan(bound) => compare(value, bound) == Some(Ordering::Greater),
                Predicate::GreaterThanOrEqualTo(bound) => {
                    matches!(compare(value, bound), Some(Ordering::Greater | Ordering::Equal))
                }
                Predicate::LessThan(bound) => compare(value, bound) == Some(Ordering::Less),
                Predicate::LessThanOrEqualTo(bound) => {
                    matches!(compare(value, bound), Some(Ordering::Less | Ordering::Equal))
                }
                Predicate::Exists => value.is_some(),
                Predicate::ContainsAll(expected) => contains_all(value, expected),
                Predicate::StartsWith(prefix) => match (value, prefix) {
                    (Some(Value::String(s)), Value::String(p)) => s.starts_with(p.as_str()),
                    _ => false,
                },
            }
        }
    }
}

/// Field lookup including the envelope keys a query may filter on
fn field_value(record: &Record, field: &str) -> Option<Value> {
    match field {
        "objectId" => record.id().map(|id| json!(id)),
        "createdAt" => record.created_at().map(|d| json!({ "__type": "Date", "iso": encode_date(d) })),
        "updatedAt" => record.updated_at().map(|d| json!({ "__type": "Date", "iso": encode_date(d) })),
        _ => record.get(field).cloned(),
    }
}

/// Equality with array membership: `tags = "a"` matches `["a", "b"]`
fn equals(value: Option<&Value>, expected: &Value) -> bool {
    match value {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => items.iter().any(|i| same(i, expected)),
        Some(v) => same(v, expected),
    }
}

fn same(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (reference_key(a), reference_key(b)) {
        return x == y;
    }
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => match (decode_typed_date(a), decode_typed_date(b)) {
            (Some(x), Some(y)) => x == y,
            _ => a == b,
        },
    }
}

/// (className, objectId) of a pointer or object encoding
fn reference_key(value: &Value) -> Option<(&str, &str)> {
    Some((value.get("className")?.as_str()?, value.get("objectId")?.as_str()?))
}

fn decode_typed_date(value: &Value) -> Option<chrono::DateTime<Utc>> {
    if value.get("__type").and_then(Value::as_str) == Some("Date") {
        decode_date(value)
    } else {
        None
    }
}

fn contains_all(value: Option<&Value>, expected: &Value) -> bool {
    let Some(Value::Array(items)) = value else { return false };
    match expected {
        Value::Array(wanted) => wanted.iter().all(|w| items.iter().any(|i| same(i, w))),
        single => items.iter().any(|i| same(i, single)),
    }
}

/// Ordering between comparable values; `None` when the kinds differ
fn compare(value: Option<&Value>, bound: &Value) -> Option<Ordering> {
    let value = value?;
    match (value, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => {
            let a = decode_typed_date(value).or_else(|| decode_date(value))?;
            let b = decode_typed_date(bound).or_else(|| decode_date(bound))?;
            Some(a.cmp(&b))
        }
    }
}

fn sort_records(records: &mut [Record], order: &[SortKey]) {
    if order.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for key in order {
            let va = field_value(a, &key.field);
            let vb = field_value(b, &key.field);
            let ord = match (va.as_ref(), vb.as_ref()) {
                (Some(x), Some(y)) => compare(Some(x), y).unwrap_or_else(|| type_rank(x).cmp(&type_rank(y))),
                (Some(_), None) => Ordering::Greater,
                (None, Some(_)) => Ordering::Less,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return match key.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
            }
        }
        Ordering::Equal
    });
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::acl::Acl;

    fn backend_with_games() -> MemoryBackend {
        let backend = MemoryBackend::new();
        backend
            .seed(
                "Game",
                &[
                    json!({ "objectId": "g1", "score": 10, "name": "Alpha", "tags": ["a", "b"] }),
                    json!({ "objectId": "g2", "score": 30, "name": "Beta", "tags": ["b"] }),
                    json!({ "objectId": "g3", "score": 20, "name": "Alpine" }),
                ],
            )
            .unwrap();
        backend
    }

    fn ids(records: &[Record]) -> Vec<&str> {
        records.iter().filter_map(Record::id).collect()
    }

    #[tokio::test]
    async fn filters_sorts_and_counts() {
        let backend = backend_with_games();

        let mut query = Query::new("Game");
        query.greater_than_or_equal_to("score", json!(20)).add_descending("score");
        assert_eq!(ids(&backend.find(&query).await.unwrap()), vec!["g2", "g3"]);
        assert_eq!(backend.count(&query).await.unwrap(), 2);

        let mut query = Query::new("Game");
        query.starts_with("name", json!("Alp")).add_ascending("name");
        assert_eq!(ids(&backend.find(&query).await.unwrap()), vec!["g1", "g3"]);
    }

    #[tokio::test]
    async fn array_predicates() {
        let backend = backend_with_games();

        let mut query = Query::new("Game");
        query.equal_to("tags", json!("b")).add_ascending("objectId");
        assert_eq!(ids(&backend.find(&query).await.unwrap()), vec!["g1", "g2"]);

        let mut query = Query::new("Game");
        query.contains_all("tags", json!(["a", "b"]));
        assert_eq!(ids(&backend.find(&query).await.unwrap()), vec!["g1"]);

        let mut query = Query::new("Game");
        query.exists("tags").not_equal_to("score", json!(10));
        assert_eq!(ids(&backend.find(&query).await.unwrap()), vec!["g2"]);
    }

    #[tokio::test]
    async fn get_requires_an_id() {
        let backend = backend_with_games();
        let query = Query::new("Game");
        let err = backend.get(&query, None).await.unwrap_err();
        assert_eq!(err.code, codes::MISSING_OBJECT_ID);
        let err = backend.get(&query, Some("nope")).await.unwrap_err();
        assert_eq!(err.code, codes::OBJECT_NOT_FOUND);
        assert_eq!(backend.get(&query, Some("g2")).await.unwrap().get("score"), Some(&json!(30)));
    }

    #[tokio::test]
    async fn save_creates_then_applies_only_dirty_fields() {
        let backend = MemoryBackend::new();
        let mut record = Record::new("Note");
        record.set("title", "draft").set("views", 1);
        let saved = backend.save(record).await.unwrap();
        let id = saved.id().unwrap().to_string();
        assert!(!saved.is_dirty());

        // The increment runs against the stored value, not the empty local copy
        let mut partial = Record::with_id("Note", id.clone());
        partial.increment("views");
        assert_eq!(partial.get("views"), Some(&json!(1)));
        let updated = backend.save(partial).await.unwrap();
        assert_eq!(updated.get("title"), Some(&json!("draft")));
        assert_eq!(updated.get("views"), Some(&json!(2)));
        assert!(updated.updated_at() >= saved.updated_at());
    }

    #[tokio::test]
    async fn mutations_on_the_wrong_type_fail_without_changes() {
        let backend = backend_with_games();

        // Local copy is stale: the stored field holds a string
        let mut stale = Record::with_id("Game", "g1");
        stale.increment("name");
        let err = backend.save(stale).await.unwrap_err();
        assert_eq!(err.code, codes::INCORRECT_TYPE);

        let mut mixed = Record::with_id("Game", "g1");
        mixed.set("score", 99).add("name", "x");
        let err = backend.save(mixed).await.unwrap_err();
        assert_eq!(err.code, codes::INCORRECT_TYPE);

        let stored = backend.get(&Query::new("Game"), Some("g1")).await.unwrap();
        assert_eq!(stored.get("name"), Some(&json!("Alpha")));
        assert_eq!(stored.get("score"), Some(&json!(10)));
    }

    #[tokio::test]
    async fn array_ops_merge_with_stored_items() {
        let backend = backend_with_games();
        let mut partial = Record::with_id("Game", "g1");
        partial.add_unique("tags", "b").add_unique("tags", "c");
        let updated = backend.save(partial).await.unwrap();
        assert_eq!(updated.get("tags"), Some(&json!(["a", "b", "c"])));

        let mut partial = Record::with_id("Game", "g1");
        partial.remove("tags", "a");
        let updated = backend.save(partial).await.unwrap();
        assert_eq!(updated.get("tags"), Some(&json!(["b", "c"])));
    }

    #[tokio::test]
    async fn queries_on_invalid_fields_are_rejected() {
        let backend = backend_with_games();
        let mut query = Query::new("Game");
        query.equal_to("", json!(1));
        assert_eq!(backend.count(&query).await.unwrap_err().code, codes::INVALID_QUERY);

        let mut query = Query::new("Game");
        query.add_ascending("bad key");
        assert_eq!(backend.find(&query).await.unwrap_err().code, codes::INVALID_QUERY);

        let mut query = Query::new("Game");
        query.exists("owner.name").add_descending("createdAt");
        assert_eq!(backend.count(&query).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn initialize_records_the_application() {
        let backend = MemoryBackend::new();
        assert!(backend.application_id().is_none());
        backend.initialize("app", "http://localhost:1337/parse");
        assert_eq!(backend.application_id().as_deref(), Some("app"));
        assert_eq!(backend.server_url().as_deref(), Some("http://localhost:1337/parse"));
    }

    #[tokio::test]
    async fn save_rejects_invalid_keys() {
        let backend = MemoryBackend::new();
        let mut record = Record::new("Note");
        record.set("$bad", 1);
        let err = backend.save(record).await.unwrap_err();
        assert_eq!(err.code, codes::INVALID_KEY_NAME);
    }

    #[tokio::test]
    async fn nested_unsaved_objects_become_pointers() {
        let backend = MemoryBackend::new();
        let mut author = Record::new("Author");
        author.set("name", "Ana");
        let mut post = Record::new("Post");
        post.set_record("author", &author);

        assert!(backend.is_empty("Author"));
        let saved = backend.save(post).await.unwrap();
        let pointer = saved.get("author").unwrap();
        assert_eq!(pointer["__type"], json!("Pointer"));
        assert_eq!(backend.len("Author"), 1);

        let mut query = Query::new("Post");
        query.include("author");
        let found = backend.find(&query).await.unwrap();
        assert_eq!(found[0].get("author").unwrap()["name"], json!("Ana"));
        assert!(!found[0].is_dirty());
    }

    #[tokio::test]
    async fn acl_hides_and_protects_objects() {
        let backend = MemoryBackend::new();
        let mut private = Record::new("Secret");
        private.set_acl(Acl::new());
        let saved = backend.save(private).await.unwrap();

        assert_eq!(backend.count(&Query::new("Secret")).await.unwrap(), 0);
        let err = backend.destroy(saved).await.unwrap_err();
        assert_eq!(err.code, codes::OBJECT_NOT_FOUND);
    }

    #[tokio::test]
    async fn sessions_expire_server_side() {
        let backend = MemoryBackend::new();
        let mut user = Record::new(USER_COLLECTION);
        user.set("username", "ana").set("password", "pw").set("email", "ana@example.com");
        let signed_up = backend.sign_up(user).await.unwrap();
        assert!(signed_up.session_token.is_some());

        backend.log_out();
        assert!(backend.current_user().is_none());
        let err = backend.log_in("ana", "wrong").await.unwrap_err();
        assert_eq!(err.code, codes::OBJECT_NOT_FOUND);
        backend.log_in("ana", "pw").await.unwrap();

        backend.expire_sessions();
        let err = backend.count(&Query::new("Game")).await.unwrap_err();
        assert_eq!(err.code, codes::INVALID_SESSION_TOKEN);

        backend.log_out();
        assert_eq!(backend.count(&Query::new("Game")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_signups_are_rejected() {
        let backend = MemoryBackend::new();
        let mut user = Record::new(USER_COLLECTION);
        user.set("username", "ana").set("password", "pw").set("email", "ana@example.com");
        backend.sign_up(user.clone()).await.unwrap();

        let err = backend.sign_up(user).await.unwrap_err();
        assert_eq!(err.code, codes::USERNAME_TAKEN);

        let mut other = Record::new(USER_COLLECTION);
        other.set("username", "bea").set("password", "pw").set("email", "ana@example.com");
        let err = backend.sign_up(other).await.unwrap_err();
        assert_eq!(err.code, codes::EMAIL_TAKEN);
    }
}
