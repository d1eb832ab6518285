use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::backend::user::User;

const PUBLIC_KEY: &str = "*";
const ROLE_PREFIX: &str = "role:";

/// Read/write grants held by one subject
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessEntry {
    #[serde(default, skip_serializing_if = "is_false")]
    pub read: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub write: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl AccessEntry {
    fn is_empty(&self) -> bool {
        !self.read && !self.write
    }
}

/// Per-record access control list.
///
/// Subjects are `*` (public), a user id, or `role:<name>`. Serializes to the
/// backend's ACL shape: `{"*": {"read": true}, "<id>": {"read": true, "write": true}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Acl {
    permissions: BTreeMap<String, AccessEntry>,
}

#[derive(Clone, Copy)]
enum Access {
    Read,
    Write,
}

impl Acl {
    /// Empty ACL: nobody but the master key can read or write
    pub fn new() -> Self {
        Self::default()
    }

    /// ACL granting read and write to one user
    pub fn for_user(user: &User) -> Self {
        let mut acl = Self::new();
        acl.set_read_access(&user.id, true);
        acl.set_write_access(&user.id, true);
        acl
    }

    pub fn set_public_read_access(&mut self, allowed: bool) -> &mut Self {
        self.set(PUBLIC_KEY.to_string(), Access::Read, allowed)
    }

    pub fn set_public_write_access(&mut self, allowed: bool) -> &mut Self {
        self.set(PUBLIC_KEY.to_string(), Access::Write, allowed)
    }

    pub fn set_read_access(&mut self, user_id: &str, allowed: bool) -> &mut Self {
        self.set(user_id.to_string(), Access::Read, allowed)
    }

    pub fn set_write_access(&mut self, user_id: &str, allowed: bool) -> &mut Self {
        self.set(user_id.to_string(), Access::Write, allowed)
    }

    pub fn set_role_read_access(&mut self, role: &str, allowed: bool) -> &mut Self {
        self.set(format!("{}{}", ROLE_PREFIX, role), Access::Read, allowed)
    }

    pub fn set_role_write_access(&mut self, role: &str, allowed: bool) -> &mut Self {
        self.set(format!("{}{}", ROLE_PREFIX, role), Access::Write, allowed)
    }

    pub fn public_read_access(&self) -> bool {
        self.entry(PUBLIC_KEY).read
    }

    pub fn public_write_access(&self) -> bool {
        self.entry(PUBLIC_KEY).write
    }

    pub fn read_access(&self, user_id: &str) -> bool {
        self.entry(user_id).read
    }

    pub fn write_access(&self, user_id: &str) -> bool {
        self.entry(user_id).write
    }

    pub fn role_read_access(&self, role: &str) -> bool {
        self.entry(&format!("{}{}", ROLE_PREFIX, role)).read
    }

    pub fn role_write_access(&self, role: &str) -> bool {
        self.entry(&format!("{}{}", ROLE_PREFIX, role)).write
    }

    /// Public or user-level read check; role membership is not resolved here
    pub fn can_read(&self, user_id: Option<&str>) -> bool {
        self.public_read_access() || user_id.is_some_and(|id| self.read_access(id))
    }

    pub fn can_write(&self, user_id: Option<&str>) -> bool {
        self.public_write_access() || user_id.is_some_and(|id| self.write_access(id))
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }

    fn entry(&self, key: &str) -> AccessEntry {
        self.permissions.get(key).copied().unwrap_or_default()
    }

    fn set(&mut self, key: String, access: Access, allowed: bool) -> &mut Self {
        let entry = self.permissions.entry(key.clone()).or_default();
        match access {
            Access::Read => entry.read = allowed,
            Access::Write => entry.write = allowed,
        }
        if entry.is_empty() {
            self.permissions.remove(&key);
        }
        self
    }
}
