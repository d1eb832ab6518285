// Backend error type
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric error codes reported by the backend.
///
/// The bridge never invents codes of its own; these mirror the values the
/// backend returns so callers can match on them.
pub mod codes {
    pub const OTHER_CAUSE: i32 = -1;
    pub const OBJECT_NOT_FOUND: i32 = 101;
    pub const INVALID_QUERY: i32 = 102;
    pub const MISSING_OBJECT_ID: i32 = 104;
    pub const INVALID_KEY_NAME: i32 = 105;
    pub const INCORRECT_TYPE: i32 = 111;
    pub const USERNAME_MISSING: i32 = 200;
    pub const PASSWORD_MISSING: i32 = 201;
    pub const USERNAME_TAKEN: i32 = 202;
    pub const EMAIL_TAKEN: i32 = 203;
    pub const INVALID_SESSION_TOKEN: i32 = 209;
}

/// Error delivered by a backend call: a numeric code plus a message
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("backend error {code}: {message}")]
pub struct BackendError {
    pub code: i32,
    pub message: String,
}

impl BackendError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// The session token attached to the request is no longer valid
    pub fn is_invalid_session(&self) -> bool {
        self.code == codes::INVALID_SESSION_TOKEN
    }
}

// Static constructor methods for the codes the memory backend raises
impl BackendError {
    pub fn object_not_found(message: impl Into<String>) -> Self {
        Self::new(codes::OBJECT_NOT_FOUND, message)
    }

    pub fn missing_object_id() -> Self {
        Self::new(codes::MISSING_OBJECT_ID, "An object id is required")
    }

    pub fn invalid_key_name(key: &str) -> Self {
        Self::new(codes::INVALID_KEY_NAME, format!("Invalid field name: {}", key))
    }

    pub fn incorrect_type(message: impl Into<String>) -> Self {
        Self::new(codes::INCORRECT_TYPE, message)
    }

    pub fn invalid_query(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_QUERY, message)
    }

    pub fn invalid_session() -> Self {
        Self::new(codes::INVALID_SESSION_TOKEN, "Invalid session token")
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(codes::OTHER_CAUSE, message)
    }
}

pub type BackendResult<T> = Result<T, BackendError>;
