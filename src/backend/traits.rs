use async_trait::async_trait;

use crate::backend::query::Query;
use crate::backend::record::Record;
use crate::backend::user::User;
use crate::error::BackendResult;

/// The backend SDK surface the bridge drives.
///
/// Query and record calls are async and report failures as `BackendError`.
/// Session state (`current_user`, `log_out`) is local and synchronous:
/// `log_out` only drops the session and never waits on the server.
#[async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Point the SDK at an application
    fn initialize(&self, application_id: &str, server_url: &str);

    // Queries
    async fn count(&self, query: &Query) -> BackendResult<u64>;
    async fn find(&self, query: &Query) -> BackendResult<Vec<Record>>;
    /// Fetch one object matching `query` by id; a missing id is the backend's to reject
    async fn get(&self, query: &Query, id: Option<&str>) -> BackendResult<Record>;

    // Records
    async fn save(&self, record: Record) -> BackendResult<Record>;
    async fn destroy(&self, record: Record) -> BackendResult<Record>;

    // Session
    async fn log_in(&self, username: &str, password: &str) -> BackendResult<User>;
    /// Register the user described by `user` (username, email, password fields)
    async fn sign_up(&self, user: Record) -> BackendResult<User>;
    fn log_out(&self);
    fn current_user(&self) -> Option<User>;
}
