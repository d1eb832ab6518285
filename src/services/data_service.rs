use std::sync::Arc;

use crate::backend::{Acl, Backend, Query, Record, User, USER_COLLECTION};
use crate::channel::ResultChannel;
use crate::config::BackendConfig;
use crate::translator::{QueryTranslator, RequestParams};

/// Session and CRUD surface over a backend.
///
/// Holds no state of its own beyond the shared backend handle, so clones are
/// cheap and interchangeable. Every asynchronous operation is spawned on the
/// current tokio runtime and must be called from inside one.
#[derive(Clone)]
pub struct DataService {
    backend: Arc<dyn Backend>,
}

impl DataService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn initialize(&self, config: &BackendConfig) {
        self.backend.initialize(&config.application_id, &config.server_url);
    }

    // ========================================
    // Session
    // ========================================

    pub fn current_user(&self) -> Option<User> {
        self.backend.current_user()
    }

    /// Sign in, replacing any current session
    pub fn login(&self, username: &str, password: &str) -> ResultChannel<User> {
        if self.backend.current_user().is_some() {
            self.backend.log_out();
        }
        let backend = self.backend.clone();
        let (username, password) = (username.to_string(), password.to_string());
        ResultChannel::spawn("login", self.backend.clone(), async move {
            let user = backend.log_in(&username, &password).await?;
            tracing::info!("Logged in as {}", user.username);
            Ok(user)
        })
    }

    /// Drop the local session. Always succeeds with `()`.
    pub fn logout(&self) -> ResultChannel<()> {
        self.backend.log_out();
        ResultChannel::ready(Ok(()))
    }

    pub fn signup(&self, username: &str, email: &str, password: &str) -> ResultChannel<User> {
        let mut user = Record::new(USER_COLLECTION);
        user.set("username", username).set("email", email).set("password", password);
        let backend = self.backend.clone();
        ResultChannel::spawn("signup", self.backend.clone(), async move {
            let user = backend.sign_up(user).await?;
            tracing::info!("Signed up {}", user.username);
            Ok(user)
        })
    }

    // ========================================
    // Utilities
    // ========================================

    /// Empty, unsaved record in `collection`
    pub fn new_record(&self, collection: &str) -> Record {
        Record::new(collection)
    }

    pub fn build_query(&self, collection: &str, params: Option<&RequestParams>) -> Query {
        QueryTranslator::build_query(collection, params)
    }

    /// ACL for `params`, scoped to whoever is signed in now
    pub fn build_acl(&self, params: Option<&RequestParams>) -> Option<Acl> {
        QueryTranslator::build_acl(params, self.backend.current_user().as_ref())
    }

    // ========================================
    // CRUD
    // ========================================

    pub fn count(&self, collection: &str, params: Option<&RequestParams>) -> ResultChannel<u64> {
        let query = self.build_query(collection, params);
        let backend = self.backend.clone();
        ResultChannel::spawn("count", self.backend.clone(), async move { backend.count(&query).await })
    }

    pub fn get_all(&self, collection: &str, params: Option<&RequestParams>) -> ResultChannel<Vec<Record>> {
        let query = self.build_query(collection, params);
        let backend = self.backend.clone();
        ResultChannel::spawn("getAll", self.backend.clone(), async move {
            let records = backend.find(&query).await?;
            tracing::debug!("Fetched {} records from {}", records.len(), query.class_name());
            Ok(records)
        })
    }

    /// Fetch one record by `params.id`. A missing id is left for the
    /// backend to reject.
    pub fn get(&self, collection: &str, params: Option<&RequestParams>) -> ResultChannel<Record> {
        let query = self.build_query(collection, params);
        let id = params.and_then(|p| p.id.clone());
        let backend = self.backend.clone();
        ResultChannel::spawn("get", self.backend.clone(), async move { backend.get(&query, id.as_deref()).await })
    }

    /// Save a new record, applying the ACL described by `params` if any
    pub fn add(&self, collection: &str, mut record: Record, params: Option<&RequestParams>) -> ResultChannel<Record> {
        self.check_collection(collection, &record);
        if let Some(acl) = self.build_acl(params) {
            record.set_acl(acl);
        }
        let backend = self.backend.clone();
        ResultChannel::spawn("add", self.backend.clone(), async move { backend.save(record).await })
    }

    /// Apply `params.updatedFields`, then the ACL if one is described, and save
    pub fn update(&self, collection: &str, mut record: Record, params: Option<&RequestParams>) -> ResultChannel<Record> {
        self.check_collection(collection, &record);
        QueryTranslator::update_fields(&mut record, params);
        if let Some(acl) = self.build_acl(params) {
            record.set_acl(acl);
        }
        let backend = self.backend.clone();
        ResultChannel::spawn("update", self.backend.clone(), async move { backend.save(record).await })
    }

    pub fn delete(&self, collection: &str, record: Record) -> ResultChannel<Record> {
        self.check_collection(collection, &record);
        let backend = self.backend.clone();
        ResultChannel::spawn("delete", self.backend.clone(), async move { backend.destroy(record).await })
    }

    fn check_collection(&self, collection: &str, record: &Record) {
        if record.class_name() != collection {
            tracing::warn!("Record of {} passed for collection {}", record.class_name(), collection);
        }
    }
}
