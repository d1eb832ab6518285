#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use data_bridge::backend::{Backend, MemoryBackend, Query, Record, User};
use data_bridge::error::{BackendError, BackendResult};
use data_bridge::DataService;
use serde_json::{json, Value};

/// Memory backend that can be told to fail every call with a given error,
/// and counts forced sign-outs.
#[derive(Default)]
pub struct ScriptedBackend {
    pub inner: MemoryBackend,
    failure: Mutex<Option<BackendError>>,
    log_outs: AtomicUsize,
}

impl ScriptedBackend {
    pub fn fail_with(&self, err: BackendError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn log_outs(&self) -> usize {
        self.log_outs.load(Ordering::SeqCst)
    }

    fn check(&self) -> BackendResult<()> {
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    fn initialize(&self, application_id: &str, server_url: &str) {
        self.inner.initialize(application_id, server_url);
    }

    async fn count(&self, query: &Query) -> BackendResult<u64> {
        self.check()?;
        self.inner.count(query).await
    }

    async fn find(&self, query: &Query) -> BackendResult<Vec<Record>> {
        self.check()?;
        self.inner.find(query).await
    }

    async fn get(&self, query: &Query, id: Option<&str>) -> BackendResult<Record> {
        self.check()?;
        self.inner.get(query, id).await
    }

    async fn save(&self, record: Record) -> BackendResult<Record> {
        self.check()?;
        self.inner.save(record).await
    }

    async fn destroy(&self, record: Record) -> BackendResult<Record> {
        self.check()?;
        self.inner.destroy(record).await
    }

    async fn log_in(&self, username: &str, password: &str) -> BackendResult<User> {
        self.check()?;
        self.inner.log_in(username, password).await
    }

    async fn sign_up(&self, user: Record) -> BackendResult<User> {
        self.check()?;
        self.inner.sign_up(user).await
    }

    fn log_out(&self) {
        self.log_outs.fetch_add(1, Ordering::SeqCst);
        self.inner.log_out();
    }

    fn current_user(&self) -> Option<User> {
        self.inner.current_user()
    }
}

pub fn games() -> Vec<Value> {
    vec![
        json!({ "objectId": "g1", "name": "Alpha", "score": 10, "tags": ["arcade", "retro"], "owner": { "__type": "Pointer", "className": "Player", "objectId": "p1" } }),
        json!({ "objectId": "g2", "name": "Beta", "score": 30, "tags": ["arcade"], "owner": { "__type": "Pointer", "className": "Player", "objectId": "p2" } }),
        json!({ "objectId": "g3", "name": "Alpine", "score": 20 }),
        json!({ "objectId": "g4", "name": "Gamma", "score": 40, "tags": ["retro"] }),
    ]
}

pub fn players() -> Vec<Value> {
    vec![
        json!({ "objectId": "p1", "name": "Ana", "level": 3 }),
        json!({ "objectId": "p2", "name": "Bea", "level": 7 }),
    ]
}

static TRACING: Once = Once::new();

/// Route library logs to the test writer; RUST_LOG picks the level
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Service over a memory backend holding the game fixtures
pub fn seeded() -> (Arc<MemoryBackend>, DataService) {
    init_tracing();
    let backend = Arc::new(MemoryBackend::new());
    backend.seed("Game", &games()).unwrap();
    backend.seed("Player", &players()).unwrap();
    let service = DataService::new(backend.clone());
    (backend, service)
}

pub fn scripted() -> (Arc<ScriptedBackend>, DataService) {
    init_tracing();
    let backend = Arc::new(ScriptedBackend::default());
    backend.inner.seed("Game", &games()).unwrap();
    let service = DataService::new(backend.clone());
    (backend, service)
}

pub fn params(value: Value) -> data_bridge::RequestParams {
    serde_json::from_value(value).unwrap()
}

pub fn ids(records: &[Record]) -> Vec<&str> {
    records.iter().filter_map(Record::id).collect()
}
