pub mod backend;
pub mod channel;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod services;
pub mod translator;
pub mod types;

pub use backend::{Backend, MemoryBackend, Query, Record, User};
pub use channel::ResultChannel;
pub use error::{BackendError, BackendResult};
pub use model::{FieldDefinition, Model, ModelMapper, SchemaRegistry};
pub use services::DataService;
pub use translator::{QueryTranslator, RequestParams};
