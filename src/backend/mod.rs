pub mod acl;
pub mod memory;
pub mod query;
pub mod record;
pub mod traits;
pub mod user;

pub use acl::{AccessEntry, Acl};
pub use memory::MemoryBackend;
pub use query::{Constraint, Predicate, Query, SortDirection, SortKey};
pub use record::{FieldOp, Record};
pub use traits::Backend;
pub use user::{User, USER_COLLECTION};
