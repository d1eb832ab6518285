pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod update;
pub mod acl;

pub use types::*;

/// Turns declarative request descriptions into backend queries, record
/// mutations and ACLs.
///
/// Stateless; the operations live in `impl` blocks spread over this
/// module's files, one per concern.
pub struct QueryTranslator;
