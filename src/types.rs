/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Data types a backend field can hold.
/// Used by model definitions; only `Pointer` changes how a field is mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    String,
    Number,
    Bool,
    Array,
    Object,
    Date,
    File,
    Pointer,
    Relation,
    Null,
}

impl DataType {
    pub fn is_pointer(&self) -> bool {
        matches!(self, DataType::Pointer)
    }
}
