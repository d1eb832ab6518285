pub mod types;
pub mod factory;

pub use types::*;
pub use factory::ModelMapper;
