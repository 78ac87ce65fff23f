//! Path-based decomposition and reconstruction engine.
//!
//! The registry maps storage paths to fields, the marshal and unmarshal
//! engines translate between an object's document form and flat key-value
//! pairs, and the diff logic derives the minimal backend mutation set.

mod diff;
mod field_registry;
mod kv;
mod marshal;
mod path_expr;
mod unmarshal;

pub use diff::*;
pub use field_registry::*;
pub use kv::KvPair;
pub(crate) use kv::*;
pub use marshal::*;
pub use path_expr::*;
pub use unmarshal::unmarshal;
