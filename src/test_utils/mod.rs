//! the test_utils folder here will share utils or test components between unit
//! tests of the binder, its engines and its backends
mod common;
mod fixtures;

pub use common::*;
pub use fixtures::*;
