//! Binder: keeps one in-memory object and its key-value namespace in sync.
//!
//! - [`bind`] loads or creates the stored form and subscribes to changes.
//! - [`Binder::save`] persists the minimal change set.
//! - Backend changes are merged by a single reconciliation task and
//!   reported to per-field triggers registered with
//!   [`Binder::bind_field`].

mod adapter;
#[allow(clippy::module_inception)]
mod binder;
mod options;
mod trigger;
mod watch;

pub use binder::*;
pub use options::*;
pub use trigger::FieldCallback;

#[cfg(test)]
mod binder_test;
