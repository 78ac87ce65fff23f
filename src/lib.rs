//! Binds an in-memory object to a hierarchical key-value namespace.
//!
//! Fields annotated with a storage path are kept as their own documents (or
//! directories of documents) in a pluggable [`Backend`]; everything else
//! lives inline in the root document. [`bind`] loads or creates the stored
//! form, [`Binder::save`] persists only what changed, and backend changes are
//! merged back into the object while per-field triggers observe them.
//!
//! ```ignore
//! let ctx = CancellationToken::new();
//! let binder = bind(ctx.clone(), Config::default(), "file://conf/app.json", BindOptions::new()).await?;
//! binder
//!     .bind_field("settings.theme", |new, old| println!("{old} -> {new}"))
//!     .await?;
//! binder.update(|c| c.items.push(item));
//! binder.save(&ctx).await?;
//! ```

mod binder;
mod codec;
mod config;
mod constants;
mod core;
mod errors;
mod shape;
mod storage;
pub(crate) mod utils;

pub use binder::*;
pub use codec::*;
pub use config::*;
pub use constants::DEFAULT_TAG_NAME;
pub use core::*;
pub use errors::*;
pub use shape::*;
pub use storage::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
