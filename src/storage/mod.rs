//! Backend contract and the built-in backends.
//!
//! A backend stores opaque bytes under slash-separated names. Names ending
//! in `/` denote directories: loading one returns its direct children, and
//! watching one reports changes to any of them.

mod adaptors;
mod backend_registry;

#[doc(hidden)]
pub use adaptors::*;
pub use backend_registry::*;


use std::collections::BTreeMap;

#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::Result;

/// Raw backend content: name -> bytes. Empty bytes mean the name is absent.
pub type Entries = BTreeMap<String, Vec<u8>>;

/// One change notification delivered by a backend watch feed.
pub type ChangeBatch = Entries;

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Backend: Send + Sync + 'static {
    /// Reads a single document, or every direct child of a directory.
    /// Missing names yield an empty result, not an error.
    async fn load(
        &self,
        ctx: &CancellationToken,
        path: &str,
    ) -> Result<Entries>;

    /// Writes `data` at `path`; empty `data` removes the name.
    async fn save(
        &self,
        ctx: &CancellationToken,
        path: &str,
        data: Vec<u8>,
    ) -> Result<()>;

    /// Subscribes to changes under `paths` and pushes them into `tx` until
    /// `ctx` is cancelled. Returns once the subscription is established.
    async fn watch(
        &self,
        ctx: CancellationToken,
        paths: Vec<String>,
        tx: mpsc::Sender<ChangeBatch>,
    ) -> Result<()>;
}
