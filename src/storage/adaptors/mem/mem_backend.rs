//! In-process key-value backend with prefix watches, shaped after a
//! distributed KV store: directory loads and watches match every key under
//! the prefix.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;
use tracing::warn;

use crate::core::is_dir;
use crate::Backend;
use crate::ChangeBatch;
use crate::Entries;
use crate::Error;
use crate::Result;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct MemoryBackend {
    store: Arc<RwLock<Entries>>,
    events: broadcast::Sender<(String, Vec<u8>)>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store: Arc::new(RwLock::new(Entries::new())),
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    /// Current content of every key, for inspection.
    pub fn entries(&self) -> Entries {
        self.store.read().clone()
    }

    fn put(
        &self,
        path: &str,
        data: Vec<u8>,
    ) {
        let changed = {
            let mut store = self.store.write();
            if data.is_empty() {
                store.remove(path).is_some()
            } else {
                store.insert(path.to_string(), data.clone()).as_ref() != Some(&data)
            }
        };
        if changed {
            trace!(path, "memory backend changed");
            // no subscribers is fine
            let _ = self.events.send((path.to_string(), data));
        }
    }
}

/// Collapses watch paths so that no path is covered by a directory prefix
/// already in the list.
pub(crate) fn common_paths(paths: &[String]) -> Vec<String> {
    let mut result: Vec<String> = paths
        .iter()
        .filter(|p| {
            !paths
                .iter()
                .any(|other| other != *p && is_dir(other) && p.starts_with(other.as_str()))
        })
        .cloned()
        .collect();
    result.sort();
    result.dedup();
    result
}

fn covers(
    watched: &str,
    key: &str,
) -> bool {
    if is_dir(watched) {
        key.starts_with(watched)
    } else {
        key == watched
    }
}

/// Keys currently stored under any watched path.
fn watched_keys(
    store: &Entries,
    watched: &[String],
) -> BTreeSet<String> {
    store
        .keys()
        .filter(|k| watched.iter().any(|w| covers(w, k)))
        .cloned()
        .collect()
}

/// Full picture of the watched paths after events were lost: every stored
/// key, plus empty payloads for watched documents that are absent and for
/// keys seen earlier that have since vanished. `known` is reset to what is
/// stored now.
pub(crate) fn resync_batch(
    store: &Entries,
    watched: &[String],
    known: &mut BTreeSet<String>,
) -> ChangeBatch {
    let mut batch: ChangeBatch = store
        .iter()
        .filter(|(k, _)| watched.iter().any(|w| covers(w, k)))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    for path in watched.iter().filter(|w| !is_dir(w)) {
        batch.entry(path.clone()).or_default();
    }
    for key in known.iter() {
        batch.entry(key.clone()).or_default();
    }
    *known = batch
        .iter()
        .filter(|(_, v)| !v.is_empty())
        .map(|(k, _)| k.clone())
        .collect();
    batch
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    async fn load(
        &self,
        ctx: &CancellationToken,
        path: &str,
    ) -> Result<Entries> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let store = self.store.read();
        Ok(store
            .range(path.to_string()..)
            .take_while(|(k, _)| covers(path, k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn save(
        &self,
        ctx: &CancellationToken,
        path: &str,
        data: Vec<u8>,
    ) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.put(path, data);
        Ok(())
    }

    async fn watch(
        &self,
        ctx: CancellationToken,
        paths: Vec<String>,
        tx: mpsc::Sender<ChangeBatch>,
    ) -> Result<()> {
        let watched = common_paths(&paths);
        let mut rx = self.events.subscribe();
        let store = self.store.clone();
        let mut known = watched_keys(&store.read(), &watched);
        debug!(?watched, "memory backend watch");

        tokio::spawn(async move {
            loop {
                let batch = tokio::select! {
                    _ = ctx.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok((key, data)) => {
                            if !watched.iter().any(|w| covers(w, &key)) {
                                continue;
                            }
                            if data.is_empty() {
                                known.remove(&key);
                            } else {
                                known.insert(key.clone());
                            }
                            ChangeBatch::from([(key, data)])
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!("memory watch lagged, {} events dropped, resyncing", n);
                            let store = store.read();
                            resync_batch(&store, &watched, &mut known)
                        }
                        Err(RecvError::Closed) => break,
                    },
                };
                if tx.send(batch).await.is_err() {
                    break;
                }
            }
            debug!("memory watch stopped");
        });
        Ok(())
    }
}
