//! Watch-driven reconciliation: backend change batches are queued and
//! merged into the live object one batch at a time.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::binder::BinderInner;
use crate::apply_to_cache;
use crate::core::is_dir;
use crate::core::parent_dir;
use crate::unmarshal;
use crate::utils::async_task::spawn_task;
use crate::Bindable;
use crate::ChangeBatch;
use crate::Error;
use crate::KvPair;
use crate::Result;

/// Subscribes to every registered path and spawns the task that drains
/// the change queue. The task holds only a weak reference to the binder.
pub(crate) async fn start_watch<T: Bindable>(
    inner: &Arc<BinderInner<T>>,
    queue_size: usize,
) -> Result<()> {
    let paths: Vec<String> = inner
        .registry
        .paths()
        .map(|p| inner.adapter.file_name(p))
        .collect();
    let (tx, mut rx) = mpsc::channel::<ChangeBatch>(queue_size);
    inner.adapter.backend().watch(inner.ctx.clone(), paths, tx).await?;

    let weak = Arc::downgrade(inner);
    let ctx = inner.ctx.clone();
    spawn_task("reconcile", move || async move {
        loop {
            let batch = tokio::select! {
                _ = ctx.cancelled() => break,
                batch = rx.recv() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };
            let Some(inner) = weak.upgrade() else {
                break;
            };
            if let Err(e) = inner.reconcile(batch).await {
                error!(action = "reconcile", root = %inner.registry.root(), "dropping change batch: {}", e);
            }
        }
        debug!("reconciliation stopped");
        Ok(())
    });
    Ok(())
}

/// Forces a full reload every `ttl` until the bind token is cancelled.
pub(crate) fn start_ttl_reload<T: Bindable>(
    inner: &Arc<BinderInner<T>>,
    ttl: Duration,
) {
    let weak = Arc::downgrade(inner);
    let ctx = inner.ctx.clone();
    spawn_task("ttl_reload", move || async move {
        let mut ticker = tokio::time::interval(ttl);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let Some(inner) = weak.upgrade() else {
                break;
            };
            match inner.force_load(&ctx).await {
                Ok(()) => {}
                Err(Error::NoFiles) => debug!(root = %inner.registry.root(), "ttl reload found nothing"),
                Err(Error::Cancelled) => break,
                Err(e) => warn!(root = %inner.registry.root(), "ttl reload failed: {}", e),
            }
        }
        Ok(())
    });
}

impl<T: Bindable> BinderInner<T> {
    /// Merges one change batch. Document fields take the delivered value;
    /// a change under a directory field re-reads that whole directory, once
    /// per batch. Returns whether anything was merged.
    ///
    /// On error the object and the cache are left as they were.
    pub(crate) async fn reconcile(
        &self,
        batch: ChangeBatch,
    ) -> Result<bool> {
        let _gate = self.gate.lock().await;

        let mut documents: BTreeMap<String, KvPair> = BTreeMap::new();
        let mut reloads: BTreeSet<String> = BTreeSet::new();
        {
            let state = self.state.lock();
            for (name, data) in &batch {
                let Some(key) = self.adapter.key_of(name) else {
                    continue;
                };
                if is_dir(&key) {
                    continue;
                }
                let Some(owner) = self.registry.owner_of(&key) else {
                    continue;
                };
                let cached = state.cache.get(&key).map(String::as_str).unwrap_or_default();

                if owner.is_dir() {
                    let unchanged = self
                        .adapter
                        .decode(&self.registry, &key, data)
                        .map(|pair| pair.value == cached)
                        .unwrap_or(false);
                    if !unchanged {
                        reloads.insert(owner.path.clone());
                    }
                } else {
                    let pair = self.adapter.decode(&self.registry, &key, data)?;
                    if pair.value != cached {
                        documents.insert(key, pair);
                    }
                }
            }
        }

        if documents.is_empty() && reloads.is_empty() {
            return Ok(false);
        }

        let mut pairs: Vec<KvPair> = documents.into_values().collect();
        for dir in &reloads {
            let Some(descriptor) = self.registry.get(dir) else {
                continue;
            };
            let entries = self.adapter.load(&self.ctx, &self.registry, descriptor).await?;
            if entries.is_empty() {
                // nothing left: reset the collection
                pairs.push(KvPair::new(dir.as_str(), ""));
            }
            pairs.extend(entries);
        }

        let notifications = {
            let mut state = self.state.lock();
            unmarshal(&self.registry, &pairs, &mut state.target)?;
            for dir in &reloads {
                state.cache.retain(|key, _| parent_dir(key) != dir.as_str());
            }
            for pair in &pairs {
                apply_to_cache(&mut state.cache, pair);
            }
            self.take_notifications(&mut state)?
        };

        debug!(
            root = %self.registry.root(),
            pairs = pairs.len(),
            reloaded = reloads.len(),
            triggers = notifications.len(),
            "reconciled"
        );
        for notification in notifications {
            notification.fire();
        }
        Ok(true)
    }
}
