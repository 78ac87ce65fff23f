//! Local filesystem backend. Storage names are filesystem paths, relative
//! names resolve against the working directory; change notifications come
//! from `notify`.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use notify::event::EventKind;
use notify::RecursiveMode;
use notify::Watcher;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;

use crate::core::is_dir;
use crate::core::parent_dir;
use crate::utils::async_task::cancellable;
use crate::utils::file_io::fs_path;
use crate::utils::file_io::is_ignored_file_name;
use crate::utils::file_io::read_file_if_exists;
use crate::utils::file_io::remove_file_if_exists;
use crate::utils::file_io::write_file;
use crate::Backend;
use crate::ChangeBatch;
use crate::Entries;
use crate::Result;
use crate::StorageError;

#[derive(Debug, Default, Clone)]
pub struct FileBackend;

impl FileBackend {
    pub fn new() -> Self {
        Self
    }

    async fn load_dir(dir: &str) -> Result<Entries> {
        let mut entries = Entries::new();
        let mut read_dir = match tokio::fs::read_dir(fs_path(dir)).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => {
                return Err(StorageError::PathError {
                    path: fs_path(dir),
                    source: e,
                }
                .into())
            }
        };

        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_ignored_file_name(&name) || entry.file_type().await?.is_dir() {
                continue;
            }
            // vanished between listing and reading
            if let Some(data) = read_file_if_exists(&entry.path()).await? {
                entries.insert(format!("{dir}{name}"), data);
            }
        }
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl Backend for FileBackend {
    async fn load(
        &self,
        ctx: &CancellationToken,
        path: &str,
    ) -> Result<Entries> {
        cancellable(ctx, async {
            if is_dir(path) {
                return Self::load_dir(path).await;
            }
            let mut entries = Entries::new();
            if let Some(data) = read_file_if_exists(Path::new(path)).await? {
                entries.insert(path.to_string(), data);
            }
            Ok(entries)
        })
        .await
    }

    async fn save(
        &self,
        ctx: &CancellationToken,
        path: &str,
        data: Vec<u8>,
    ) -> Result<()> {
        cancellable(ctx, async {
            if data.is_empty() {
                debug!(action = "remove", path, "file backend");
                remove_file_if_exists(Path::new(path)).await
            } else {
                debug!(action = "write", path, "file backend");
                write_file(Path::new(path), &data).await
            }
        })
        .await
    }

    /// Watches the directory of every path non-recursively. Missing
    /// directories are created first so that later files are observed.
    async fn watch(
        &self,
        ctx: CancellationToken,
        paths: Vec<String>,
        tx: mpsc::Sender<ChangeBatch>,
    ) -> Result<()> {
        let mut prefixes: HashMap<PathBuf, String> = HashMap::new();
        for path in &paths {
            let prefix = if is_dir(path) { path.as_str() } else { parent_dir(path) };
            let dir = fs_path(prefix);
            tokio::fs::create_dir_all(&dir).await.map_err(|e| StorageError::PathError {
                path: dir.clone(),
                source: e,
            })?;
            let canonical = tokio::fs::canonicalize(&dir).await?;
            prefixes.entry(canonical).or_insert_with(|| prefix.to_string());
        }

        let lookup = prefixes.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for changed in &event.paths {
                    if let Some(batch) = read_change(&lookup, changed) {
                        if tx.blocking_send(batch).is_err() {
                            debug!("watch receiver closed");
                            return;
                        }
                    }
                }
            }
            Err(e) => error!(action = "notify", "watch error: {}", e),
        })?;

        for dir in prefixes.keys() {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
            debug!("watching {:?}", dir);
        }

        tokio::spawn(async move {
            ctx.cancelled().await;
            drop(watcher);
            debug!("file watch stopped");
        });
        Ok(())
    }
}

/// Maps one changed filesystem path back to its storage name and current
/// content (empty when the file is gone).
fn read_change(
    prefixes: &HashMap<PathBuf, String>,
    changed: &Path,
) -> Option<ChangeBatch> {
    let name = changed.file_name()?.to_string_lossy().into_owned();
    if is_ignored_file_name(&name) || changed.is_dir() {
        return None;
    }
    let parent = changed.parent()?;
    let prefix = prefixes
        .get(parent)
        .or_else(|| std::fs::canonicalize(parent).ok().and_then(|p| prefixes.get(&p)))?;

    let data = match std::fs::read(changed) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            warn!(action = "read_file", path = ?changed, "{}", e);
            return None;
        }
    };
    Some(ChangeBatch::from([(format!("{prefix}{name}"), data)]))
}
