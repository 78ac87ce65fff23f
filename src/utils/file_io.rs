use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use tracing::debug;
use tracing::error;

use crate::Result;
use crate::StorageError;

/// Filesystem location of a slash-separated storage name; "" is the
/// working directory.
pub(crate) fn fs_path(name: &str) -> PathBuf {
    if name.is_empty() {
        PathBuf::from(".")
    } else {
        PathBuf::from(name)
    }
}

pub(crate) async fn create_parent_dir_if_not_exist(path: &Path) -> Result<()> {
    if let Some(parent_dir) = path.parent() {
        if parent_dir.as_os_str().is_empty() || parent_dir.exists() {
            return Ok(());
        }
        if let Err(e) = tokio::fs::create_dir_all(parent_dir).await {
            error!("Failed to create directory {:?}: {:?}", parent_dir, e);
            return Err(StorageError::PathError {
                path: parent_dir.to_path_buf(),
                source: e,
            }
            .into());
        }
        debug!("created directory: {:?}", parent_dir);
    }
    Ok(())
}

pub(crate) async fn write_file(
    path: &Path,
    buf: &[u8],
) -> Result<()> {
    create_parent_dir_if_not_exist(path).await?;
    tokio::fs::write(path, buf).await.map_err(|e| {
        StorageError::PathError {
            path: path.to_path_buf(),
            source: e,
        }
        .into()
    })
}

/// Reads a file; a missing file reads as `None`.
pub(crate) async fn read_file_if_exists(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::PathError {
            path: path.to_path_buf(),
            source: e,
        }
        .into()),
    }
}

/// Removing a file that does not exist succeeds.
pub(crate) async fn remove_file_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::PathError {
            path: path.to_path_buf(),
            source: e,
        }
        .into()),
    }
}

/// Dot-files and editor backups never map to storage names.
pub(crate) fn is_ignored_file_name(name: &str) -> bool {
    name.is_empty() || name.starts_with('.') || name.ends_with('~')
}
