//! Object Binding Error Hierarchy
//!
//! Defines the error types surfaced by the binder, categorized by the layer
//! that produced them: bind-time validation, path queries, decoding of stored
//! content, codecs and storage backends.

use std::path::PathBuf;

use config::ConfigError;
use tokio::task::JoinError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid bind target or unresolvable bind URI
    #[error(transparent)]
    Bind(#[from] BindError),

    /// Malformed serialized content at a storage path
    #[error("Decode failed at path {path}: {reason}")]
    Decode { path: String, reason: String },

    /// A stored key matches no registered field (schema drift)
    #[error("Key {0} matches no registered field")]
    UnknownPath(String),

    /// Invalid or out-of-bounds field-path query
    #[error(transparent)]
    PathExpression(#[from] PathExpressionError),

    /// ForceLoad found nothing to load
    #[error("No files found in backend")]
    NoFiles,

    /// Backend I/O and watcher failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Codec encode/decode failures at the backend boundary
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Binder configuration loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The operation's cancellation token fired
    #[error("Operation cancelled")]
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// Target value does not match its declared shape
    #[error("Invalid bind target: {0}")]
    InvalidTarget(String),

    /// No backend registered for the URI scheme
    #[error("{0} for bind is not supported")]
    UnsupportedScheme(String),

    /// Malformed bind URI
    #[error("Invalid URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Two fields resolve to the same storage path
    #[error("Storage path {path} is bound by both {first} and {second}")]
    DuplicatePath {
        path: String,
        first: String,
        second: String,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathExpressionError {
    /// Syntax error in the expression itself
    #[error("Malformed path expression {expr}: {reason}")]
    Malformed { expr: String, reason: &'static str },

    /// Composite has no field with this declared name
    #[error("Field {0} not found")]
    FieldNotFound(String),

    /// Mapping has no such key and auto-creation is off
    #[error("Key {0} not found")]
    KeyNotFound(String),

    /// Segment used against a sequence is not a number
    #[error("{0} is not a number")]
    NotAnIndex(String),

    /// Index beyond the sequence length and auto-creation is off
    #[error("Index {index} out of range (len {len})")]
    OutOfRange { index: usize, len: usize },

    /// Remaining segments against a value that cannot be descended into
    #[error("Segment {segment} is not supported on {kind}")]
    Unsupported { segment: String, kind: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// I/O failure tied to a concrete path
    #[error("Error occurred at path: {path}")]
    PathError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Change-notification subscription failures
    #[error("Watch failed: {0}")]
    Watch(String),

    /// Generic backend failure reported by a custom backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Background task failed
    #[error("Background task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("JSON codec failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML codec failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

// ============== Conversion Implementations ============== //
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(StorageError::IoError(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Codec(CodecError::Json(e))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Codec(CodecError::Yaml(e))
    }
}

impl From<notify::Error> for Error {
    fn from(e: notify::Error) -> Self {
        Error::Storage(StorageError::Watch(e.to_string()))
    }
}

impl From<JoinError> for Error {
    fn from(err: JoinError) -> Self {
        StorageError::TaskFailed(err).into()
    }
}

impl Error {
    pub(crate) fn decode(
        path: impl Into<String>,
        reason: impl ToString,
    ) -> Self {
        Error::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
