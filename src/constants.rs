// -
// Storage namespace

/// Separator between storage path segments; a trailing one marks a directory
pub(crate) const PATH_SEPARATOR: char = '/';

/// Annotation key read from each field's side table unless overridden
pub const DEFAULT_TAG_NAME: &str = "bind";

// -
// URI resolution

/// Scheme assumed for bind URIs that carry none
pub(crate) const SCHEME_FILE: &str = "file";
pub(crate) const SCHEME_MEM: &str = "mem";

// -
// Watch pipeline

/// Bounded change-batch queue between backend feeds and the reconciliation task
pub(crate) const DEFAULT_WATCH_QUEUE_SIZE: usize = 64;
