use std::time::Duration;

use serde::Deserialize;

use crate::constants::DEFAULT_WATCH_QUEUE_SIZE;
use crate::constants::PATH_SEPARATOR;
use crate::Result;
use crate::DEFAULT_TAG_NAME;

/// Tunables applied to every binder created from configuration.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct BinderConfig {
    /// Annotation key read from each field's side table
    #[serde(default = "default_tag_name")]
    pub tag_name: String,

    /// Store bare names without the codec extension
    #[serde(default)]
    pub without_extension: bool,

    /// Skip the backend watch subscription
    #[serde(default)]
    pub without_watch: bool,

    /// Periodic full reload interval (unit: milliseconds, 0 disables it)
    #[serde(default)]
    pub ttl_ms: u64,

    /// Capacity of the change-batch queue feeding reconciliation
    #[serde(default = "default_watch_queue_size")]
    pub watch_queue_size: usize,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            tag_name: default_tag_name(),
            without_extension: false,
            without_watch: false,
            ttl_ms: 0,
            watch_queue_size: default_watch_queue_size(),
        }
    }
}

impl BinderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tag_name.is_empty() {
            return Err(invalid("tag_name must not be empty"));
        }
        if self.tag_name.contains(PATH_SEPARATOR) {
            return Err(invalid("tag_name must not contain a path separator"));
        }
        if self.watch_queue_size == 0 {
            return Err(invalid("watch_queue_size must be greater than 0"));
        }
        Ok(())
    }

    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_ms > 0).then(|| Duration::from_millis(self.ttl_ms))
    }
}

fn invalid(message: &str) -> crate::Error {
    config::ConfigError::Message(message.to_string()).into()
}

fn default_tag_name() -> String {
    DEFAULT_TAG_NAME.to_string()
}
fn default_watch_queue_size() -> usize {
    DEFAULT_WATCH_QUEUE_SIZE
}
