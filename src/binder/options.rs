use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::constants::DEFAULT_WATCH_QUEUE_SIZE;
use crate::Backend;
use crate::BackendRegistry;
use crate::BinderConfig;
use crate::Codec;
use crate::DEFAULT_TAG_NAME;

/// Serialization gate shared by every operation of one or more binders.
pub type Locker = Arc<Mutex<()>>;

/// Options recognized by [`bind`](crate::bind), set through chained setters.
///
/// ```ignore
/// let options = BindOptions::new()
///     .tag_name("kv")
///     .without_watch(true);
/// ```
#[derive(Clone)]
pub struct BindOptions {
    pub(super) backend: Option<Arc<dyn Backend>>,
    pub(super) codec: Option<Arc<dyn Codec>>,
    pub(super) locker: Option<Locker>,
    pub(super) tag_name: String,
    pub(super) without_extension: bool,
    pub(super) without_watch: bool,
    pub(super) ttl: Option<Duration>,
    pub(super) backends: BackendRegistry,
    pub(super) watch_queue_size: usize,
}

impl Default for BindOptions {
    fn default() -> Self {
        Self {
            backend: None,
            codec: None,
            locker: None,
            tag_name: DEFAULT_TAG_NAME.to_string(),
            without_extension: false,
            without_watch: false,
            ttl: None,
            backends: BackendRegistry::default(),
            watch_queue_size: DEFAULT_WATCH_QUEUE_SIZE,
        }
    }
}

impl fmt::Debug for BindOptions {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("BindOptions")
            .field("backend", &self.backend.is_some())
            .field("codec", &self.codec.as_ref().map(|c| c.name()))
            .field("locker", &self.locker.is_some())
            .field("tag_name", &self.tag_name)
            .field("without_extension", &self.without_extension)
            .field("without_watch", &self.without_watch)
            .field("ttl", &self.ttl)
            .field("backends", &self.backends)
            .field("watch_queue_size", &self.watch_queue_size)
            .finish()
    }
}

impl BindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds options from loaded configuration.
    pub fn from_config(config: &BinderConfig) -> Self {
        Self {
            tag_name: config.tag_name.clone(),
            without_extension: config.without_extension,
            without_watch: config.without_watch,
            ttl: config.ttl(),
            watch_queue_size: config.watch_queue_size,
            ..Self::default()
        }
    }

    /// Overrides the backend selected from the URI scheme
    pub fn backend(
        mut self,
        backend: Arc<dyn Backend>,
    ) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Overrides the codec selected from the URI extension
    pub fn codec(
        mut self,
        codec: Arc<dyn Codec>,
    ) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Shares one serialization gate between several binders
    pub fn locker(
        mut self,
        locker: Locker,
    ) -> Self {
        self.locker = Some(locker);
        self
    }

    pub fn tag_name(
        mut self,
        tag_name: impl Into<String>,
    ) -> Self {
        self.tag_name = tag_name.into();
        self
    }

    pub fn without_extension(
        mut self,
        without_extension: bool,
    ) -> Self {
        self.without_extension = without_extension;
        self
    }

    pub fn without_watch(
        mut self,
        without_watch: bool,
    ) -> Self {
        self.without_watch = without_watch;
        self
    }

    /// Periodic forced reload interval
    pub fn ttl(
        mut self,
        ttl: Duration,
    ) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Scheme table used when no explicit backend is given
    pub fn backends(
        mut self,
        backends: BackendRegistry,
    ) -> Self {
        self.backends = backends;
        self
    }

    pub fn watch_queue_size(
        mut self,
        size: usize,
    ) -> Self {
        self.watch_queue_size = size.max(1);
        self
    }
}
