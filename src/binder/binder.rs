use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::adapter::extension_of;
use super::adapter::StorageAdapter;
use super::options::Locker;
use super::trigger::collect_notifications;
use super::trigger::FieldCallback;
use super::trigger::Notification;
use super::trigger::Trigger;
use super::watch;
use super::BindOptions;
use crate::apply_to_cache;
use crate::codec_for_extension;
use crate::default_codec;
use crate::diff;
use crate::marshal_object;
use crate::resolve;
use crate::unmarshal;
use crate::Bindable;
use crate::BindUri;
use crate::Error;
use crate::FieldRegistry;
use crate::KvPair;
use crate::PathExpr;
use crate::PersistedKeys;
use crate::Result;

/// Mutable binder state, always accessed under the serialization gate.
pub(crate) struct State<T> {
    pub(crate) target: T,
    /// Document form of the object as last notified
    pub(crate) snapshot: Value,
    pub(crate) cache: PersistedKeys,
    pub(crate) triggers: Vec<Trigger>,
}

pub(crate) struct BinderInner<T> {
    pub(crate) registry: FieldRegistry,
    pub(crate) adapter: StorageAdapter,
    pub(crate) gate: Locker,
    pub(crate) state: Mutex<State<T>>,
    /// Bind-time token; ends the watch feed and background reloads
    pub(crate) ctx: CancellationToken,
}

/// Handle to an object bound to a key-value namespace. Clones share the
/// same object and state.
pub struct Binder<T> {
    pub(super) inner: Arc<BinderInner<T>>,
}

impl<T> Clone for Binder<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Binds `target` to the namespace named by `uri`.
///
/// The URI scheme selects the backend (`file` when absent) and its extension
/// the codec (JSON when absent or unknown). When the backend holds nothing
/// for the object yet, the current object is persisted; otherwise the stored
/// content is loaded into it. Unless disabled, changes made in the backend
/// are merged into the object from then on, until `ctx` is cancelled.
pub async fn bind<T: Bindable>(
    ctx: CancellationToken,
    target: T,
    uri: &str,
    options: BindOptions,
) -> Result<Binder<T>> {
    let bind_uri = BindUri::parse(uri)?;
    let backend = match &options.backend {
        Some(backend) => backend.clone(),
        None => options.backends.resolve(&bind_uri)?,
    };

    let mut extension = extension_of(&bind_uri.path).to_string();
    let codec = options
        .codec
        .clone()
        .or_else(|| codec_for_extension(&extension))
        .unwrap_or_else(default_codec);

    let mut root = bind_uri.path.clone();
    let extension = if options.without_extension {
        None
    } else {
        if extension.is_empty() {
            extension = format!(".{}", codec.name());
        }
        if let Some(stripped) = root.strip_suffix(extension.as_str()) {
            root = stripped.to_string();
        }
        Some(extension)
    };

    let registry = FieldRegistry::build(&root, &T::shape(), &options.tag_name)?;
    let inner = Arc::new(BinderInner {
        registry,
        adapter: StorageAdapter::new(backend, codec, extension),
        gate: options.locker.clone().unwrap_or_default(),
        state: Mutex::new(State {
            target,
            snapshot: Value::Null,
            cache: PersistedKeys::new(),
            triggers: Vec::new(),
        }),
        ctx: ctx.clone(),
    });

    inner.init(&ctx).await?;

    if !options.without_watch {
        watch::start_watch(&inner, options.watch_queue_size).await?;
    }
    if let Some(ttl) = options.ttl {
        watch::start_ttl_reload(&inner, ttl);
    }

    info!(
        root = %inner.registry.root(),
        codec = inner.adapter.codec().name(),
        fields = inner.registry.len(),
        "bound"
    );
    Ok(Binder { inner })
}

impl<T: Bindable> BinderInner<T> {
    /// Loads stored content into the object, or persists the object when
    /// nothing is stored yet.
    async fn init(
        &self,
        ctx: &CancellationToken,
    ) -> Result<()> {
        let _gate = self.gate.lock().await;

        let pairs = self.adapter.load_all(ctx, &self.registry).await?;
        if pairs.is_empty() {
            debug!(root = %self.registry.root(), "backend is empty, persisting current object");
            let current = {
                let state = self.state.lock();
                marshal_object(&self.registry, &state.target)?
            };
            self.persist(ctx, diff(&current, &PersistedKeys::new())).await?;
        } else {
            let mut state = self.state.lock();
            unmarshal(&self.registry, &pairs, &mut state.target)?;
            state.cache = cache_of(&pairs);
        }

        let mut state = self.state.lock();
        state.snapshot = serde_json::to_value(&state.target)?;
        Ok(())
    }

    /// Writes the change set; stops at the first failure. The cache follows
    /// every successful write.
    async fn persist(
        &self,
        ctx: &CancellationToken,
        changes: crate::ChangeSet,
    ) -> Result<usize> {
        let mut written = 0;
        for pair in changes.into_pairs() {
            self.adapter.save(ctx, &self.registry, &pair).await?;
            apply_to_cache(&mut self.state.lock().cache, &pair);
            written += 1;
        }
        Ok(written)
    }

    pub(crate) async fn save(
        &self,
        ctx: &CancellationToken,
    ) -> Result<usize> {
        let _gate = self.gate.lock().await;
        let changes = {
            let state = self.state.lock();
            let current = marshal_object(&self.registry, &state.target)?;
            diff(&current, &state.cache)
        };
        let written = self.persist(ctx, changes).await?;
        debug!(root = %self.registry.root(), written, "saved");
        Ok(written)
    }

    pub(crate) async fn force_load(
        &self,
        ctx: &CancellationToken,
    ) -> Result<()> {
        let _gate = self.gate.lock().await;

        let pairs = self.adapter.load_all(ctx, &self.registry).await?;
        if pairs.is_empty() {
            return Err(Error::NoFiles);
        }

        let notifications = {
            let mut state = self.state.lock();
            unmarshal(&self.registry, &pairs, &mut state.target)?;
            state.cache = cache_of(&pairs);
            self.take_notifications(&mut state)?
        };
        for notification in notifications {
            notification.fire();
        }
        Ok(())
    }

    /// Compares the object against the snapshot, then refreshes the
    /// snapshot. The returned callbacks must run after the state lock is
    /// released.
    pub(crate) fn take_notifications(
        &self,
        state: &mut State<T>,
    ) -> Result<Vec<Notification>> {
        let current = serde_json::to_value(&state.target)?;
        let fired = collect_notifications(
            self.registry.root_shape(),
            &state.triggers,
            &state.snapshot,
            &current,
        );
        state.snapshot = current;
        Ok(fired)
    }
}

impl<T: Bindable> Binder<T> {
    /// Copy of the live object.
    pub fn get(&self) -> T {
        self.inner.state.lock().target.clone()
    }

    pub fn read<R>(
        &self,
        f: impl FnOnce(&T) -> R,
    ) -> R {
        f(&self.inner.state.lock().target)
    }

    /// Mutates the live object in place. Nothing is persisted until
    /// [`save`](Self::save); local edits are reported to triggers with the
    /// next merge from the backend.
    pub fn update<R>(
        &self,
        f: impl FnOnce(&mut T) -> R,
    ) -> R {
        f(&mut self.inner.state.lock().target)
    }

    /// Registers `callback` for the field at `expr` (e.g. `items[0].label`)
    /// and invokes it once right away with the current value as both
    /// arguments. Later calls receive `(new, old)` whenever a merge changes
    /// the value.
    ///
    /// The callback runs while the binder is locked: it may call
    /// [`get`](Self::get) or [`read`](Self::read) but not the async
    /// operations.
    pub async fn bind_field<F>(
        &self,
        expr: &str,
        callback: F,
    ) -> Result<()>
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let expr = PathExpr::compile(expr)?;
        let callback: FieldCallback = Arc::new(callback);

        let _gate = self.inner.gate.lock().await;
        let current = {
            let state = self.inner.state.lock();
            let document = serde_json::to_value(&state.target)?;
            resolve(&document, self.inner.registry.root_shape(), &expr, true)?.value
        };
        callback(&current, &current);

        self.inner.state.lock().triggers.push(Trigger { expr, callback });
        Ok(())
    }

    /// Typed variant of [`bind_field`](Self::bind_field). Values that do not
    /// deserialize into `V` are logged and skipped.
    pub async fn bind_field_as<V, F>(
        &self,
        expr: &str,
        callback: F,
    ) -> Result<()>
    where
        V: DeserializeOwned + 'static,
        F: Fn(V, V) + Send + Sync + 'static,
    {
        let path = expr.to_string();
        self.bind_field(expr, move |new, old| match (V::deserialize(new), V::deserialize(old)) {
            (Ok(new), Ok(old)) => callback(new, old),
            (Err(e), _) | (_, Err(e)) => warn!(path = %path, "field value does not match callback type: {}", e),
        })
        .await
    }

    /// Current value at `expr`, without auto-creating missing elements.
    pub fn field_value(
        &self,
        expr: &str,
    ) -> Result<Value> {
        let expr = PathExpr::compile(expr)?;
        let state = self.inner.state.lock();
        let document = serde_json::to_value(&state.target)?;
        Ok(resolve(&document, self.inner.registry.root_shape(), &expr, false)?.value)
    }

    /// Reloads every registered path and merges the result. Fails with
    /// [`Error::NoFiles`] when the backend holds nothing for the object.
    pub async fn force_load(
        &self,
        ctx: &CancellationToken,
    ) -> Result<()> {
        self.inner.force_load(ctx).await
    }

    /// Persists the difference between the object and what is known to be
    /// stored. Stops at the first failed write; keys already written stay
    /// written.
    pub async fn save(
        &self,
        ctx: &CancellationToken,
    ) -> Result<()> {
        self.inner.save(ctx).await.map(|_| ())
    }

    /// Root storage path, without extension.
    pub fn root(&self) -> &str {
        self.inner.registry.root()
    }

    /// Every registered storage path.
    pub fn paths(&self) -> Vec<String> {
        self.inner.registry.paths().map(str::to_string).collect()
    }

    /// Backend names the registered paths are stored under.
    pub fn file_names(&self) -> Vec<String> {
        self.inner
            .registry
            .paths()
            .map(|p| self.inner.adapter.file_name(p))
            .collect()
    }
}

fn cache_of(pairs: &[KvPair]) -> PersistedKeys {
    let mut cache = PersistedKeys::new();
    for pair in pairs {
        apply_to_cache(&mut cache, pair);
    }
    cache
}
