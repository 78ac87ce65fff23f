//! Boundary between the engines' neutral key-value text and the backend's
//! named byte blobs: extension policy, codec translation and loading of
//! documents and directories.

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::warn;

use crate::core::base_name;
use crate::core::is_dir;
use crate::core::parent_dir;
use crate::core::sort_entry_names;
use crate::Backend;
use crate::Codec;
use crate::FieldDescriptor;
use crate::FieldRegistry;
use crate::KvPair;
use crate::Result;
use crate::ScalarKind;
use crate::Shape;
use crate::ShapeKind;

/// Extension of the last path segment including its dot, or "" for
/// directories and names without one.
pub(crate) fn extension_of(path: &str) -> &str {
    if is_dir(path) {
        return "";
    }
    let base = base_name(path);
    match base.rfind('.') {
        Some(i) => &base[i..],
        None => "",
    }
}

pub(crate) struct StorageAdapter {
    backend: Arc<dyn Backend>,
    codec: Arc<dyn Codec>,
    /// `None` stores bare names
    extension: Option<String>,
}

impl StorageAdapter {
    pub(crate) fn new(
        backend: Arc<dyn Backend>,
        codec: Arc<dyn Codec>,
        extension: Option<String>,
    ) -> Self {
        Self {
            backend,
            codec,
            extension,
        }
    }

    pub(crate) fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub(crate) fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// Backend name of a storage key; directories keep their name.
    pub(crate) fn file_name(
        &self,
        key: &str,
    ) -> String {
        match &self.extension {
            Some(ext) if !is_dir(key) => format!("{key}{ext}"),
            _ => key.to_string(),
        }
    }

    /// Storage key of a backend name, `None` when the extension does not
    /// match the bound one.
    pub(crate) fn key_of(
        &self,
        name: &str,
    ) -> Option<String> {
        match &self.extension {
            _ if is_dir(name) => Some(name.to_string()),
            Some(ext) => name
                .strip_suffix(ext.as_str())
                .filter(|key| !base_name(key).is_empty())
                .map(str::to_string),
            None => Some(name.to_string()),
        }
    }

    /// Neutral text to codec bytes; an empty value stays empty (delete).
    pub(crate) fn encode(
        &self,
        registry: &FieldRegistry,
        pair: &KvPair,
    ) -> Result<Vec<u8>> {
        if pair.is_empty() {
            return Ok(Vec::new());
        }
        let value: Value =
            serde_json::from_str(&pair.value).map_err(|e| crate::Error::decode(&pair.key, e))?;
        let value = template_for(registry, &pair.key).conform(value);
        self.codec.marshal(&value)
    }

    /// Codec bytes to neutral text conformed to the key's template, so the
    /// result compares equal to fresh marshal output for equal content.
    pub(crate) fn decode(
        &self,
        registry: &FieldRegistry,
        key: &str,
        data: &[u8],
    ) -> Result<KvPair> {
        if data.is_empty() {
            return Ok(KvPair::new(key, ""));
        }
        let value = self
            .codec
            .decode(data, &template_for(registry, key))
            .map_err(|e| crate::Error::decode(key, e))?;
        Ok(KvPair::new(key, serde_json::to_string(&value)?))
    }

    pub(crate) async fn save(
        &self,
        ctx: &CancellationToken,
        registry: &FieldRegistry,
        pair: &KvPair,
    ) -> Result<()> {
        let data = self.encode(registry, pair)?;
        let name = self.file_name(&pair.key);
        debug!(action = "save", path = %name, bytes = data.len(), "persisting");
        self.backend.save(ctx, &name, data).await
    }

    /// Content currently stored for one registered field. Directories yield
    /// their direct children with a matching extension, ordered numerically
    /// for sequences whose names are all numerals and lexically otherwise.
    /// Empty entries are skipped.
    pub(crate) async fn load(
        &self,
        ctx: &CancellationToken,
        registry: &FieldRegistry,
        descriptor: &FieldDescriptor,
    ) -> Result<Vec<KvPair>> {
        let dir = descriptor.path.as_str();
        let entries = self.backend.load(ctx, &self.file_name(dir)).await?;

        if !descriptor.is_dir() {
            return entries
                .iter()
                .filter(|(name, data)| !data.is_empty() && self.key_of(name).as_deref() == Some(dir))
                .map(|(_, data)| self.decode(registry, dir, data))
                .collect();
        }

        let mut named = Vec::new();
        for (name, data) in &entries {
            let Some(key) = self.key_of(name) else {
                debug!(path = %name, "ignoring entry with foreign extension");
                continue;
            };
            if is_dir(&key) || parent_dir(&key) != dir || data.is_empty() {
                continue;
            }
            if registry.template_for(&key).is_none() {
                warn!(path = %key, "ignoring entry that matches no field");
                continue;
            }
            named.push((base_name(&key).to_string(), data));
        }

        let mut names: Vec<String> = named.iter().map(|(n, _)| n.clone()).collect();
        sort_entry_names(&mut names, descriptor.kind == ShapeKind::Sequence);

        names
            .iter()
            .filter_map(|n| named.iter().find(|(name, _)| name == n))
            .map(|(name, data)| self.decode(registry, &format!("{dir}{name}"), data))
            .collect()
    }

    /// Loads every registered field; fields with no content contribute
    /// nothing.
    pub(crate) async fn load_all(
        &self,
        ctx: &CancellationToken,
        registry: &FieldRegistry,
    ) -> Result<Vec<KvPair>> {
        let mut pairs = Vec::new();
        for descriptor in registry.descriptors() {
            pairs.extend(self.load(ctx, registry, descriptor).await?);
        }
        Ok(pairs)
    }
}

fn template_for(
    registry: &FieldRegistry,
    key: &str,
) -> Shape {
    registry
        .template_for(key)
        .unwrap_or(Shape::Scalar(ScalarKind::Any))
}
