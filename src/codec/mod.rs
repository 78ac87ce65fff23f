//! Codecs translate between the neutral document form (`serde_json::Value`)
//! and the bytes a backend stores.

mod json_codec;
mod yaml_codec;

pub use json_codec::*;
pub use yaml_codec::*;


use std::sync::Arc;

use serde_json::Value;

use crate::Result;
use crate::Shape;

pub trait Codec: Send + Sync + 'static {
    /// Short name, also the file extension without its dot.
    fn name(&self) -> &'static str;

    fn marshal(
        &self,
        value: &Value,
    ) -> Result<Vec<u8>>;

    fn unmarshal(
        &self,
        data: &[u8],
    ) -> Result<Value>;

    /// Decodes `data` into the shape of `template`: undeclared keys are
    /// dropped and missing fields take their zero value.
    fn decode(
        &self,
        data: &[u8],
        template: &Shape,
    ) -> Result<Value> {
        Ok(template.conform(self.unmarshal(data)?))
    }
}

/// Codec registered for a file extension (with or without the leading dot).
pub fn codec_for_extension(extension: &str) -> Option<Arc<dyn Codec>> {
    match extension.trim_start_matches('.') {
        "json" => Some(Arc::new(JsonCodec)),
        "yaml" | "yml" => Some(Arc::new(YamlCodec)),
        _ => None,
    }
}

pub fn default_codec() -> Arc<dyn Codec> {
    Arc::new(JsonCodec)
}

/// Drops `null` object members recursively.
pub(crate) fn prune_nulls(value: &Value) -> Value {
    match value {
        Value::Object(members) => Value::Object(
            members
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), prune_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(prune_nulls).collect()),
        other => other.clone(),
    }
}
