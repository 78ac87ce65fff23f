use serde_json::Value;

use super::prune_nulls;
use super::Codec;
use crate::Result;

/// YAML documents, `null` members omitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn marshal(
        &self,
        value: &Value,
    ) -> Result<Vec<u8>> {
        Ok(serde_yaml::to_string(&prune_nulls(value))?.into_bytes())
    }

    fn unmarshal(
        &self,
        data: &[u8],
    ) -> Result<Value> {
        Ok(serde_yaml::from_slice(data)?)
    }
}
