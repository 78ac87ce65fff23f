use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::Serializer;
use serde_json::Value;

use super::prune_nulls;
use super::Codec;
use crate::Result;

/// Tab-indented JSON, `null` members omitted.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn marshal(
        &self,
        value: &Value,
    ) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
        prune_nulls(value).serialize(&mut serializer)?;
        Ok(buf)
    }

    fn unmarshal(
        &self,
        data: &[u8],
    ) -> Result<Value> {
        Ok(serde_json::from_slice(data)?)
    }
}
