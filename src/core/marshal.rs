//! Marshal Engine: decomposes the document form of a bound object into the
//! flat list of (storage path, serialized value) pairs that represents its
//! complete current state.

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use super::field_registry::FieldRegistry;
use super::kv::is_dir;
use super::kv::KvPair;
use crate::BindError;
use crate::Result;
use crate::Shape;

/// Serializes `target` and marshals it against `registry`.
pub fn marshal_object<T: Serialize>(
    registry: &FieldRegistry,
    target: &T,
) -> Result<Vec<KvPair>> {
    let document = serde_json::to_value(target)?;
    marshal(registry, &document)
}

/// Output order: the combined root document (when at least one inline field
/// exists) first, then exploded fields in declared order. Elements of an
/// exploded collection follow the collection's own order.
pub fn marshal(
    registry: &FieldRegistry,
    document: &Value,
) -> Result<Vec<KvPair>> {
    let root = registry.root();
    let shape = registry.root_shape();

    if !registry.is_composite_root() {
        return explode(root, shape, document.clone());
    }

    let members = document.as_object().ok_or_else(|| {
        BindError::InvalidTarget(format!("composite root serialized as {}", kind_of(document)))
    })?;

    let mut pairs = Vec::new();
    let mut combined = Map::new();
    for field in shape.fields() {
        let value = members
            .get(&field.serialization_name)
            .cloned()
            .unwrap_or_else(|| field.shape.zero_value());

        if let Some(descriptor) = registry.exploded_field(&field.declared_name) {
            pairs.extend(explode(&descriptor.path, &field.shape, value)?);
        } else if is_dir(root) {
            pairs.push(KvPair::new(
                format!("{root}{}", field.serialization_name),
                encode(&field.shape, value)?,
            ));
        } else {
            combined.insert(field.serialization_name.clone(), field.shape.conform(value));
        }
    }

    if !combined.is_empty() {
        let text = serde_json::to_string(&Value::Object(combined))?;
        pairs.insert(0, KvPair::new(root, text));
    }
    Ok(pairs)
}

/// One pair for a document path; one pair per element for a directory path.
fn explode(
    path: &str,
    shape: &Shape,
    value: Value,
) -> Result<Vec<KvPair>> {
    if !is_dir(path) {
        return Ok(vec![KvPair::new(path, encode(shape, value)?)]);
    }

    let mismatch = |value: &Value| -> crate::Error {
        BindError::InvalidTarget(format!(
            "{} at {path} serialized as {}",
            shape.kind().as_str(),
            kind_of(value)
        ))
        .into()
    };

    let mut pairs = Vec::new();
    match (shape.strip_indirection(), value) {
        (_, Value::Null) => {}
        (Shape::Mapping(inner), Value::Object(entries)) => {
            for (key, entry) in entries {
                pairs.push(KvPair::new(format!("{path}{key}"), encode(inner, entry)?));
            }
        }
        (Shape::Sequence(inner), Value::Array(items)) => {
            for (index, item) in items.into_iter().enumerate() {
                pairs.push(KvPair::new(format!("{path}{index}"), encode(inner, item)?));
            }
        }
        (Shape::Composite(fields), Value::Object(mut members)) => {
            for field in fields {
                let member = members
                    .remove(&field.serialization_name)
                    .unwrap_or_else(|| field.shape.zero_value());
                pairs.push(KvPair::new(
                    format!("{path}{}", field.serialization_name),
                    encode(&field.shape, member)?,
                ));
            }
        }
        (_, value) => return Err(mismatch(&value)),
    }
    Ok(pairs)
}

fn encode(
    shape: &Shape,
    value: Value,
) -> Result<String> {
    Ok(serde_json::to_string(&shape.conform(value))?)
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
