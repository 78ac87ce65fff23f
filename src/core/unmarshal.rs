//! Unmarshal Engine: rebuilds one document from a (possibly partial) set of
//! (storage path, serialized value) pairs and overwrites the live object
//! from it in a single pass.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use super::field_registry::FieldDescriptor;
use super::field_registry::FieldRegistry;
use super::kv::base_name;
use super::kv::parent_dir;
use super::kv::KvPair;
use super::marshal::kind_of;
use crate::constants::PATH_SEPARATOR;
use crate::shape::is_exploded;
use crate::Error;
use crate::Result;
use crate::ShapeKind;

/// What a batch of pairs contributes to the bound object.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct Assembly {
    /// Top-level fields of a composite root, keyed by serialization name
    pub fields: Map<String, Value>,
    /// Replacement for a non-composite root
    pub whole: Option<Value>,
}

impl Assembly {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.whole.is_none()
    }
}

/// Merges `pairs` into `target`.
///
/// Fields named by the assembled document replace the live ones; fields it
/// does not name keep their value. An empty value on a field's own path
/// resets that field to its zero value; empty values of individual
/// directory entries contribute nothing. On error `target` is untouched.
pub fn unmarshal<T>(
    registry: &FieldRegistry,
    pairs: &[KvPair],
    target: &mut T,
) -> Result<()>
where
    T: Serialize + DeserializeOwned,
{
    let assembly = assemble(registry, pairs)?;
    if assembly.is_empty() {
        return Ok(());
    }

    let merged = match assembly.whole {
        Some(whole) => whole,
        None => {
            let mut current = match serde_json::to_value(&*target)? {
                Value::Object(members) => members,
                other => {
                    return Err(Error::decode(
                        registry.root(),
                        format!("live object serialized as {}", kind_of(&other)),
                    ))
                }
            };
            for (name, value) in assembly.fields {
                current.insert(name, value);
            }
            Value::Object(current)
        }
    };

    *target = serde_json::from_value(merged).map_err(|e| Error::decode(registry.root(), e))?;
    Ok(())
}

/// Classifies every pair by its key and assembles the combined document.
pub(crate) fn assemble(
    registry: &FieldRegistry,
    pairs: &[KvPair],
) -> Result<Assembly> {
    let composite = registry.is_composite_root();
    let mut assembly = Assembly::default();
    let mut buckets: BTreeMap<&str, (&FieldDescriptor, Vec<&KvPair>)> = BTreeMap::new();

    for pair in pairs {
        let key = pair.key.as_str();

        if let Some(descriptor) = registry.get(key) {
            if descriptor.is_root() && composite {
                splice_root_document(registry, pair, &mut assembly.fields)?;
            } else {
                let value = own_value(descriptor, pair)?;
                if descriptor.is_root() {
                    assembly.whole = Some(value);
                } else {
                    assembly
                        .fields
                        .insert(descriptor.serialization_name.clone(), value);
                }
            }
            continue;
        }

        if !key.contains(PATH_SEPARATOR) && composite {
            if !pair.is_empty() {
                assembly.fields.insert(key.to_string(), parse(key, &pair.value)?);
            }
            continue;
        }

        let Some(owner) = registry.get(parent_dir(key)).filter(|d| d.is_dir()) else {
            return Err(Error::UnknownPath(key.to_string()));
        };
        if pair.is_empty() {
            continue;
        }
        if owner.is_root() && composite {
            let name = base_name(key);
            let known = registry
                .root_shape()
                .field_by_serialization_name(name)
                .filter(|f| !is_exploded(f, registry.tag_name()));
            if known.is_none() {
                return Err(Error::UnknownPath(key.to_string()));
            }
            assembly.fields.insert(name.to_string(), parse(key, &pair.value)?);
        } else {
            buckets
                .entry(owner.path.as_str())
                .or_insert_with(|| (owner, Vec::new()))
                .1
                .push(pair);
        }
    }

    for (descriptor, entries) in buckets.into_values() {
        let collection = parts_to_value(descriptor, &entries)?;
        if descriptor.is_root() {
            assembly.whole = Some(collection);
        } else {
            assembly
                .fields
                .insert(descriptor.serialization_name.clone(), collection);
        }
    }

    Ok(assembly)
}

/// Root document of a composite: its members are spliced in directly; an
/// empty value resets every inline field.
fn splice_root_document(
    registry: &FieldRegistry,
    pair: &KvPair,
    fields: &mut Map<String, Value>,
) -> Result<()> {
    if pair.is_empty() {
        for field in registry.root_shape().inline_only(registry.tag_name()).fields() {
            fields.insert(field.serialization_name.clone(), field.shape.zero_value());
        }
        return Ok(());
    }
    if registry.root_descriptor().is_dir() {
        return Err(Error::decode(&pair.key, "directory path carries a value"));
    }
    match parse(&pair.key, &pair.value)? {
        Value::Object(members) => {
            fields.extend(members);
            Ok(())
        }
        other => Err(Error::decode(
            &pair.key,
            format!("root document is {}, expected object", kind_of(&other)),
        )),
    }
}

/// Value stored at a descriptor's own path; empty means zero value.
fn own_value(
    descriptor: &FieldDescriptor,
    pair: &KvPair,
) -> Result<Value> {
    if pair.is_empty() {
        return Ok(descriptor.shape.zero_value());
    }
    if descriptor.is_dir() {
        return Err(Error::decode(&pair.key, "directory path carries a value"));
    }
    parse(&pair.key, &pair.value)
}

/// Sequence directories become an array in encounter order; mapping and
/// composite directories become an object keyed by entry name.
fn parts_to_value(
    descriptor: &FieldDescriptor,
    entries: &[&KvPair],
) -> Result<Value> {
    match descriptor.kind {
        ShapeKind::Sequence => entries
            .iter()
            .map(|p| parse(&p.key, &p.value))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        _ => entries
            .iter()
            .map(|p| Ok((base_name(&p.key).to_string(), parse(&p.key, &p.value)?)))
            .collect::<Result<Map<_, _>>>()
            .map(Value::Object),
    }
}

fn parse(
    key: &str,
    text: &str,
) -> Result<Value> {
    serde_json::from_str(text).map_err(|e| Error::decode(key, e))
}
