//! Field Registry: maps every storage path owned by a bound object to the
//! descriptor of the field stored there. Built once at bind time, immutable
//! afterwards.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::kv::base_name;
use super::kv::is_dir;
use super::kv::parent_dir;
use super::kv::root_dir;
use crate::constants::PATH_SEPARATOR;
use crate::shape::is_exploded;
use crate::BindError;
use crate::Result;
use crate::Shape;
use crate::ShapeKind;

/// Metadata of one storage location: the root object itself, or one field
/// that carries a path annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Absolute storage path; a trailing separator marks a directory field
    pub path: String,
    /// Field name in the host type ("" for the root)
    pub declared_name: String,
    /// Name used in the combined document ("" for the root)
    pub serialization_name: String,
    pub kind: ShapeKind,
    pub shape: Shape,
    /// Shape of one collection element, indirection stripped
    pub element_shape: Option<Shape>,
}

impl FieldDescriptor {
    fn new(
        path: String,
        declared_name: &str,
        serialization_name: &str,
        shape: &Shape,
    ) -> Self {
        Self {
            path,
            declared_name: declared_name.to_string(),
            serialization_name: serialization_name.to_string(),
            kind: shape.kind(),
            shape: shape.clone(),
            element_shape: shape.element().cloned(),
        }
    }

    pub fn is_dir(&self) -> bool {
        is_dir(&self.path)
    }

    pub fn is_root(&self) -> bool {
        self.declared_name.is_empty()
    }

    /// Zero-valued instance of one collection element.
    pub fn element_template(&self) -> Option<Value> {
        self.element_shape.as_ref().map(Shape::zero_value)
    }
}

#[derive(Debug, Clone)]
pub struct FieldRegistry {
    root: String,
    root_dir: String,
    tag_name: String,
    root_shape: Shape,
    fields: BTreeMap<String, FieldDescriptor>,
}

impl FieldRegistry {
    /// Introspects `shape` and registers the root plus every field whose
    /// annotation (under `tag_name`) contains a path separator. Relative
    /// annotations resolve against the root's containing directory.
    pub fn build(
        root: &str,
        shape: &Shape,
        tag_name: &str,
    ) -> Result<Self> {
        let root_dir = root_dir(root).to_string();
        let mut fields = BTreeMap::new();

        let root_descriptor = FieldDescriptor::new(root.to_string(), "", "", shape);
        if root_descriptor.is_dir() && root_descriptor.kind == ShapeKind::Scalar {
            return Err(BindError::InvalidTarget(format!(
                "scalar root cannot be bound to directory path {root}"
            ))
            .into());
        }
        fields.insert(root.to_string(), root_descriptor);

        for field in shape.fields() {
            if !is_exploded(field, tag_name) {
                continue;
            }
            let annotation = field.annotation(tag_name).unwrap_or_default();
            let path = if annotation.starts_with(PATH_SEPARATOR) {
                annotation.to_string()
            } else {
                format!("{root_dir}{annotation}")
            };

            let descriptor = FieldDescriptor::new(
                path.clone(),
                &field.declared_name,
                &field.serialization_name,
                &field.shape,
            );
            if descriptor.is_dir() && descriptor.kind == ShapeKind::Scalar {
                return Err(BindError::InvalidTarget(format!(
                    "scalar field {} cannot be bound to directory path {path}",
                    field.declared_name
                ))
                .into());
            }
            if let Some(existing) = fields.get(&path) {
                return Err(BindError::DuplicatePath {
                    path,
                    first: display_name(existing),
                    second: field.declared_name.clone(),
                }
                .into());
            }
            debug!("registered field {} at {}", field.declared_name, path);
            fields.insert(path, descriptor);
        }

        Ok(Self {
            root: root.to_string(),
            root_dir,
            tag_name: tag_name.to_string(),
            root_shape: shape.clone(),
            fields,
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn root_dir(&self) -> &str {
        &self.root_dir
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    pub fn root_shape(&self) -> &Shape {
        &self.root_shape
    }

    pub fn root_descriptor(&self) -> &FieldDescriptor {
        &self.fields[&self.root]
    }

    pub fn is_composite_root(&self) -> bool {
        self.root_shape.kind() == ShapeKind::Composite
    }

    pub fn get(
        &self,
        path: &str,
    ) -> Option<&FieldDescriptor> {
        self.fields.get(path)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    /// Exploded descriptor of a root field, looked up by declared name.
    pub fn exploded_field(
        &self,
        declared_name: &str,
    ) -> Option<&FieldDescriptor> {
        self.fields
            .values()
            .find(|d| !d.is_root() && d.declared_name == declared_name)
    }

    /// Descriptor owning `key`: exact match first, else its containing
    /// directory when that directory is a registered directory field.
    pub fn owner_of(
        &self,
        key: &str,
    ) -> Option<&FieldDescriptor> {
        if let Some(descriptor) = self.fields.get(key) {
            return Some(descriptor);
        }
        self.fields.get(parent_dir(key)).filter(|d| d.is_dir())
    }

    /// Shape the content stored at `key` must conform to.
    pub fn template_for(
        &self,
        key: &str,
    ) -> Option<Shape> {
        let owner = self.owner_of(key)?;
        if owner.path == key {
            if owner.is_root() && self.is_composite_root() {
                return Some(self.root_shape.inline_only(&self.tag_name));
            }
            return Some(owner.shape.clone());
        }
        match owner.kind {
            ShapeKind::Composite => owner
                .shape
                .field_by_serialization_name(base_name(key))
                .map(|f| f.shape.clone()),
            _ => owner.element_shape.clone(),
        }
    }
}

fn display_name(descriptor: &FieldDescriptor) -> String {
    if descriptor.is_root() {
        "<root>".to_string()
    } else {
        descriptor.declared_name.clone()
    }
}
