//! Static shape description of bindable objects.
//!
//! Every engine in this crate walks the neutral document form
//! ([`serde_json::Value`]) of the bound object, guided by a [`Shape`] that the
//! object's type declares once through [`Shaped::shape`]. Per-field path
//! annotations are an explicit side table on each [`FieldShape`].
//!
//! ## Example
//! ```ignore
//! impl Shaped for Config {
//!     fn shape() -> Shape {
//!         Shape::composite(vec![
//!             FieldShape::new("name", String::shape()),
//!             FieldShape::new("settings", Settings::shape()).bind("cfg/settings"),
//!             FieldShape::new("items", Vec::<Item>::shape()).bind("cfg/items/"),
//!         ])
//!     }
//! }
//! ```
//!
//! Fields must be listed in the order serde serializes them, under the names
//! serde serializes them with (see [`FieldShape::rename`]).

mod primitives;


use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use crate::constants::DEFAULT_TAG_NAME;

/// Shape of a scalar leaf; decides its zero value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Bool,
    Integer,
    Float,
    String,
    /// Untyped leaf (e.g. a raw `serde_json::Value`), zero is `null`
    Any,
}

/// Closed set of shape variants the engines dispatch on.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Scalar(ScalarKind),
    /// String-keyed map; the box holds the value shape
    Mapping(Box<Shape>),
    /// Ordered collection; the box holds the element shape
    Sequence(Box<Shape>),
    /// Record with named fields
    Composite(Vec<FieldShape>),
    /// Ownership indirection (`Option`, `Box`); `null` means absent
    Indirect(Box<Shape>),
}

/// Shape variant with ownership indirection stripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Scalar,
    Mapping,
    Sequence,
    Composite,
}

impl ShapeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShapeKind::Scalar => "scalar",
            ShapeKind::Mapping => "mapping",
            ShapeKind::Sequence => "sequence",
            ShapeKind::Composite => "composite",
        }
    }
}

/// One declared field of a composite.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldShape {
    /// Field name in the host type; used by path expressions
    pub declared_name: String,
    /// Name in the serialized document; defaults to `declared_name`
    pub serialization_name: String,
    /// Side table of annotations keyed by tag name
    pub annotations: BTreeMap<String, String>,
    pub shape: Shape,
}

impl FieldShape {
    pub fn new(
        declared_name: impl Into<String>,
        shape: Shape,
    ) -> Self {
        let declared_name = declared_name.into();
        Self {
            serialization_name: declared_name.clone(),
            declared_name,
            annotations: BTreeMap::new(),
            shape,
        }
    }

    /// Serialized name differs from the declared one (`#[serde(rename)]`).
    pub fn rename(
        mut self,
        serialization_name: impl Into<String>,
    ) -> Self {
        self.serialization_name = serialization_name.into();
        self
    }

    /// Annotates the field under the default `bind` tag.
    pub fn bind(
        self,
        annotation: impl Into<String>,
    ) -> Self {
        self.tag(DEFAULT_TAG_NAME, annotation)
    }

    /// Annotates the field under an arbitrary tag name.
    pub fn tag(
        mut self,
        tag_name: impl Into<String>,
        annotation: impl Into<String>,
    ) -> Self {
        self.annotations.insert(tag_name.into(), annotation.into());
        self
    }

    /// Annotation path for `tag_name`, with any `,options` suffix removed.
    pub fn annotation(
        &self,
        tag_name: &str,
    ) -> Option<&str> {
        let raw = self.annotations.get(tag_name)?;
        let path = raw.split(',').next().unwrap_or_default();
        if path.is_empty() {
            None
        } else {
            Some(path)
        }
    }
}

impl Shape {
    pub fn composite(fields: Vec<FieldShape>) -> Self {
        Shape::Composite(fields)
    }

    pub fn mapping(value: Shape) -> Self {
        Shape::Mapping(Box::new(value))
    }

    pub fn sequence(element: Shape) -> Self {
        Shape::Sequence(Box::new(element))
    }

    pub fn indirect(inner: Shape) -> Self {
        Shape::Indirect(Box::new(inner))
    }

    pub fn kind(&self) -> ShapeKind {
        match self.strip_indirection() {
            Shape::Scalar(_) => ShapeKind::Scalar,
            Shape::Mapping(_) => ShapeKind::Mapping,
            Shape::Sequence(_) => ShapeKind::Sequence,
            Shape::Composite(_) => ShapeKind::Composite,
            Shape::Indirect(_) => unreachable!("indirection stripped"),
        }
    }

    pub fn strip_indirection(&self) -> &Shape {
        let mut shape = self;
        while let Shape::Indirect(inner) = shape {
            shape = inner;
        }
        shape
    }

    pub fn is_collection(&self) -> bool {
        matches!(self.kind(), ShapeKind::Mapping | ShapeKind::Sequence)
    }

    /// Shape of one collection element with indirection stripped.
    ///
    /// Composites stored as directories have heterogeneous members, so they
    /// report no single element shape.
    pub fn element(&self) -> Option<&Shape> {
        match self.strip_indirection() {
            Shape::Mapping(value) => Some(value.strip_indirection()),
            Shape::Sequence(element) => Some(element.strip_indirection()),
            _ => None,
        }
    }

    pub fn fields(&self) -> &[FieldShape] {
        match self.strip_indirection() {
            Shape::Composite(fields) => fields,
            _ => &[],
        }
    }

    pub fn field_by_declared_name(
        &self,
        name: &str,
    ) -> Option<&FieldShape> {
        self.fields().iter().find(|f| f.declared_name == name)
    }

    pub fn field_by_serialization_name(
        &self,
        name: &str,
    ) -> Option<&FieldShape> {
        self.fields().iter().find(|f| f.serialization_name == name)
    }

    /// Zero-valued instance in document form.
    pub fn zero_value(&self) -> Value {
        match self {
            Shape::Scalar(ScalarKind::Bool) => Value::Bool(false),
            Shape::Scalar(ScalarKind::Integer) => Value::from(0),
            Shape::Scalar(ScalarKind::Float) => Value::from(0.0),
            Shape::Scalar(ScalarKind::String) => Value::String(String::new()),
            Shape::Scalar(ScalarKind::Any) => Value::Null,
            Shape::Mapping(_) => Value::Object(Map::new()),
            Shape::Sequence(_) => Value::Array(Vec::new()),
            Shape::Composite(fields) => Value::Object(
                fields
                    .iter()
                    .map(|f| (f.serialization_name.clone(), f.shape.zero_value()))
                    .collect(),
            ),
            Shape::Indirect(_) => Value::Null,
        }
    }

    /// Zero value with indirection stripped; the placeholder for an absent
    /// pointer-like value.
    pub fn placeholder(&self) -> Value {
        self.strip_indirection().zero_value()
    }

    /// Rebuilds `value` the way decoding into a zero-valued typed template and
    /// re-encoding would: composites come out in declared order with missing
    /// fields zeroed and undeclared keys dropped.
    pub fn conform(
        &self,
        value: Value,
    ) -> Value {
        match (self, value) {
            (Shape::Indirect(_), Value::Null) => Value::Null,
            (Shape::Indirect(inner), value) => inner.conform(value),
            (Shape::Composite(fields), Value::Object(mut members)) => Value::Object(
                fields
                    .iter()
                    .map(|f| {
                        let member = members
                            .remove(&f.serialization_name)
                            .map(|v| f.shape.conform(v))
                            .unwrap_or_else(|| f.shape.zero_value());
                        (f.serialization_name.clone(), member)
                    })
                    .collect(),
            ),
            (Shape::Composite(_), Value::Null) => self.zero_value(),
            (Shape::Mapping(inner), Value::Object(members)) => Value::Object(
                members.into_iter().map(|(k, v)| (k, inner.conform(v))).collect(),
            ),
            (Shape::Sequence(inner), Value::Array(items)) => {
                Value::Array(items.into_iter().map(|v| inner.conform(v)).collect())
            }
            (Shape::Mapping(_) | Shape::Sequence(_), Value::Null) => self.zero_value(),
            (Shape::Scalar(ScalarKind::Float), Value::Number(n)) if !n.is_f64() => {
                n.as_f64().map(Value::from).unwrap_or(Value::Number(n))
            }
            (_, value) => value,
        }
    }

    /// Composite restricted to the fields that carry no path annotation.
    pub fn inline_only(
        &self,
        tag_name: &str,
    ) -> Shape {
        match self.strip_indirection() {
            Shape::Composite(fields) => Shape::Composite(
                fields
                    .iter()
                    .filter(|f| !is_exploded(f, tag_name))
                    .cloned()
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

/// A field is exploded to its own storage path when its annotation contains
/// a path separator; otherwise it stays inline in its owner's document.
pub(crate) fn is_exploded(
    field: &FieldShape,
    tag_name: &str,
) -> bool {
    field
        .annotation(tag_name)
        .map(|a| a.contains(crate::constants::PATH_SEPARATOR))
        .unwrap_or(false)
}

/// Types that can describe their own shape.
pub trait Shaped {
    fn shape() -> Shape;
}

/// Types that can be bound to a key-value namespace.
pub trait Bindable: Shaped + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Bindable for T where T: Shaped + Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}
