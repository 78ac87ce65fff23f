//! Field-path expressions (`A.B[2].C`) and their resolution against the
//! document form of a bound object.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::PathExpressionError;
use crate::Shape;

/// Compiled field-path expression: an ordered list of segments where a
/// bracket segment is kept bare (`B[2]` -> `B`, `2`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    raw: String,
    segments: Vec<String>,
}

impl PathExpr {
    /// Single left-to-right scan; `.` or `[` closes the previous segment,
    /// `]` closes an index segment. No escaping.
    pub fn compile(expr: &str) -> Result<Self, PathExpressionError> {
        let malformed = |reason| PathExpressionError::Malformed {
            expr: expr.to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut in_index = false;
        let mut after_index = false;

        for c in expr.chars() {
            match c {
                '.' => {
                    if in_index {
                        return Err(malformed("'.' inside index"));
                    }
                    if !after_index {
                        if current.is_empty() {
                            return Err(malformed("empty segment"));
                        }
                        segments.push(std::mem::take(&mut current));
                    }
                    after_index = false;
                }
                '[' => {
                    if in_index {
                        return Err(malformed("nested '['"));
                    }
                    if !after_index {
                        if !current.is_empty() {
                            segments.push(std::mem::take(&mut current));
                        } else if !segments.is_empty() {
                            return Err(malformed("empty segment"));
                        }
                    }
                    in_index = true;
                    after_index = false;
                }
                ']' => {
                    if !in_index {
                        return Err(malformed("unmatched ']'"));
                    }
                    if current.is_empty() {
                        return Err(malformed("empty index"));
                    }
                    if current.starts_with('-') {
                        return Err(malformed("negative index"));
                    }
                    segments.push(std::mem::take(&mut current));
                    in_index = false;
                    after_index = true;
                }
                _ => {
                    if after_index {
                        return Err(malformed("expected '.' or '[' after ']'"));
                    }
                    current.push(c);
                }
            }
        }

        if in_index {
            return Err(malformed("unclosed '['"));
        }
        if !after_index {
            if !current.is_empty() {
                segments.push(current);
            } else if !expr.is_empty() {
                return Err(malformed("empty segment"));
            }
        }

        Ok(Self {
            raw: expr.to_string(),
            segments,
        })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The empty expression addresses the whole object.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl FromStr for PathExpr {
    type Err = PathExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathExpr::compile(s)
    }
}

impl fmt::Display for PathExpr {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Value found at the end of a path, together with the shape that
/// describes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<'s> {
    pub value: Value,
    pub shape: &'s Shape,
}

impl Resolved<'_> {
    /// Absent means an empty ownership indirection (or untyped `null`).
    pub fn is_absent(&self) -> bool {
        self.value.is_null()
    }
}

/// Walks `root` segment by segment, dispatching on the current shape.
///
/// With `auto_create`, a missing mapping entry yields a zero-valued
/// placeholder of the mapping's value shape, and an index past the end of a
/// sequence yields exactly one zero-valued placeholder element; neither
/// mutates `root`.
pub fn resolve<'s>(
    root: &Value,
    shape: &'s Shape,
    expr: &PathExpr,
    auto_create: bool,
) -> Result<Resolved<'s>, PathExpressionError> {
    let mut node: Cow<'_, Value> = Cow::Borrowed(root);
    let mut shape = shape;
    let mut segments = expr.segments().iter();
    let mut pending = segments.next();

    loop {
        if let Shape::Indirect(inner) = shape {
            if node.is_null() {
                match pending {
                    None => break,
                    Some(_) if auto_create => node = Cow::Owned(inner.zero_value()),
                    Some(segment) => {
                        return Err(PathExpressionError::Unsupported {
                            segment: segment.clone(),
                            kind: "absent value",
                        })
                    }
                }
            }
            shape = inner;
            continue;
        }

        let Some(segment) = pending else {
            break;
        };
        let (child, child_shape) = step(node, shape, segment, auto_create)?;
        node = child;
        shape = child_shape;
        pending = segments.next();
    }

    Ok(Resolved {
        value: node.into_owned(),
        shape,
    })
}

fn step<'a, 's>(
    node: Cow<'a, Value>,
    shape: &'s Shape,
    segment: &str,
    auto_create: bool,
) -> Result<(Cow<'a, Value>, &'s Shape), PathExpressionError> {
    match shape {
        Shape::Composite(fields) => {
            let field = fields
                .iter()
                .find(|f| f.declared_name == segment)
                .ok_or_else(|| PathExpressionError::FieldNotFound(segment.to_string()))?;
            let child = child(node, |v| v.get(&field.serialization_name))
                .unwrap_or(Cow::Owned(Value::Null));
            Ok((child, &field.shape))
        }
        Shape::Mapping(inner) => match child(node, |v| v.get(segment)) {
            Some(child) => Ok((child, inner)),
            None if auto_create => Ok((Cow::Owned(inner.zero_value()), inner)),
            None => Err(PathExpressionError::KeyNotFound(segment.to_string())),
        },
        Shape::Sequence(inner) => {
            let index: usize = segment
                .parse()
                .map_err(|_| PathExpressionError::NotAnIndex(segment.to_string()))?;
            let len = node.as_array().map(Vec::len).unwrap_or(0);
            match child(node, |v| v.get(index)) {
                Some(child) => Ok((child, inner)),
                None if auto_create => Ok((Cow::Owned(inner.zero_value()), inner)),
                None => Err(PathExpressionError::OutOfRange { index, len }),
            }
        }
        Shape::Scalar(_) => Err(PathExpressionError::Unsupported {
            segment: segment.to_string(),
            kind: "scalar",
        }),
        Shape::Indirect(_) => unreachable!("indirection is dereferenced by the caller"),
    }
}

fn child<'a>(
    node: Cow<'a, Value>,
    get: impl Fn(&Value) -> Option<&Value>,
) -> Option<Cow<'a, Value>> {
    match node {
        Cow::Borrowed(v) => get(v).map(Cow::Borrowed),
        Cow::Owned(v) => get(&v).cloned().map(Cow::Owned),
    }
}
