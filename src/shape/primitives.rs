use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::ScalarKind;
use super::Shape;
use super::Shaped;

macro_rules! scalar_shape {
    ($kind:expr => $($ty:ty),+) => {
        $(
            impl Shaped for $ty {
                fn shape() -> Shape {
                    Shape::Scalar($kind)
                }
            }
        )+
    };
}

scalar_shape!(ScalarKind::Bool => bool);
scalar_shape!(ScalarKind::Integer => i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
scalar_shape!(ScalarKind::Float => f32, f64);
scalar_shape!(ScalarKind::String => String, char);
scalar_shape!(ScalarKind::Any => Value);

impl<T: Shaped> Shaped for Vec<T> {
    fn shape() -> Shape {
        Shape::sequence(T::shape())
    }
}

impl<T: Shaped> Shaped for Option<T> {
    fn shape() -> Shape {
        Shape::indirect(T::shape())
    }
}

// Box and Arc serialize transparently and are never null.
impl<T: Shaped> Shaped for Box<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Shaped> Shaped for Arc<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: Shaped> Shaped for BTreeMap<String, T> {
    fn shape() -> Shape {
        Shape::mapping(T::shape())
    }
}

impl<T: Shaped, S> Shaped for HashMap<String, T, S> {
    fn shape() -> Shape {
        Shape::mapping(T::shape())
    }
}
