//! Bridge between Rust types and runtime values.
//!
//! Scalars, `String`, `Vec<T>`, `Option<T>` and `IndexMap<String, V>` are
//! covered here. Structs get the same traits from `#[derive(Record)]`:
//!
//! ```ignore
//! #[derive(Record, Debug, PartialEq)]
//! #[record(name = "shop.Order")]
//! struct Order {
//!     id: i64,
//!     #[record(rename = "lines")]
//!     items: Vec<String>,
//! }
//!
//! let order: Order = cast_to(Registry::global(), &json_like_map)?;
//! ```

use crate::converter::ConvertError;
use crate::record::{RecordType, RecordValue};
use crate::registry::Registry;
use crate::shape::Shape;
use crate::value::Value;
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use num_bigint::BigInt;
use std::sync::Arc;

/// The shape a Rust type corresponds to.
pub trait HasShape {
    fn shape() -> Shape;
}

pub trait IntoValue {
    fn into_value(self) -> Value;
}

/// Reads a value that already has the type's shape.
///
/// Use [`cast_to`] to convert arbitrary values first.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, ConvertError>;
}

/// A struct described by a [`RecordType`].
pub trait Reflect: Sized {
    /// The record type, built once.
    fn record_type() -> Arc<RecordType>;

    fn into_record(self) -> RecordValue;

    fn from_record(record: &RecordValue) -> Result<Self, ConvertError>;
}

/// Converts `value` to `T`'s shape and reads the result.
pub fn cast_to<T>(registry: &Registry, value: &Value) -> Result<T, ConvertError>
where
    T: HasShape + FromValue,
{
    let converted = registry.cast(value, &T::shape())?;
    T::from_value(&converted)
}

fn mismatch<T: HasShape>(value: &Value) -> ConvertError {
    ConvertError::unsupported(value, &T::shape())
}

macro_rules! scalar {
    ($ty:ty, $shape:expr, $variant:ident) => {
        impl HasShape for $ty {
            fn shape() -> Shape {
                $shape
            }
        }

        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }

        impl FromValue for $ty {
            fn from_value(value: &Value) -> Result<Self, ConvertError> {
                match value {
                    Value::$variant(v) => Ok(v.clone()),
                    other => Err(mismatch::<Self>(other)),
                }
            }
        }
    };
}

scalar!(bool, Shape::BOOL, Bool);
scalar!(i8, Shape::BYTE, Byte);
scalar!(i16, Shape::SHORT, Short);
scalar!(i32, Shape::INT, Int);
scalar!(i64, Shape::LONG, Long);
scalar!(f32, Shape::FLOAT, Float);
scalar!(f64, Shape::DOUBLE, Double);
scalar!(char, Shape::CHAR, Char);
scalar!(BigInt, Shape::BIGINT, BigInt);
scalar!(BigDecimal, Shape::BIGDECIMAL, BigDecimal);
scalar!(String, Shape::STRING, String);
scalar!(NaiveDateTime, Shape::DATE, Date);

impl HasShape for Value {
    fn shape() -> Shape {
        Shape::Any
    }
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, ConvertError> {
        Ok(value.clone())
    }
}

impl<T: HasShape> HasShape for Option<T> {
    fn shape() -> Shape {
        T::shape()
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        self.map_or(Value::Null, IntoValue::into_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, ConvertError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: HasShape> HasShape for Vec<T> {
    fn shape() -> Shape {
        Shape::list(T::shape())
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn into_value(self) -> Value {
        Value::list(self.into_iter().map(IntoValue::into_value))
    }
}

impl<T: FromValue + HasShape> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Result<Self, ConvertError> {
        let items = value.items_snapshot().ok_or_else(|| mismatch::<Self>(value))?;
        items
            .iter()
            .enumerate()
            .map(|(i, item)| T::from_value(item).map_err(|e| e.with_context(format_args!("element {i}"))))
            .collect()
    }
}

impl<V: HasShape> HasShape for IndexMap<String, V> {
    fn shape() -> Shape {
        Shape::linked_map(Shape::STRING, V::shape())
    }
}

impl<V: IntoValue> IntoValue for IndexMap<String, V> {
    fn into_value(self) -> Value {
        Value::linked_map(self.into_iter().map(|(k, v)| (Value::String(k), v.into_value())))
    }
}

impl<V: FromValue + HasShape> FromValue for IndexMap<String, V> {
    fn from_value(value: &Value) -> Result<Self, ConvertError> {
        let map = value.as_map().ok_or_else(|| mismatch::<Self>(value))?;
        let entries = map.read().snapshot();
        entries
            .iter()
            .map(|(k, v)| {
                let key = k.as_str().ok_or_else(|| mismatch::<String>(k))?;
                let v = V::from_value(v).map_err(|e| e.with_context(format_args!("key {key}")))?;
                Ok((key.to_string(), v))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_bridge() {
        assert_eq!(42i32.into_value(), Value::Int(42));
        assert_eq!(i64::from_value(&Value::Long(7)).unwrap(), 7);
        assert!(i64::from_value(&Value::Int(7)).is_err());
        assert_eq!(<Option<String>>::shape(), Shape::STRING);
        assert_eq!(<Option<String>>::from_value(&Value::Null).unwrap(), None);
    }

    #[test]
    fn test_cast_to_converts_first() {
        let registry = Registry::global();
        let n: i64 = cast_to(registry, &Value::from("12")).unwrap();
        assert_eq!(n, 12);

        let list = Value::list([Value::from("1"), Value::Int(2)]);
        let numbers: Vec<i32> = cast_to(registry, &list).unwrap();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn test_map_bridge() {
        let mut map = IndexMap::new();
        map.insert("b".to_string(), vec![true]);
        map.insert("a".to_string(), vec![]);
        let value = map.clone().into_value();
        assert_eq!(value.type_name(), "linked_map");

        let back: IndexMap<String, Vec<bool>> = cast_to(Registry::global(), &value).unwrap();
        assert_eq!(back, map);
        assert_eq!(back.keys().collect::<Vec<_>>(), ["b", "a"]);
    }

    #[test]
    fn test_element_errors_carry_position() {
        let list = Value::list([Value::Int(1), Value::from("x")]);
        let err = <Vec<i32>>::from_value(&list).unwrap_err();
        assert!(err.to_string().contains("element 1"), "{err}");
    }
}
