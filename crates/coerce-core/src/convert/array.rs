//! Fixed-length arrays.

use super::{fill_bytes, fill_target, nil_fallback, source_items};
use crate::converter::{ConvertError, Converter, ConverterDecl};
use crate::extension::Metadata;
use crate::registry::Registry;
use crate::shape::{PrimitiveKind, Shape};
use crate::value::Value;

/// Converts sequences element by element.
///
/// When an override or default array is given it is filled in place, up to
/// its own length; otherwise the result has the source's length. Scalars
/// become one-element sequences. Also turns sequences into `bytes`.
pub struct ArrayConverter {
    decl: ConverterDecl,
}

impl ArrayConverter {
    pub const ID: &'static str = "array";

    pub fn new() -> Self {
        Self {
            decl: ConverterDecl::new(Self::ID).description("Convert to an array"),
        }
    }

    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.decl = self.decl.with_metadata(metadata);
        self
    }

    fn to_array(
        &self,
        registry: &Registry,
        value: &Value,
        element: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        if value.is_null() {
            return Ok(nil_fallback(default, overriding, || {
                Value::array(element.clone(), Vec::new())
            }));
        }

        let items = source_items(value);
        let target = fill_target(default, overriding, |v| v.as_array().cloned());
        let limit = target
            .as_ref()
            .map_or(items.len(), |array| array.read().len());
        let converted = convert_items(registry, &items[..limit.min(items.len())], element)?;

        match target {
            Some(target) => {
                {
                    let mut array = target.write();
                    for (index, item) in converted.into_iter().enumerate() {
                        array.set(index, item);
                    }
                }
                Ok(Value::Array(target))
            }
            None => Ok(Value::array(element.clone(), converted)),
        }
    }

    fn to_bytes(
        &self,
        registry: &Registry,
        value: &Value,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        let bytes = convert_items(registry, &source_items(value), &Shape::BYTE)?
            .into_iter()
            .map(|item| match item {
                Value::Byte(b) => Ok(b as u8),
                other => Err(ConvertError::Failed(format!(
                    "byte conversion produced {}",
                    other.describe()
                ))),
            })
            .collect::<Result<Vec<u8>, _>>()?;
        let bytes = match fill_target(default, overriding, Value::as_bytes) {
            Some(base) => fill_bytes(base, &bytes),
            None => bytes,
        };
        Ok(Value::Bytes(bytes))
    }
}

impl Default for ArrayConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts each item to `element`, naming the failing index.
pub(crate) fn convert_items(
    registry: &Registry,
    items: &[Value],
    element: &Shape,
) -> Result<Vec<Value>, ConvertError> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            registry
                .cast(item, element)
                .map_err(|e| e.with_context(format_args!("element {index}")))
        })
        .collect()
}

impl Converter for ArrayConverter {
    fn decl(&self) -> &ConverterDecl {
        &self.decl
    }

    fn can_convert(&self, value: &Value, shape: &Shape) -> Result<bool, ConvertError> {
        Ok(match shape {
            Shape::Array(_) => true,
            Shape::Primitive(PrimitiveKind::Bytes) => {
                matches!(value, Value::Array(_) | Value::Collection(_))
            }
            _ => false,
        })
    }

    fn convert(
        &self,
        registry: &Registry,
        value: &Value,
        shape: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        match shape {
            Shape::Array(element) => self.to_array(registry, value, element, default, overriding),
            _ => self.to_bytes(registry, value, default, overriding),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i32]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn test_elements_are_converted() {
        let source = Value::list(["1".into(), "2".into(), Value::Long(3)]);
        let out = Registry::global()
            .cast(&source, &Shape::array(Shape::INT))
            .unwrap();
        assert_eq!(out.items_snapshot().unwrap(), ints(&[1, 2, 3]));
        assert_eq!(out.runtime_shape(), Shape::array(Shape::INT));
    }

    #[test]
    fn test_override_shorter_than_source_truncates() {
        let source = Value::array(Shape::INT, ints(&[1, 2, 3, 4, 5]));
        let target = Value::array(Shape::LONG, vec![Value::Long(0); 3]);
        let out = Registry::global()
            .convert(&source, &Shape::array(Shape::LONG), None, Some(&target))
            .unwrap();
        assert!(out.same_instance(&target));
        assert_eq!(
            target.items_snapshot().unwrap(),
            vec![Value::Long(1), Value::Long(2), Value::Long(3)]
        );
    }

    #[test]
    fn test_override_longer_than_source_keeps_tail() {
        let source = Value::array(Shape::INT, ints(&[1, 2, 3, 4, 5]));
        let target = Value::array(Shape::INT, ints(&[0, 0, 0, 0, 0, 6, 7]));
        Registry::global()
            .convert(&source, &Shape::array(Shape::INT), None, Some(&target))
            .unwrap();
        assert_eq!(target.items_snapshot().unwrap(), ints(&[1, 2, 3, 4, 5, 6, 7]));
    }

    #[test]
    fn test_scalar_wraps() {
        let out = Registry::global()
            .cast(&Value::from("8"), &Shape::array(Shape::INT))
            .unwrap();
        assert_eq!(out.items_snapshot().unwrap(), ints(&[8]));
    }

    #[test]
    fn test_nil_yields_empty_array() {
        let out = Registry::global()
            .cast(&Value::Null, &Shape::array(Shape::STRING))
            .unwrap();
        assert_eq!(out.runtime_shape(), Shape::array(Shape::STRING));
        assert_eq!(out.items_snapshot().unwrap(), Vec::<Value>::new());
    }

    #[test]
    fn test_element_failure_names_index() {
        let source = Value::list([Value::Int(1), "x".into()]);
        let err = Registry::global()
            .cast(&source, &Shape::array(Shape::INT))
            .unwrap_err();
        assert!(err.to_string().contains("element 1"), "{err}");
    }
}
