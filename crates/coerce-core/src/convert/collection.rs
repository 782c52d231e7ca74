//! Lists and sets.

use super::array::convert_items;
use super::{fill_target, source_items};
use crate::converter::{ConvertError, Converter, ConverterDecl};
use crate::extension::Metadata;
use crate::registry::Registry;
use crate::shape::{CollectionKind, Shape};
use crate::value::{CollectionValue, Shared, Value};

/// Converts sequences into a list or set.
///
/// Each converted element is first removed from the target and then
/// appended, so an element already present moves to the end.
pub struct CollectionConverter {
    decl: ConverterDecl,
}

impl CollectionConverter {
    pub const ID: &'static str = "collection";

    pub fn new() -> Self {
        Self {
            decl: ConverterDecl::new(Self::ID).description("Convert to a list or set"),
        }
    }

    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.decl = self.decl.with_metadata(metadata);
        self
    }
}

impl Default for CollectionConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for CollectionConverter {
    fn decl(&self) -> &ConverterDecl {
        &self.decl
    }

    fn can_convert(&self, _value: &Value, shape: &Shape) -> Result<bool, ConvertError> {
        Ok(matches!(shape, Shape::Collection { .. }))
    }

    fn convert(
        &self,
        registry: &Registry,
        value: &Value,
        shape: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        let Shape::Collection { element, kind } = shape else {
            return Err(ConvertError::unsupported(value, shape));
        };
        let target = fill_target(default, overriding, |v| v.as_collection().cloned());
        if value.is_null() {
            return Ok(Value::Collection(target.unwrap_or_else(|| empty(*kind))));
        }

        let converted = convert_items(registry, &source_items(value), element)?;
        let target = target.unwrap_or_else(|| empty(*kind));
        {
            let mut collection = target.write();
            for item in converted {
                collection.remove(&item);
                collection.add(item);
            }
        }
        Ok(Value::Collection(target))
    }
}

fn empty(kind: CollectionKind) -> Shared<CollectionValue> {
    Shared::new(CollectionValue::new(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ints(values: &[i32]) -> Vec<Value> {
        values.iter().copied().map(Value::Int).collect()
    }

    #[test]
    fn test_fills_existing_list() {
        let existing = Value::list(ints(&[9]));
        let source = Value::array(Shape::INT, ints(&[1, 2, 3]));
        let out = Registry::global()
            .convert(&source, &Shape::list(Shape::INT), None, Some(&existing))
            .unwrap();
        assert!(out.same_instance(&existing));
        assert_eq!(existing.items_snapshot().unwrap(), ints(&[9, 1, 2, 3]));
    }

    // Equal elements already in the target move to the end.
    #[test]
    fn test_remove_then_add_moves_equal_elements() {
        let existing = Value::list(ints(&[2, 9, 2]));
        let source = Value::list(ints(&[2, 4]));
        Registry::global()
            .convert(&source, &Shape::list(Shape::INT), None, Some(&existing))
            .unwrap();
        assert_eq!(existing.items_snapshot().unwrap(), ints(&[9, 2, 2, 4]));
    }

    #[test]
    fn test_elements_converted_and_set_deduplicates() {
        let source = Value::list(["1".into(), Value::Long(1), "2".into()]);
        let out = Registry::global()
            .cast(&source, &Shape::set(Shape::INT))
            .unwrap();
        assert_eq!(out.type_name(), "set");
        assert_eq!(out.items_snapshot().unwrap(), ints(&[1, 2]));
    }

    #[test]
    fn test_default_is_filled_when_no_override() {
        let default = Value::list(ints(&[7]));
        let out = Registry::global()
            .convert(&Value::from("8"), &Shape::list(Shape::INT), Some(&default), None)
            .unwrap();
        assert!(out.same_instance(&default));
        assert_eq!(default.items_snapshot().unwrap(), ints(&[7, 8]));
    }

    #[test]
    fn test_nil_yields_empty_of_kind() {
        let out = Registry::global()
            .cast(&Value::Null, &Shape::set(Shape::STRING))
            .unwrap();
        assert_eq!(out.type_name(), "set");
        assert_eq!(out.items_snapshot().unwrap().len(), 0);
    }

    #[test]
    fn test_list_to_list_of_other_kind() {
        let source = Value::list(ints(&[1, 2]));
        let out = Registry::global()
            .cast(&source, &Shape::list(Shape::STRING))
            .unwrap();
        assert!(!out.same_instance(&source));
        assert_eq!(out.items_snapshot().unwrap(), vec![Value::from("1"), Value::from("2")]);
    }
}
