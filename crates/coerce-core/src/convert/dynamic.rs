//! Dynamic objects.

use super::fill_target;
use super::map::entries_of;
use crate::converter::{ConvertError, Converter, ConverterDecl};
use crate::dynamic::{DynamicObject, DynamicType, ensure_supported};
use crate::extension::Metadata;
use crate::registry::Registry;
use crate::shape::Shape;
use crate::value::{Shared, Value};
use std::sync::Arc;

/// Fills a dynamic object from a map, a record or another dynamic object.
///
/// Each value is converted to the target property's declared shape.
/// Closed types silently drop properties they do not declare.
pub struct DynamicConverter {
    decl: ConverterDecl,
}

impl DynamicConverter {
    pub const ID: &'static str = "dynamic";

    pub fn new() -> Self {
        Self {
            decl: ConverterDecl::new(Self::ID).description("Convert to a dynamic object"),
        }
    }

    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.decl = self.decl.with_metadata(metadata);
        self
    }
}

impl Default for DynamicConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for DynamicConverter {
    fn decl(&self) -> &ConverterDecl {
        &self.decl
    }

    fn can_convert(&self, _value: &Value, shape: &Shape) -> Result<bool, ConvertError> {
        if !matches!(shape, Shape::Dynamic(_)) {
            return Ok(false);
        }
        ensure_supported()?;
        Ok(true)
    }

    fn convert(
        &self,
        registry: &Registry,
        value: &Value,
        shape: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        let Shape::Dynamic(declared) = shape else {
            return Err(ConvertError::unsupported(value, shape));
        };
        ensure_supported()?;
        let ty = declared.clone().unwrap_or_else(DynamicType::untyped);
        let target = fill_target(default, overriding, |v| v.as_dynamic().cloned());
        if value.is_null() {
            return match target {
                Some(target) => Ok(Value::Dynamic(target)),
                None => Ok(Value::dynamic(DynamicObject::new(&ty)?)),
            };
        }

        let Some(entries) = entries_of(value)? else {
            return Err(ConvertError::InvalidInput(format!(
                "{} has no properties for {shape}",
                value.describe()
            )));
        };
        let target = match target {
            Some(target) => target,
            None => Shared::new(DynamicObject::new(&ty)?),
        };
        let target_type = Arc::clone(target.read().dynamic_type());

        let mut converted = Vec::with_capacity(entries.len());
        for (key, v) in entries {
            let Value::String(name) = registry.cast(&key, &Shape::STRING)? else {
                continue;
            };
            let property_shape = match target_type.property_shape(&name) {
                Some(shape) => shape.clone(),
                None if target_type.is_open() => Shape::Any,
                None => continue,
            };
            let v = registry
                .cast(&v, &property_shape)
                .map_err(|e| e.with_context(format_args!("{}.{name}", target_type.name())))?;
            converted.push((name, v));
        }
        {
            let mut object = target.write();
            for (name, v) in converted {
                object.set(&name, v)?;
            }
        }
        Ok(Value::Dynamic(target))
    }
}

#[cfg(all(test, feature = "dynamic"))]
mod tests {
    use super::*;
    use crate::record::{RecordType, RecordValue};
    use pretty_assertions::assert_eq;

    fn order_type() -> Arc<DynamicType> {
        DynamicType::builder("test.convert.Order")
            .property("id", Shape::LONG)
            .property("tags", Shape::list(Shape::STRING))
            .build()
    }

    fn property(value: &Value, name: &str) -> Option<Value> {
        value.as_dynamic().unwrap().read().get(name).cloned()
    }

    #[test]
    fn test_map_to_closed_type() {
        let source = Value::map([
            ("id".into(), "17".into()),
            ("tags".into(), Value::list([Value::Int(1)])),
            ("extra".into(), Value::Bool(true)),
        ]);
        let out = Registry::global()
            .cast(&source, &Shape::dynamic_of(&order_type()))
            .unwrap();
        assert_eq!(property(&out, "id"), Some(Value::Long(17)));
        assert_eq!(
            property(&out, "tags").unwrap().items_snapshot().unwrap(),
            vec![Value::from("1")]
        );
        assert_eq!(property(&out, "extra"), None);
    }

    #[test]
    fn test_record_to_untyped_keeps_values() {
        let ty = RecordType::builder("test.convert.Source")
            .field("a", Shape::INT)
            .build();
        let record = Value::record(RecordValue::new(&ty).with("a", 4).unwrap());
        let out = Registry::global().cast(&record, &Shape::dynamic()).unwrap();
        assert_eq!(property(&out, "a"), Some(Value::Int(4)));
    }

    #[test]
    fn test_dynamic_to_record() {
        let ty = RecordType::builder("test.convert.Target")
            .field("id", Shape::INT)
            .field("missing", Shape::INT)
            .build();
        let object = DynamicObject::new(&order_type()).unwrap().with("id", 5i64).unwrap();
        let out = Registry::global()
            .cast(&Value::dynamic(object), &Shape::record(&ty))
            .unwrap();
        let record = out.as_record().unwrap().read();
        assert_eq!(record.get("id").unwrap(), &Value::Int(5));
        assert_eq!(record.get("missing").unwrap(), &Value::Int(0));
    }

    #[test]
    fn test_dynamic_to_map() {
        let object = DynamicObject::new(&order_type()).unwrap().with("id", 2i64).unwrap();
        let out = Registry::global()
            .cast(&Value::dynamic(object), &Shape::map(Shape::STRING, Shape::ANY))
            .unwrap();
        assert_eq!(
            out.as_map().unwrap().read().get_str("id"),
            Some(&Value::Long(2))
        );
    }

    #[test]
    fn test_nil_creates_zeroed_object() {
        let out = Registry::global()
            .cast(&Value::Null, &Shape::dynamic_of(&order_type()))
            .unwrap();
        assert_eq!(property(&out, "id"), Some(Value::Long(0)));
        assert_eq!(property(&out, "tags"), Some(Value::Null));
    }

    #[test]
    fn test_sequences_are_rejected() {
        let err = Registry::global()
            .cast(&Value::list([]), &Shape::dynamic())
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidInput(_)));
    }
}
