//! Records.

use super::fill_target;
use crate::catalog::{FieldCatalog, fields_of};
use crate::converter::{ConvertError, Converter, ConverterDecl};
use crate::dynamic::ensure_supported;
use crate::extension::Metadata;
use crate::record::RecordValue;
use crate::registry::Registry;
use crate::shape::Shape;
use crate::value::{Shared, Value};

/// Fills a record from a map, another record or a dynamic object.
///
/// Fields are matched by name and every value goes through the registry
/// into the field's shape. Final fields are left to the constructor.
pub struct RecordConverter {
    decl: ConverterDecl,
}

impl RecordConverter {
    pub const ID: &'static str = "record";

    pub fn new() -> Self {
        Self {
            decl: ConverterDecl::new(Self::ID).description("Convert to a record"),
        }
    }

    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.decl = self.decl.with_metadata(metadata);
        self
    }
}

impl Default for RecordConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// `(field, source value, field shape)` for every field the source supplies.
fn assignments(
    registry: &Registry,
    value: &Value,
    catalog: &FieldCatalog,
) -> Result<Option<Vec<(String, Value, Shape)>>, ConvertError> {
    let writable = catalog.iter().filter(|f| !f.descriptor.is_final());
    let pairs = match value {
        Value::Record(record) => {
            let record = record.read();
            writable
                .filter_map(|f| {
                    record
                        .field(f.name())
                        .map(|v| (f.name().to_string(), v.clone(), f.shape().clone()))
                })
                .collect()
        }
        Value::Dynamic(object) => {
            ensure_supported()?;
            let object = object.read();
            writable
                .map(|f| {
                    let v = object.get(f.name()).cloned().unwrap_or_default();
                    (f.name().to_string(), v, f.shape().clone())
                })
                .collect()
        }
        Value::Map(map) => {
            let entries = map.read().snapshot();
            let mut pairs = Vec::new();
            for (key, v) in entries {
                let name = registry.cast(&key, &Shape::STRING)?;
                let field = name
                    .as_str()
                    .and_then(|name| catalog.get(name))
                    .filter(|f| !f.descriptor.is_final());
                if let Some(field) = field {
                    pairs.push((field.name().to_string(), v, field.shape().clone()));
                }
            }
            pairs
        }
        _ => return Ok(None),
    };
    Ok(Some(pairs))
}

impl Converter for RecordConverter {
    fn decl(&self) -> &ConverterDecl {
        &self.decl
    }

    fn can_convert(&self, _value: &Value, shape: &Shape) -> Result<bool, ConvertError> {
        Ok(matches!(shape, Shape::Record(_)))
    }

    fn convert(
        &self,
        registry: &Registry,
        value: &Value,
        shape: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        let Shape::Record(ty) = shape else {
            return Err(ConvertError::unsupported(value, shape));
        };
        let target = fill_target(default, overriding, |v| v.as_record().cloned());
        if value.is_null() {
            return match target {
                Some(target) => Ok(Value::Record(target)),
                None => Ok(Value::record(RecordValue::instantiate(ty, registry)?)),
            };
        }

        let catalog = fields_of(ty);
        let Some(pending) = assignments(registry, value, &catalog)? else {
            return Err(ConvertError::InvalidInput(format!(
                "{} has no fields for {}",
                value.describe(),
                ty.name()
            )));
        };
        let mut converted = Vec::with_capacity(pending.len());
        for (name, source, field_shape) in pending {
            let v = registry
                .cast(&source, &field_shape)
                .map_err(|e| e.with_context(format_args!("{}.{name}", ty.name())))?;
            converted.push((name, v));
        }

        let target = match target {
            Some(target) => target,
            None => Shared::new(RecordValue::instantiate(ty, registry)?),
        };
        {
            let mut record = target.write();
            for (name, v) in converted {
                record.set(&name, v)?;
            }
        }
        Ok(Value::Record(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Constructor, FieldDescriptor, Mutability, RecordType};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn person() -> Arc<RecordType> {
        RecordType::builder("test.convert.Person")
            .field("name", Shape::STRING)
            .field("age", Shape::INT)
            .build()
    }

    fn field(value: &Value, name: &str) -> Value {
        value.as_record().unwrap().read().get(name).unwrap().clone()
    }

    #[test]
    fn test_map_to_record_converts_fields() {
        let ty = person();
        let source = Value::map([
            ("name".into(), "Ada".into()),
            ("age".into(), "36".into()),
            ("unknown".into(), Value::Int(1)),
        ]);
        let out = Registry::global().cast(&source, &Shape::record(&ty)).unwrap();
        assert_eq!(field(&out, "name"), Value::from("Ada"));
        assert_eq!(field(&out, "age"), Value::Int(36));
    }

    #[test]
    fn test_record_to_unrelated_record_by_name() {
        let employee = RecordType::builder("test.convert.Employee")
            .field("age", Shape::LONG)
            .field("badge", Shape::INT)
            .build();
        let source = RecordValue::new(&person()).with("age", 40).unwrap();
        let out = Registry::global()
            .cast(&Value::record(source), &Shape::record(&employee))
            .unwrap();
        assert_eq!(field(&out, "age"), Value::Long(40));
        assert_eq!(field(&out, "badge"), Value::Int(0));
    }

    #[test]
    fn test_nested_records_convert_deeply() {
        let inner = person();
        let outer = RecordType::builder("test.convert.Team")
            .field("lead", Shape::record(&inner))
            .field("members", Shape::list(Shape::record(&inner)))
            .build();
        let ada = Value::map([("name".into(), "Ada".into())]);
        let source = Value::map([
            ("lead".into(), ada.clone()),
            ("members".into(), Value::list([ada])),
        ]);
        let out = Registry::global().cast(&source, &Shape::record(&outer)).unwrap();
        let lead = field(&out, "lead");
        assert_eq!(field(&lead, "name"), Value::from("Ada"));
        let members = field(&out, "members").items_snapshot().unwrap();
        assert_eq!(field(&members[0], "age"), Value::Int(0));
    }

    #[test]
    fn test_override_is_filled_in_place() {
        let ty = person();
        let target = Value::record(RecordValue::new(&ty).with("name", "Bob").unwrap());
        let source = Value::map([("age".into(), Value::Int(5))]);
        let out = Registry::global()
            .convert(&source, &Shape::record(&ty), None, Some(&target))
            .unwrap();
        assert!(out.same_instance(&target));
        assert_eq!(field(&target, "name"), Value::from("Bob"));
        assert_eq!(field(&target, "age"), Value::Int(5));
    }

    #[test]
    fn test_nil_instantiates() {
        let ty = RecordType::builder("test.convert.Built")
            .field("n", Shape::INT)
            .constructor(Constructor::new(vec![], |_| Ok(vec![("n".into(), Value::Int(3))])))
            .build();
        let out = Registry::global().cast(&Value::Null, &Shape::record(&ty)).unwrap();
        assert_eq!(field(&out, "n"), Value::Int(3));
    }

    #[test]
    fn test_final_fields_are_not_assigned() {
        let ty = RecordType::builder("test.convert.Final")
            .field_with(FieldDescriptor::new("id", Shape::INT).with_mutability(Mutability::Final))
            .field("n", Shape::INT)
            .build();
        let source = Value::map([("id".into(), Value::Int(9)), ("n".into(), Value::Int(1))]);
        let out = Registry::global().cast(&source, &Shape::record(&ty)).unwrap();
        assert_eq!(field(&out, "id"), Value::Int(0));
        assert_eq!(field(&out, "n"), Value::Int(1));
    }

    #[test]
    fn test_field_failure_names_field() {
        let source = Value::map([("age".into(), "old".into())]);
        let err = Registry::global()
            .cast(&source, &Shape::record(&person()))
            .unwrap_err();
        assert!(err.to_string().contains("test.convert.Person.age"), "{err}");
    }

    #[test]
    fn test_scalar_source_is_rejected() {
        let err = Registry::global()
            .cast(&Value::Int(1), &Shape::record(&person()))
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidInput(_)));
    }
}
