//! Key/value maps.

use super::fill_target;
use crate::converter::{ConvertError, Converter, ConverterDecl};
use crate::dynamic::ensure_supported;
use crate::extension::Metadata;
use crate::registry::Registry;
use crate::shape::{MapKind, Shape};
use crate::value::{MapValue, Shared, Value};

/// Copies the entries of a map, record or dynamic object into a map.
///
/// Values are copied as they are; nested conversion is left to the caller.
/// Sequences have no keys and are rejected.
pub struct MapConverter {
    decl: ConverterDecl,
}

impl MapConverter {
    pub const ID: &'static str = "map";

    pub fn new() -> Self {
        Self {
            decl: ConverterDecl::new(Self::ID).description("Convert to a map"),
        }
    }

    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.decl = self.decl.with_metadata(metadata);
        self
    }
}

impl Default for MapConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Entries of a keyed source, copied out of its lock.
pub(crate) fn entries_of(value: &Value) -> Result<Option<Vec<(Value, Value)>>, ConvertError> {
    Ok(Some(match value {
        Value::Map(map) => map.read().snapshot(),
        Value::Record(record) => record
            .read()
            .fields()
            .map(|(name, v)| (Value::from(name), v.clone()))
            .collect(),
        Value::Dynamic(object) => {
            ensure_supported()?;
            object
                .read()
                .properties()
                .map(|(name, v)| (Value::from(name), v.clone()))
                .collect()
        }
        _ => return Ok(None),
    }))
}

impl Converter for MapConverter {
    fn decl(&self) -> &ConverterDecl {
        &self.decl
    }

    fn can_convert(&self, _value: &Value, shape: &Shape) -> Result<bool, ConvertError> {
        Ok(matches!(shape, Shape::Map { .. }))
    }

    fn convert(
        &self,
        _registry: &Registry,
        value: &Value,
        shape: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        let Shape::Map { kind, .. } = shape else {
            return Err(ConvertError::unsupported(value, shape));
        };
        let target = fill_target(default, overriding, |v| v.as_map().cloned());
        if value.is_null() {
            return Ok(Value::Map(target.unwrap_or_else(|| empty(*kind))));
        }

        let Some(entries) = entries_of(value)? else {
            return Err(ConvertError::InvalidInput(format!(
                "{} has no key/value pairs for {shape}",
                value.describe()
            )));
        };
        let target = target.unwrap_or_else(|| empty(*kind));
        target.write().put_all(entries);
        Ok(Value::Map(target))
    }
}

fn empty(kind: MapKind) -> Shared<MapValue> {
    Shared::new(MapValue::new(kind))
}
