use crate::config::CloneConfig;
use crate::dynamic::{DynamicObject, ensure_supported};
use crate::error::AccessError;
use crate::record::RecordValue;
use crate::registry::Registry;
use crate::value::{ArrayValue, CollectionValue, MapValue, Shared, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Map every composite instance to a single copy, so cycles and shared
    /// children survive instead of recursing forever.
    pub guard_cycles: bool,
}

impl From<&CloneConfig> for CloneOptions {
    fn from(config: &CloneConfig) -> Self {
        Self {
            guard_cycles: config.guard_cycles,
        }
    }
}

/// Deep copy of `value`.
///
/// Scalars are returned as they are. Composites are rebuilt with every
/// element, key and field copied; record fields marked final keep what the
/// constructor gave them. Opaque values go through their byte encoding.
///
/// Self-referencing graphs recurse without bound; use [`deep_clone_with`]
/// and [`CloneOptions::guard_cycles`] for those.
pub fn deep_clone(registry: &Registry, value: &Value) -> Result<Value, AccessError> {
    deep_clone_with(registry, value, CloneOptions::default())
}

pub fn deep_clone_with(
    registry: &Registry,
    value: &Value,
    options: CloneOptions,
) -> Result<Value, AccessError> {
    let mut cloner = Cloner {
        registry,
        seen: options.guard_cycles.then(HashMap::new),
    };
    cloner.clone_value(value)
}

struct Cloner<'r> {
    registry: &'r Registry,
    seen: Option<HashMap<usize, Value>>,
}

impl Cloner<'_> {
    fn clone_value(&mut self, value: &Value) -> Result<Value, AccessError> {
        if let (Some(seen), Some(id)) = (&self.seen, value.identity()) {
            if let Some(copy) = seen.get(&id) {
                return Ok(copy.clone());
            }
        }

        match value {
            Value::Array(array) => {
                let (element, items) = {
                    let array = array.read();
                    (array.element().clone(), array.items().to_vec())
                };
                let copy = Shared::new(ArrayValue::filled(element, items.len()));
                self.remember(value, Value::Array(copy.clone()));
                let items = self.clone_all(&items)?;
                copy.write().replace_items(items);
                Ok(Value::Array(copy))
            }
            Value::Collection(collection) => {
                let (kind, items) = {
                    let collection = collection.read();
                    (collection.kind(), collection.items().to_vec())
                };
                let copy = Shared::new(CollectionValue::new(kind));
                self.remember(value, Value::Collection(copy.clone()));
                let items = self.clone_all(&items)?;
                {
                    let mut target = copy.write();
                    for item in items {
                        target.add(item);
                    }
                }
                Ok(Value::Collection(copy))
            }
            Value::Map(map) => {
                let (kind, entries) = {
                    let map = map.read();
                    (map.kind(), map.snapshot())
                };
                let copy = Shared::new(MapValue::new(kind));
                self.remember(value, Value::Map(copy.clone()));
                let mut cloned = Vec::with_capacity(entries.len());
                for (k, v) in &entries {
                    cloned.push((self.clone_value(k)?, self.clone_value(v)?));
                }
                copy.write().put_all(cloned);
                Ok(Value::Map(copy))
            }
            Value::Record(record) => {
                let (ty, fields) = {
                    let record = record.read();
                    let fields: Vec<(String, Value)> = record
                        .catalog()
                        .iter()
                        .filter(|field| !field.descriptor.is_final())
                        .filter_map(|field| {
                            record
                                .field(field.name())
                                .map(|v| (field.name().to_string(), v.clone()))
                        })
                        .collect();
                    (record.record_type().clone(), fields)
                };
                let copy = Shared::new(RecordValue::instantiate(&ty, self.registry)?);
                self.remember(value, Value::Record(copy.clone()));
                let mut cloned = Vec::with_capacity(fields.len());
                for (name, v) in &fields {
                    cloned.push((name, self.clone_value(v)?));
                }
                {
                    let mut target = copy.write();
                    for (name, v) in cloned {
                        target.set(name, v)?;
                    }
                }
                Ok(Value::Record(copy))
            }
            Value::Dynamic(object) => {
                ensure_supported()?;
                let (ty, properties) = {
                    let object = object.read();
                    let properties: Vec<(String, Value)> = object
                        .properties()
                        .map(|(name, v)| (name.to_string(), v.clone()))
                        .collect();
                    (object.dynamic_type().clone(), properties)
                };
                let copy = Shared::new(DynamicObject::new(&ty)?);
                self.remember(value, Value::Dynamic(copy.clone()));
                let mut cloned = Vec::with_capacity(properties.len());
                for (name, v) in &properties {
                    cloned.push((name, self.clone_value(v)?));
                }
                {
                    let mut target = copy.write();
                    for (name, v) in cloned {
                        target.set(name, v)?;
                    }
                }
                Ok(Value::Dynamic(copy))
            }
            Value::Opaque(opaque) => {
                let copy = opaque
                    .encode()
                    .and_then(|bytes| opaque.decode(&bytes))
                    .ok_or_else(|| AccessError::NoFieldModel(opaque.type_name().to_string()))?;
                let copy = Value::Opaque(copy);
                self.remember(value, copy.clone());
                Ok(copy)
            }
            scalar => Ok(scalar.clone()),
        }
    }

    fn clone_all(&mut self, items: &[Value]) -> Result<Vec<Value>, AccessError> {
        items.iter().map(|item| self.clone_value(item)).collect()
    }

    fn remember(&mut self, original: &Value, copy: Value) {
        if let (Some(seen), Some(id)) = (&mut self.seen, original.identity()) {
            seen.insert(id, copy);
        }
    }
}
