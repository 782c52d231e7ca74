//! Builtin converters and the manifest that orders them.

mod any;
mod array;
mod bytes;
mod collection;
mod dynamic;
mod map;
mod primitive;
mod record;
mod string;

pub use any::AnyConverter;
pub use array::ArrayConverter;
pub use bytes::{ByteArrayConverter, BytesConverter};
pub use collection::CollectionConverter;
pub use dynamic::DynamicConverter;
pub use map::MapConverter;
pub use primitive::PrimitiveConverter;
pub use record::RecordConverter;
pub use string::{StringConverter, render};

pub(crate) use primitive::{Number, format_date};

use crate::config::EngineConfig;
use crate::converter::Converter;
use crate::dynamic::dynamic_supported;
use crate::extension::{ExtensionLoader, Metadata};
use crate::shape::PrimitiveKind;
use crate::value::Value;
use std::sync::Arc;

/// Manifest listing the builtin converters.
pub const BUILTIN_MANIFEST: &str = include_str!("builtin.manifest");

/// Origin reported for errors in [`BUILTIN_MANIFEST`].
pub const BUILTIN_ORIGIN: &str = "builtin";

pub type ConverterLoader = ExtensionLoader<Arc<dyn Converter>>;

/// A loader that knows every builtin converter by its manifest name.
///
/// Converters that need dynamic object support decline when it is absent.
pub fn builtin_loader(config: &EngineConfig) -> ConverterLoader {
    let mut loader = ConverterLoader::new();

    provide(&mut loader, AnyConverter::ID, |meta| {
        Some(AnyConverter::new().with_metadata(meta))
    });

    for kind in PrimitiveKind::ALL {
        if matches!(kind, PrimitiveKind::String | PrimitiveKind::Bytes) {
            continue;
        }
        provide(&mut loader, PrimitiveConverter::id_for(kind), move |meta| {
            Some(PrimitiveConverter::new(kind).with_metadata(meta))
        });
    }

    let pretty = config.render.pretty;
    provide(&mut loader, StringConverter::ID, move |meta| {
        Some(StringConverter::new(pretty).with_metadata(meta))
    });
    provide(&mut loader, BytesConverter::ID, |meta| {
        Some(BytesConverter::new().with_metadata(meta))
    });
    provide(&mut loader, ByteArrayConverter::ID, |meta| {
        Some(ByteArrayConverter::new().with_metadata(meta))
    });
    provide(&mut loader, ArrayConverter::ID, |meta| {
        Some(ArrayConverter::new().with_metadata(meta))
    });
    provide(&mut loader, CollectionConverter::ID, |meta| {
        Some(CollectionConverter::new().with_metadata(meta))
    });
    provide(&mut loader, MapConverter::ID, |meta| {
        Some(MapConverter::new().with_metadata(meta))
    });
    provide(&mut loader, DynamicConverter::ID, |meta| {
        dynamic_supported().then(|| DynamicConverter::new().with_metadata(meta))
    });
    provide(&mut loader, RecordConverter::ID, |meta| {
        Some(RecordConverter::new().with_metadata(meta))
    });

    loader
}

fn provide<C, F>(loader: &mut ConverterLoader, name: impl Into<String>, make: F)
where
    C: Converter + 'static,
    F: Fn(&Metadata) -> Option<C> + Send + Sync + 'static,
{
    loader.provide(name, move |meta: &Metadata| {
        make(meta).map(|converter| Arc::new(converter) as Arc<dyn Converter>)
    });
}

/// Result for nil input: the override, else the default, else `zero()`.
pub(crate) fn nil_fallback(
    default: Option<&Value>,
    overriding: Option<&Value>,
    zero: impl FnOnce() -> Value,
) -> Value {
    overriding.or(default).cloned().unwrap_or_else(zero)
}

/// The first of override and default that `pick` accepts.
pub(crate) fn fill_target<'a, T>(
    default: Option<&'a Value>,
    overriding: Option<&'a Value>,
    pick: impl Fn(&'a Value) -> Option<T>,
) -> Option<T> {
    overriding.and_then(&pick).or_else(|| default.and_then(&pick))
}

/// Elements of a sequence source. Anything else is a one-element sequence.
pub(crate) fn source_items(value: &Value) -> Vec<Value> {
    match value {
        Value::Bytes(bytes) => bytes.iter().map(|b| Value::Byte(*b as i8)).collect(),
        other => other
            .items_snapshot()
            .unwrap_or_else(|| vec![other.clone()]),
    }
}

/// Raw bytes of a byte array or an array of bytes.
pub(crate) fn byte_sequence(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Bytes(bytes) => Some(bytes.clone()),
        Value::Array(array) => {
            let array = array.read();
            if array.element().primitive() != Some(PrimitiveKind::Byte) {
                return None;
            }
            array
                .items()
                .iter()
                .map(|item| match item {
                    Value::Byte(b) => Some(*b as u8),
                    _ => None,
                })
                .collect()
        }
        _ => None,
    }
}

/// `base` with its leading bytes replaced by `source`, up to the shorter length.
pub(crate) fn fill_bytes(base: &[u8], source: &[u8]) -> Vec<u8> {
    let mut out = base.to_vec();
    let n = out.len().min(source.len());
    out[..n].copy_from_slice(&source[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::shape::Shape;

    #[test]
    fn test_builtin_manifest_loads_cleanly() {
        let mut loader = builtin_loader(&EngineConfig::default());
        loader.load_str(BUILTIN_ORIGIN, BUILTIN_MANIFEST);
        assert!(loader.errors().is_empty(), "{:?}", loader.errors());
        let names: Vec<_> = loader.extensions().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"any"));
        assert_eq!(names.last(), Some(&"record"));
        assert_eq!(names.contains(&"dynamic"), dynamic_supported());
    }

    #[test]
    fn test_manifest_names_match_decl_ids() {
        let mut loader = builtin_loader(&EngineConfig::default());
        loader.load_str(BUILTIN_ORIGIN, BUILTIN_MANIFEST);
        for extension in loader.extensions() {
            let converter = extension.instance.as_ref().unwrap();
            assert_eq!(converter.decl().id, extension.name);
        }
    }

    #[test]
    fn test_manifest_metadata_reaches_decl() {
        let mut loader = builtin_loader(&EngineConfig::default());
        loader.load_str("extra", "primitive.int;owner=ops");
        let converter = loader.extensions()[0].instance.as_ref().unwrap();
        assert_eq!(converter.decl().metadata("owner"), Some("ops"));
    }

    #[test]
    fn test_fill_bytes_stops_at_shorter() {
        assert_eq!(fill_bytes(&[0, 0, 0], &[1, 2, 3, 4, 5]), vec![1, 2, 3]);
        assert_eq!(fill_bytes(&[0, 0, 0], &[7]), vec![7, 0, 0]);
    }

    #[test]
    fn test_byte_sequence_sources() {
        let boxed = Value::array(Shape::BYTE, vec![Value::Byte(-1), Value::Byte(2)]);
        assert_eq!(byte_sequence(&boxed), Some(vec![0xff, 2]));
        assert_eq!(byte_sequence(&Value::Bytes(vec![3])), Some(vec![3]));
        assert_eq!(byte_sequence(&Value::array(Shape::INT, vec![])), None);
    }

    #[test]
    fn test_builtin_registry_without_builtins_is_empty() {
        let config = EngineConfig {
            builtin_converters: false,
            ..Default::default()
        };
        let (registry, errors) = Registry::with_config(&config);
        assert!(registry.is_empty());
        assert!(errors.is_empty());
    }
}
