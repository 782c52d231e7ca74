//! Converter registry and first-match dispatch.

use crate::config::EngineConfig;
use crate::convert::{BUILTIN_MANIFEST, BUILTIN_ORIGIN, builtin_loader};
use crate::converter::{self, Converter, ConverterDecl, ConvertError};
use crate::extension::ManifestError;
use crate::shape::Shape;
use crate::value::Value;
use std::sync::{Arc, OnceLock};

/// Ordered converter list. The first converter that accepts a
/// (value, shape) pair performs the conversion.
///
/// Registration is `&mut self`: a registry shared across threads is
/// built first and then only read.
#[derive(Clone, Default)]
pub struct Registry {
    converters: Vec<Arc<dyn Converter>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The builtin converters plus any manifests named in `config`.
    ///
    /// Manifest problems do not stop loading; they are returned alongside
    /// the registry.
    pub fn with_config(config: &EngineConfig) -> (Self, Vec<ManifestError>) {
        let mut loader = builtin_loader(config);
        if config.builtin_converters {
            loader.load_str(BUILTIN_ORIGIN, BUILTIN_MANIFEST);
        }
        for path in &config.manifests {
            loader.load_file(path);
        }

        let mut registry = Registry::new();
        let errors = loader.errors().to_vec();
        for extension in loader.into_extensions() {
            if let Some(converter) = extension.instance {
                registry.register_arc(converter);
            }
        }
        tracing::debug!(
            converters = registry.len(),
            errors = errors.len(),
            "registry loaded"
        );
        (registry, errors)
    }

    /// The builtin converters with the default configuration.
    pub fn builtin() -> Self {
        let (registry, errors) = Self::with_config(&EngineConfig::default());
        for error in errors {
            tracing::warn!(%error, "builtin manifest error");
        }
        registry
    }

    /// Process-wide registry of builtin converters, built on first use.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::builtin)
    }

    /// Appends a converter to the dispatch order.
    pub fn register(&mut self, converter: impl Converter + 'static) {
        self.register_arc(Arc::new(converter));
    }

    pub fn register_arc(&mut self, converter: Arc<dyn Converter>) {
        tracing::trace!(converter = %converter.decl().id, "registered");
        self.converters.push(converter);
    }

    /// Removes the converter with `id`, returning it.
    pub fn unregister(&mut self, id: &str) -> Option<Arc<dyn Converter>> {
        let index = self.converters.iter().position(|c| c.decl().id == id)?;
        Some(self.converters.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Converter>> {
        self.converters.iter().find(|c| c.decl().id == id)
    }

    /// Converters in dispatch order.
    pub fn converters(&self) -> impl Iterator<Item = &Arc<dyn Converter>> {
        self.converters.iter()
    }

    pub fn declarations(&self) -> impl Iterator<Item = &ConverterDecl> {
        self.converters.iter().map(|c| c.decl())
    }

    /// The converter that would handle `value` into `shape`.
    pub fn find(&self, value: &Value, shape: &Shape) -> Option<&Arc<dyn Converter>> {
        self.converters
            .iter()
            .find(|c| converter::accepts(c.as_ref(), value, shape))
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    /// Converts `value` to `shape`.
    ///
    /// With no shape, a nil value yields the override, else the default,
    /// else nil; any other value is returned as is. Nil `default` and
    /// `overriding` count as absent. When `overriding` is given, composite
    /// results are written into it.
    pub fn convert<'a>(
        &self,
        value: &Value,
        shape: impl Into<Option<&'a Shape>>,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        let default = default.filter(|v| !v.is_null());
        let overriding = overriding.filter(|v| !v.is_null());

        let Some(shape) = shape.into() else {
            if value.is_null() {
                return Ok(overriding.or(default).cloned().unwrap_or_default());
            }
            return Ok(value.clone());
        };

        let Some(chosen) = self.find(value, shape) else {
            return Err(ConvertError::unsupported(value, shape));
        };
        tracing::trace!(
            converter = %chosen.decl().id,
            value = %value.describe(),
            shape = %shape,
            "dispatch"
        );
        converter::invoke(chosen.as_ref(), self, value, shape, default, overriding)
    }

    /// [`convert`](Self::convert) with no default or override.
    pub fn cast(&self, value: &Value, shape: &Shape) -> Result<Value, ConvertError> {
        self.convert(value, shape, None, None)
    }

    /// Fills `dest` from `source`, converting to `dest`'s own shape.
    pub fn override_into(&self, source: &Value, dest: &Value) -> Result<Value, ConvertError> {
        self.convert(source, &dest.runtime_shape(), None, Some(dest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        decl: ConverterDecl,
        shape: Shape,
        out: Value,
    }

    impl Converter for Fixed {
        fn decl(&self) -> &ConverterDecl {
            &self.decl
        }

        fn can_convert(&self, _value: &Value, shape: &Shape) -> Result<bool, ConvertError> {
            Ok(*shape == self.shape)
        }

        fn convert(
            &self,
            _registry: &Registry,
            _value: &Value,
            _shape: &Shape,
            _default: Option<&Value>,
            _overriding: Option<&Value>,
        ) -> Result<Value, ConvertError> {
            Ok(self.out.clone())
        }
    }

    fn fixed(id: &str, shape: Shape, out: Value) -> Fixed {
        Fixed {
            decl: ConverterDecl::new(id),
            shape,
            out,
        }
    }

    fn make_test_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(fixed("first", Shape::INT, Value::Int(1)));
        registry.register(fixed("second", Shape::INT, Value::Int(2)));
        registry.register(fixed("text", Shape::STRING, Value::from("t")));
        registry
    }

    #[test]
    fn test_first_match_wins() {
        let registry = make_test_registry();
        let out = registry.cast(&Value::from("x"), &Shape::INT).unwrap();
        assert_eq!(out, Value::Int(1));
    }

    #[test]
    fn test_unregister_exposes_next() {
        let mut registry = make_test_registry();
        assert!(registry.unregister("first").is_some());
        assert!(registry.unregister("first").is_none());
        assert_eq!(registry.len(), 2);
        let out = registry.cast(&Value::from("x"), &Shape::INT).unwrap();
        assert_eq!(out, Value::Int(2));
    }

    #[test]
    fn test_unsupported_is_error() {
        let registry = make_test_registry();
        let err = registry.cast(&Value::Int(1), &Shape::LONG).unwrap_err();
        assert!(matches!(err, ConvertError::Unsupported { .. }));
    }

    #[test]
    fn test_no_shape_rules() {
        let registry = Registry::new();
        let none: Option<&Shape> = None;
        let d = Value::Int(5);
        let o = Value::Int(6);
        assert_eq!(
            registry.convert(&Value::Null, none, Some(&d), Some(&o)).unwrap(),
            o
        );
        assert_eq!(registry.convert(&Value::Null, none, Some(&d), None).unwrap(), d);
        assert_eq!(registry.convert(&Value::Null, none, None, None).unwrap(), Value::Null);
        assert_eq!(
            registry.convert(&Value::from("x"), none, Some(&d), None).unwrap(),
            Value::from("x")
        );
    }

    #[test]
    fn test_find_and_declarations() {
        let registry = make_test_registry();
        let ids: Vec<_> = registry.declarations().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["first", "second", "text"]);
        let found = registry.find(&Value::Null, &Shape::STRING).unwrap();
        assert_eq!(found.decl().id, "text");
        assert!(registry.get("second").is_some());
    }

    #[test]
    fn test_global_is_populated() {
        assert!(!Registry::global().is_empty());
    }
}
