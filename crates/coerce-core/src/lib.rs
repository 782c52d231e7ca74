//! Coerce: shape-driven runtime value conversion
//!
//! Values are converted toward a [`Shape`] by the first converter in a
//! [`Registry`] that accepts them. Composite results can be written into an
//! existing instance (the "override"). Around the registry sit deep clone,
//! structural equality and multi-key sort.
//!
//! ```
//! use rhi_coerce_core::{Shape, Value};
//!
//! let n = rhi_coerce_core::cast(&Value::from("123"), &Shape::INT).unwrap();
//! assert_eq!(n, Value::Int(123));
//! ```

extern crate self as rhi_coerce_core;

mod catalog;
mod config;
pub mod convert;
mod converter;
mod dynamic;
mod error;
mod extension;
pub mod ops;
pub mod reflect;
mod record;
mod registry;
mod shape;
mod value;

pub use catalog::{CatalogField, FieldCatalog, fields_of};
pub use config::{CloneConfig, ConfigError, EngineConfig, RenderConfig};
pub use converter::{ConvertError, Converter, ConverterDecl, Delegate, Delegates};
pub use dynamic::{
    DynamicObject, DynamicType, DynamicTypeBuilder, DynamicTypes, TypeLoadError,
    dynamic_supported,
};
pub use error::AccessError;
pub use extension::{
    DEFAULT_INDEX, Extension, ExtensionLoader, Factory, ManifestError, Metadata,
};
pub use ops::{CloneOptions, Comparator, SortError, sort};
pub use record::{Constructor, FieldDescriptor, Mutability, RecordType, RecordTypeBuilder, RecordValue};
pub use registry::Registry;
pub use shape::{CollectionKind, MapKind, PrimitiveKind, Shape, ShapeParseError};
pub use value::{
    ArrayRef, ArrayValue, CollectionRef, CollectionValue, DynamicRef, MapRef, MapValue, Opaque,
    RecordRef, Serialized, Shared, Value,
};

#[cfg(feature = "derive")]
pub use rhi_coerce_derive::Record;

/// Converts `value` to `shape` with the global registry.
///
/// See [`Registry::convert`].
pub fn convert(
    value: &Value,
    shape: &Shape,
    default: Option<&Value>,
    overriding: Option<&Value>,
) -> Result<Value, ConvertError> {
    Registry::global().convert(value, shape, default, overriding)
}

pub fn cast(value: &Value, shape: &Shape) -> Result<Value, ConvertError> {
    Registry::global().cast(value, shape)
}

pub fn deep_clone(value: &Value) -> Result<Value, AccessError> {
    ops::deep_clone(Registry::global(), value)
}

pub fn equals(a: &Value, b: &Value, loose: bool) -> bool {
    ops::equals(Registry::global(), a, b, loose)
}
