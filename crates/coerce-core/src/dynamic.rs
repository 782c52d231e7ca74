//! Dynamic objects: values whose properties are declared at runtime.
//!
//! Support is optional. [`dynamic_supported`] is probed once and every
//! dynamic code path checks it before touching a dynamic object.

use crate::error::AccessError;
use crate::record::next_type_id;
use crate::shape::{Shape, ShapeParseError};
use crate::value::Value;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Whether dynamic objects are available in this process.
pub fn dynamic_supported() -> bool {
    static PROBE: OnceLock<bool> = OnceLock::new();
    *PROBE.get_or_init(|| {
        let supported = cfg!(feature = "dynamic");
        tracing::debug!(supported, "dynamic object support probed");
        supported
    })
}

pub(crate) fn ensure_supported() -> Result<(), AccessError> {
    if dynamic_supported() {
        Ok(())
    } else {
        Err(AccessError::DynamicUnavailable)
    }
}

/// Declared properties of a dynamic object.
///
/// Closed types reject properties they do not declare; open types take any.
pub struct DynamicType {
    id: u64,
    name: String,
    properties: IndexMap<String, Shape>,
    open: bool,
}

impl DynamicType {
    pub fn builder(name: impl Into<String>) -> DynamicTypeBuilder {
        DynamicTypeBuilder {
            name: name.into(),
            properties: IndexMap::new(),
            open: false,
        }
    }

    /// The shared open type with no declared properties.
    pub fn untyped() -> Arc<DynamicType> {
        static UNTYPED: OnceLock<Arc<DynamicType>> = OnceLock::new();
        Arc::clone(UNTYPED.get_or_init(|| DynamicType::builder("dynamic").open().build()))
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn property_shape(&self, name: &str) -> Option<&Shape> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Shape)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl PartialEq for DynamicType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for DynamicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicType")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .field("open", &self.open)
            .finish()
    }
}

pub struct DynamicTypeBuilder {
    name: String,
    properties: IndexMap<String, Shape>,
    open: bool,
}

impl DynamicTypeBuilder {
    pub fn property(mut self, name: impl Into<String>, shape: Shape) -> Self {
        self.properties.insert(name.into(), shape);
        self
    }

    pub fn open(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn build(self) -> Arc<DynamicType> {
        Arc::new(DynamicType {
            id: next_type_id(),
            name: self.name,
            properties: self.properties,
            open: self.open,
        })
    }
}

/// An instance of a [`DynamicType`]. Declared properties start at their zero value.
#[derive(Clone)]
pub struct DynamicObject {
    ty: Arc<DynamicType>,
    values: IndexMap<String, Value>,
}

impl DynamicObject {
    pub fn new(ty: &Arc<DynamicType>) -> Result<Self, AccessError> {
        ensure_supported()?;
        let values = ty
            .properties()
            .map(|(name, shape)| (name.to_string(), shape.field_zero()))
            .collect();
        Ok(Self {
            ty: Arc::clone(ty),
            values,
        })
    }

    pub fn dynamic_type(&self) -> &Arc<DynamicType> {
        &self.ty
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) -> Result<(), AccessError> {
        if !self.ty.is_open() && self.ty.property_shape(name).is_none() {
            return Err(AccessError::NoSuchProperty {
                ty: self.ty.name().to_string(),
                property: name.to_string(),
            });
        }
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, AccessError> {
        self.set(name, value.into())?;
        Ok(self)
    }

    /// Declared shape of a property, `Any` for undeclared properties of open types.
    pub fn property_shape(&self, name: &str) -> Option<&Shape> {
        static ANY: Shape = Shape::Any;
        match self.ty.property_shape(name) {
            Some(shape) => Some(shape),
            None if self.ty.is_open() => Some(&ANY),
            None => None,
        }
    }

    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Debug for DynamicObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.ty.name());
        for (name, value) in self.properties() {
            s.field(name, value);
        }
        s.finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TypeLoadError {
    #[error("invalid type file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("type {ty}, property '{property}': {source}")]
    Shape {
        ty: String,
        property: String,
        #[source]
        source: ShapeParseError,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TypeFile {
    types: Vec<TypeDef>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TypeDef {
    name: String,
    open: bool,
    properties: IndexMap<String, String>,
}

/// Named dynamic types and the factory for their objects.
///
/// Types can be declared in TOML:
///
/// ```toml
/// [[types]]
/// name = "demo.Order"
///
/// [types.properties]
/// id = "long"
/// tags = "list<string>"
/// ```
#[derive(Debug, Default)]
pub struct DynamicTypes {
    types: IndexMap<String, Arc<DynamicType>>,
}

impl DynamicTypes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, ty: Arc<DynamicType>) {
        self.types.insert(ty.name().to_string(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<DynamicType>> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn create(&self, name: &str) -> Result<DynamicObject, AccessError> {
        let ty = self
            .get(name)
            .ok_or_else(|| AccessError::UnknownType(name.to_string()))?;
        DynamicObject::new(ty)
    }

    /// Shape lookup for [`Shape::parse_with`].
    pub fn resolve(&self, name: &str) -> Option<Shape> {
        self.get(name).map(Shape::dynamic_of)
    }

    /// Loads type definitions. Property shapes may name types defined
    /// earlier in the same text. Returns the number of types defined.
    pub fn load_toml(&mut self, text: &str) -> Result<usize, TypeLoadError> {
        let file: TypeFile = toml::from_str(text)?;
        let count = file.types.len();
        for def in file.types {
            let mut builder = DynamicType::builder(&def.name);
            if def.open {
                builder = builder.open();
            }
            for (property, shape_text) in &def.properties {
                let shape = Shape::parse_with(shape_text, |name| self.resolve(name)).map_err(
                    |source| TypeLoadError::Shape {
                        ty: def.name.clone(),
                        property: property.clone(),
                        source,
                    },
                )?;
                builder = builder.property(property, shape);
            }
            self.define(builder.build());
        }
        Ok(count)
    }
}
