//! Record types: fixed-layout values with named, typed fields.

use crate::catalog::{FieldCatalog, fields_of};
use crate::error::AccessError;
use crate::registry::Registry;
use crate::shape::Shape;
use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TYPE_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_type_id() -> u64 {
    NEXT_TYPE_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mutability {
    #[default]
    Mutable,
    /// Set once by a constructor. Skipped when cloning.
    Final,
    /// Belongs to the type, not to instances.
    Constant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub shape: Shape,
    pub mutability: Mutability,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            mutability: Mutability::Mutable,
        }
    }

    pub fn with_mutability(mut self, mutability: Mutability) -> Self {
        self.mutability = mutability;
        self
    }

    pub fn is_final(&self) -> bool {
        self.mutability == Mutability::Final
    }
}

type Initializer = dyn Fn(&[Value]) -> Result<Vec<(String, Value)>, String> + Send + Sync;

/// A way to build an instance from positional arguments.
///
/// The initializer returns the field assignments to apply on top of a
/// zero-filled instance.
#[derive(Clone)]
pub struct Constructor {
    params: Vec<Shape>,
    init: Arc<Initializer>,
}

impl Constructor {
    pub fn new<F>(params: Vec<Shape>, init: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Vec<(String, Value)>, String> + Send + Sync + 'static,
    {
        Self {
            params,
            init: Arc::new(init),
        }
    }

    pub fn params(&self) -> &[Shape] {
        &self.params
    }
}

impl fmt::Debug for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constructor")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// A record type: name, optional parent, declared fields and constructors.
pub struct RecordType {
    id: u64,
    name: String,
    parent: Option<Arc<RecordType>>,
    fields: Vec<FieldDescriptor>,
    constants: IndexMap<String, Value>,
    constructors: Vec<Constructor>,
    default_constructor: bool,
}

impl RecordType {
    pub fn builder(name: impl Into<String>) -> RecordTypeBuilder {
        RecordTypeBuilder {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
            constants: IndexMap::new(),
            constructors: Vec::new(),
            abstract_type: false,
        }
    }

    /// Process-unique id.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<RecordType>> {
        self.parent.as_ref()
    }

    /// Fields declared on this type, excluding inherited ones.
    pub fn declared_fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    /// True when instances can be built without running a constructor.
    pub fn has_default_constructor(&self) -> bool {
        self.default_constructor
    }

    /// This type followed by its ancestors.
    pub fn ancestry(&self) -> impl Iterator<Item = &RecordType> {
        std::iter::successors(Some(self), |ty| ty.parent.as_deref())
    }

    pub fn is_subtype_of(&self, other: &RecordType) -> bool {
        self.ancestry().any(|ty| ty.id == other.id)
    }

    /// A constant declared on this type or an ancestor.
    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.ancestry().find_map(|ty| ty.constants.get(name))
    }
}

impl PartialEq for RecordType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(|p| p.name()))
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

pub struct RecordTypeBuilder {
    name: String,
    parent: Option<Arc<RecordType>>,
    fields: Vec<FieldDescriptor>,
    constants: IndexMap<String, Value>,
    constructors: Vec<Constructor>,
    abstract_type: bool,
}

impl RecordTypeBuilder {
    pub fn parent(mut self, parent: &Arc<RecordType>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    pub fn field(self, name: impl Into<String>, shape: Shape) -> Self {
        self.field_with(FieldDescriptor::new(name, shape))
    }

    pub fn field_with(mut self, descriptor: FieldDescriptor) -> Self {
        self.fields.push(descriptor);
        self
    }

    pub fn constant(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        self.fields.push(
            FieldDescriptor::new(name.clone(), value.runtime_shape())
                .with_mutability(Mutability::Constant),
        );
        self.constants.insert(name, value);
        self
    }

    /// Adds a constructor. A type with explicit constructors has no
    /// implicit zero-filling one.
    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Marks the type as having no implicit constructor.
    pub fn abstract_type(mut self) -> Self {
        self.abstract_type = true;
        self
    }

    pub fn build(self) -> Arc<RecordType> {
        Arc::new(RecordType {
            id: next_type_id(),
            default_constructor: self.constructors.is_empty() && !self.abstract_type,
            name: self.name,
            parent: self.parent,
            fields: self.fields,
            constants: self.constants,
            constructors: self.constructors,
        })
    }
}

/// A record instance with one slot per catalog field.
#[derive(Clone)]
pub struct RecordValue {
    ty: Arc<RecordType>,
    catalog: Arc<FieldCatalog>,
    slots: Vec<Value>,
}

impl RecordValue {
    /// A zero-filled instance. No constructor runs.
    pub fn new(ty: &Arc<RecordType>) -> Self {
        let catalog = fields_of(ty);
        let slots = catalog
            .iter()
            .map(|field| field.descriptor.shape.field_zero())
            .collect();
        Self {
            ty: Arc::clone(ty),
            catalog,
            slots,
        }
    }

    /// A zero-filled instance with the given fields set. Names the type does
    /// not declare are dropped.
    pub fn from_fields<'a>(
        ty: &Arc<RecordType>,
        fields: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Self {
        let mut record = Self::new(ty);
        for (name, value) in fields {
            if let Err(e) = record.set(name, value) {
                tracing::debug!(error = %e, "field dropped");
            }
        }
        record
    }

    /// Builds an instance the way a conversion target is built.
    ///
    /// A no-arg constructor (explicit, or the implicit zero-filling one) is
    /// tried first. Then each constructor whose parameters can all be
    /// defaulted by converting nil to the parameter shape.
    pub fn instantiate(ty: &Arc<RecordType>, registry: &Registry) -> Result<Self, AccessError> {
        let nullary = ty.constructors().iter().find(|c| c.params().is_empty());
        match nullary {
            Some(constructor) => match Self::construct(ty, constructor, &[]) {
                Ok(record) => return Ok(record),
                Err(e) => tracing::debug!(record = ty.name(), error = %e, "no-arg constructor failed"),
            },
            None if ty.has_default_constructor() => return Ok(Self::new(ty)),
            None => {}
        }

        for constructor in ty.constructors().iter().filter(|c| !c.params().is_empty()) {
            let args: Result<Vec<Value>, _> = constructor
                .params()
                .iter()
                .map(|param| registry.convert(&Value::Null, param, None, None))
                .collect();
            let Ok(args) = args else {
                continue;
            };
            match Self::construct(ty, constructor, &args) {
                Ok(record) => return Ok(record),
                Err(e) => tracing::debug!(record = ty.name(), error = %e, "constructor failed"),
            }
        }

        Err(AccessError::NotInstantiable(ty.name().to_string()))
    }

    fn construct(
        ty: &Arc<RecordType>,
        constructor: &Constructor,
        args: &[Value],
    ) -> Result<Self, AccessError> {
        let assignments = (constructor.init)(args).map_err(|message| AccessError::Constructor {
            record: ty.name().to_string(),
            message,
        })?;
        let mut record = Self::new(ty);
        for (name, value) in assignments {
            record.set(&name, value)?;
        }
        Ok(record)
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.ty
    }

    pub fn catalog(&self) -> &Arc<FieldCatalog> {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value of a field, or `None` if the type has no such field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.catalog.index_of(name).map(|i| &self.slots[i])
    }

    pub fn get(&self, name: &str) -> Result<&Value, AccessError> {
        self.field(name).ok_or_else(|| self.no_such_field(name))
    }

    pub fn set(&mut self, name: &str, value: Value) -> Result<(), AccessError> {
        let index = self
            .catalog
            .index_of(name)
            .ok_or_else(|| self.no_such_field(name))?;
        self.slots[index] = value;
        Ok(())
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self, AccessError> {
        self.set(name, value.into())?;
        Ok(self)
    }

    /// Fields in catalog order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.catalog
            .iter()
            .map(|field| field.name())
            .zip(self.slots.iter())
    }

    fn no_such_field(&self, name: &str) -> AccessError {
        AccessError::NoSuchField {
            record: self.ty.name().to_string(),
            field: name.to_string(),
        }
    }
}

impl fmt::Debug for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct(self.ty.name());
        for (name, value) in self.fields() {
            s.field(name, value);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_zero_filled() {
        let ty = RecordType::builder("test.record.Zero")
            .field("n", Shape::INT)
            .field("s", Shape::STRING)
            .build();
        let record = RecordValue::new(&ty);
        assert_eq!(record.get("n").unwrap(), &Value::Int(0));
        assert_eq!(record.get("s").unwrap(), &Value::Null);
    }

    #[test]
    fn test_unknown_field_is_access_error() {
        let ty = RecordType::builder("test.record.Unknown").build();
        let mut record = RecordValue::new(&ty);
        assert!(matches!(
            record.set("missing", Value::Int(1)),
            Err(AccessError::NoSuchField { .. })
        ));
    }

    #[test]
    fn test_instantiate_prefers_nullary() {
        let ty = RecordType::builder("test.record.Nullary")
            .field("n", Shape::INT)
            .constructor(Constructor::new(vec![Shape::INT], |args| {
                Ok(vec![("n".into(), args[0].clone())])
            }))
            .constructor(Constructor::new(vec![], |_| Ok(vec![("n".into(), Value::Int(7))])))
            .build();
        let record = RecordValue::instantiate(&ty, Registry::global()).unwrap();
        assert_eq!(record.get("n").unwrap(), &Value::Int(7));
    }

    #[test]
    fn test_instantiate_defaults_parameters() {
        let ty = RecordType::builder("test.record.Params")
            .field("n", Shape::INT)
            .field("s", Shape::STRING)
            .constructor(Constructor::new(vec![Shape::INT, Shape::STRING], |args| {
                Ok(vec![("n".into(), args[0].clone()), ("s".into(), args[1].clone())])
            }))
            .build();
        let record = RecordValue::instantiate(&ty, Registry::global()).unwrap();
        assert_eq!(record.get("n").unwrap(), &Value::Int(0));
        assert_eq!(record.get("s").unwrap(), &Value::from(""));
    }

    #[test]
    fn test_instantiate_skips_failing_constructor() {
        let ty = RecordType::builder("test.record.Failing")
            .field("n", Shape::INT)
            .constructor(Constructor::new(vec![Shape::INT], |_| Err("rejected".into())))
            .constructor(Constructor::new(vec![Shape::LONG], |_| {
                Ok(vec![("n".into(), Value::Int(2))])
            }))
            .build();
        let record = RecordValue::instantiate(&ty, Registry::global()).unwrap();
        assert_eq!(record.get("n").unwrap(), &Value::Int(2));
    }

    #[test]
    fn test_abstract_type_not_instantiable() {
        let ty = RecordType::builder("test.record.Abstract").abstract_type().build();
        assert_eq!(
            RecordValue::instantiate(&ty, Registry::global()).unwrap_err(),
            AccessError::NotInstantiable("test.record.Abstract".into())
        );
    }

    #[test]
    fn test_constants_live_on_type() {
        let ty = RecordType::builder("test.record.Constants")
            .constant("VERSION", Value::Int(3))
            .field("n", Shape::INT)
            .build();
        assert_eq!(ty.constant("VERSION"), Some(&Value::Int(3)));
        assert!(RecordValue::new(&ty).field("VERSION").is_none());
    }
}
