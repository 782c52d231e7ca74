//! Runtime values.
//!
//! Scalars are plain data. Composites (arrays, collections, maps, records and
//! dynamic objects) are shared handles: cloning a [`Value`] clones the handle,
//! not the contents, so an override target can be filled in place and a
//! container may hold itself.

use crate::dynamic::DynamicObject;
use crate::record::RecordValue;
use crate::shape::{CollectionKind, MapKind, PrimitiveKind, Shape};
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use indexmap::IndexMap;
use num_bigint::BigInt;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A shared, lockable handle to composite state.
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T> Shared<T> {
    pub fn new(inner: T) -> Self {
        Self(Arc::new(RwLock::new(inner)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Address of the instance, used as an identity key.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_read() {
            Some(inner) => inner.fmt(f),
            None => write!(f, "<locked@{:#x}>", self.addr()),
        }
    }
}

pub type ArrayRef = Shared<ArrayValue>;
pub type CollectionRef = Shared<CollectionValue>;
pub type MapRef = Shared<MapValue>;
pub type RecordRef = Shared<RecordValue>;
pub type DynamicRef = Shared<DynamicObject>;

/// Fixed-length sequence with a declared element shape.
#[derive(Debug, Clone)]
pub struct ArrayValue {
    element: Shape,
    items: Vec<Value>,
}

impl ArrayValue {
    pub fn new(element: Shape, items: Vec<Value>) -> Self {
        Self { element, items }
    }

    /// An array of `len` zero values of the element shape.
    pub fn filled(element: Shape, len: usize) -> Self {
        let zero = element.field_zero();
        Self {
            items: vec![zero; len],
            element,
        }
    }

    pub fn element(&self) -> &Shape {
        &self.element
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Replaces the item at `index`. Returns false when out of bounds.
    pub fn set(&mut self, index: usize, value: Value) -> bool {
        match self.items.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub(crate) fn replace_items(&mut self, items: Vec<Value>) -> Vec<Value> {
        std::mem::replace(&mut self.items, items)
    }
}

/// Growable list or set.
#[derive(Debug, Clone, Default)]
pub struct CollectionValue {
    kind: CollectionKind,
    items: Vec<Value>,
}

impl CollectionValue {
    pub fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            items: Vec::new(),
        }
    }

    pub fn from_items(kind: CollectionKind, items: impl IntoIterator<Item = Value>) -> Self {
        let mut collection = Self::new(kind);
        for item in items {
            collection.add(item);
        }
        collection
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.items.contains(value)
    }

    /// Appends `value`. Sets ignore values they already hold.
    pub fn add(&mut self, value: Value) -> bool {
        if self.kind == CollectionKind::Set && self.contains(&value) {
            return false;
        }
        self.items.push(value);
        true
    }

    /// Removes the first item equal to `value`.
    pub fn remove(&mut self, value: &Value) -> bool {
        match self.items.iter().position(|item| item == value) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub(crate) fn replace_items(&mut self, items: Vec<Value>) -> Vec<Value> {
        std::mem::replace(&mut self.items, items)
    }
}

/// Key/value map. Keys compare scalars by value and composites by identity.
#[derive(Debug, Clone, Default)]
pub struct MapValue {
    kind: MapKind,
    entries: IndexMap<Value, Value>,
}

impl MapValue {
    pub fn new(kind: MapKind) -> Self {
        Self {
            kind,
            entries: IndexMap::new(),
        }
    }

    pub fn from_entries(kind: MapKind, entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Self {
            kind,
            entries: entries.into_iter().collect(),
        }
    }

    pub fn kind(&self) -> MapKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Looks up a string key.
    pub fn get_str(&self, key: &str) -> Option<&Value> {
        self.entries.get(&Value::String(key.to_string()))
    }

    pub fn insert(&mut self, key: Value, value: Value) -> Option<Value> {
        self.entries.insert(key, value)
    }

    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    /// Copies every entry of `other` into this map.
    pub fn put_all(&mut self, other: impl IntoIterator<Item = (Value, Value)>) {
        self.entries.extend(other);
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, Value, Value> {
        self.entries.iter()
    }

    pub fn keys(&self) -> indexmap::map::Keys<'_, Value, Value> {
        self.entries.keys()
    }

    pub(crate) fn snapshot(&self) -> Vec<(Value, Value)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A host value with no field model.
///
/// Opaque values are compared by identity. Cloning one requires a byte-stream
/// round trip through [`encode`](Opaque::encode) and [`decode`](Opaque::decode).
pub trait Opaque: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;

    fn encode(&self) -> Option<Vec<u8>> {
        None
    }

    fn decode(&self, _bytes: &[u8]) -> Option<Arc<dyn Opaque>> {
        None
    }
}

/// Opaque wrapper for serde types, round-tripped through JSON bytes.
#[derive(Debug)]
pub struct Serialized<T> {
    name: &'static str,
    value: T,
}

impl<T> Serialized<T>
where
    T: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
{
    pub fn new(value: T) -> Self {
        Self {
            name: std::any::type_name::<T>(),
            value,
        }
    }

    pub fn get(&self) -> &T {
        &self.value
    }
}

impl<T> Opaque for Serialized<T>
where
    T: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static,
{
    fn type_name(&self) -> &str {
        self.name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn encode(&self) -> Option<Vec<u8>> {
        serde_json::to_vec(&self.value).ok()
    }

    fn decode(&self, bytes: &[u8]) -> Option<Arc<dyn Opaque>> {
        let value: T = serde_json::from_slice(bytes).ok()?;
        Some(Arc::new(Serialized::new(value)))
    }
}

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    BigInt(BigInt),
    BigDecimal(BigDecimal),
    String(String),
    /// Fixed byte array with value semantics.
    Bytes(Vec<u8>),
    Date(NaiveDateTime),
    Array(ArrayRef),
    Collection(CollectionRef),
    Map(MapRef),
    Record(RecordRef),
    Dynamic(DynamicRef),
    Opaque(Arc<dyn Opaque>),
}

impl Value {
    pub fn array(element: Shape, items: Vec<Value>) -> Self {
        Value::Array(Shared::new(ArrayValue::new(element, items)))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Collection(Shared::new(CollectionValue::from_items(
            CollectionKind::List,
            items,
        )))
    }

    pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Collection(Shared::new(CollectionValue::from_items(
            CollectionKind::Set,
            items,
        )))
    }

    pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(Shared::new(MapValue::from_entries(MapKind::Hash, entries)))
    }

    pub fn linked_map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
        Value::Map(Shared::new(MapValue::from_entries(MapKind::Linked, entries)))
    }

    pub fn record(record: RecordValue) -> Self {
        Value::Record(Shared::new(record))
    }

    pub fn dynamic(object: DynamicObject) -> Self {
        Value::Dynamic(Shared::new(object))
    }

    pub fn opaque(value: impl Opaque + 'static) -> Self {
        Value::Opaque(Arc::new(value))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Primitive kind of a scalar value.
    pub fn kind(&self) -> Option<PrimitiveKind> {
        Some(match self {
            Value::Bool(_) => PrimitiveKind::Bool,
            Value::Byte(_) => PrimitiveKind::Byte,
            Value::Short(_) => PrimitiveKind::Short,
            Value::Int(_) => PrimitiveKind::Int,
            Value::Long(_) => PrimitiveKind::Long,
            Value::Float(_) => PrimitiveKind::Float,
            Value::Double(_) => PrimitiveKind::Double,
            Value::Char(_) => PrimitiveKind::Char,
            Value::BigInt(_) => PrimitiveKind::BigInt,
            Value::BigDecimal(_) => PrimitiveKind::BigDecimal,
            Value::String(_) => PrimitiveKind::String,
            Value::Bytes(_) => PrimitiveKind::Bytes,
            Value::Date(_) => PrimitiveKind::Date,
            _ => return None,
        })
    }

    pub fn is_number(&self) -> bool {
        self.kind().is_some_and(PrimitiveKind::is_numeric)
    }

    pub fn is_composite(&self) -> bool {
        self.identity().is_some() && !matches!(self, Value::Opaque(_))
    }

    /// The shape this value satisfies without conversion.
    pub fn runtime_shape(&self) -> Shape {
        if let Some(kind) = self.kind() {
            return Shape::Primitive(kind);
        }
        match self {
            Value::Array(a) => Shape::Array(Box::new(a.read().element().clone())),
            Value::Collection(c) => Shape::Collection {
                element: Box::new(Shape::Any),
                kind: c.read().kind(),
            },
            Value::Map(m) => Shape::Map {
                key: Box::new(Shape::Any),
                value: Box::new(Shape::Any),
                kind: m.read().kind(),
            },
            Value::Record(r) => Shape::Record(Arc::clone(r.read().record_type())),
            Value::Dynamic(d) => Shape::Dynamic(Some(Arc::clone(d.read().dynamic_type()))),
            _ => Shape::Any,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            Value::Array(a) => format!("{}[]", a.read().element()),
            Value::Collection(c) => c.read().kind().name().to_string(),
            Value::Map(m) => m.read().kind().name().to_string(),
            Value::Record(r) => r.read().record_type().name().to_string(),
            Value::Dynamic(d) => d.read().dynamic_type().name().to_string(),
            Value::Opaque(o) => o.type_name().to_string(),
            scalar => scalar.kind().map_or("null", PrimitiveKind::name).to_string(),
        }
    }

    /// Short form for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::String(s) if s.chars().count() > 32 => {
                let head: String = s.chars().take(32).collect();
                format!("\"{head}...\"")
            }
            Value::String(s) => format!("{s:?}"),
            Value::Bytes(b) => format!("bytes[{}]", b.len()),
            v if v.kind().is_some() => format!("{}:{}", v.scalar_text(), v.type_name()),
            v => v.type_name(),
        }
    }

    fn scalar_text(&self) -> String {
        match self {
            Value::Bool(b) => b.to_string(),
            Value::Byte(n) => n.to_string(),
            Value::Short(n) => n.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Long(n) => n.to_string(),
            Value::Float(n) => format!("{n:?}"),
            Value::Double(n) => format!("{n:?}"),
            Value::Char(c) => format!("{c:?}"),
            Value::BigInt(n) => n.to_string(),
            Value::BigDecimal(n) => n.to_string(),
            Value::Date(d) => d.to_string(),
            _ => String::new(),
        }
    }

    /// Identity key for composite and opaque values.
    pub fn identity(&self) -> Option<usize> {
        match self {
            Value::Array(h) => Some(h.addr()),
            Value::Collection(h) => Some(h.addr()),
            Value::Map(h) => Some(h.addr()),
            Value::Record(h) => Some(h.addr()),
            Value::Dynamic(h) => Some(h.addr()),
            Value::Opaque(o) => Some(Arc::as_ptr(o) as *const () as usize),
            _ => None,
        }
    }

    /// Whether both values are the same composite instance.
    pub fn same_instance(&self, other: &Value) -> bool {
        match (self.identity(), other.identity()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Items of an array or collection, copied out of the lock.
    pub fn items_snapshot(&self) -> Option<Vec<Value>> {
        match self {
            Value::Array(a) => Some(a.read().items().to_vec()),
            Value::Collection(c) => Some(c.read().items().to_vec()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integral value of the fixed-width integer kinds.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(n) => Some(i64::from(*n)),
            Value::Short(n) => Some(i64::from(*n)),
            Value::Int(n) => Some(i64::from(*n)),
            Value::Long(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(n) => Some(f64::from(*n)),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&CollectionRef> {
        match self {
            Value::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapRef> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordRef> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_dynamic(&self) -> Option<&DynamicRef> {
        match self {
            Value::Dynamic(d) => Some(d),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Short(a), Value::Short(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::BigDecimal(a), Value::BigDecimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (a, b) => a.same_instance(b),
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Byte(n) => n.hash(state),
            Value::Short(n) => n.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Long(n) => n.hash(state),
            Value::Float(n) => n.to_bits().hash(state),
            Value::Double(n) => n.to_bits().hash(state),
            Value::Char(c) => c.hash(state),
            Value::BigInt(n) => n.hash(state),
            Value::BigDecimal(n) => n.hash(state),
            Value::String(s) => s.hash(state),
            Value::Bytes(b) => b.hash(state),
            Value::Date(d) => d.hash(state),
            other => other.identity().hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Byte(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<char> for Value {
    fn from(v: char) -> Self {
        Value::Char(v)
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Value::BigInt(v)
    }
}

impl From<BigDecimal> for Value {
    fn from(v: BigDecimal) -> Self {
        Value::BigDecimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Date(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_scalar_equality_is_by_value() {
        assert_eq!(Value::from("a"), Value::from("a"));
        assert_eq!(Value::Double(f64::NAN), Value::Double(f64::NAN));
        assert_ne!(Value::Int(1), Value::Long(1));
    }

    #[test]
    fn test_composite_equality_is_by_identity() {
        let a = Value::list([Value::Int(1)]);
        let b = Value::list([Value::Int(1)]);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert!(a.same_instance(&a.clone()));
    }

    #[test]
    fn test_hash_matches_equality() {
        let list = Value::list([]);
        let mut set = HashSet::new();
        set.insert(Value::Int(3));
        set.insert(Value::Int(3));
        set.insert(list.clone());
        set.insert(list);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_set_ignores_duplicates() {
        let mut set = CollectionValue::new(CollectionKind::Set);
        assert!(set.add(Value::Int(1)));
        assert!(!set.add(Value::Int(1)));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_collection_remove_first_match() {
        let mut list =
            CollectionValue::from_items(CollectionKind::List, [1, 2, 1].map(Value::Int));
        assert!(list.remove(&Value::Int(1)));
        assert_eq!(list.items(), &[Value::Int(2), Value::Int(1)]);
        assert!(!list.remove(&Value::Int(7)));
    }

    #[test]
    fn test_filled_array_uses_field_zero() {
        let ints = ArrayValue::filled(Shape::INT, 2);
        assert_eq!(ints.items(), &[Value::Int(0), Value::Int(0)]);
        let strings = ArrayValue::filled(Shape::STRING, 1);
        assert_eq!(strings.items(), &[Value::Null]);
    }

    #[test]
    fn test_runtime_shape() {
        assert_eq!(Value::Int(1).runtime_shape(), Shape::INT);
        assert_eq!(
            Value::array(Shape::STRING, vec![]).runtime_shape(),
            Shape::array(Shape::STRING)
        );
        assert_eq!(Value::Null.runtime_shape(), Shape::Any);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(Value::Long(1).type_name(), "long");
        assert_eq!(Value::array(Shape::INT, vec![]).type_name(), "int[]");
        assert_eq!(Value::set([]).type_name(), "set");
        assert_eq!(Value::linked_map([]).type_name(), "linked_map");
    }

    #[test]
    fn test_serialized_round_trip() {
        let value = Serialized::new(vec![1u32, 2, 3]);
        let bytes = value.encode().unwrap();
        let back = value.decode(&bytes).unwrap();
        let back = back.as_any().downcast_ref::<Serialized<Vec<u32>>>().unwrap();
        assert_eq!(back.get(), &vec![1, 2, 3]);
    }
}
