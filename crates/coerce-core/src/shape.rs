//! Shape descriptors: the structure a conversion should produce.

use crate::dynamic::DynamicType;
use crate::record::RecordType;
use crate::value::Value;
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use num_bigint::BigInt;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Scalar kinds with a dedicated converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    BigInt,
    BigDecimal,
    String,
    Bytes,
    Date,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 13] = [
        PrimitiveKind::Bool,
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::Char,
        PrimitiveKind::BigInt,
        PrimitiveKind::BigDecimal,
        PrimitiveKind::String,
        PrimitiveKind::Bytes,
        PrimitiveKind::Date,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Char => "char",
            PrimitiveKind::BigInt => "bigint",
            PrimitiveKind::BigDecimal => "bigdecimal",
            PrimitiveKind::String => "string",
            PrimitiveKind::Bytes => "bytes",
            PrimitiveKind::Date => "date",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            "boolean" => PrimitiveKind::Bool,
            "integer" => PrimitiveKind::Int,
            "str" => PrimitiveKind::String,
            other => return Self::ALL.into_iter().find(|k| k.name() == other),
        };
        Some(kind)
    }

    /// Kinds whose zero is a value rather than nil (numbers, bool, char).
    pub fn is_scalar(self) -> bool {
        !matches!(
            self,
            PrimitiveKind::BigInt
                | PrimitiveKind::BigDecimal
                | PrimitiveKind::String
                | PrimitiveKind::Bytes
                | PrimitiveKind::Date
        )
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::Short
                | PrimitiveKind::Int
                | PrimitiveKind::Long
                | PrimitiveKind::Float
                | PrimitiveKind::Double
                | PrimitiveKind::BigInt
                | PrimitiveKind::BigDecimal
        )
    }

    /// Value a converter produces for nil input with no default or override.
    pub fn zero(self) -> Value {
        match self {
            PrimitiveKind::Bool => Value::Bool(false),
            PrimitiveKind::Byte => Value::Byte(0),
            PrimitiveKind::Short => Value::Short(0),
            PrimitiveKind::Int => Value::Int(0),
            PrimitiveKind::Long => Value::Long(0),
            PrimitiveKind::Float => Value::Float(0.0),
            PrimitiveKind::Double => Value::Double(0.0),
            PrimitiveKind::Char => Value::Char('\0'),
            PrimitiveKind::BigInt => Value::BigInt(BigInt::default()),
            PrimitiveKind::BigDecimal => Value::BigDecimal(BigDecimal::default()),
            PrimitiveKind::String => Value::String(String::new()),
            PrimitiveKind::Bytes => Value::Bytes(Vec::new()),
            PrimitiveKind::Date => Value::Date(NaiveDateTime::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CollectionKind {
    #[default]
    List,
    Set,
}

impl CollectionKind {
    pub fn name(self) -> &'static str {
        match self {
            CollectionKind::List => "list",
            CollectionKind::Set => "set",
        }
    }
}

/// Map flavor. Both keep insertion order; only `Linked` promises it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MapKind {
    #[default]
    Hash,
    Linked,
}

impl MapKind {
    pub fn name(self) -> &'static str {
        match self {
            MapKind::Hash => "map",
            MapKind::Linked => "linked_map",
        }
    }
}

/// Runtime descriptor of a target value's structure.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Accepts every value unchanged.
    Any,
    Primitive(PrimitiveKind),
    Array(Box<Shape>),
    Collection {
        element: Box<Shape>,
        kind: CollectionKind,
    },
    Map {
        key: Box<Shape>,
        value: Box<Shape>,
        kind: MapKind,
    },
    Record(Arc<RecordType>),
    /// A dynamic object, optionally of one declared type.
    Dynamic(Option<Arc<DynamicType>>),
}

impl Shape {
    pub const ANY: Shape = Shape::Any;
    pub const BOOL: Shape = Shape::Primitive(PrimitiveKind::Bool);
    pub const BYTE: Shape = Shape::Primitive(PrimitiveKind::Byte);
    pub const SHORT: Shape = Shape::Primitive(PrimitiveKind::Short);
    pub const INT: Shape = Shape::Primitive(PrimitiveKind::Int);
    pub const LONG: Shape = Shape::Primitive(PrimitiveKind::Long);
    pub const FLOAT: Shape = Shape::Primitive(PrimitiveKind::Float);
    pub const DOUBLE: Shape = Shape::Primitive(PrimitiveKind::Double);
    pub const CHAR: Shape = Shape::Primitive(PrimitiveKind::Char);
    pub const BIGINT: Shape = Shape::Primitive(PrimitiveKind::BigInt);
    pub const BIGDECIMAL: Shape = Shape::Primitive(PrimitiveKind::BigDecimal);
    pub const STRING: Shape = Shape::Primitive(PrimitiveKind::String);
    pub const BYTES: Shape = Shape::Primitive(PrimitiveKind::Bytes);
    pub const DATE: Shape = Shape::Primitive(PrimitiveKind::Date);

    pub fn array(element: Shape) -> Self {
        Shape::Array(Box::new(element))
    }

    pub fn list(element: Shape) -> Self {
        Shape::Collection {
            element: Box::new(element),
            kind: CollectionKind::List,
        }
    }

    pub fn set(element: Shape) -> Self {
        Shape::Collection {
            element: Box::new(element),
            kind: CollectionKind::Set,
        }
    }

    pub fn map(key: Shape, value: Shape) -> Self {
        Shape::Map {
            key: Box::new(key),
            value: Box::new(value),
            kind: MapKind::Hash,
        }
    }

    pub fn linked_map(key: Shape, value: Shape) -> Self {
        Shape::Map {
            key: Box::new(key),
            value: Box::new(value),
            kind: MapKind::Linked,
        }
    }

    pub fn record(ty: &Arc<RecordType>) -> Self {
        Shape::Record(Arc::clone(ty))
    }

    pub fn dynamic() -> Self {
        Shape::Dynamic(None)
    }

    pub fn dynamic_of(ty: &Arc<DynamicType>) -> Self {
        Shape::Dynamic(Some(Arc::clone(ty)))
    }

    pub fn primitive(&self) -> Option<PrimitiveKind> {
        match self {
            Shape::Primitive(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Element shape of an array or collection.
    pub fn element(&self) -> Option<&Shape> {
        match self {
            Shape::Array(element) | Shape::Collection { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Initial value of a field or array slot of this shape.
    pub fn field_zero(&self) -> Value {
        match self {
            Shape::Primitive(kind) if kind.is_scalar() => kind.zero(),
            _ => Value::Null,
        }
    }

    /// Whether every value of `other` is also a value of `self`.
    pub fn is_assignable_from(&self, other: &Shape) -> bool {
        match (self, other) {
            (Shape::Any, _) => true,
            (Shape::Record(target), Shape::Record(source)) => source.is_subtype_of(target),
            (Shape::Dynamic(None), Shape::Dynamic(_)) => true,
            (Shape::Array(target), Shape::Array(source)) => target.is_assignable_from(source),
            (
                Shape::Collection { element, kind },
                Shape::Collection {
                    element: source,
                    kind: source_kind,
                },
            ) => kind == source_kind && element.is_assignable_from(source),
            (
                Shape::Map { key, value, kind },
                Shape::Map {
                    key: source_key,
                    value: source_value,
                    kind: source_kind,
                },
            ) => {
                kind == source_kind
                    && key.is_assignable_from(source_key)
                    && value.is_assignable_from(source_value)
            }
            (target, source) => target == source,
        }
    }

    /// Whether `value` already satisfies this shape and needs no conversion.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (Shape::Any, _) => true,
            (_, Value::Null) => false,
            (Shape::Primitive(kind), value) => value.kind() == Some(*kind),
            (Shape::Array(element), Value::Array(array)) => {
                element.is_assignable_from(array.read().element())
            }
            (Shape::Collection { element, kind }, Value::Collection(collection)) => {
                let items = {
                    let collection = collection.read();
                    if collection.kind() != *kind {
                        return false;
                    }
                    if **element == Shape::Any {
                        return true;
                    }
                    collection.items().to_vec()
                };
                items.iter().all(|item| element.accepts(item))
            }
            (Shape::Map { key, value, kind }, Value::Map(map)) => {
                let entries = {
                    let map = map.read();
                    if map.kind() != *kind {
                        return false;
                    }
                    if **key == Shape::Any && **value == Shape::Any {
                        return true;
                    }
                    map.snapshot()
                };
                entries
                    .iter()
                    .all(|(k, v)| key.accepts(k) && value.accepts(v))
            }
            (Shape::Record(ty), Value::Record(record)) => {
                record.read().record_type().is_subtype_of(ty)
            }
            (Shape::Dynamic(None), Value::Dynamic(_)) => true,
            (Shape::Dynamic(Some(ty)), Value::Dynamic(object)) => {
                object.read().dynamic_type().id() == ty.id()
            }
            _ => false,
        }
    }

    /// Parses shape text, resolving named types through `resolve`.
    ///
    /// ```text
    /// int            list<string>         map<string, list<int>>
    /// int[]          set<long>            linked_map<string, any>
    /// any            dynamic              dynamic<demo.Order>
    /// ```
    pub fn parse_with(
        input: &str,
        resolve: impl Fn(&str) -> Option<Shape>,
    ) -> Result<Shape, ShapeParseError> {
        let mut parser = Parser {
            input,
            pos: 0,
            resolve: &resolve,
        };
        let shape = parser.shape()?;
        parser.skip_ws();
        match parser.peek() {
            None => Ok(shape),
            Some(found) => Err(parser.unexpected(found)),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Any => f.write_str("any"),
            Shape::Primitive(kind) => f.write_str(kind.name()),
            Shape::Array(element) => write!(f, "{element}[]"),
            Shape::Collection { element, kind } => write!(f, "{}<{element}>", kind.name()),
            Shape::Map { key, value, kind } => write!(f, "{}<{key}, {value}>", kind.name()),
            Shape::Record(ty) => f.write_str(ty.name()),
            Shape::Dynamic(None) => f.write_str("dynamic"),
            Shape::Dynamic(Some(ty)) => write!(f, "dynamic<{}>", ty.name()),
        }
    }
}

impl FromStr for Shape {
    type Err = ShapeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Shape::parse_with(s, |_| None)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeParseError {
    #[error("unexpected end of shape '{0}'")]
    UnexpectedEnd(String),

    #[error("unexpected '{found}' at offset {offset} in '{input}'")]
    Unexpected {
        input: String,
        offset: usize,
        found: char,
    },

    #[error("unknown type '{0}'")]
    UnknownType(String),
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    resolve: &'a dyn Fn(&str) -> Option<Shape>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn unexpected(&self, found: char) -> ShapeParseError {
        ShapeParseError::Unexpected {
            input: self.input.to_string(),
            offset: self.pos,
            found,
        }
    }

    fn expect(&mut self, want: char) -> Result<(), ShapeParseError> {
        self.skip_ws();
        match self.peek() {
            Some(c) if c == want => {
                self.pos += c.len_utf8();
                Ok(())
            }
            Some(c) => Err(self.unexpected(c)),
            None => Err(ShapeParseError::UnexpectedEnd(self.input.to_string())),
        }
    }

    fn ident(&mut self) -> Result<&str, ShapeParseError> {
        self.skip_ws();
        let start = self.pos;
        while let Some(c) = self
            .peek()
            .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | ':' | '$'))
        {
            self.pos += c.len_utf8();
        }
        if start == self.pos {
            return match self.peek() {
                Some(c) => Err(self.unexpected(c)),
                None => Err(ShapeParseError::UnexpectedEnd(self.input.to_string())),
            };
        }
        Ok(&self.input[start..self.pos])
    }

    fn shape(&mut self) -> Result<Shape, ShapeParseError> {
        let name = self.ident()?.to_string();
        let mut shape = match name.as_str() {
            "any" => Shape::Any,
            "list" | "set" => {
                self.expect('<')?;
                let element = self.shape()?;
                self.expect('>')?;
                if name == "list" {
                    Shape::list(element)
                } else {
                    Shape::set(element)
                }
            }
            "map" | "linked_map" => {
                self.expect('<')?;
                let key = self.shape()?;
                self.expect(',')?;
                let value = self.shape()?;
                self.expect('>')?;
                if name == "map" {
                    Shape::map(key, value)
                } else {
                    Shape::linked_map(key, value)
                }
            }
            "dynamic" => {
                self.skip_ws();
                if self.peek() == Some('<') {
                    self.expect('<')?;
                    let type_name = self.ident()?.to_string();
                    self.expect('>')?;
                    match (self.resolve)(&type_name) {
                        Some(shape @ Shape::Dynamic(Some(_))) => shape,
                        _ => return Err(ShapeParseError::UnknownType(type_name)),
                    }
                } else {
                    Shape::Dynamic(None)
                }
            }
            other => match PrimitiveKind::from_name(other) {
                Some(kind) => Shape::Primitive(kind),
                None => (self.resolve)(other)
                    .ok_or_else(|| ShapeParseError::UnknownType(other.to_string()))?,
            },
        };
        loop {
            self.skip_ws();
            if !self.input[self.pos..].starts_with('[') {
                break;
            }
            self.expect('[')?;
            self.expect(']')?;
            shape = Shape::array(shape);
        }
        Ok(shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordType;

    #[test]
    fn test_parse_primitives() {
        assert_eq!("int".parse::<Shape>().unwrap(), Shape::INT);
        assert_eq!("boolean".parse::<Shape>().unwrap(), Shape::BOOL);
        assert_eq!("bytes".parse::<Shape>().unwrap(), Shape::BYTES);
    }

    #[test]
    fn test_parse_nested() {
        let shape: Shape = "map<string, list<int[]>>".parse().unwrap();
        assert_eq!(
            shape,
            Shape::map(Shape::STRING, Shape::list(Shape::array(Shape::INT)))
        );
        assert_eq!(shape.to_string(), "map<string, list<int[]>>");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "widget".parse::<Shape>(),
            Err(ShapeParseError::UnknownType("widget".into()))
        );
        assert!(matches!(
            "list<int".parse::<Shape>(),
            Err(ShapeParseError::UnexpectedEnd(_))
        ));
        assert!(matches!(
            "int>".parse::<Shape>(),
            Err(ShapeParseError::Unexpected { found: '>', .. })
        ));
    }

    #[test]
    fn test_parse_with_resolver() {
        let person = RecordType::builder("demo.Person").build();
        let shape = Shape::parse_with("demo.Person[]", |name| {
            (name == "demo.Person").then(|| Shape::record(&person))
        })
        .unwrap();
        assert_eq!(shape, Shape::array(Shape::record(&person)));
    }

    #[test]
    fn test_accepts_exact_kind_only() {
        assert!(Shape::INT.accepts(&Value::Int(1)));
        assert!(!Shape::INT.accepts(&Value::Long(1)));
        assert!(!Shape::INT.accepts(&Value::Null));
        assert!(Shape::Any.accepts(&Value::Null));
    }

    #[test]
    fn test_accepts_checks_collection_contents() {
        let ints = Value::list([Value::Int(1), Value::Int(2)]);
        assert!(Shape::list(Shape::INT).accepts(&ints));
        assert!(!Shape::list(Shape::STRING).accepts(&ints));
        assert!(!Shape::set(Shape::INT).accepts(&ints));
    }

    #[test]
    fn test_record_subtype_assignable() {
        let base = RecordType::builder("demo.Base").field("id", Shape::LONG).build();
        let derived = RecordType::builder("demo.Derived").parent(&base).build();
        assert!(Shape::record(&base).is_assignable_from(&Shape::record(&derived)));
        assert!(!Shape::record(&derived).is_assignable_from(&Shape::record(&base)));
    }
}
