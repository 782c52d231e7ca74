//! Byte arrays: the `bytes` primitive and boxed `byte[]` arrays.

use super::{ArrayConverter, byte_sequence, fill_bytes, fill_target, nil_fallback};
use crate::converter::{ConvertError, Converter, ConverterDecl, Delegate, Delegates};
use crate::extension::Metadata;
use crate::registry::Registry;
use crate::shape::{PrimitiveKind, Shape};
use crate::value::{ArrayValue, Shared, Value};

/// Encodes scalars as big-endian bytes and strings as UTF-8.
///
/// Sequences it cannot read are handed to the array converter.
pub struct BytesConverter {
    decl: ConverterDecl,
    delegates: Delegates,
}

impl BytesConverter {
    pub const ID: &'static str = "primitive.bytes";

    pub fn new() -> Self {
        Self {
            decl: ConverterDecl::new(Self::ID).description("Convert to a byte array"),
            delegates: Delegates {
                on_error: Some(Delegate::new(ArrayConverter::new())),
                ..Default::default()
            },
        }
    }

    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.decl = self.decl.with_metadata(metadata);
        self
    }
}

impl Default for BytesConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for BytesConverter {
    fn decl(&self) -> &ConverterDecl {
        &self.decl
    }

    fn can_convert(&self, _value: &Value, shape: &Shape) -> Result<bool, ConvertError> {
        Ok(shape.primitive() == Some(PrimitiveKind::Bytes))
    }

    fn convert(
        &self,
        _registry: &Registry,
        value: &Value,
        shape: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        if value.is_null() {
            return Ok(nil_fallback(default, overriding, || Value::Bytes(Vec::new())));
        }
        if let Some(source) = byte_sequence(value) {
            let bytes = match fill_target(default, overriding, Value::as_bytes) {
                Some(base) => fill_bytes(base, &source),
                None => source,
            };
            return Ok(Value::Bytes(bytes));
        }

        let bytes = match value {
            Value::Bool(b) => vec![u8::from(*b)],
            Value::Byte(n) => vec![*n as u8],
            Value::Short(n) => n.to_be_bytes().to_vec(),
            Value::Char(c) => u16::try_from(u32::from(*c))
                .map_err(|_| {
                    ConvertError::InvalidInput(format!("{c:?} does not fit in two bytes"))
                })?
                .to_be_bytes()
                .to_vec(),
            Value::Int(n) => n.to_be_bytes().to_vec(),
            Value::Float(f) => f.to_bits().to_be_bytes().to_vec(),
            Value::Long(n) => n.to_be_bytes().to_vec(),
            Value::Double(f) => f.to_bits().to_be_bytes().to_vec(),
            Value::BigInt(n) => n.to_signed_bytes_be(),
            Value::String(s) => s.as_bytes().to_vec(),
            other => return Err(ConvertError::unrecognized(other, shape)),
        };
        Ok(Value::Bytes(bytes))
    }

    fn delegates(&self) -> Option<&Delegates> {
        Some(&self.delegates)
    }
}

/// Boxed `byte[]` arrays.
///
/// The input is first encoded by [`BytesConverter`], then unpacked into
/// `byte` elements. Failures fall back to the general array converter.
pub struct ByteArrayConverter {
    decl: ConverterDecl,
    delegates: Delegates,
}

impl ByteArrayConverter {
    pub const ID: &'static str = "array.bytes";

    pub fn new() -> Self {
        Self {
            decl: ConverterDecl::new(Self::ID).description("Convert to a boxed byte[] array"),
            delegates: Delegates {
                before: Some(Delegate::new(BytesConverter::new()).targeting(Shape::BYTES)),
                after: None,
                on_error: Some(Delegate::new(ArrayConverter::new())),
            },
        }
    }

    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.decl = self.decl.with_metadata(metadata);
        self
    }
}

impl Default for ByteArrayConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for ByteArrayConverter {
    fn decl(&self) -> &ConverterDecl {
        &self.decl
    }

    fn can_convert(&self, _value: &Value, shape: &Shape) -> Result<bool, ConvertError> {
        Ok(matches!(shape, Shape::Array(element) if **element == Shape::BYTE))
    }

    fn convert(
        &self,
        _registry: &Registry,
        value: &Value,
        shape: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        if value.is_null() {
            return Ok(nil_fallback(default, overriding, || {
                Value::array(Shape::BYTE, Vec::new())
            }));
        }
        let Value::Bytes(bytes) = value else {
            return Err(ConvertError::unrecognized(value, shape));
        };
        let items: Vec<Value> = bytes.iter().map(|b| Value::Byte(*b as i8)).collect();

        match fill_target(default, overriding, |v| v.as_array().cloned()) {
            Some(target) => {
                {
                    let mut array = target.write();
                    for (index, item) in items.into_iter().enumerate().take(array.len()) {
                        array.set(index, item);
                    }
                }
                Ok(Value::Array(target))
            }
            None => Ok(Value::Array(Shared::new(ArrayValue::new(Shape::BYTE, items)))),
        }
    }

    fn delegates(&self) -> Option<&Delegates> {
        Some(&self.delegates)
    }
}
