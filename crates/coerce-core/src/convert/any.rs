use super::nil_fallback;
use crate::converter::{ConvertError, Converter, ConverterDecl};
use crate::extension::Metadata;
use crate::registry::Registry;
use crate::shape::Shape;
use crate::value::Value;

/// The `any` shape: values pass through unchanged.
pub struct AnyConverter {
    decl: ConverterDecl,
}

impl AnyConverter {
    pub const ID: &'static str = "any";

    pub fn new() -> Self {
        Self {
            decl: ConverterDecl::new(Self::ID).description("Pass values through unchanged"),
        }
    }

    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.decl = self.decl.with_metadata(metadata);
        self
    }
}

impl Default for AnyConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for AnyConverter {
    fn decl(&self) -> &ConverterDecl {
        &self.decl
    }

    fn can_convert(&self, _value: &Value, shape: &Shape) -> Result<bool, ConvertError> {
        Ok(*shape == Shape::Any)
    }

    fn convert(
        &self,
        _registry: &Registry,
        value: &Value,
        _shape: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        if value.is_null() {
            return Ok(nil_fallback(default, overriding, || Value::Null));
        }
        Ok(value.clone())
    }
}
