//! Converter trait and the conversion protocol.

use crate::error::AccessError;
use crate::registry::Registry;
use crate::shape::Shape;
use crate::value::Value;
use indexmap::IndexMap;
use std::sync::Arc;

/// Declaration of a converter: identity and metadata.
#[derive(Debug, Clone, Default)]
pub struct ConverterDecl {
    /// Unique identifier (e.g., "primitive.int").
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Opaque `key=value` pairs from the extension manifest.
    pub metadata: IndexMap<String, String>,
}

impl ConverterDecl {
    /// Create a declaration with the given id and no metadata.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Set the description.
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Add one metadata entry.
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Merge manifest metadata, later keys overwriting earlier ones.
    pub fn with_metadata(mut self, metadata: &IndexMap<String, String>) -> Self {
        self.metadata
            .extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Look up a metadata value.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// Error during conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("no converter for {value} -> {shape}")]
    Unsupported { value: String, shape: String },

    #[error("conversion failed: {0}")]
    Failed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Access(#[from] AccessError),
}

impl ConvertError {
    pub fn unsupported(value: &Value, shape: &Shape) -> Self {
        ConvertError::Unsupported {
            value: value.describe(),
            shape: shape.to_string(),
        }
    }

    /// Input the converter accepts in principle but cannot read.
    pub fn unrecognized(value: &Value, shape: &Shape) -> Self {
        ConvertError::InvalidInput(format!(
            "cannot convert {} to {}",
            value.describe(),
            shape
        ))
    }

    /// Prefixes the message with where the error happened.
    pub fn with_context(self, context: impl std::fmt::Display) -> Self {
        match self {
            ConvertError::Failed(msg) => ConvertError::Failed(format!("{context}: {msg}")),
            ConvertError::InvalidInput(msg) => {
                ConvertError::InvalidInput(format!("{context}: {msg}"))
            }
            ConvertError::Unsupported { value, shape } => ConvertError::Unsupported {
                value: format!("{context}: {value}"),
                shape,
            },
            access @ ConvertError::Access(_) => access,
        }
    }
}

/// A converter run before, after, or instead of (on error) another one.
#[derive(Clone)]
pub struct Delegate {
    converter: Arc<dyn Converter>,
    shape: Option<Shape>,
}

impl Delegate {
    pub fn new(converter: impl Converter + 'static) -> Self {
        Self::from_arc(Arc::new(converter))
    }

    pub fn from_arc(converter: Arc<dyn Converter>) -> Self {
        Self {
            converter,
            shape: None,
        }
    }

    /// Makes the delegate convert to `shape` instead of the caller's target.
    /// Default and override values are not passed to such a delegate.
    pub fn targeting(mut self, shape: Shape) -> Self {
        self.shape = Some(shape);
        self
    }

    pub fn converter(&self) -> &Arc<dyn Converter> {
        &self.converter
    }

    fn run(
        &self,
        registry: &Registry,
        value: &Value,
        target: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Option<Result<Value, ConvertError>> {
        let (shape, default, overriding) = match &self.shape {
            Some(shape) => (shape, None, None),
            None => (target, default, overriding),
        };
        if !accepts(self.converter.as_ref(), value, shape) {
            return None;
        }
        Some(invoke(
            self.converter.as_ref(),
            registry,
            value,
            shape,
            default,
            overriding,
        ))
    }
}

#[derive(Clone, Default)]
pub struct Delegates {
    pub before: Option<Delegate>,
    pub after: Option<Delegate>,
    pub on_error: Option<Delegate>,
}

/// A converter from any accepted value to one family of shapes.
///
/// Implementations answer [`can_convert`](Converter::can_convert) and do the
/// work in [`convert`](Converter::convert). The fast path, delegates and
/// error recovery are handled by [`invoke`].
pub trait Converter: Send + Sync {
    fn decl(&self) -> &ConverterDecl;

    /// Whether this converter handles `value` into `shape`.
    fn can_convert(&self, value: &Value, shape: &Shape) -> Result<bool, ConvertError>;

    /// Performs the conversion. `default` and `overriding` are never nil.
    fn convert(
        &self,
        registry: &Registry,
        value: &Value,
        shape: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError>;

    fn delegates(&self) -> Option<&Delegates> {
        None
    }
}

/// `can_convert` with failures treated as "no".
pub fn accepts(converter: &dyn Converter, value: &Value, shape: &Shape) -> bool {
    match converter.can_convert(value, shape) {
        Ok(accepted) => accepted,
        Err(e) => {
            tracing::debug!(
                converter = %converter.decl().id,
                shape = %shape,
                error = %e,
                "can_convert failed, treating as unsupported"
            );
            false
        }
    }
}

/// Runs the full protocol for one converter.
///
/// 1. with no override, a non-nil value that already satisfies `shape` is
///    returned as is
/// 2. the before delegate, if it accepts the value
/// 3. [`Converter::convert`]
/// 4. the after delegate, if it accepts the result
///
/// If 2-4 fail and the exception delegate accepts the value as it stood
/// when the failure happened, its result is returned instead.
pub fn invoke(
    converter: &dyn Converter,
    registry: &Registry,
    value: &Value,
    shape: &Shape,
    default: Option<&Value>,
    overriding: Option<&Value>,
) -> Result<Value, ConvertError> {
    let default = default.filter(|v| !v.is_null());
    let overriding = overriding.filter(|v| !v.is_null());

    if overriding.is_none() && !value.is_null() && shape.accepts(value) {
        return Ok(value.clone());
    }

    let Some(delegates) = converter.delegates() else {
        return converter.convert(registry, value, shape, default, overriding);
    };

    let mut current = value.clone();
    let result = run_chain(
        converter,
        delegates,
        registry,
        &mut current,
        shape,
        default,
        overriding,
    );
    match result {
        Ok(converted) => Ok(converted),
        Err(e) => {
            let recovered = delegates
                .on_error
                .as_ref()
                .and_then(|d| d.run(registry, &current, shape, default, overriding));
            match recovered {
                Some(result) => {
                    tracing::trace!(
                        converter = %converter.decl().id,
                        error = %e,
                        "recovered by exception delegate"
                    );
                    result
                }
                None => Err(e),
            }
        }
    }
}

fn run_chain(
    converter: &dyn Converter,
    delegates: &Delegates,
    registry: &Registry,
    current: &mut Value,
    shape: &Shape,
    default: Option<&Value>,
    overriding: Option<&Value>,
) -> Result<Value, ConvertError> {
    if let Some(before) = &delegates.before {
        if let Some(result) = before.run(registry, current, shape, default, overriding) {
            *current = result?;
        }
    }
    *current = converter.convert(registry, current, shape, default, overriding)?;
    if let Some(after) = &delegates.after {
        if let Some(result) = after.run(registry, current, shape, default, overriding) {
            *current = result?;
        }
    }
    Ok(current.clone())
}
