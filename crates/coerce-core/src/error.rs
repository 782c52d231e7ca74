//! Structural access errors.

/// A field, property or constructor could not be reached or invoked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("record type {record} has no field '{field}'")]
    NoSuchField { record: String, field: String },

    #[error("dynamic type {ty} has no property '{property}'")]
    NoSuchProperty { ty: String, property: String },

    #[error("unknown dynamic type '{0}'")]
    UnknownType(String),

    #[error("record type {0} has no usable constructor")]
    NotInstantiable(String),

    #[error("constructor of {record} failed: {message}")]
    Constructor { record: String, message: String },

    #[error("{0} has no field model and cannot be serialized")]
    NoFieldModel(String),

    #[error("dynamic objects are not supported in this build")]
    DynamicUnavailable,
}
