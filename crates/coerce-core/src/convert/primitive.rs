//! Scalar converters: one instance per primitive kind.

use super::{byte_sequence, nil_fallback};
use crate::converter::{ConvertError, Converter, ConverterDecl};
use crate::extension::Metadata;
use crate::registry::Registry;
use crate::shape::{PrimitiveKind, Shape};
use crate::value::Value;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Timelike};
use num_bigint::BigInt;
use num_traits::{FromPrimitive, ToPrimitive, Zero};
use std::str::FromStr;

const SECONDS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Converts to exactly one primitive kind.
///
/// Handles every kind except `string` and `bytes`, which have their own
/// converters.
pub struct PrimitiveConverter {
    kind: PrimitiveKind,
    decl: ConverterDecl,
}

impl PrimitiveConverter {
    pub fn new(kind: PrimitiveKind) -> Self {
        Self {
            kind,
            decl: ConverterDecl::new(Self::id_for(kind))
                .description(format!("Convert to {}", kind.name())),
        }
    }

    pub fn id_for(kind: PrimitiveKind) -> String {
        format!("primitive.{}", kind.name())
    }

    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        self.decl = self.decl.with_metadata(metadata);
        self
    }

    pub fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    fn unrecognized(&self, value: &Value) -> ConvertError {
        ConvertError::unrecognized(value, &Shape::Primitive(self.kind))
    }

    fn to_bool(&self, value: &Value) -> Result<Value, ConvertError> {
        let b = match value {
            Value::Bool(b) => *b,
            Value::Char(c) => *c != '\0',
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(self.unrecognized(value)),
            },
            other => match Number::of(other) {
                Some(n) => !n.is_zero(),
                None => return self.from_bytes(value),
            },
        };
        Ok(Value::Bool(b))
    }

    fn to_char(&self, value: &Value) -> Result<Value, ConvertError> {
        match value {
            Value::Char(c) => Ok(Value::Char(*c)),
            Value::String(s) => Ok(Value::Char(s.trim().chars().next().unwrap_or('\0'))),
            other => match Number::of(other) {
                Some(n) => u32::try_from(n.to_i64())
                    .ok()
                    .and_then(char::from_u32)
                    .map(Value::Char)
                    .ok_or_else(|| {
                        ConvertError::InvalidInput(format!(
                            "{} is not a character code",
                            other.describe()
                        ))
                    }),
                None => self.from_bytes(value),
            },
        }
    }

    fn to_date(&self, value: &Value) -> Result<Value, ConvertError> {
        match value {
            Value::Date(d) => Ok(Value::Date(*d)),
            Value::String(s) => parse_date(s.trim())
                .map(Value::Date)
                .ok_or_else(|| ConvertError::InvalidInput(format!("unrecognized date '{s}'"))),
            other => match other.as_i64() {
                Some(millis) => from_millis(millis).map(Value::Date).ok_or_else(|| {
                    ConvertError::InvalidInput(format!("{millis} ms is out of the date range"))
                }),
                None => Err(self.unrecognized(value)),
            },
        }
    }

    fn to_number(&self, value: &Value) -> Result<Value, ConvertError> {
        match value {
            Value::String(s) => parse_number(self.kind, s.trim()),
            Value::Char(c) => narrow(self.kind, &Number::Int(i64::from(u32::from(*c)))),
            Value::Date(d) if self.kind == PrimitiveKind::Long => Ok(Value::Long(to_millis(d))),
            other => match Number::of(other) {
                Some(n) => narrow(self.kind, &n),
                None => self.from_bytes(value),
            },
        }
    }

    /// Fixed-width big-endian decoding; wrong widths are unrecognized.
    fn from_bytes(&self, value: &Value) -> Result<Value, ConvertError> {
        byte_sequence(value)
            .and_then(|bytes| from_be_bytes(self.kind, &bytes))
            .ok_or_else(|| self.unrecognized(value))
    }
}

impl Converter for PrimitiveConverter {
    fn decl(&self) -> &ConverterDecl {
        &self.decl
    }

    fn can_convert(&self, _value: &Value, shape: &Shape) -> Result<bool, ConvertError> {
        Ok(shape.primitive() == Some(self.kind))
    }

    fn convert(
        &self,
        _registry: &Registry,
        value: &Value,
        _shape: &Shape,
        default: Option<&Value>,
        overriding: Option<&Value>,
    ) -> Result<Value, ConvertError> {
        let zero = || self.kind.zero();
        if value.is_null() {
            return Ok(nil_fallback(default, overriding, zero));
        }
        if let Value::String(s) = value {
            if s.trim().is_empty() {
                return Ok(match self.kind {
                    PrimitiveKind::Date => nil_fallback(default, overriding, zero),
                    _ => zero(),
                });
            }
        }
        match self.kind {
            PrimitiveKind::Bool => self.to_bool(value),
            PrimitiveKind::Char => self.to_char(value),
            PrimitiveKind::Date => self.to_date(value),
            _ => self.to_number(value),
        }
    }
}

/// A numeric value of any width.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Number<'a> {
    Int(i64),
    Float(f64),
    Big(&'a BigInt),
    Decimal(&'a BigDecimal),
}

impl<'a> Number<'a> {
    pub(crate) fn of(value: &'a Value) -> Option<Self> {
        match value {
            Value::BigInt(n) => Some(Number::Big(n)),
            Value::BigDecimal(n) => Some(Number::Decimal(n)),
            other => other
                .as_i64()
                .map(Number::Int)
                .or_else(|| other.as_f64().map(Number::Float)),
        }
    }

    pub(crate) fn is_zero(&self) -> bool {
        match self {
            Number::Int(n) => *n == 0,
            Number::Float(f) => *f == 0.0,
            Number::Big(n) => n.is_zero(),
            Number::Decimal(n) => n.is_zero(),
        }
    }

    /// Two's-complement low 64 bits; floats saturate.
    pub(crate) fn to_i64(&self) -> i64 {
        match self {
            Number::Int(n) => *n,
            Number::Float(f) => *f as i64,
            Number::Big(n) => low_bits(n),
            Number::Decimal(n) => low_bits(&truncate(n)),
        }
    }

    pub(crate) fn to_f64(&self) -> f64 {
        match self {
            Number::Int(n) => *n as f64,
            Number::Float(f) => *f,
            Number::Big(n) => n.to_f64().unwrap_or(f64::NAN),
            Number::Decimal(n) => n.to_f64().unwrap_or(f64::NAN),
        }
    }

    pub(crate) fn to_bigint(&self) -> Option<BigInt> {
        match self {
            Number::Int(n) => Some(BigInt::from(*n)),
            Number::Float(f) => BigInt::from_f64(f.trunc()),
            Number::Big(n) => Some((*n).clone()),
            Number::Decimal(n) => Some(truncate(n)),
        }
    }

    /// Exact for integers. Floats go through their shortest decimal form.
    pub(crate) fn to_bigdecimal(&self) -> Option<BigDecimal> {
        match self {
            Number::Int(n) => Some(BigDecimal::from(*n)),
            Number::Float(f) if f.is_finite() => BigDecimal::from_str(&format!("{f:?}")).ok(),
            Number::Float(_) => None,
            Number::Big(n) => Some(BigDecimal::new((*n).clone(), 0)),
            Number::Decimal(n) => Some((*n).clone()),
        }
    }
}

fn truncate(n: &BigDecimal) -> BigInt {
    n.with_scale(0).into_bigint_and_exponent().0
}

fn low_bits(n: &BigInt) -> i64 {
    (n & BigInt::from(u64::MAX)).to_u64().unwrap_or_default() as i64
}

fn integral<T>(n: &Number<'_>, wrap: fn(i64) -> T, saturate: fn(f64) -> T) -> T {
    match n {
        Number::Float(f) => saturate(*f),
        other => wrap(other.to_i64()),
    }
}

fn narrow(kind: PrimitiveKind, n: &Number<'_>) -> Result<Value, ConvertError> {
    let out_of_range = || ConvertError::InvalidInput(format!("{n:?} has no {} value", kind.name()));
    Ok(match kind {
        PrimitiveKind::Byte => Value::Byte(integral(n, |i| i as i8, |f| f as i8)),
        PrimitiveKind::Short => Value::Short(integral(n, |i| i as i16, |f| f as i16)),
        PrimitiveKind::Int => Value::Int(integral(n, |i| i as i32, |f| f as i32)),
        PrimitiveKind::Long => Value::Long(n.to_i64()),
        PrimitiveKind::Float => Value::Float(n.to_f64() as f32),
        PrimitiveKind::Double => Value::Double(n.to_f64()),
        PrimitiveKind::BigInt => Value::BigInt(n.to_bigint().ok_or_else(out_of_range)?),
        PrimitiveKind::BigDecimal => Value::BigDecimal(n.to_bigdecimal().ok_or_else(out_of_range)?),
        other => {
            return Err(ConvertError::Failed(format!(
                "{} is not a numeric kind",
                other.name()
            )));
        }
    })
}

fn parse_number(kind: PrimitiveKind, text: &str) -> Result<Value, ConvertError> {
    fn parsed<T: FromStr>(text: &str, kind: PrimitiveKind) -> Result<T, ConvertError>
    where
        T::Err: std::fmt::Display,
    {
        text.parse::<T>().map_err(|e| {
            ConvertError::InvalidInput(format!("invalid {} '{text}': {e}", kind.name()))
        })
    }

    Ok(match kind {
        PrimitiveKind::Byte => Value::Byte(parsed(text, kind)?),
        PrimitiveKind::Short => Value::Short(parsed(text, kind)?),
        PrimitiveKind::Int => Value::Int(parsed(text, kind)?),
        PrimitiveKind::Long => Value::Long(parsed(text, kind)?),
        PrimitiveKind::Float => Value::Float(parsed(text, kind)?),
        PrimitiveKind::Double => Value::Double(parsed(text, kind)?),
        PrimitiveKind::BigInt => Value::BigInt(parsed(text, kind)?),
        PrimitiveKind::BigDecimal => Value::BigDecimal(parsed(text, kind)?),
        other => {
            return Err(ConvertError::Failed(format!(
                "{} is not a numeric kind",
                other.name()
            )));
        }
    })
}

fn from_be_bytes(kind: PrimitiveKind, bytes: &[u8]) -> Option<Value> {
    Some(match (kind, bytes.len()) {
        (PrimitiveKind::Bool, 1) => Value::Bool(bytes[0] != 0),
        (PrimitiveKind::Byte, 1) => Value::Byte(bytes[0] as i8),
        (PrimitiveKind::Short, 2) => Value::Short(i16::from_be_bytes(bytes.try_into().ok()?)),
        (PrimitiveKind::Char, 2) => {
            let code = u16::from_be_bytes(bytes.try_into().ok()?);
            Value::Char(char::from_u32(u32::from(code))?)
        }
        (PrimitiveKind::Int, 4) => Value::Int(i32::from_be_bytes(bytes.try_into().ok()?)),
        (PrimitiveKind::Float, 4) => {
            Value::Float(f32::from_bits(u32::from_be_bytes(bytes.try_into().ok()?)))
        }
        (PrimitiveKind::Long, 8) => Value::Long(i64::from_be_bytes(bytes.try_into().ok()?)),
        (PrimitiveKind::Double, 8) => {
            Value::Double(f64::from_bits(u64::from_be_bytes(bytes.try_into().ok()?)))
        }
        (PrimitiveKind::BigInt, _) => Value::BigInt(BigInt::from_signed_bytes_be(bytes)),
        _ => return None,
    })
}

pub(crate) fn to_millis(date: &NaiveDateTime) -> i64 {
    date.and_utc().timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|d| d.naive_utc())
}

/// `yyyy-MM-dd HH:mm:ss.S`, the fraction in whole milliseconds.
pub(crate) fn format_date(date: &NaiveDateTime) -> String {
    format!(
        "{}.{}",
        date.format(SECONDS_FORMAT),
        date.nanosecond() / 1_000_000
    )
}

/// Tries, in order: `yyyy-MM-dd HH:mm:ss SSS`, `yyyy-MM-dd HH:mm:ss.S`,
/// `yyyy-MM-dd HH:mm:ss`, `yyyyMMddHHmmss`, `yyyyMMdd`, `yyyy-MM-dd`.
fn parse_date(text: &str) -> Option<NaiveDateTime> {
    for separator in [' ', '.'] {
        let Some((head, fraction)) = text.rsplit_once(separator) else {
            continue;
        };
        let Ok(base) = NaiveDateTime::parse_from_str(head, SECONDS_FORMAT) else {
            continue;
        };
        if let Ok(millis @ 0..1000) = fraction.parse::<i64>() {
            return Some(base + TimeDelta::milliseconds(millis));
        }
    }
    if let Ok(date) = NaiveDateTime::parse_from_str(text, SECONDS_FORMAT) {
        return Some(date);
    }
    if let Some(date) = parse_compact(text) {
        return Some(date);
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()?
        .and_hms_opt(0, 0, 0)
}

fn parse_compact(text: &str) -> Option<NaiveDateTime> {
    if !matches!(text.len(), 8 | 14) || !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let field = |from: usize, to: usize| text[from..to].parse::<u32>().ok();
    let date = NaiveDate::from_ymd_opt(field(0, 4)? as i32, field(4, 6)?, field(6, 8)?);
    match text.len() {
        14 => date?.and_hms_opt(field(8, 10)?, field(10, 12)?, field(12, 14)?),
        8 => date?.and_hms_opt(0, 0, 0),
        _ => None,
    }
}
