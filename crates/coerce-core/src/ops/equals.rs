use crate::convert::Number;
use crate::dynamic::dynamic_supported;
use crate::registry::Registry;
use crate::shape::Shape;
use crate::value::Value;

/// Structural equality.
///
/// Values of different types are unequal unless `loose` is set, in which
/// case a string is read as a number against a number, any other value is
/// read as `double` against a number, and otherwise one side is cast to the
/// other's type. Numbers compare as `double`. Sequences compare in order,
/// maps by key, records and dynamic objects by field name.
///
/// Failures while reading fields or casting count as "not equal".
pub fn equals(registry: &Registry, a: &Value, b: &Value, loose: bool) -> bool {
    if a.same_instance(b) {
        return true;
    }
    match (a.is_null(), b.is_null()) {
        (true, true) => return true,
        (true, false) | (false, true) => return false,
        _ => {}
    }
    if same_type(a, b) {
        return same_content(registry, a, b, loose);
    }
    loose && loosely_equal(registry, a, b)
}

fn loosely_equal(registry: &Registry, a: &Value, b: &Value) -> bool {
    if a.is_number() && b.is_number() {
        return numbers_equal(a, b);
    }
    let toward_number = |other: &Value, number: &Value| {
        registry
            .cast(other, &Shape::DOUBLE)
            .is_ok_and(|other| numbers_equal(&other, number))
    };
    if a.is_number() {
        return toward_number(b, a);
    }
    if b.is_number() {
        return toward_number(a, b);
    }
    // Either direction may lose information, so both are tried.
    cast_equal(registry, b, a) || cast_equal(registry, a, b)
}

/// `from` cast to the runtime type of `onto`, then compared with it.
fn cast_equal(registry: &Registry, from: &Value, onto: &Value) -> bool {
    match registry.cast(from, &onto.runtime_shape()) {
        Ok(cast) => same_type(&cast, onto) && same_content(registry, &cast, onto, true),
        Err(e) => {
            tracing::trace!(from = %from.describe(), onto = %onto.type_name(), error = %e, "loose cast failed");
            false
        }
    }
}

fn same_type(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => {
            let (x, y) = (x.read().element().clone(), y.read().element().clone());
            x.is_assignable_from(&y) || y.is_assignable_from(&x)
        }
        (Value::Collection(x), Value::Collection(y)) => x.read().kind() == y.read().kind(),
        (Value::Map(_), Value::Map(_)) => true,
        (Value::Record(x), Value::Record(y)) => {
            let (x, y) = (x.read().record_type().clone(), y.read().record_type().clone());
            x.is_subtype_of(&y) || y.is_subtype_of(&x)
        }
        (Value::Dynamic(_), Value::Dynamic(_)) => true,
        (Value::Opaque(x), Value::Opaque(y)) => x.type_name() == y.type_name(),
        _ => matches!((a.kind(), b.kind()), (Some(x), Some(y)) if x == y),
    }
}

fn same_content(registry: &Registry, a: &Value, b: &Value, loose: bool) -> bool {
    match (a, b) {
        (Value::Array(_) | Value::Collection(_), Value::Array(_) | Value::Collection(_)) => {
            match (a.items_snapshot(), b.items_snapshot()) {
                (Some(x), Some(y)) => sequences_equal(registry, &x, &y, loose),
                _ => false,
            }
        }
        (Value::Map(x), Value::Map(y)) => {
            let left = x.read().snapshot();
            let right = y.read().clone();
            left.len() == right.len()
                && left.iter().all(|(key, v)| match right.get(key) {
                    Some(other) => equals(registry, v, other, loose),
                    None => false,
                })
        }
        (Value::Record(x), Value::Record(y)) => {
            let left: Vec<(String, Value)> = x
                .read()
                .fields()
                .map(|(name, v)| (name.to_string(), v.clone()))
                .collect();
            let right = y.read().clone();
            left.len() == right.len()
                && left.iter().all(|(name, v)| match right.field(name) {
                    Some(other) => equals(registry, v, other, loose),
                    None => false,
                })
        }
        (Value::Dynamic(x), Value::Dynamic(y)) => {
            if !dynamic_supported() {
                return false;
            }
            let left: Vec<(String, Value)> = x
                .read()
                .properties()
                .map(|(name, v)| (name.to_string(), v.clone()))
                .collect();
            let right = y.read().clone();
            left.len() == right.len()
                && left.iter().all(|(name, v)| match right.get(name) {
                    Some(other) => equals(registry, v, other, loose),
                    None => false,
                })
        }
        (Value::Opaque(_), Value::Opaque(_)) => false,
        _ if a.is_number() => numbers_equal(a, b),
        _ => a == b,
    }
}

fn sequences_equal(registry: &Registry, x: &[Value], y: &[Value], loose: bool) -> bool {
    x.len() == y.len() && x.iter().zip(y).all(|(a, b)| equals(registry, a, b, loose))
}

/// `double` comparison where NaN equals NaN.
fn numbers_equal(a: &Value, b: &Value) -> bool {
    match (Number::of(a), Number::of(b)) {
        (Some(x), Some(y)) => {
            let (x, y) = (x.to_f64(), y.to_f64());
            x == y || (x.is_nan() && y.is_nan())
        }
        _ => false,
    }
}
