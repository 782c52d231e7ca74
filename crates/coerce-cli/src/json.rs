//! JSON ⇄ [`Value`] at the command line boundary.

use num_bigint::BigInt;
use rhi_coerce_core::Value;
use rhi_coerce_core::convert::render;
use serde_json::{Map, Number, Value as Json};
use std::collections::HashSet;

/// Integers become `int` when they fit, then `long`, then big integers.
/// Arrays become lists and objects become linked maps.
pub fn to_value(json: &Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                i32::try_from(i).map_or(Value::Long(i), Value::Int)
            } else if let Some(u) = n.as_u64() {
                Value::BigInt(BigInt::from(u))
            } else {
                Value::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::String(s.clone()),
        Json::Array(items) => Value::list(items.iter().map(to_value)),
        Json::Object(map) => Value::linked_map(
            map.iter()
                .map(|(k, v)| (Value::String(k.clone()), to_value(v))),
        ),
    }
}

/// JSON form of `value`. Scalars JSON cannot hold are written as their
/// string rendering. A composite that contains itself is cut off with
/// `"(cycle)"`.
pub fn from_value(value: &Value) -> Json {
    let mut path = HashSet::new();
    write(value, &mut path)
}

fn write(value: &Value, path: &mut HashSet<usize>) -> Json {
    if let Some(id) = value.identity() {
        if !path.insert(id) {
            return Json::String("(cycle)".into());
        }
    }
    let json = match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Byte(n) => Json::from(*n),
        Value::Short(n) => Json::from(*n),
        Value::Int(n) => Json::from(*n),
        Value::Long(n) => Json::from(*n),
        Value::Float(n) => float(f64::from(*n)),
        Value::Double(n) => float(*n),
        Value::BigInt(n) => match i64::try_from(n) {
            Ok(n) => Json::from(n),
            Err(_) => Json::String(n.to_string()),
        },
        Value::String(s) => Json::String(s.clone()),
        Value::Bytes(bytes) => Json::Array(bytes.iter().map(|b| Json::from(*b)).collect()),
        Value::Array(_) | Value::Collection(_) => {
            let items = value.items_snapshot().unwrap_or_default();
            Json::Array(items.iter().map(|item| write(item, path)).collect())
        }
        Value::Map(map) => {
            let entries = map
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect::<Vec<_>>();
            let mut object = Map::new();
            for (k, v) in entries {
                let key = match k.as_str() {
                    Some(key) => key.to_string(),
                    None => render(&k, false),
                };
                object.insert(key, write(&v, path));
            }
            Json::Object(object)
        }
        Value::Record(record) => {
            let fields = record
                .read()
                .fields()
                .map(|(name, v)| (name.to_string(), v.clone()))
                .collect::<Vec<_>>();
            object_of(fields, path)
        }
        Value::Dynamic(object) => {
            let properties = object
                .read()
                .properties()
                .map(|(name, v)| (name.to_string(), v.clone()))
                .collect::<Vec<_>>();
            object_of(properties, path)
        }
        other => Json::String(render(other, false)),
    };
    if let Some(id) = value.identity() {
        path.remove(&id);
    }
    json
}

fn object_of(fields: Vec<(String, Value)>, path: &mut HashSet<usize>) -> Json {
    let mut object = Map::new();
    for (name, v) in fields {
        object.insert(name, write(&v, path));
    }
    Json::Object(object)
}

fn float(n: f64) -> Json {
    Number::from_f64(n).map_or(Json::Null, Json::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_numbers_pick_narrowest_kind() {
        assert_eq!(to_value(&json!(7)), Value::Int(7));
        assert_eq!(to_value(&json!(5_000_000_000i64)), Value::Long(5_000_000_000));
        assert_eq!(
            to_value(&json!(u64::MAX)),
            Value::BigInt(BigInt::from(u64::MAX))
        );
        assert_eq!(to_value(&json!(1.5)), Value::Double(1.5));
    }

    #[test]
    fn test_object_order_is_kept() {
        let value = to_value(&json!({"b": 1, "a": [true, null]}));
        assert_eq!(value.type_name(), "linked_map");
        assert_eq!(from_value(&value).to_string(), r#"{"b":1,"a":[true,null]}"#);
    }

    #[test]
    fn test_scalars_without_json_form() {
        assert_eq!(from_value(&Value::Char('x')), json!("x"));
        assert_eq!(from_value(&Value::Double(f64::NAN)), Json::Null);
        assert_eq!(from_value(&Value::Bytes(vec![1, 2])), json!([1, 2]));
    }

    #[test]
    fn test_cycle_is_cut() {
        let list = Value::list([Value::Int(1)]);
        list.as_collection().unwrap().write().add(list.clone());
        assert_eq!(from_value(&list), json!([1, "(cycle)"]));
    }
}
