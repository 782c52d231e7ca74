use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use pretty_assertions::assert_eq;
use rhi_coerce_core::{Comparator, RecordType, RecordValue, Registry, Shape, Value, sort};
use std::str::FromStr;
use std::sync::Arc;

fn ints(values: &[i32]) -> Vec<Value> {
    values.iter().copied().map(Value::Int).collect()
}

fn entry(key: &str, value: impl Into<Value>) -> (Value, Value) {
    (Value::from(key), value.into())
}

#[test]
fn test_string_and_nil_to_int() {
    let registry = Registry::global();
    assert_eq!(registry.cast(&Value::from("123"), &Shape::INT).unwrap(), Value::Int(123));
    assert_eq!(registry.cast(&Value::from(""), &Shape::INT).unwrap(), Value::Int(0));
    assert_eq!(
        registry
            .convert(&Value::Null, &Shape::INT, Some(&Value::Int(5)), None)
            .unwrap(),
        Value::Int(5)
    );
}

#[test]
fn test_array_into_existing_list() {
    let existing = Value::list(ints(&[9]));
    let out = rhi_coerce_core::convert(
        &Value::array(Shape::INT, ints(&[1, 2, 3])),
        &Shape::list(Shape::INT),
        None,
        Some(&existing),
    )
    .unwrap();
    assert!(out.same_instance(&existing));
    assert_eq!(out.items_snapshot().unwrap(), ints(&[9, 1, 2, 3]));
}

#[test]
fn test_override_array_keeps_its_length() {
    let source = Value::array(Shape::INT, ints(&[1, 2, 3, 4, 5]));

    let short = Value::array(Shape::INT, ints(&[0, 0, 0]));
    Registry::global()
        .convert(&source, &Shape::array(Shape::INT), None, Some(&short))
        .unwrap();
    assert_eq!(short.items_snapshot().unwrap(), ints(&[1, 2, 3]));

    let long = Value::array(Shape::INT, ints(&[0, 0, 0, 0, 0, 6, 7]));
    Registry::global()
        .convert(&source, &Shape::array(Shape::INT), None, Some(&long))
        .unwrap();
    assert_eq!(long.items_snapshot().unwrap(), ints(&[1, 2, 3, 4, 5, 6, 7]));
}

#[test]
fn test_matching_shape_returns_same_instance() {
    let list = Value::list(ints(&[1]));
    let out = Registry::global().cast(&list, &list.runtime_shape()).unwrap();
    assert!(out.same_instance(&list));
}

#[test]
fn test_record_round_trips_through_map() {
    let ty = RecordType::builder("test.Pair")
        .field("a", Shape::INT)
        .field("b", Shape::STRING)
        .build();
    let record = Value::record(RecordValue::from_fields(
        &ty,
        [("a", Value::Int(4)), ("b", Value::from("four"))],
    ));

    let registry = Registry::global();
    let map = registry
        .cast(&record, &Shape::map(Shape::STRING, Shape::ANY))
        .unwrap();
    assert_eq!(map.type_name(), "map");
    let back = registry.cast(&map, &Shape::record(&ty)).unwrap();

    assert!(!back.same_instance(&record));
    assert!(rhi_coerce_core::equals(&back, &record, false));
}

#[test]
fn test_unrelated_records_share_field_names() {
    let person = RecordType::builder("test.Person")
        .field("name", Shape::STRING)
        .field("age", Shape::STRING)
        .build();
    let employee = RecordType::builder("test.Employee")
        .field("name", Shape::STRING)
        .field("age", Shape::INT)
        .field("badge", Shape::LONG)
        .build();
    let source = Value::record(RecordValue::from_fields(
        &person,
        [("name", Value::from("Ada")), ("age", Value::from("36"))],
    ));

    let out = Registry::global().cast(&source, &Shape::record(&employee)).unwrap();
    let out = out.as_record().unwrap().read();
    assert_eq!(out.get("name").unwrap(), &Value::from("Ada"));
    assert_eq!(out.get("age").unwrap(), &Value::Int(36));
    assert_eq!(out.get("badge").unwrap(), &Value::Long(0));
}

#[test]
fn test_primitive_round_trips() {
    let registry = Registry::global();
    let samples = [
        Value::Bool(false),
        Value::Bool(true),
        Value::Byte(i8::MIN),
        Value::Byte(i8::MAX),
        Value::Short(i16::MIN),
        Value::Int(0),
        Value::Int(i32::MIN),
        Value::Int(i32::MAX),
        Value::Long(i64::MIN),
        Value::Long(i64::MAX),
        Value::Float(0.5),
        Value::Double(-1.25),
        Value::Char('z'),
        Value::BigInt(BigInt::from_str("123456789012345678901234567890").unwrap()),
        Value::BigDecimal(BigDecimal::from_str("-0.000125").unwrap()),
        Value::from(""),
        Value::from("text"),
    ];
    for value in samples {
        let shape = value.runtime_shape();
        let once = registry.cast(&value, &shape).unwrap();
        let twice = registry.cast(&once, &shape).unwrap();
        assert_eq!(twice, value, "{shape}");

        let text = registry.cast(&value, &Shape::STRING).unwrap();
        if !matches!(value, Value::String(_)) {
            assert_eq!(registry.cast(&text, &shape).unwrap(), value, "{shape} via string");
        }
    }
}

#[test]
fn test_unsupported_is_an_error() {
    let list = Value::list(ints(&[1, 2]));
    let err = Registry::global()
        .cast(&list, &Shape::map(Shape::STRING, Shape::ANY))
        .unwrap_err();
    assert!(matches!(err, rhi_coerce_core::ConvertError::Unsupported { .. }));
}

#[test]
fn test_equality_is_reflexive_and_symmetric() {
    let samples = [
        Value::Null,
        Value::Int(1),
        Value::Long(1),
        Value::from("1"),
        Value::Double(1.0),
        Value::list(ints(&[1, 2])),
        Value::array(Shape::INT, ints(&[1, 2])),
        Value::map([entry("k", 1)]),
    ];
    for a in &samples {
        assert!(rhi_coerce_core::equals(a, a, false), "{}", a.describe());
        for b in &samples {
            for loose in [false, true] {
                assert_eq!(
                    rhi_coerce_core::equals(a, b, loose),
                    rhi_coerce_core::equals(b, a, loose),
                    "{} vs {} (loose: {loose})",
                    a.describe(),
                    b.describe()
                );
            }
        }
    }
}

#[test]
fn test_sort_keeps_ties_in_order() {
    let rows = Value::list([
        Value::map([entry("a", 1), entry("b", "x")]),
        Value::map([entry("a", 1), entry("b", "y")]),
        Value::map([entry("a", 0), entry("b", "z")]),
    ]);
    let none: [Option<Comparator>; 1] = [None];
    sort(&rows, &["a"], &none, &[false]).unwrap();

    let order: Vec<Value> = rows
        .items_snapshot()
        .unwrap()
        .iter()
        .map(|row| row.as_map().unwrap().read().get_str("b").cloned().unwrap_or_default())
        .collect();
    assert_eq!(order, vec![Value::from("z"), Value::from("x"), Value::from("y")]);
}

#[test]
fn test_clone_then_compare() {
    let ty: Arc<RecordType> = RecordType::builder("test.Box")
        .field("items", Shape::list(Shape::INT))
        .build();
    let original = Value::record(RecordValue::from_fields(
        &ty,
        [("items", Value::list(ints(&[3, 4])))],
    ));

    let copy = rhi_coerce_core::deep_clone(&original).unwrap();
    assert!(rhi_coerce_core::equals(&copy, &original, false));

    let items = copy.as_record().unwrap().read().get("items").unwrap().clone();
    items.as_collection().unwrap().write().add(Value::Int(5));
    assert!(!rhi_coerce_core::equals(&copy, &original, false));
}
