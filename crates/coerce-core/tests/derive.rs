#![cfg(feature = "derive")]

use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use rhi_coerce_core::reflect::{FromValue, HasShape, IntoValue, Reflect, cast_to};
use rhi_coerce_core::{ConvertError, Record, Registry, Shape, Value};

#[derive(Record, Debug, PartialEq)]
#[record(name = "shop.Customer")]
struct Customer {
    name: String,
    vip: bool,
}

#[derive(Record, Debug, PartialEq)]
#[record(name = "shop.Order")]
struct Order {
    id: i64,
    #[record(rename = "lines")]
    items: Vec<String>,
    customer: Customer,
    note: Option<String>,
    tags: IndexMap<String, i32>,
    #[record(skip)]
    cached_total: Option<f64>,
}

#[derive(Record, Debug, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

fn entry(key: &str, value: impl Into<Value>) -> (Value, Value) {
    (Value::from(key), value.into())
}

#[test]
fn test_record_type_is_cached() {
    let ty = Order::record_type();
    assert!(std::sync::Arc::ptr_eq(&ty, &Order::record_type()));
    assert_eq!(ty.name(), "shop.Order");

    let names: Vec<&str> = ty.declared_fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["id", "lines", "customer", "note", "tags"]);
}

#[test]
fn test_default_name_is_module_path() {
    assert_eq!(Point::record_type().name(), "derive::Point");
}

#[test]
fn test_cast_from_loose_map() {
    let source = Value::linked_map([
        entry("id", "42"),
        entry("lines", Value::list([Value::from("pen"), Value::Int(7)])),
        entry(
            "customer",
            Value::map([entry("name", "Ada"), entry("vip", "true")]),
        ),
        entry("tags", Value::linked_map([entry("rush", 1)])),
        entry("unknown", 1),
    ]);

    let order: Order = cast_to(Registry::global(), &source).unwrap();
    assert_eq!(
        order,
        Order {
            id: 42,
            items: vec!["pen".into(), "7".into()],
            customer: Customer {
                name: "Ada".into(),
                vip: true,
            },
            note: None,
            tags: IndexMap::from([("rush".to_string(), 1)]),
            cached_total: None,
        }
    );
}

#[test]
fn test_into_value_and_back() {
    let point = Point { x: 3, y: -1 };
    let value = point.into_value();
    assert!(Point::shape().accepts(&value));

    let record = value.as_record().unwrap().read();
    assert_eq!(record.get("x").unwrap(), &Value::Int(3));
    drop(record);

    assert_eq!(Point::from_value(&value).unwrap(), Point { x: 3, y: -1 });
}

#[test]
fn test_skipped_field_comes_back_default() {
    let order = Order {
        id: 1,
        items: Vec::new(),
        customer: Customer {
            name: "Bo".into(),
            vip: false,
        },
        note: Some("fragile".into()),
        tags: IndexMap::new(),
        cached_total: Some(9.5),
    };
    let back = Order::from_value(&order.into_value()).unwrap();
    assert_eq!(back.cached_total, None);
    assert_eq!(back.note.as_deref(), Some("fragile"));
}

#[test]
fn test_field_error_names_the_field() {
    let source = Value::map([entry("x", "one"), entry("y", 2)]);
    let err = cast_to::<Point>(Registry::global(), &source).unwrap_err();
    assert!(err.to_string().contains("derive::Point.x"), "{err}");
}

#[test]
fn test_wrong_value_kind() {
    let err = Point::from_value(&Value::Int(1)).unwrap_err();
    assert!(matches!(err, ConvertError::Unsupported { .. }));
}

#[test]
fn test_record_shape_converts_to_map() {
    let value = Point { x: 1, y: 2 }.into_value();
    let map = Registry::global()
        .cast(&value, &Shape::linked_map(Shape::STRING, Shape::ANY))
        .unwrap();
    let map = map.as_map().unwrap().read();
    assert_eq!(map.get_str("y"), Some(&Value::Int(2)));
}
