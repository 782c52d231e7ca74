//! Strings, including the diagnostic rendering of composite values.

use super::{format_date, nil_fallback};
use crate::converter::{ConvertError, Converter, ConverterDecl};
use crate::extension::Metadata;
use crate::registry::Registry;
use crate::shape::Shape;
use crate::value::Value;

const INDENT: &str = "    ";

/// Formats any value as a string.
///
/// Scalars use their plain text form. Composites are rendered as nested
/// tags, e.g. `<array class='int' length='1'><item index='1' class='int'>7</item></array>`.
pub struct StringConverter {
    decl: ConverterDecl,
    pretty: bool,
}

impl StringConverter {
    pub const ID: &'static str = "primitive.string";

    pub fn new(pretty: bool) -> Self {
        Self {
            decl: ConverterDecl::new(Self::ID).description("Convert to a string"),
            pretty,
        }
    }

    /// Applies manifest metadata; `pretty=false` turns indentation off.
    pub fn with_metadata(mut self, metadata: &Metadata) -> Self {
        if let Some(pretty) = metadata.get("pretty") {
            self.pretty = pretty != "false";
        }
        self.decl = self.decl.with_metadata(metadata);
        self
    }

    pub fn is_pretty(&self) -> bool {
        self.pretty
    }
}

impl Converter for StringConverter {
    fn decl(&self) -> &ConverterDecl {
        &self.decl
    }

    fn can_convert(&self, _value: &Value, shape: &Shape) -> Result<bool, ConvertError> {
        Ok(*shape == Shape::STRING)
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
            return Ok(nil_fallback(default, overriding, || Value::String(String::new())));
        }
        Ok(Value::String(render(value, self.pretty)))
    }
}

/// String form of `value`. With `pretty`, nested tags are indented four
/// spaces per level.
pub fn render(value: &Value, pretty: bool) -> String {
    let mut renderer = Renderer {
        out: String::new(),
        pretty,
        depth: 0,
        after_close: false,
    };
    renderer.value(value);
    renderer.out
}

struct Renderer {
    out: String,
    pretty: bool,
    depth: usize,
    after_close: bool,
}

impl Renderer {
    fn value(&mut self, value: &Value) {
        match value {
            Value::Array(array) => {
                let (element, items) = {
                    let array = array.read();
                    (array.element().to_string(), array.items().to_vec())
                };
                self.sequence("array", element, &items, value, "(this array)");
            }
            Value::Collection(collection) => {
                let (kind, items) = {
                    let collection = collection.read();
                    (collection.kind().name().to_string(), collection.items().to_vec())
                };
                self.sequence("collection", kind, &items, value, "(this collection)");
            }
            Value::Map(map) => {
                let (kind, entries) = {
                    let map = map.read();
                    (map.kind().name(), map.snapshot())
                };
                self.open(
                    "map",
                    &[("class", kind.to_string()), ("length", entries.len().to_string())],
                );
                for (index, (k, v)) in entries.iter().enumerate() {
                    self.open("entry", &[("index", (index + 1).to_string())]);
                    self.open("key", &[("class", k.type_name())]);
                    self.nested(k, value, "(this map)");
                    self.close("key");
                    self.open("value", &[("class", v.type_name())]);
                    self.nested(v, value, "(this map)");
                    self.close("value");
                    self.close("entry");
                }
                self.close("map");
            }
            Value::Record(record) => {
                let (name, fields) = {
                    let record = record.read();
                    let fields: Vec<(String, Value)> = record
                        .fields()
                        .map(|(k, v)| (k.to_string(), v.clone()))
                        .collect();
                    (record.record_type().name().to_string(), fields)
                };
                self.properties("record", name, &fields, value, "(this record)");
            }
            Value::Dynamic(object) => {
                let (name, properties) = {
                    let object = object.read();
                    let properties: Vec<(String, Value)> = object
                        .properties()
                        .map(|(k, v)| (k.to_string(), v.clone()))
                        .collect();
                    (object.dynamic_type().name().to_string(), properties)
                };
                self.properties("dynamic", name, &properties, value, "(this dynamic)");
            }
            scalar => {
                let text = scalar_text(scalar);
                self.out.push_str(&text);
            }
        }
    }

    fn sequence(
        &mut self,
        tag: &str,
        class: String,
        items: &[Value],
        container: &Value,
        placeholder: &str,
    ) {
        self.open(tag, &[("class", class), ("length", items.len().to_string())]);
        for (index, item) in items.iter().enumerate() {
            self.open(
                "item",
                &[("index", (index + 1).to_string()), ("class", item.type_name())],
            );
            self.nested(item, container, placeholder);
            self.close("item");
        }
        self.close(tag);
    }

    fn properties(
        &mut self,
        tag: &str,
        class: String,
        properties: &[(String, Value)],
        container: &Value,
        placeholder: &str,
    ) {
        self.open(tag, &[("class", class)]);
        for (name, v) in properties {
            self.open("property", &[("name", name.clone()), ("class", v.type_name())]);
            self.nested(v, container, placeholder);
            self.close("property");
        }
        self.close(tag);
    }

    fn nested(&mut self, item: &Value, container: &Value, placeholder: &str) {
        if item.same_instance(container) {
            self.out.push_str(placeholder);
        } else {
            self.value(item);
        }
    }

    fn open(&mut self, tag: &str, attributes: &[(&str, String)]) {
        self.line_break();
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attributes {
            self.out.push_str(&format!(" {name}='{value}'"));
        }
        self.out.push('>');
        self.depth += 1;
        self.after_close = false;
    }

    fn close(&mut self, tag: &str) {
        self.depth = self.depth.saturating_sub(1);
        if self.after_close {
            self.line_break();
        }
        self.out.push_str(&format!("</{tag}>"));
        self.after_close = true;
    }

    fn line_break(&mut self) {
        if self.pretty && !self.out.is_empty() {
            self.out.push('\n');
            self.out.push_str(&INDENT.repeat(self.depth));
        }
    }
}

/// Plain text of a non-composite value. Nil is empty.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Byte(n) => n.to_string(),
        Value::Short(n) => n.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Long(n) => n.to_string(),
        Value::Float(n) => format!("{n:?}"),
        Value::Double(n) => format!("{n:?}"),
        Value::Char(c) => c.to_string(),
        Value::BigInt(n) => n.to_string(),
        Value::BigDecimal(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Bytes(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        Value::Date(d) => format_date(d),
        Value::Opaque(o) => format!("{o:?}"),
        composite => composite.type_name(),
    }
}
