use crate::convert::Number;
use crate::dynamic::ensure_supported;
use crate::error::AccessError;
use crate::shape::CollectionKind;
use crate::value::Value;
use std::cmp::Ordering;
use std::sync::Arc;

/// Custom ordering for one sort key.
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> Ordering + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum SortError {
    #[error("{0} cannot be sorted in place")]
    NotSortable(String),

    #[error("{fields} fields but {other} {what}")]
    LengthMismatch {
        fields: usize,
        other: usize,
        what: &'static str,
    },

    #[error("no natural order between {left} and {right}")]
    Incomparable { left: String, right: String },

    #[error(transparent)]
    Access(#[from] AccessError),
}

/// Sorts an array or list in place by one or more keys.
///
/// Each key is a field name (empty for the element itself), an optional
/// comparator and a reverse flag, all given positionally. Empty slices
/// stand for a single key: the element itself, natural order, reversed.
/// Keys are compared in order until one differs. Nil elements and nil key
/// values always go last: the reverse flag orders the non-nil values only,
/// so a descending sort does not move nils to the front. Ties keep their
/// original order.
pub fn sort(
    values: &Value,
    fields: &[&str],
    comparators: &[Option<Comparator>],
    reverse: &[bool],
) -> Result<(), SortError> {
    let keys = keys(fields, comparators, reverse)?;

    let items = match values {
        Value::Array(array) => array.read().items().to_vec(),
        Value::Collection(list) if list.read().kind() == CollectionKind::List => {
            list.read().items().to_vec()
        }
        other => return Err(SortError::NotSortable(other.type_name())),
    };

    // Key values are looked up once, before comparing.
    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        let key_values = keys
            .iter()
            .map(|key| key_value(&item, key.field))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push((item, key_values));
    }

    let mut failure = None;
    rows.sort_by(|(a, a_keys), (b, b_keys)| {
        if failure.is_some() {
            return Ordering::Equal;
        }
        match compare_rows(&keys, a, a_keys, b, b_keys) {
            Ok(ordering) => ordering,
            Err(e) => {
                failure = Some(e);
                Ordering::Equal
            }
        }
    });
    if let Some(e) = failure {
        return Err(e);
    }

    let sorted = rows.into_iter().map(|(item, _)| item).collect();
    match values {
        Value::Array(array) => {
            array.write().replace_items(sorted);
        }
        Value::Collection(list) => {
            list.write().replace_items(sorted);
        }
        _ => {}
    }
    Ok(())
}

struct SortKey<'a> {
    field: Option<&'a str>,
    comparator: Option<&'a Comparator>,
    reverse: bool,
}

fn keys<'a>(
    fields: &[&'a str],
    comparators: &'a [Option<Comparator>],
    reverse: &[bool],
) -> Result<Vec<SortKey<'a>>, SortError> {
    let fields: Vec<Option<&str>> = if fields.is_empty() {
        vec![None]
    } else {
        fields
            .iter()
            .copied()
            .map(|f| Some(f.trim()).filter(|f| !f.is_empty()))
            .collect()
    };
    let comparators: Vec<Option<&Comparator>> = if comparators.is_empty() {
        vec![None]
    } else {
        comparators.iter().map(Option::as_ref).collect()
    };
    let reverse = if reverse.is_empty() { &[true][..] } else { reverse };

    if comparators.len() != fields.len() {
        return Err(SortError::LengthMismatch {
            fields: fields.len(),
            other: comparators.len(),
            what: "comparators",
        });
    }
    if reverse.len() != fields.len() {
        return Err(SortError::LengthMismatch {
            fields: fields.len(),
            other: reverse.len(),
            what: "reverse flags",
        });
    }

    Ok(fields
        .into_iter()
        .zip(comparators)
        .zip(reverse)
        .map(|((field, comparator), reverse)| SortKey {
            field,
            comparator,
            reverse: *reverse,
        })
        .collect())
}

fn key_value(item: &Value, field: Option<&str>) -> Result<Value, SortError> {
    let Some(field) = field else {
        return Ok(item.clone());
    };
    Ok(match item {
        Value::Null => Value::Null,
        Value::Map(map) => map.read().get_str(field).cloned().unwrap_or_default(),
        Value::Record(record) => record.read().get(field)?.clone(),
        Value::Dynamic(object) => {
            ensure_supported()?;
            let object = object.read();
            match object.get(field) {
                Some(v) => v.clone(),
                None if object.dynamic_type().is_open() => Value::Null,
                None => {
                    return Err(AccessError::NoSuchProperty {
                        ty: object.dynamic_type().name().to_string(),
                        property: field.to_string(),
                    }
                    .into());
                }
            }
        }
        other => {
            return Err(AccessError::NoSuchField {
                record: other.type_name(),
                field: field.to_string(),
            }
            .into());
        }
    })
}

fn compare_rows(
    keys: &[SortKey<'_>],
    a: &Value,
    a_keys: &[Value],
    b: &Value,
    b_keys: &[Value],
) -> Result<Ordering, SortError> {
    if let Some(ordering) = nil_last(a, b) {
        return Ok(ordering);
    }
    for ((key, x), y) in keys.iter().zip(a_keys).zip(b_keys) {
        let ordering = match nil_last(x, y) {
            Some(ordering) => ordering,
            None => {
                let ordering = match key.comparator {
                    Some(comparator) => comparator(x, y),
                    None => natural_order(x, y)?,
                };
                if key.reverse {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
        };
        if ordering != Ordering::Equal {
            return Ok(ordering);
        }
    }
    Ok(Ordering::Equal)
}

fn nil_last(a: &Value, b: &Value) -> Option<Ordering> {
    match (a.is_null(), b.is_null()) {
        (true, true) => Some(Ordering::Equal),
        (true, false) => Some(Ordering::Greater),
        (false, true) => Some(Ordering::Less),
        (false, false) => None,
    }
}

/// Ordering of numbers, strings, chars, bools and dates.
///
/// Numbers of any kind compare with each other: as `double`, or exactly
/// when a big number meets an integer or another big number.
pub(crate) fn natural_order(a: &Value, b: &Value) -> Result<Ordering, SortError> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Char(x), Value::Char(y)) => Ok(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Ok(x.cmp(y)),
        _ => match (Number::of(a), Number::of(b)) {
            (Some(x), Some(y)) => Ok(compare_numbers(&x, &y)),
            _ => Err(SortError::Incomparable {
                left: a.type_name(),
                right: b.type_name(),
            }),
        },
    }
}

fn compare_numbers(x: &Number<'_>, y: &Number<'_>) -> Ordering {
    let exact = |n: &Number<'_>| !matches!(n, Number::Float(_));
    let big = |n: &Number<'_>| matches!(n, Number::Big(_) | Number::Decimal(_));
    if exact(x) && exact(y) && (big(x) || big(y)) {
        if let (Some(x), Some(y)) = (x.to_bigdecimal(), y.to_bigdecimal()) {
            return x.cmp(&y);
        }
    }
    x.to_f64().total_cmp(&y.to_f64())
}
