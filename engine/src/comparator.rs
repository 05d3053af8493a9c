//! Collection ordering.

use crate::Record;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::rc::Rc;

/// How a collection keeps its records ordered.
#[derive(Clone)]
pub enum Comparator {
    /// Ascending by the value of one attribute.
    Attribute(String),
    /// Ascending by a derived value.
    Key(Rc<dyn Fn(&Record) -> Value>),
    /// Full pairwise comparison.
    Compare(Rc<dyn Fn(&Record, &Record) -> Ordering>),
}

impl fmt::Debug for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparator::Attribute(attr) => f.debug_tuple("Attribute").field(attr).finish(),
            Comparator::Key(_) => f.write_str("Key(..)"),
            Comparator::Compare(_) => f.write_str("Compare(..)"),
        }
    }
}

impl Comparator {
    pub fn attribute(attr: impl Into<String>) -> Self {
        Comparator::Attribute(attr.into())
    }

    pub fn key(key: impl Fn(&Record) -> Value + 'static) -> Self {
        Comparator::Key(Rc::new(key))
    }

    pub fn compare(compare: impl Fn(&Record, &Record) -> Ordering + 'static) -> Self {
        Comparator::Compare(Rc::new(compare))
    }

    /// The attribute this comparator sorts on, when it sorts on exactly one.
    pub fn sort_attribute(&self) -> Option<&str> {
        match self {
            Comparator::Attribute(attr) => Some(attr),
            _ => None,
        }
    }

    /// Stable sort of `records`.
    pub fn sort(&self, records: &mut [Record]) {
        match self {
            Comparator::Attribute(attr) => {
                sort_by_key(records, |record| record.get(attr).unwrap_or(Value::Null))
            }
            Comparator::Key(key) => sort_by_key(records, |record| key(record)),
            Comparator::Compare(compare) => records.sort_by(|a, b| compare(a, b)),
        }
    }
}

fn sort_by_key(records: &mut [Record], key: impl Fn(&Record) -> Value) {
    let mut keyed: Vec<(Value, Record)> = records
        .iter()
        .map(|record| (key(record), record.clone()))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| compare_values(a, b));
    for (slot, (_, record)) in records.iter_mut().zip(keyed) {
        *slot = record;
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

/// Total order over attribute values.
///
/// Numbers compare numerically and strings lexically. Values of different
/// types are ranked by type, with `Null` (a missing value) last.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(x, y)| compare_values(x, y))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
