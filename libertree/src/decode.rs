//! JSON-shaped mapping to [`Group`].
//!
//! Objects and sequences of objects are groups, scalars are
//! attributes. JSON has no tuple type, so sequences of scalars
//! arrive as tuple attributes ([`AttrValue::List`]) and sequences
//! of scalar sequences as [`AttrValue::Table`]. Only sequences
//! holding a non-scalar member are read as group sequences.

use super::*;
use serde_json::{ Map, Value };

#[inline]
fn is_scalar(v: &Value) -> bool {
    matches!(v, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

#[inline]
fn decode_scalar(v: &Value) -> Option<AttrValue> {
    match v {
        Value::Bool(b) => Some(AttrValue::Bool(*b)),
        Value::Number(n) => Some(match n.as_i64() {
            Some(i) => AttrValue::Int(i),
            None => AttrValue::Float(n.as_f64().unwrap_or(f64::NAN))
        }),
        Value::String(s) => Some(AttrValue::Str(s.as_str().into())),
        _ => None
    }
}

#[inline]
fn decode_tuple(items: &[Value]) -> Option<AttrValue> {
    if items.iter().all(is_scalar) {
        return Some(AttrValue::List(
            items.iter().filter_map(decode_scalar).collect()));
    }
    let rows = items.iter().map(|row| match row {
        Value::Array(cols) if cols.iter().all(is_scalar) =>
            Some(cols.iter().filter_map(decode_scalar).collect()),
        _ => None
    }).collect::<Option<Vec<Vec<_>>>>()?;
    Some(AttrValue::Table(rows))
}

fn decode_object(map: &Map<String, Value>) -> Group {
    let mut group = Group::default();
    for (key, value) in map {
        match value {
            Value::Null => {},
            Value::Object(inner) => {
                group.push_group(key.as_str(), decode_object(inner));
            },
            Value::Array(items) if items.is_empty() => {
                group.groups.entry(key.as_str().into()).or_default();
            },
            Value::Array(items) => match decode_tuple(items) {
                Some(tuple) => if key != COMMENT_KEY {
                    group.set_attr(key.as_str(), tuple);
                },
                // non-object members become empty groups
                None => for item in items {
                    group.push_group(key.as_str(), decode(item));
                }
            },
            scalar => if key != COMMENT_KEY {
                if let Some(v) = decode_scalar(scalar) {
                    group.set_attr(key.as_str(), v);
                }
            }
        }
    }
    group
}

/// Decode a JSON document into a [`Group`].
/// Never fails: a malformed mapping gives a malformed tree.
pub fn decode(value: &Value) -> Group {
    match value {
        Value::Object(map) => decode_object(map),
        _ => Group::default()
    }
}
