//! Activity list entries
//!
//! Activities are exported with every attribute the API returns, so they stay
//! untyped JSON and are flattened into dotted column names.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::frame::Cell;

/// Flatten nested objects into `parent.child` keys. Arrays are kept as a
/// single JSON cell.
pub fn flatten_activity(activity: &Value) -> BTreeMap<String, Cell> {
    let mut out = BTreeMap::new();
    match activity {
        Value::Object(map) => flatten_into(&mut out, None, map),
        other => {
            out.insert("value".to_string(), other.clone());
        }
    }
    out
}

fn flatten_into(out: &mut BTreeMap<String, Cell>, prefix: Option<&str>, map: &Map<String, Value>) {
    for (key, value) in map {
        let column = match prefix {
            Some(p) => format!("{}.{}", p, key),
            None => key.clone(),
        };
        match value {
            Value::Object(inner) if !inner.is_empty() => flatten_into(out, Some(&column), inner),
            other => {
                out.insert(column, other.clone());
            }
        }
    }
}
