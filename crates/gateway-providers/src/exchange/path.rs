//! Dotted JSON paths (`output.images.0.url`).
//!
//! Numeric segments index into arrays; every other segment is an object key.
//! An empty path addresses the root value.

use gateway_core::{GatewayError, GatewayResult};
use serde_json::{Map, Value};

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|segment| !segment.is_empty())
}

/// Value at `path`, if present
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Set `path` to `new_value`, creating intermediate containers as needed.
///
/// A missing container addressed by a numeric segment becomes an array padded
/// with nulls; any other missing container becomes an object.
///
/// # Errors
/// Returns a transformer error when a segment runs into a scalar, or a
/// non-numeric segment addresses an array
pub fn set_path(target: &mut Value, path: &str, new_value: Value) -> GatewayResult<()> {
    let parts: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = parts.split_last() else {
        *target = new_value;
        return Ok(());
    };

    let mut current = target;
    for segment in parents {
        if current.is_null() {
            *current = empty_container(segment);
        }
        current = match current {
            Value::Object(map) => map.entry((*segment).to_string()).or_insert(Value::Null),
            Value::Array(items) => {
                let index = array_index(path, segment)?;
                if index >= items.len() {
                    items.resize(index + 1, Value::Null);
                }
                &mut items[index]
            }
            _ => return Err(not_a_container(path, segment)),
        };
    }

    if current.is_null() {
        *current = empty_container(last);
    }
    match current {
        Value::Object(map) => {
            map.insert((*last).to_string(), new_value);
        }
        Value::Array(items) => {
            let index = array_index(path, last)?;
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            items[index] = new_value;
        }
        _ => return Err(not_a_container(path, last)),
    }
    Ok(())
}

/// Remove and return the value at `path`
pub fn remove_path(target: &mut Value, path: &str) -> Option<Value> {
    let parts: Vec<&str> = segments(path).collect();
    let (last, parents) = parts.split_last()?;

    let mut current = target;
    for segment in parents {
        current = match current {
            Value::Object(map) => map.get_mut(*segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    match current {
        Value::Object(map) => map.remove(*last),
        _ => None,
    }
}

fn empty_container(segment: &str) -> Value {
    if segment.parse::<usize>().is_ok() {
        Value::Array(Vec::new())
    } else {
        Value::Object(Map::new())
    }
}

fn array_index(path: &str, segment: &str) -> GatewayResult<usize> {
    segment.parse().map_err(|_| {
        GatewayError::transformer(format!(
            "path '{path}': segment '{segment}' addresses an array but is not an index"
        ))
    })
}

fn not_a_container(path: &str, segment: &str) -> GatewayError {
    GatewayError::transformer(format!(
        "path '{path}': cannot descend into '{segment}', parent is not an object or array"
    ))
}
