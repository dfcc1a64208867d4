//! JSON pointer writes
//!
//! `serde_json` reads pointers natively; these helpers add creation of
//! missing intermediate objects and removal.

use serde_json::{Map, Value};

fn tokens(pointer: &str) -> Option<Vec<String>> {
    if pointer.is_empty() {
        return Some(Vec::new());
    }
    let rest = pointer.strip_prefix('/')?;
    Some(
        rest.split('/')
            .map(|t| t.replace("~1", "/").replace("~0", "~"))
            .collect(),
    )
}

/// Set the value at `pointer`, creating intermediate objects
///
/// Returns `false` without modifying anything when an intermediate node
/// exists but is not an object.
pub fn set_pointer(target: &mut Value, pointer: &str, value: Value) -> bool {
    let Some(tokens) = tokens(pointer) else {
        return false;
    };
    let Some((last, parents)) = tokens.split_last() else {
        *target = value;
        return true;
    };

    // Check first so a failed write leaves the target untouched.
    let mut cursor = &*target;
    for token in parents {
        match cursor {
            Value::Object(map) => match map.get(token) {
                Some(next) => cursor = next,
                None => break,
            },
            Value::Null => break,
            _ => return false,
        }
    }
    if !matches!(cursor, Value::Object(_) | Value::Null) {
        return false;
    }

    let mut node = target;
    for token in parents {
        if node.is_null() {
            *node = Value::Object(Map::new());
        }
        let Some(map) = node.as_object_mut() else {
            return false;
        };
        node = map
            .entry(token.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    if node.is_null() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            true
        }
        _ => false,
    }
}

/// Remove and return the value at `pointer`
pub fn take_pointer(target: &mut Value, pointer: &str) -> Option<Value> {
    let tokens = tokens(pointer)?;
    let (last, parents) = tokens.split_last()?;
    let mut node = target;
    for token in parents {
        node = node.as_object_mut()?.get_mut(token)?;
    }
    node.as_object_mut()?.remove(last)
}

/// Whether a non-null value exists at `pointer`
#[inline]
#[must_use]
pub fn has_value(target: &Value, pointer: &str) -> bool {
    target.pointer(pointer).is_some_and(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_creates_intermediate_objects() {
        let mut value = json!({});
        assert!(set_pointer(&mut value, "/colors/primary", json!("#123")));
        assert_eq!(value, json!({"colors": {"primary": "#123"}}));
    }

    #[test]
    fn set_refuses_to_descend_through_scalars() {
        let mut value = json!({"colors": "red"});
        assert!(!set_pointer(&mut value, "/colors/primary", json!("#123")));
        assert_eq!(value, json!({"colors": "red"}));
    }

    #[test]
    fn take_removes_nested_value() {
        let mut value = json!({"a": {"b": 1, "c": 2}});
        assert_eq!(take_pointer(&mut value, "/a/b"), Some(json!(1)));
        assert_eq!(value, json!({"a": {"c": 2}}));
        assert_eq!(take_pointer(&mut value, "/a/missing"), None);
    }

    #[test]
    fn escaped_tokens() {
        let mut value = json!({});
        set_pointer(&mut value, "/a~1b", json!(true));
        assert_eq!(value, json!({"a/b": true}));
        assert!(has_value(&value, "/a~1b"));
    }
}
