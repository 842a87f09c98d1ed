//! JSON bridging for the boundary lattice.
//!
//! Agent hosts usually speak JSON at their tool-call layer; these
//! conversions move payloads between `serde_json::Value` and the sandbox
//! lattice. JSON objects become maps with string keys; lattice maps with
//! non-string keys are keyed by their display rendering on the way out.

use scriptbox_core::Value;

/// Lattice → JSON.
///
/// Byte strings that are not valid UTF-8 are replaced lossily; non-finite
/// floats become `null` (JSON has no representation for them).
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Nil => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(bytes) => serde_json::Value::String(String::from_utf8_lossy(bytes).into_owned()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Map(entries) => {
            let mut object = serde_json::Map::with_capacity(entries.len());
            for (k, v) in entries {
                let key = match k.as_str() {
                    Some(s) => s.to_string(),
                    None => k.to_string(),
                };
                object.insert(key, value_to_json(v));
            }
            serde_json::Value::Object(object)
        }
    }
}

/// JSON → lattice. Integral numbers become `Int`, everything else `Float`.
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::str(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(json_to_value).collect()),
        serde_json::Value::Object(object) => Value::Map(
            object
                .iter()
                .map(|(k, v)| (Value::str(k.clone()), json_to_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_to_value_scalars() {
        assert_eq!(json_to_value(&json!(null)), Value::Nil);
        assert_eq!(json_to_value(&json!(true)), Value::Bool(true));
        assert_eq!(json_to_value(&json!(7)), Value::Int(7));
        assert_eq!(json_to_value(&json!(0.5)), Value::Float(0.5));
        assert_eq!(json_to_value(&json!("s")), Value::str("s"));
    }

    #[test]
    fn test_value_to_json_scalars() {
        assert_eq!(value_to_json(&Value::Nil), json!(null));
        assert_eq!(value_to_json(&Value::Int(7)), json!(7));
        assert_eq!(value_to_json(&Value::Float(0.5)), json!(0.5));
        assert_eq!(value_to_json(&Value::str("s")), json!("s"));
    }

    #[test]
    fn test_non_finite_floats_become_null() {
        assert_eq!(value_to_json(&Value::Float(f64::NAN)), json!(null));
        assert_eq!(value_to_json(&Value::Float(f64::INFINITY)), json!(null));
    }

    #[test]
    fn test_roundtrip_nested() {
        let json = json!({
            "name": "agent",
            "steps": [1, 2, 3],
            "done": false,
            "meta": {"depth": 2}
        });
        let value = json_to_value(&json);
        assert_eq!(value_to_json(&value), json);
    }

    #[test]
    fn test_object_preserves_entry_shape() {
        let value = json_to_value(&json!({"k": [null, 1.5]}));
        assert_eq!(
            value,
            Value::Map(vec![(
                Value::str("k"),
                Value::List(vec![Value::Nil, Value::Float(1.5)])
            )])
        );
    }

    #[test]
    fn test_non_string_map_keys_rendered() {
        let value = Value::Map(vec![(Value::Int(3), Value::Bool(true))]);
        assert_eq!(value_to_json(&value), json!({"3": true}));
    }

    #[test]
    fn test_lossy_string_bytes() {
        let value = Value::bytes(vec![0xff]);
        assert_eq!(value_to_json(&value), json!("\u{fffd}"));
    }
}
