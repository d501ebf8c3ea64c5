//! Lightweight input validation against a tool's JSON schema
//!
//! Checks required fields and the types of declared properties. Unknown
//! fields pass through untouched - models often send extras and the
//! handlers ignore them.

use serde_json::Value;

/// Validate `args` against `schema`. Returns the offending field and reason
/// on failure.
pub fn validate(args: &Value, schema: &Value) -> Result<(), String> {
    let object = match args.as_object() {
        Some(o) => o,
        None => return Err("input must be a JSON object".to_string()),
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for field in required.iter().filter_map(Value::as_str) {
            match object.get(field) {
                None | Some(Value::Null) => {
                    return Err(format!("{} is required", field));
                }
                _ => {}
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (field, spec) in properties {
            let value = match object.get(field) {
                Some(v) if !v.is_null() => v,
                _ => continue,
            };
            let expected = spec.get("type").and_then(Value::as_str).unwrap_or("any");
            if !type_matches(value, expected) {
                return Err(format!("{} must be a {}", field, expected));
            }
            if let Some(allowed) = spec.get("enum").and_then(Value::as_array) {
                if !allowed.contains(value) {
                    return Err(format!("{} must be one of {}", field, Value::Array(allowed.clone())));
                }
            }
        }
    }

    Ok(())
}

fn type_matches(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "limit": { "type": "integer" },
                "mode": { "type": "string", "enum": ["a", "b"] }
            },
            "required": ["path"]
        })
    }

    #[test]
    fn missing_required_field() {
        let err = validate(&json!({}), &schema()).unwrap_err();
        assert_eq!(err, "path is required");
    }

    #[test]
    fn wrong_type() {
        let err = validate(&json!({ "path": 1 }), &schema()).unwrap_err();
        assert_eq!(err, "path must be a string");
        let err = validate(&json!({ "path": "x", "limit": "ten" }), &schema()).unwrap_err();
        assert_eq!(err, "limit must be a integer");
    }

    #[test]
    fn enum_constraint() {
        assert!(validate(&json!({ "path": "x", "mode": "a" }), &schema()).is_ok());
        assert!(validate(&json!({ "path": "x", "mode": "c" }), &schema()).is_err());
    }

    #[test]
    fn extras_and_nulls_pass() {
        assert!(validate(&json!({ "path": "x", "bonus": true, "limit": null }), &schema()).is_ok());
    }
}
