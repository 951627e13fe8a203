//! Validation for the JSON Schema subset used by tool declarations.
//!
//! Supported keywords: `type` (a name or a list of names), `properties`,
//! `required`, `enum`, `items`, and `additionalProperties: false`.
//! Unknown keywords are ignored.

use serde_json::{Map, Value};

const KNOWN_TYPES: &[&str] = &[
    "object", "string", "number", "integer", "boolean", "array", "null",
];

/// Check that a declared input schema is usable: an object schema at the
/// root, known type names, and well-formed `properties`/`required`.
pub fn check_schema(schema: &Value) -> Result<(), String> {
    let obj = schema
        .as_object()
        .ok_or_else(|| "schema must be a JSON object".to_string())?;

    match obj.get("type") {
        Some(Value::String(t)) if t == "object" => {}
        Some(other) => return Err(format!("root type must be \"object\", got {other}")),
        None => return Err("root schema must declare \"type\": \"object\"".into()),
    }

    check_node(schema, "$")
}

fn check_node(schema: &Value, path: &str) -> Result<(), String> {
    let Some(obj) = schema.as_object() else {
        return Err(format!("{path}: schema must be a JSON object"));
    };

    if let Some(ty) = obj.get("type") {
        let names: Vec<&Value> = match ty {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for name in names {
            match name.as_str() {
                Some(n) if KNOWN_TYPES.contains(&n) => {}
                _ => return Err(format!("{path}: unsupported type {name}")),
            }
        }
    }

    if let Some(props) = obj.get("properties") {
        let props = props
            .as_object()
            .ok_or_else(|| format!("{path}: \"properties\" must be an object"))?;
        for (key, sub) in props {
            check_node(sub, &format!("{path}.{key}"))?;
        }
    }

    if let Some(required) = obj.get("required") {
        let ok = required
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string));
        if !ok {
            return Err(format!("{path}: \"required\" must be a list of names"));
        }
    }

    if let Some(items) = obj.get("items") {
        check_node(items, &format!("{path}[]"))?;
    }

    Ok(())
}

/// Validate tool arguments against a declared schema.
///
/// Returns the first mismatch found, described with a path such as
/// `$.expression`.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<(), String> {
    validate_node(schema, arguments, "$")
}

fn validate_node(schema: &Value, value: &Value, path: &str) -> Result<(), String> {
    let Some(obj) = schema.as_object() else {
        return Ok(());
    };

    if let Some(ty) = obj.get("type") {
        let allowed: Vec<&str> = match ty {
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            Value::String(name) => vec![name.as_str()],
            _ => Vec::new(),
        };
        if !allowed.is_empty() && !allowed.iter().any(|t| matches_type(t, value)) {
            return Err(format!(
                "{path}: expected {}, got {}",
                allowed.join(" or "),
                type_name(value)
            ));
        }
    }

    if let Some(Value::Array(options)) = obj.get("enum") {
        if !options.contains(value) {
            return Err(format!("{path}: {value} is not one of the allowed values"));
        }
    }

    if let Value::Object(map) = value {
        validate_object(obj, map, path)?;
    }

    if let (Some(items), Value::Array(elements)) = (obj.get("items"), value) {
        for (i, element) in elements.iter().enumerate() {
            validate_node(items, element, &format!("{path}[{i}]"))?;
        }
    }

    Ok(())
}

fn validate_object(
    schema: &Map<String, Value>,
    map: &Map<String, Value>,
    path: &str,
) -> Result<(), String> {
    if let Some(Value::Array(required)) = schema.get("required") {
        for name in required.iter().filter_map(Value::as_str) {
            if !map.contains_key(name) {
                return Err(format!("{path}: missing required property `{name}`"));
            }
        }
    }

    let props = schema.get("properties").and_then(Value::as_object);

    if let Some(props) = props {
        for (key, sub) in props {
            if let Some(v) = map.get(key) {
                validate_node(sub, v, &format!("{path}.{key}"))?;
            }
        }
    }

    if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
        for key in map.keys() {
            if !props.is_some_and(|p| p.contains_key(key)) {
                return Err(format!("{path}: unexpected property `{key}`"));
            }
        }
    }

    Ok(())
}

fn matches_type(name: &str, value: &Value) -> bool {
    match name {
        "object" => value.is_object(),
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => match value {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        },
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn calc_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "expression": {"type": "string"},
                "precision": {"type": "integer"},
                "mode": {"type": "string", "enum": ["exact", "approx"]}
            },
            "required": ["expression"],
            "additionalProperties": false
        })
    }

    #[test]
    fn accepts_valid_arguments() {
        let args = json!({"expression": "2+2", "precision": 2, "mode": "exact"});
        assert!(validate_arguments(&calc_schema(), &args).is_ok());
    }

    #[test]
    fn rejects_missing_required() {
        let err = validate_arguments(&calc_schema(), &json!({})).unwrap_err();
        assert!(err.contains("missing required property `expression`"), "{err}");
    }

    #[test]
    fn rejects_wrong_type() {
        let err = validate_arguments(&calc_schema(), &json!({"expression": 4})).unwrap_err();
        assert!(err.contains("$.expression"), "{err}");
        assert!(err.contains("expected string, got number"), "{err}");
    }

    #[test]
    fn integer_accepts_whole_floats_only() {
        let schema = calc_schema();
        assert!(validate_arguments(&schema, &json!({"expression": "1", "precision": 3.0})).is_ok());
        assert!(validate_arguments(&schema, &json!({"expression": "1", "precision": 3.5})).is_err());
    }

    #[test]
    fn rejects_value_outside_enum() {
        let err =
            validate_arguments(&calc_schema(), &json!({"expression": "1", "mode": "fuzzy"}))
                .unwrap_err();
        assert!(err.contains("$.mode"), "{err}");
    }

    #[test]
    fn rejects_additional_properties() {
        let err = validate_arguments(&calc_schema(), &json!({"expression": "1", "extra": true}))
            .unwrap_err();
        assert!(err.contains("unexpected property `extra`"), "{err}");
    }

    #[test]
    fn validates_array_items() {
        let schema = json!({
            "type": "object",
            "properties": {"values": {"type": "array", "items": {"type": "number"}}}
        });
        assert!(validate_arguments(&schema, &json!({"values": [1, 2.5]})).is_ok());
        let err = validate_arguments(&schema, &json!({"values": [1, "two"]})).unwrap_err();
        assert!(err.contains("$.values[1]"), "{err}");
    }

    #[test]
    fn type_list_allows_any_member() {
        let schema = json!({
            "type": "object",
            "properties": {"timezone": {"type": ["string", "null"]}}
        });
        assert!(validate_arguments(&schema, &json!({"timezone": null})).is_ok());
        assert!(validate_arguments(&schema, &json!({"timezone": "UTC"})).is_ok());
        assert!(validate_arguments(&schema, &json!({"timezone": 5})).is_err());
    }

    #[test]
    fn check_schema_requires_object_root() {
        assert!(check_schema(&calc_schema()).is_ok());
        assert!(check_schema(&json!({"type": "string"})).is_err());
        assert!(check_schema(&json!({"properties": {}})).is_err());
        assert!(check_schema(&json!("object")).is_err());
    }

    #[test]
    fn check_schema_rejects_unknown_types_and_bad_required() {
        let schema = json!({"type": "object", "properties": {"x": {"type": "decimal"}}});
        let err = check_schema(&schema).unwrap_err();
        assert!(err.contains("$.x"), "{err}");

        let schema = json!({"type": "object", "required": "x"});
        assert!(check_schema(&schema).is_err());
    }
}
