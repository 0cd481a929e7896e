//! Validation of tool arguments against a tool's JSON input schema.
//!
//! Covers the keywords tool servers use in practice: `type`, `enum`, `const`,
//! `properties`, `required`, `additionalProperties`, `items`,
//! `minimum`/`maximum` and `minLength`/`maxLength`. Unknown keywords are
//! ignored, so a schema this module does not understand accepts the input.

use serde_json::{Map, Value};
use std::fmt;

/// The first mismatch found between an input and its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Location of the offending value, e.g. `input.options.depth`.
    pub path: String,
    pub message: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl std::error::Error for SchemaViolation {}

/// Check `value` against `schema`.
pub fn validate(schema: &Value, value: &Value) -> Result<(), SchemaViolation> {
    check(schema, value, "input")
}

fn violation(path: &str, message: impl Into<String>) -> SchemaViolation {
    SchemaViolation {
        path: path.to_string(),
        message: message.into(),
    }
}

fn check(schema: &Value, value: &Value, path: &str) -> Result<(), SchemaViolation> {
    let rules = match schema {
        Value::Object(rules) => rules,
        Value::Bool(false) => return Err(violation(path, "no value is allowed here")),
        _ => return Ok(()),
    };

    if let Some(expected) = rules.get("type") {
        check_type(expected, value, path)?;
    }

    if let Some(Value::Array(allowed)) = rules.get("enum") {
        if !allowed.contains(value) {
            return Err(violation(
                path,
                format!("{value} is not one of {}", Value::Array(allowed.clone())),
            ));
        }
    }

    if let Some(expected) = rules.get("const") {
        if expected != value {
            return Err(violation(path, format!("expected {expected}, got {value}")));
        }
    }

    match value {
        Value::Object(fields) => check_object(rules, fields, path),
        Value::Array(items) => {
            if let Some(item_schema) = rules.get("items") {
                for (i, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{path}[{i}]"))?;
                }
            }
            Ok(())
        }
        Value::Number(n) => {
            let Some(n) = n.as_f64() else {
                return Ok(());
            };
            if let Some(min) = rules.get("minimum").and_then(Value::as_f64) {
                if n < min {
                    return Err(violation(path, format!("{n} is less than minimum {min}")));
                }
            }
            if let Some(max) = rules.get("maximum").and_then(Value::as_f64) {
                if n > max {
                    return Err(violation(path, format!("{n} is greater than maximum {max}")));
                }
            }
            Ok(())
        }
        Value::String(s) => {
            let len = s.chars().count() as u64;
            if let Some(min) = rules.get("minLength").and_then(Value::as_u64) {
                if len < min {
                    return Err(violation(path, format!("shorter than {min} characters")));
                }
            }
            if let Some(max) = rules.get("maxLength").and_then(Value::as_u64) {
                if len > max {
                    return Err(violation(path, format!("longer than {max} characters")));
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_type(expected: &Value, value: &Value, path: &str) -> Result<(), SchemaViolation> {
    let matches = match expected {
        Value::String(t) => type_matches(t, value),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| type_matches(t, value)),
        _ => true,
    };

    if matches {
        Ok(())
    } else {
        Err(violation(
            path,
            format!("expected {}, got {}", describe(expected), type_name(value)),
        ))
    }
}

fn check_object(
    rules: &Map<String, Value>,
    fields: &Map<String, Value>,
    path: &str,
) -> Result<(), SchemaViolation> {
    if let Some(Value::Array(required)) = rules.get("required") {
        for name in required.iter().filter_map(Value::as_str) {
            if !fields.contains_key(name) {
                return Err(violation(
                    path,
                    format!("missing required property '{name}'"),
                ));
            }
        }
    }

    let properties = rules.get("properties").and_then(Value::as_object);
    let additional = rules.get("additionalProperties");

    for (name, field) in fields {
        let field_path = format!("{path}.{name}");
        match properties.and_then(|p| p.get(name)) {
            Some(field_schema) => check(field_schema, field, &field_path)?,
            None => match additional {
                Some(Value::Bool(false)) => {
                    return Err(violation(path, format!("unexpected property '{name}'")));
                }
                Some(extra @ Value::Object(_)) => check(extra, field, &field_path)?,
                _ => {}
            },
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        "number" => value.is_number(),
        "integer" => match value {
            Value::Number(n) => {
                n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            _ => false,
        },
        _ => true,
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

fn describe(expected: &Value) -> String {
    match expected {
        Value::String(t) => t.clone(),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}
