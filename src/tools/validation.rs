//! Validate tool-call arguments against a JSON-Schema subset before execution.
//!
//! Supported keywords: `type`, `required`, `properties`, `enum`, `items`,
//! `minimum`/`maximum` (inclusive), `minLength`/`maxLength` (inclusive,
//! counted in characters). Unknown keywords are ignored rather than rejected,
//! so tools may carry richer schemas for the provider's benefit.
//!
//! A property set to `null` is treated like an absent one, except that it too
//! fails `required` (null and absent both fail, for different reasons on the
//! wire but the same reason here).

use serde_json::Value;

/// One validation failure, attributed to a location in the argument object.
///
/// Paths use dotted property names and bracketed array indices (`config.value`,
/// `items[1]`). The root value has the empty path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Validate parsed tool arguments against a JSON Schema.
///
/// Collects every violation found (in schema-walk order) rather than stopping
/// at the first, so the model gets one complete correction hint.
pub fn validate_arguments(args: &Value, schema: &Value) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_value(args, schema, "", &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_value(value: &Value, schema: &Value, path: &str, errors: &mut Vec<ValidationError>) {
    let Some(schema_obj) = schema.as_object() else {
        return;
    };

    if let Some(expected) = schema_obj.get("type").and_then(Value::as_str) {
        if !value_matches_type(value, expected) {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("expected type '{}', got {}", expected, json_type_name(value)),
            });
            // remaining keywords assume the declared shape
            return;
        }
    }

    if let Some(allowed) = schema_obj.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            errors.push(ValidationError {
                path: path.to_string(),
                message: format!("value {} is not one of the allowed values", value),
            });
        }
    }

    match value {
        Value::Object(obj) => {
            if let Some(required) = schema_obj.get("required").and_then(Value::as_array) {
                for name in required.iter().filter_map(Value::as_str) {
                    let satisfied = matches!(obj.get(name), Some(v) if !v.is_null());
                    if !satisfied {
                        errors.push(ValidationError {
                            path: join_path(path, name),
                            message: format!("missing required property '{name}'"),
                        });
                    }
                }
            }
            if let Some(properties) = schema_obj.get("properties").and_then(Value::as_object) {
                for (name, prop_schema) in properties {
                    match obj.get(name) {
                        // null handled above by the required rule only
                        None | Some(Value::Null) => {}
                        Some(prop_value) => {
                            check_value(prop_value, prop_schema, &join_path(path, name), errors);
                        }
                    }
                }
            }
        }
        Value::Array(items) => {
            if let Some(item_schema) = schema_obj.get("items") {
                for (index, item) in items.iter().enumerate() {
                    check_value(item, item_schema, &format!("{path}[{index}]"), errors);
                }
            }
        }
        Value::Number(_) => {
            let number = value.as_f64().unwrap_or(0.0);
            if let Some(minimum) = schema_obj.get("minimum").and_then(Value::as_f64) {
                if number < minimum {
                    errors.push(ValidationError {
                        path: path.to_string(),
                        message: format!("{number} is less than minimum {minimum}"),
                    });
                }
            }
            if let Some(maximum) = schema_obj.get("maximum").and_then(Value::as_f64) {
                if number > maximum {
                    errors.push(ValidationError {
                        path: path.to_string(),
                        message: format!("{number} is greater than maximum {maximum}"),
                    });
                }
            }
        }
        Value::String(text) => {
            let length = text.chars().count() as u64;
            if let Some(min_length) = schema_obj.get("minLength").and_then(Value::as_u64) {
                if length < min_length {
                    errors.push(ValidationError {
                        path: path.to_string(),
                        message: format!("length {length} is less than minLength {min_length}"),
                    });
                }
            }
            if let Some(max_length) = schema_obj.get("maxLength").and_then(Value::as_u64) {
                if length > max_length {
                    errors.push(ValidationError {
                        path: path.to_string(),
                        message: format!("length {length} is greater than maxLength {max_length}"),
                    });
                }
            }
        }
        _ => {}
    }
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}
