// ! Tool argument validation and coercion
// !
// ! Two phases run before any tool handler is invoked. Coercion widens
// ! supplied values toward the schema's declared parameter types (a numeric
// ! string becomes a number where an integer is expected) and fills defaults
// ! for missing arguments; it never fails, leaving uncoercible values in
// ! place. Validation then checks the coerced argument object against the
// ! tool's compiled input schema and reports structured violations.

use serde_json::{Map, Number, Value};
use std::collections::HashMap;

use crate::core::error::{McpError, McpResult};

/// One schema violation, pointer-addressed into the argument object
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaViolation {
    /// JSON pointer to the offending value, e.g. `/a`
    pub pointer: String,
    /// The violated schema keyword, e.g. `type` or `required`
    pub keyword: String,
    pub message: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pointer = if self.pointer.is_empty() {
            "/"
        } else {
            &self.pointer
        };
        write!(f, "{}: {}", pointer, self.message)
    }
}

/// Validate a coerced argument object against a compiled schema.
///
/// Returns all violations in schema-evaluation order; empty means valid.
pub fn validate_arguments(
    validator: &jsonschema::Validator,
    arguments: &Value,
) -> Vec<SchemaViolation> {
    validator
        .iter_errors(arguments)
        .map(|error| {
            let schema_path = error.schema_path.to_string();
            let keyword = schema_path.rsplit('/').next().unwrap_or("").to_string();
            SchemaViolation {
                pointer: error.instance_path.to_string(),
                keyword,
                message: error.to_string(),
            }
        })
        .collect()
}

/// Run both phases and produce the handler-ready argument map, or the
/// invalid-params error carrying the first violation.
pub fn prepare_arguments(
    tool_name: &str,
    validator: &jsonschema::Validator,
    schema: &Value,
    arguments: HashMap<String, Value>,
) -> McpResult<HashMap<String, Value>> {
    let coerced = coerce_arguments(schema, arguments);

    let as_value = Value::Object(coerced.clone().into_iter().collect::<Map<_, _>>());
    let violations = validate_arguments(validator, &as_value);
    if let Some(first) = violations.first() {
        return Err(McpError::invalid_params(format!(
            "tool '{tool_name}': {first}"
        )));
    }

    Ok(coerced)
}

/// Phase one: best-effort coercion of each argument toward its declared
/// property type, plus default filling for missing arguments.
pub fn coerce_arguments(
    schema: &Value,
    mut arguments: HashMap<String, Value>,
) -> HashMap<String, Value> {
    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return arguments;
    };

    for (name, property) in properties {
        match arguments.get(name) {
            Some(value) => {
                if let Some(coerced) = coerce_value(value, property) {
                    arguments.insert(name.clone(), coerced);
                }
            }
            None => {
                if let Some(fallback) = missing_value(property) {
                    arguments.insert(name.clone(), fallback);
                }
            }
        }
    }

    arguments
}

/// Value for a missing argument: the schema default, else null when the
/// declared type admits it. Required-but-absent arguments stay absent for
/// the validator to report.
fn missing_value(property: &Value) -> Option<Value> {
    if let Some(default) = property.get("default") {
        return Some(default.clone());
    }
    if type_admits_null(property) {
        return Some(Value::Null);
    }
    None
}

fn type_admits_null(property: &Value) -> bool {
    match property.get("type") {
        Some(Value::String(t)) => t == "null",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("null")),
        _ => false,
    }
}

/// Coerce one value toward its property schema. `None` means "leave as is".
fn coerce_value(value: &Value, property: &Value) -> Option<Value> {
    let declared = property.get("type").and_then(Value::as_str)?;
    match declared {
        "integer" => coerce_integer(value),
        "number" => coerce_number(value),
        "boolean" => coerce_boolean(value),
        "string" => coerce_string(value),
        // Arrays and objects are accepted only in their own shape; the
        // validator reports everything else.
        _ => None,
    }
}

/// int accepts: integers; integer-form strings (optional leading `-`);
/// whole-valued floats
fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                None // already an integer
            } else {
                let f = n.as_f64()?;
                (f.fract() == 0.0 && f.is_finite()).then(|| Value::from(f as i64))
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.parse::<i64>().ok().map(Value::from)
        }
        _ => None,
    }
}

/// float accepts: integers, floats, numeric strings
fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::String(s) => {
            let f = s.trim().parse::<f64>().ok()?;
            Number::from_f64(f).map(Value::Number)
        }
        _ => None, // numbers pass through untouched
    }
}

/// bool accepts: booleans; 0/1; "0"/"1"/"true"/"false" case-insensitive
fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// string accepts any scalar via string conversion; arrays/objects are left
/// for the validator to reject
fn coerce_string(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::String(b.to_string())),
        Value::Number(n) => Some(Value::String(n.to_string())),
        _ => None,
    }
}
