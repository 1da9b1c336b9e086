//! Schema validation helpers.
//!
//! This module validates `serde_json::Value` configuration against a [`Schema`]
//! and reports problems as diagnostics pointing at the offending attribute.
//!
//! # Example
//!
//! ```
//! use jenkins_credential_provider::schema::{Schema, Attribute};
//! use jenkins_credential_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("name", Attribute::required_string())
//!     .with_attribute(
//!         "scope",
//!         Attribute::optional_string().with_allowed_values(["SYSTEM", "GLOBAL"]),
//!     );
//!
//! let diagnostics = validate(&schema, &json!({"name": "deploy-token", "scope": "GLOBAL"}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "deploy-token", "scope": "USER"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("scope".to_string()));
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use serde_json::Value;

/// Validate a JSON value against a schema.
///
/// Returns a list of diagnostics for any validation errors found.
/// An empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Optional attributes may be absent or null
/// - Computed attributes are skipped (provider sets these)
/// - Attribute types must match the schema
/// - String attributes with allowed values must use one of them
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        Value::Null => {
            // Nothing configured: only required attributes can fail
            for (name, attr) in sorted(schema) {
                validate_attribute(name, attr, None, &mut diagnostics);
            }
            return diagnostics;
        },
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in sorted(schema) {
        validate_attribute(name, attr, obj.get(name), &mut diagnostics);
    }
    diagnostics
}

// Deterministic diagnostic order regardless of map iteration order.
fn sorted(schema: &Schema) -> Vec<(&String, &Attribute)> {
    let mut attrs: Vec<_> = schema.attributes.iter().collect();
    attrs.sort_by(|a, b| a.0.cmp(b.0));
    attrs
}

fn validate_attribute(
    name: &str,
    attr: &Attribute,
    value: Option<&Value>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    // Skip computed-only attributes (provider sets these)
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", name))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(name),
                );
            }
        },
        Some(v) => {
            if !type_matches(attr.attr_type, v) {
                diagnostics.push(type_error(name, attr.attr_type, v));
                return;
            }
            if let Some(s) = v.as_str() {
                validate_allowed_value(name, attr, s, diagnostics);
            }
        },
    }
}

fn validate_allowed_value(
    name: &str,
    attr: &Attribute,
    value: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.allowed_values.is_empty() || attr.allowed_values.iter().any(|v| v == value) {
        return;
    }

    diagnostics.push(
        Diagnostic::error(format!("Invalid {}: {}", name, value))
            .with_detail(format!(
                "Supported values are: {}",
                attr.allowed_values.join(", ")
            ))
            .with_attribute(name),
    );
}

fn type_matches(attr_type: AttributeType, value: &Value) -> bool {
    match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Int64 => is_int64(value),
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) => {
            n.is_i64()
                || n.as_f64().is_some_and(|f| {
                    f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64
                })
        },
        _ => false,
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn type_error(name: &str, expected: AttributeType, got: &Value) -> Diagnostic {
    let expected = match expected {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
    };
    Diagnostic::error(format!("Invalid type for attribute '{}'", name))
        .with_detail(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        ))
        .with_attribute(name)
}
