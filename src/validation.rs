//! Configuration validation against a [`Schema`].
//!
//! # Example
//!
//! ```
//! use ghostwriter_provider::schema::{Attribute, Schema, StringValidator};
//! use ghostwriter_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute(
//!         "name",
//!         Attribute::required_string().with_validator(StringValidator::length_between(1, 256)),
//!     )
//!     .with_attribute("project_id", Attribute::required_int64());
//!
//! let diagnostics = validate(&schema, &json!({"name": "op-1", "project_id": 3}));
//! assert!(diagnostics.is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"name": "", "project_id": "3"}));
//! assert_eq!(diagnostics.len(), 2);
//! ```

use crate::schema::{Attribute, AttributeType, Diagnostic, Schema};
use serde_json::{Map, Value};

/// Validate a configuration value against a schema.
///
/// Returns a list of diagnostics; an empty list means the value is valid.
///
/// # Validation Rules
///
/// - Required attributes must be present and non-null
/// - Computed-only attributes are skipped (the provider sets these)
/// - Attribute types must match the schema
/// - String validators run on configured values only, never on defaults
/// - Two conflicting attributes may not both be set to non-default values
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return diagnostics,
        _ => {
            diagnostics.push(
                Diagnostic::error("Expected object")
                    .with_detail(format!("Got {}", value_type_name(value))),
            );
            return diagnostics;
        },
    };

    for (name, attr) in &schema.attributes {
        validate_attribute(attr, obj.get(name), name, &mut diagnostics);
    }

    for (name, attr) in &schema.attributes {
        if let Some(other) = &attr.conflicts_with {
            check_conflict(schema, obj, name, attr, other, &mut diagnostics);
        }
    }

    diagnostics
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);

            // Validators only make sense once the type is right.
            if diagnostics.len() == before {
                if let Some(s) = v.as_str() {
                    for validator in &attr.validators {
                        if let Err(detail) = validator.check(s) {
                            diagnostics.push(
                                Diagnostic::error(format!(
                                    "Invalid value for attribute '{}'",
                                    path
                                ))
                                .with_detail(detail)
                                .with_attribute(path),
                            );
                        }
                    }
                }
            }
        },
    }
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) => {
            if let Some(arr) = value.as_array() {
                for (i, elem) in arr.iter().enumerate() {
                    let elem_path = format!("{}.{}", path, i);
                    validate_attribute_type(element_type, elem, &elem_path, diagnostics);
                }
            } else {
                diagnostics.push(type_error(path, "list", value));
            }
        },
    }
}

fn check_conflict(
    schema: &Schema,
    obj: &Map<String, Value>,
    name: &str,
    attr: &Attribute,
    other: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let other_attr = schema.attribute(other);
    let set_here = is_set(obj.get(name), attr.default.as_ref());
    let set_there = is_set(obj.get(other), other_attr.and_then(|a| a.default.as_ref()));

    if set_here && set_there {
        diagnostics.push(
            Diagnostic::error("Invalid Attribute Combination")
                .with_detail(format!(
                    "Attribute '{}' cannot be specified when '{}' is specified",
                    name, other
                ))
                .with_attribute(name),
        );
    }
}

/// A value counts as set when it is non-null and differs from the default.
fn is_set(value: Option<&Value>, default: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(v) => match (as_int64(v), default.and_then(as_int64)) {
            (Some(a), Some(b)) => a != b,
            _ => default != Some(v),
        },
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

/// Read an int64 the way validation accepts one: an integer, or a float with
/// no fractional part (`3.0`).
pub fn as_int64(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

fn is_int64(value: &Value) -> bool {
    as_int64(value).is_some()
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!(
            "Expected {}, got {}",
            expected,
            value_type_name(got)
        ))
        .with_attribute(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, AttributeFlags, StringValidator};
    use serde_json::json;

    fn server_link_schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "static_server_checkout_id",
                Attribute::defaulted_int64(0).conflicts_with("cloud_server_id"),
            )
            .with_attribute(
                "cloud_server_id",
                Attribute::defaulted_int64(0).conflicts_with("static_server_checkout_id"),
            )
    }

    #[test]
    fn test_validate_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "test"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("name".to_string()));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_validate_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("id", Attribute::computed_int64());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"id": "not checked"})).is_empty());
    }

    #[test]
    fn test_validate_int64() {
        let schema = Schema::v0().with_attribute("project_id", Attribute::required_int64());

        assert!(validate(&schema, &json!({"project_id": 42})).is_empty());
        assert!(validate(&schema, &json!({"project_id": 42.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"project_id": 42.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"project_id": "42"})).len(), 1);
    }

    #[test]
    fn test_validate_bool() {
        let schema = Schema::v0().with_attribute("auto_renew", Attribute::optional_bool());

        assert!(validate(&schema, &json!({"auto_renew": true})).is_empty());
        assert!(validate(&schema, &json!({})).is_empty());
        assert_eq!(validate(&schema, &json!({"auto_renew": "true"})).len(), 1);
    }

    #[test]
    fn test_validate_list() {
        let schema = Schema::v0().with_attribute(
            "aux_address",
            Attribute::new(
                AttributeType::list(AttributeType::String),
                AttributeFlags::optional_computed(),
            ),
        );

        assert!(validate(&schema, &json!({"aux_address": ["10.0.0.2"]})).is_empty());
        assert!(validate(&schema, &json!({"aux_address": []})).is_empty());

        let diagnostics = validate(&schema, &json!({"aux_address": ["10.0.0.2", 7]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("aux_address.1".to_string()));

        assert_eq!(validate(&schema, &json!({"aux_address": "10.0.0.2"})).len(), 1);
    }

    #[test]
    fn test_string_validators_apply_to_configured_values() {
        let schema = Schema::v0().with_attribute(
            "registrar",
            Attribute::defaulted_string("")
                .with_validator(StringValidator::length_between(0, 255))
                .with_validator(StringValidator::regex(
                    r"^[a-zA-Z0-9-]+$",
                    "Registrar must be alphanumeric with dashes",
                )),
        );

        assert!(validate(&schema, &json!({"registrar": "Namecheap"})).is_empty());
        // Defaults are never validated, even when they would fail a pattern.
        assert!(validate(&schema, &json!({})).is_empty());

        let diagnostics = validate(&schema, &json!({"registrar": "bad registrar!"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("registrar".to_string()));
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .unwrap_or_default()
            .contains("alphanumeric"));
    }

    #[test]
    fn test_validators_skipped_on_type_error() {
        let schema = Schema::v0().with_attribute(
            "name",
            Attribute::required_string().with_validator(StringValidator::length_between(1, 3)),
        );

        let diagnostics = validate(&schema, &json!({"name": 12345}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_conflicting_attributes() {
        let schema = server_link_schema();

        assert!(validate(&schema, &json!({"static_server_checkout_id": 4})).is_empty());
        assert!(validate(&schema, &json!({"cloud_server_id": 9})).is_empty());
        assert!(validate(
            &schema,
            &json!({"static_server_checkout_id": 4, "cloud_server_id": 0})
        )
        .is_empty());
        assert!(validate(
            &schema,
            &json!({"static_server_checkout_id": 0.0, "cloud_server_id": 9})
        )
        .is_empty());

        let diagnostics = validate(
            &schema,
            &json!({"static_server_checkout_id": 4, "cloud_server_id": 9}),
        );
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics
            .iter()
            .all(|d| d.summary == "Invalid Attribute Combination"));
    }

    #[test]
    fn test_validate_multiple_errors() {
        let schema = Schema::v0()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("project_id", Attribute::required_int64())
            .with_attribute("force_delete", Attribute::defaulted_bool(false));

        let diagnostics = validate(
            &schema,
            &json!({"name": 123, "project_id": "not a number", "force_delete": "yes"}),
        );
        assert_eq!(diagnostics.len(), 3);
    }

    #[test]
    fn test_validate_null_and_non_object_root() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &Value::Null).is_empty());

        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
    }

    #[test]
    fn test_as_int64_accepts_integral_floats() {
        assert_eq!(as_int64(&json!(12)), Some(12));
        assert_eq!(as_int64(&json!(12.0)), Some(12));
        assert_eq!(as_int64(&json!(-3.0)), Some(-3));
        assert_eq!(as_int64(&json!(12.5)), None);
        assert_eq!(as_int64(&json!("12")), None);
        assert_eq!(as_int64(&json!(1e300)), None);
    }
}
