// Settings expression DSL - Validation
//
// Pre-run checks so configuration mistakes surface when settings are loaded:
// - Field references exist in the row schema, with the right kind
// - Parameter references exist in the settings parameters
// - No division by a literal zero
// - No empty min/max lists

use crate::expr::context::FieldSchema;
use crate::expr::types::{Computation, Expression, SubaccountDef, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Validation errors
///
/// Each error names the settings key it was found under.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{location}: field reference '{field}' not found in schema")]
    InvalidFieldReference { location: String, field: String },

    #[error("{location}: field '{field}' is categorical but is used as a number")]
    NonNumericFieldReference { location: String, field: String },

    #[error("{location}: parameter reference '{param}' not found in parameters")]
    InvalidParameterReference { location: String, param: String },

    #[error("{location}: division by literal zero")]
    DivisionByZeroRisk { location: String },

    #[error("{location}: empty value list for min/max computation")]
    EmptyValueList { location: String },

    #[error("{location}: literal must be a number or boolean")]
    InvalidLiteral { location: String },

    #[error("{location}: invalid subaccount key {key}")]
    InvalidSubaccountKey { location: String, key: String },

    #[error("{location}: {reason}")]
    InvalidSetting { location: String, reason: String },
}

/// Validation result
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate a boolean expression against a schema
///
/// Returns every problem found rather than stopping at the first.
///
/// # Example
///
/// ```rust
/// use urban_subsidy_core::expr::{validate_expression, Expression, FieldSchema, Value};
/// use std::collections::HashMap;
///
/// let schema = FieldSchema::new().with_numeric(["residential_units"]);
/// let expr = Expression::GreaterThan {
///     left: Value::field("residental_units"),
///     right: Value::number(0.0),
/// };
///
/// let errors = validate_expression(&expr, &schema, &HashMap::new(), "receiving_buildings_filter")
///     .unwrap_err();
/// assert_eq!(errors.len(), 1);
/// ```
pub fn validate_expression(
    expr: &Expression,
    schema: &FieldSchema,
    params: &HashMap<String, f64>,
    location: &str,
) -> ValidationResult {
    let mut errors = Vec::new();
    check_expression(expr, schema, params, location, &mut errors);
    into_result(errors)
}

/// Validate a numeric value (e.g. a tax formula) against a schema
pub fn validate_value(
    value: &Value,
    schema: &FieldSchema,
    params: &HashMap<String, f64>,
    location: &str,
) -> ValidationResult {
    let mut errors = Vec::new();
    check_value(value, schema, params, location, &mut errors);
    into_result(errors)
}

/// Validate a subaccount mapping against a schema
pub fn validate_subaccount_def(
    def: &SubaccountDef,
    schema: &FieldSchema,
    location: &str,
) -> ValidationResult {
    let mut errors = Vec::new();

    match def {
        SubaccountDef::Field { field } => {
            if !schema.contains(field) {
                errors.push(ValidationError::InvalidFieldReference {
                    location: location.to_string(),
                    field: field.clone(),
                });
            }
        }
        SubaccountDef::Literal { value } => {
            let valid = match value {
                serde_json::Value::String(key) => !key.is_empty(),
                serde_json::Value::Number(n) => n.as_f64().is_some_and(f64::is_finite),
                _ => false,
            };
            if !valid {
                errors.push(ValidationError::InvalidSubaccountKey {
                    location: location.to_string(),
                    key: value.to_string(),
                });
            }
        }
    }

    into_result(errors)
}

fn into_result(errors: Vec<ValidationError>) -> ValidationResult {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_expression(
    expr: &Expression,
    schema: &FieldSchema,
    params: &HashMap<String, f64>,
    location: &str,
    errors: &mut Vec<ValidationError>,
) {
    match expr {
        Expression::Equal { left, right }
        | Expression::NotEqual { left, right }
        | Expression::LessThan { left, right }
        | Expression::LessOrEqual { left, right }
        | Expression::GreaterThan { left, right }
        | Expression::GreaterOrEqual { left, right } => {
            check_value(left, schema, params, location, errors);
            check_value(right, schema, params, location, errors);
        }

        Expression::In { field, .. } => {
            if !schema.contains(field) {
                errors.push(ValidationError::InvalidFieldReference {
                    location: location.to_string(),
                    field: field.clone(),
                });
            }
        }

        Expression::And { conditions } | Expression::Or { conditions } => {
            for condition in conditions {
                check_expression(condition, schema, params, location, errors);
            }
        }

        Expression::Not { condition } => {
            check_expression(condition, schema, params, location, errors);
        }
    }
}

fn check_value(
    value: &Value,
    schema: &FieldSchema,
    params: &HashMap<String, f64>,
    location: &str,
    errors: &mut Vec<ValidationError>,
) {
    match value {
        Value::Field { field } => {
            if schema.has_numeric(field) {
                return;
            }
            let error = if schema.has_categorical(field) {
                ValidationError::NonNumericFieldReference {
                    location: location.to_string(),
                    field: field.clone(),
                }
            } else {
                ValidationError::InvalidFieldReference {
                    location: location.to_string(),
                    field: field.clone(),
                }
            };
            errors.push(error);
        }

        Value::Param { param } => {
            if !params.contains_key(param) {
                errors.push(ValidationError::InvalidParameterReference {
                    location: location.to_string(),
                    param: param.clone(),
                });
            }
        }

        Value::Literal { value } => {
            if value.as_f64().is_none() && value.as_bool().is_none() {
                errors.push(ValidationError::InvalidLiteral {
                    location: location.to_string(),
                });
            }
        }

        Value::Compute { compute } => check_computation(compute, schema, params, location, errors),
    }
}

fn check_computation(
    comp: &Computation,
    schema: &FieldSchema,
    params: &HashMap<String, f64>,
    location: &str,
    errors: &mut Vec<ValidationError>,
) {
    let check = |value: &Value, errors: &mut Vec<ValidationError>| {
        check_value(value, schema, params, location, errors)
    };

    match comp {
        Computation::Add { left, right }
        | Computation::Subtract { left, right }
        | Computation::Multiply { left, right } => {
            check(left, errors);
            check(right, errors);
        }

        Computation::Divide { left, right } => {
            check(left, errors);
            check(right, errors);
            if is_literal_zero(right) {
                errors.push(ValidationError::DivisionByZeroRisk {
                    location: location.to_string(),
                });
            }
        }

        Computation::Max { values } | Computation::Min { values } => {
            if values.is_empty() {
                errors.push(ValidationError::EmptyValueList {
                    location: location.to_string(),
                });
            }
            for value in values {
                check(value, errors);
            }
        }

        Computation::Floor { value } => check(value, errors),
    }
}

/// Check if a value is a literal zero
fn is_literal_zero(value: &Value) -> bool {
    match value {
        Value::Literal { value } => value.as_f64().is_some_and(|v| v == 0.0),
        _ => false,
    }
}
