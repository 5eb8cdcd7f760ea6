// Settings expression DSL - Interpreter
//
// Evaluates values, computations, boolean expressions and subaccount
// mappings against one row's evaluation context.

use crate::expr::context::{ContextError, EvalContext};
use crate::expr::types::{Computation, Expression, SubaccountDef, Value};
use crate::models::SubaccountId;
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during expression evaluation
#[derive(Debug, Error, PartialEq)]
pub enum EvalError {
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Field '{0}' is categorical; expected a number")]
    NonNumericField(String),

    #[error("Parameter not found: {0}")]
    ParameterNotFound(String),

    #[error("Division by zero in computation")]
    DivisionByZero,

    #[error("Invalid literal type: expected number")]
    InvalidLiteralType,

    #[error("Empty value list for min/max computation")]
    EmptyValueList,

    #[error("Invalid subaccount key: {0}")]
    InvalidSubaccountKey(String),

    #[error("Context error: {0}")]
    ContextError(#[from] ContextError),
}

/// Epsilon for floating point equality comparison
const FLOAT_EPSILON: f64 = 1e-9;

// ============================================================================
// VALUE EVALUATION
// ============================================================================

/// Evaluate a value to a numeric result
///
/// Resolves field references, parameter references, literals, and computations.
///
/// # Example
///
/// ```rust
/// use urban_subsidy_core::expr::{evaluate_value, EvalContext, Value};
/// use std::collections::HashMap;
///
/// let context = EvalContext::new().with_number("assessed_value", 400_000.0);
/// let params = HashMap::new();
///
/// let value = Value::field("assessed_value");
/// assert_eq!(evaluate_value(&value, &context, &params).unwrap(), 400_000.0);
/// ```
pub fn evaluate_value(
    value: &Value,
    context: &EvalContext,
    params: &HashMap<String, f64>,
) -> Result<f64, EvalError> {
    match value {
        Value::Field { field } => context.get_field(field).map_err(|err| match err {
            ContextError::NotNumeric(name) => EvalError::NonNumericField(name),
            ContextError::FieldNotFound(name) => EvalError::FieldNotFound(name),
        }),

        Value::Param { param } => params
            .get(param)
            .copied()
            .ok_or_else(|| EvalError::ParameterNotFound(param.clone())),

        Value::Literal { value: json_value } => literal_to_number(json_value),

        Value::Compute { compute } => evaluate_computation(compute, context, params),
    }
}

fn literal_to_number(json_value: &serde_json::Value) -> Result<f64, EvalError> {
    if let Some(num) = json_value.as_f64() {
        Ok(num)
    } else if let Some(bool_val) = json_value.as_bool() {
        Ok(if bool_val { 1.0 } else { 0.0 })
    } else {
        Err(EvalError::InvalidLiteralType)
    }
}

// ============================================================================
// COMPUTATION EVALUATION
// ============================================================================

/// Evaluate an arithmetic computation
pub fn evaluate_computation(
    computation: &Computation,
    context: &EvalContext,
    params: &HashMap<String, f64>,
) -> Result<f64, EvalError> {
    let eval = |value: &Value| evaluate_value(value, context, params);

    match computation {
        Computation::Add { left, right } => Ok(eval(left)? + eval(right)?),

        Computation::Subtract { left, right } => Ok(eval(left)? - eval(right)?),

        Computation::Multiply { left, right } => Ok(eval(left)? * eval(right)?),

        Computation::Divide { left, right } => {
            let left_val = eval(left)?;
            let right_val = eval(right)?;

            if right_val.abs() < f64::EPSILON {
                return Err(EvalError::DivisionByZero);
            }

            Ok(left_val / right_val)
        }

        Computation::Max { values } => {
            if values.is_empty() {
                return Err(EvalError::EmptyValueList);
            }

            let mut max_val = f64::NEG_INFINITY;
            for value in values {
                max_val = max_val.max(eval(value)?);
            }
            Ok(max_val)
        }

        Computation::Min { values } => {
            if values.is_empty() {
                return Err(EvalError::EmptyValueList);
            }

            let mut min_val = f64::INFINITY;
            for value in values {
                min_val = min_val.min(eval(value)?);
            }
            Ok(min_val)
        }

        Computation::Floor { value } => Ok(eval(value)?.floor()),
    }
}

// ============================================================================
// EXPRESSION EVALUATION
// ============================================================================

/// Evaluate a boolean expression
///
/// # Example
///
/// ```rust
/// use urban_subsidy_core::expr::{evaluate_expression, EvalContext, Expression, Value};
/// use std::collections::HashMap;
///
/// let context = EvalContext::new().with_number("residential_units", 40.0);
/// let params = HashMap::new();
///
/// let expr = Expression::GreaterThan {
///     left: Value::field("residential_units"),
///     right: Value::number(10.0),
/// };
/// assert!(evaluate_expression(&expr, &context, &params).unwrap());
/// ```
pub fn evaluate_expression(
    expr: &Expression,
    context: &EvalContext,
    params: &HashMap<String, f64>,
) -> Result<bool, EvalError> {
    let compare = |left: &Value, right: &Value| -> Result<(f64, f64), EvalError> {
        Ok((
            evaluate_value(left, context, params)?,
            evaluate_value(right, context, params)?,
        ))
    };

    match expr {
        Expression::Equal { left, right } => {
            let (l, r) = compare(left, right)?;
            Ok((l - r).abs() < FLOAT_EPSILON)
        }

        Expression::NotEqual { left, right } => {
            let (l, r) = compare(left, right)?;
            Ok((l - r).abs() >= FLOAT_EPSILON)
        }

        Expression::LessThan { left, right } => {
            let (l, r) = compare(left, right)?;
            Ok(l < r)
        }

        Expression::LessOrEqual { left, right } => {
            let (l, r) = compare(left, right)?;
            Ok(l <= r || (l - r).abs() < FLOAT_EPSILON)
        }

        Expression::GreaterThan { left, right } => {
            let (l, r) = compare(left, right)?;
            Ok(l > r)
        }

        Expression::GreaterOrEqual { left, right } => {
            let (l, r) = compare(left, right)?;
            Ok(l >= r || (l - r).abs() < FLOAT_EPSILON)
        }

        Expression::In { field, values } => evaluate_membership(field, values, context),

        Expression::And { conditions } => {
            for condition in conditions {
                if !evaluate_expression(condition, context, params)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }

        Expression::Or { conditions } => {
            for condition in conditions {
                if evaluate_expression(condition, context, params)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }

        Expression::Not { condition } => Ok(!evaluate_expression(condition, context, params)?),
    }
}

/// Categorical fields match string values; numeric fields match numbers
fn evaluate_membership(
    field: &str,
    values: &[serde_json::Value],
    context: &EvalContext,
) -> Result<bool, EvalError> {
    if context.is_categorical(field) {
        let actual = context.get_category(field)?;
        return Ok(values.iter().any(|v| v.as_str() == Some(actual)));
    }

    let actual = context
        .get_field(field)
        .map_err(|_| EvalError::FieldNotFound(field.to_string()))?;
    Ok(values
        .iter()
        .filter_map(serde_json::Value::as_f64)
        .any(|v| (v - actual).abs() < FLOAT_EPSILON))
}

// ============================================================================
// SUBACCOUNT MAPPING
// ============================================================================

/// Resolve the subaccount a row belongs to
///
/// Categorical columns are used verbatim. Integral numbers render without a
/// decimal point, so a `regional` column of 1 maps to subaccount `"1"`.
///
/// # Example
///
/// ```rust
/// use urban_subsidy_core::expr::{resolve_subaccount, EvalContext, SubaccountDef};
///
/// let context = EvalContext::new()
///     .with_category("juris", "Oakland")
///     .with_number("regional", 1.0);
///
/// let by_juris = SubaccountDef::Field { field: "juris".to_string() };
/// assert_eq!(resolve_subaccount(&by_juris, &context).unwrap(), "Oakland");
///
/// let regional = SubaccountDef::Field { field: "regional".to_string() };
/// assert_eq!(resolve_subaccount(&regional, &context).unwrap(), "1");
/// ```
pub fn resolve_subaccount(
    def: &SubaccountDef,
    context: &EvalContext,
) -> Result<SubaccountId, EvalError> {
    match def {
        SubaccountDef::Field { field } => {
            if context.is_categorical(field) {
                let key = context.get_category(field)?;
                if key.is_empty() {
                    return Err(EvalError::InvalidSubaccountKey(format!(
                        "empty value in field '{}'",
                        field
                    )));
                }
                return Ok(key.to_string());
            }
            let value = context
                .get_field(field)
                .map_err(|_| EvalError::FieldNotFound(field.clone()))?;
            number_to_key(value)
        }

        SubaccountDef::Literal { value } => match value {
            serde_json::Value::String(key) if !key.is_empty() => Ok(key.clone()),
            serde_json::Value::Number(_) => number_to_key(literal_to_number(value)?),
            other => Err(EvalError::InvalidSubaccountKey(other.to_string())),
        },
    }
}

fn number_to_key(value: f64) -> Result<SubaccountId, EvalError> {
    if !value.is_finite() {
        return Err(EvalError::InvalidSubaccountKey(value.to_string()));
    }
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Ok((value as i64).to_string())
    } else {
        Ok(value.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
