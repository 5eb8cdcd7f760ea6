// Settings expression DSL - Type Definitions
//
// JSON expression format for filters, tax formulas and subaccount mappings.
// All types deserialize safely from settings files and are validated against
// a field schema before any step runs.

use serde::{Deserialize, Serialize};

// ============================================================================
// EXPRESSIONS
// ============================================================================

/// Boolean expression
///
/// Used for building eligibility ("sending") and candidate eligibility
/// ("receiving") filters. Evaluates to true or false for one row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Expression {
    // Comparison operators
    /// Equal (with epsilon tolerance for floats)
    #[serde(rename = "==")]
    Equal { left: Value, right: Value },

    /// Not equal
    #[serde(rename = "!=")]
    NotEqual { left: Value, right: Value },

    /// Less than
    #[serde(rename = "<")]
    LessThan { left: Value, right: Value },

    /// Less than or equal
    #[serde(rename = "<=")]
    LessOrEqual { left: Value, right: Value },

    /// Greater than
    #[serde(rename = ">")]
    GreaterThan { left: Value, right: Value },

    /// Greater than or equal
    #[serde(rename = ">=")]
    GreaterOrEqual { left: Value, right: Value },

    // Membership
    /// Field value is one of a fixed set
    ///
    /// Works on categorical fields (string values) and numeric fields
    /// (number values), e.g. `{"op": "in", "field": "juris", "values": ["Oakland"]}`.
    #[serde(rename = "in")]
    In {
        field: String,
        values: Vec<serde_json::Value>,
    },

    // Logical operators
    /// Logical AND (short-circuit evaluation)
    #[serde(rename = "and")]
    And { conditions: Vec<Expression> },

    /// Logical OR (short-circuit evaluation)
    #[serde(rename = "or")]
    Or { conditions: Vec<Expression> },

    /// Logical NOT
    #[serde(rename = "not")]
    Not { condition: Box<Expression> },
}

// ============================================================================
// VALUES
// ============================================================================

/// A numeric value in an expression
///
/// Can be a field reference, parameter, literal, or computed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Reference to a numeric column of the row
    /// Examples: "residential_units", "assessed_value", "max_profit"
    Field { field: String },

    /// Reference to a named settings parameter
    /// Examples: "tax_rate", "min_units"
    Param { param: String },

    /// Literal value (number or boolean)
    Literal { value: serde_json::Value },

    /// Computed value (arithmetic expression)
    Compute { compute: Box<Computation> },
}

impl Value {
    pub fn field(name: impl Into<String>) -> Self {
        Value::Field { field: name.into() }
    }

    pub fn param(name: impl Into<String>) -> Self {
        Value::Param { param: name.into() }
    }

    pub fn number(value: f64) -> Self {
        Value::Literal {
            value: serde_json::json!(value),
        }
    }

    pub fn compute(computation: Computation) -> Self {
        Value::Compute {
            compute: Box::new(computation),
        }
    }
}

// ============================================================================
// COMPUTATIONS
// ============================================================================

/// Arithmetic over row columns and parameters
///
/// Tax formulas are usually a single `*` of a value column by a rate
/// parameter; `min`/`max` cap or floor a tax, `floor` truncates unit counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum Computation {
    #[serde(rename = "+")]
    Add { left: Value, right: Value },

    #[serde(rename = "-")]
    Subtract { left: Value, right: Value },

    #[serde(rename = "*")]
    Multiply { left: Value, right: Value },

    /// Fails at evaluation when the divisor is zero
    #[serde(rename = "/")]
    Divide { left: Value, right: Value },

    /// Largest of a non-empty list
    #[serde(rename = "max")]
    Max { values: Vec<Value> },

    /// Smallest of a non-empty list
    #[serde(rename = "min")]
    Min { values: Vec<Value> },

    #[serde(rename = "floor")]
    Floor { value: Value },
}

// ============================================================================
// SUBACCOUNT MAPPING
// ============================================================================

/// Maps a row to the subaccount it pays into or draws from
///
/// `{"field": "juris"}` uses the row's jurisdiction; `{"field": "regional"}`
/// or `{"value": "1"}` sends everything to the regional placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubaccountDef {
    /// Use the value of a categorical or numeric column
    Field { field: String },

    /// Use a fixed subaccount id
    Literal { value: serde_json::Value },
}
