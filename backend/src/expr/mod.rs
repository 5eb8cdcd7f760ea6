// Settings expression DSL
//
// Filters, tax formulas and subaccount mappings are written as JSON
// expression trees in the settings file instead of free-form formula strings:
// - Evaluated without any code execution
// - Validated against the row schema before the run starts
//
// Architecture:
// - types.rs: Expression, Value, Computation, SubaccountDef
// - context.rs: Per-row evaluation context and field schema
// - interpreter.rs: Evaluation of values, expressions and subaccount mappings
// - validation.rs: Schema, parameter and division-safety checks

pub mod context;
pub mod interpreter;
pub mod types;
pub mod validation;

pub use context::{ContextError, EvalContext, FieldSchema};
pub use interpreter::{
    evaluate_computation, evaluate_expression, evaluate_value, resolve_subaccount, EvalError,
};
pub use types::{Computation, Expression, SubaccountDef, Value};
pub use validation::{
    validate_expression, validate_subaccount_def, validate_value, ValidationError,
    ValidationResult,
};
