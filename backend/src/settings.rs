//! Subsidy settings
//!
//! Loaded once from a JSON settings document and immutable for the run.
//!
//! ```text
//! {
//!   "years_per_iter": 5,
//!   "acct_settings": {
//!     "sending_buildings_filter": {...expression...},
//!     "sending_buildings_tax": {...value...},
//!     "sending_buildings_subaccount_def": {"field": "juris"},
//!     "parameters": {"tax_rate": 0.01},
//!     "vmt_settings": {...program...},
//!     "obag_settings": {...program...}
//!   },
//!   "feasibility": {"only_built": true, ...},
//!   "residential_developer": {...passed to the developer model...}
//! }
//! ```
//!
//! `Settings::validate` checks every expression against the columns the
//! simulation tables actually carry, so a misspelled column fails at startup.

use crate::expr::{
    validate_expression, validate_subaccount_def, validate_value, EvalContext, Expression,
    FieldSchema, SubaccountDef, ValidationError, Value,
};
use crate::models::{Building, DevelopmentForm, FeasibilityTable, ParcelTable};
use crate::subsidy::allocator::CANDIDATE_NUMERIC_FIELDS;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or validating settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid settings ({} problem(s)): {}", .0.len(), join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn default_years_per_iter() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

fn default_fee_category_field() -> String {
    "vmt_res_cat".to_string()
}

/// Complete settings document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Account and program settings
    pub acct_settings: AcctSettings,

    /// Configuration handed to the feasibility model
    #[serde(default)]
    pub feasibility: FeasibilitySettings,

    /// Opaque keyword settings handed to the developer model
    #[serde(default)]
    pub residential_developer: serde_json::Map<String, serde_json::Value>,

    /// Calendar years represented by one simulation iteration
    #[serde(default = "default_years_per_iter")]
    pub years_per_iter: u32,
}

/// Property-tax collection settings plus the two subsidy programs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcctSettings {
    /// Which buildings pay property tax into the coffer
    pub sending_buildings_filter: Expression,

    /// Tax owed by one building
    pub sending_buildings_tax: Value,

    /// Subaccount a taxed building pays into
    pub sending_buildings_subaccount_def: SubaccountDef,

    /// Named constants referenced by the tax expressions
    #[serde(default)]
    pub parameters: HashMap<String, f64>,

    pub vmt_settings: ProgramSettings,

    pub obag_settings: ProgramSettings,
}

/// Settings for one subsidy program (VMT or OBAG)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSettings {
    /// Which candidates may receive a subsidy; absent admits all
    #[serde(default)]
    pub receiving_buildings_filter: Option<Expression>,

    /// Subaccount a candidate draws from
    pub sending_buildings_subaccount_def: SubaccountDef,

    /// Per-unit fee by category (VMT program)
    #[serde(default)]
    pub fee_amounts: BTreeMap<String, f64>,

    /// Column holding the fee category of a new building
    #[serde(default = "default_fee_category_field")]
    pub fee_category_field: String,

    /// Yearly lump-sum funding (OBAG program)
    #[serde(default)]
    pub total_amount: Option<f64>,

    /// Named constants referenced by the receiving filter
    #[serde(default)]
    pub parameters: HashMap<String, f64>,
}

/// Configuration for the feasibility model
///
/// Keys other than `forms_to_test` and `only_built` are kept verbatim for
/// the model implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilitySettings {
    /// Forms to evaluate; absent means every form the model supports
    #[serde(default)]
    pub forms_to_test: Option<Vec<DevelopmentForm>>,

    /// Keep only profitable rows
    #[serde(default = "default_true")]
    pub only_built: bool,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for FeasibilitySettings {
    fn default() -> Self {
        Self {
            forms_to_test: None,
            only_built: true,
            extra: serde_json::Map::new(),
        }
    }
}

/// Columns available to settings expressions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsSchema {
    /// Columns of a building joined with its parcel geography
    pub building_fields: FieldSchema,

    /// Columns of a subsidy candidate
    pub candidate_fields: FieldSchema,
}

impl SettingsSchema {
    /// Derive the schema from the simulation's tables
    ///
    /// `feasibility` may be a sample or empty; candidate columns always
    /// include the derived allocator columns and parcel geography.
    pub fn from_tables(
        buildings: &[Building],
        parcels: &ParcelTable,
        feasibility: &FeasibilityTable,
    ) -> Self {
        let building_contexts: Vec<EvalContext> = buildings
            .iter()
            .map(|b| EvalContext::for_building(b, parcels.get(b.parcel_id)))
            .collect();
        let building_fields = FieldSchema::union_of(&building_contexts);

        let mut candidate_fields = FieldSchema::new().with_numeric(CANDIDATE_NUMERIC_FIELDS);
        for parcel in parcels.iter() {
            candidate_fields.extend(&attribute_schema(&parcel.geography));
        }
        for row in feasibility.rows() {
            candidate_fields.extend(&attribute_schema(&row.attributes));
        }

        Self {
            building_fields,
            candidate_fields,
        }
    }
}

fn attribute_schema(attributes: &crate::models::Attributes) -> FieldSchema {
    FieldSchema::new()
        .with_numeric(attributes.numeric.keys().cloned())
        .with_categorical(attributes.categorical.keys().cloned())
}

impl Settings {
    /// Parse settings from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse settings from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    /// Check every expression and scalar against the table schema
    ///
    /// Returns all problems found in one error.
    pub fn validate(&self, schema: &SettingsSchema) -> Result<(), SettingsError> {
        let mut errors = Vec::new();
        let acct = &self.acct_settings;

        if self.years_per_iter == 0 {
            errors.push(ValidationError::InvalidSetting {
                location: "years_per_iter".to_string(),
                reason: "must be positive".to_string(),
            });
        }

        collect(
            &mut errors,
            validate_expression(
                &acct.sending_buildings_filter,
                &schema.building_fields,
                &acct.parameters,
                "acct_settings.sending_buildings_filter",
            ),
        );
        collect(
            &mut errors,
            validate_value(
                &acct.sending_buildings_tax,
                &schema.building_fields,
                &acct.parameters,
                "acct_settings.sending_buildings_tax",
            ),
        );
        collect(
            &mut errors,
            validate_subaccount_def(
                &acct.sending_buildings_subaccount_def,
                &schema.building_fields,
                "acct_settings.sending_buildings_subaccount_def",
            ),
        );

        for (name, program) in [
            ("vmt_settings", &acct.vmt_settings),
            ("obag_settings", &acct.obag_settings),
        ] {
            errors.extend(program.validate(name, &schema.candidate_fields));
        }

        match acct.obag_settings.total_amount {
            Some(amount) if amount.is_finite() => {}
            Some(_) => errors.push(ValidationError::InvalidSetting {
                location: "acct_settings.obag_settings.total_amount".to_string(),
                reason: "must be a finite number".to_string(),
            }),
            None => errors.push(ValidationError::InvalidSetting {
                location: "acct_settings.obag_settings.total_amount".to_string(),
                reason: "is required".to_string(),
            }),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SettingsError::Invalid(errors))
        }
    }
}

impl ProgramSettings {
    fn validate(&self, name: &str, candidate_fields: &FieldSchema) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if let Some(filter) = &self.receiving_buildings_filter {
            collect(
                &mut errors,
                validate_expression(
                    filter,
                    candidate_fields,
                    &self.parameters,
                    &format!("acct_settings.{}.receiving_buildings_filter", name),
                ),
            );
        }
        collect(
            &mut errors,
            validate_subaccount_def(
                &self.sending_buildings_subaccount_def,
                candidate_fields,
                &format!("acct_settings.{}.sending_buildings_subaccount_def", name),
            ),
        );

        for (category, fee) in &self.fee_amounts {
            if !fee.is_finite() {
                errors.push(ValidationError::InvalidSetting {
                    location: format!("acct_settings.{}.fee_amounts.{}", name, category),
                    reason: "must be a finite number".to_string(),
                });
            }
        }

        errors
    }
}

fn collect(errors: &mut Vec<ValidationError>, result: Result<(), Vec<ValidationError>>) {
    if let Err(found) = result {
        errors.extend(found);
    }
}
