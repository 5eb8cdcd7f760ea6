// Settings expression DSL - Evaluation Context
//
// Exposes the columns of one row (building or subsidy candidate) by name.
// Numeric columns feed arithmetic and comparisons; categorical columns feed
// membership tests and subaccount mappings.

use crate::models::{Attributes, Building, Parcel};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors that can occur during context lookup
#[derive(Debug, Error, PartialEq)]
pub enum ContextError {
    #[error("Field '{0}' not found in evaluation context")]
    FieldNotFound(String),

    #[error("Field '{0}' is categorical and cannot be used as a number")]
    NotNumeric(String),
}

/// Evaluation context for one row
///
/// Numeric fields are stored as f64 for uniform arithmetic; booleans and
/// counts are converted on insertion.
///
/// # Building fields
/// - building_id, parcel_id, residential_units, non_residential_sqft, year_built
/// - parcel_size, ave_sqft_per_unit, total_residential_units (from the parcel)
/// - regional (always 1, the regional subaccount key)
/// - every building attribute and parcel geography column
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    /// Numeric column name → value
    fields: HashMap<String, f64>,

    /// Categorical column name → value
    categories: HashMap<String, String>,
}

impl EvalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context for a building joined with its parcel's geography
    ///
    /// # Example
    ///
    /// ```rust
    /// use urban_subsidy_core::expr::EvalContext;
    /// use urban_subsidy_core::{Attributes, Building, Parcel};
    ///
    /// let building = Building {
    ///     building_id: 7,
    ///     parcel_id: 3,
    ///     residential_units: 12,
    ///     non_residential_sqft: 0.0,
    ///     year_built: 1990,
    ///     attributes: Attributes::new().with_number("assessed_value", 2_000_000.0),
    /// };
    /// let parcel = Parcel::new(3, 900.0)
    ///     .with_geography(Attributes::new().with_category("juris", "Oakland"));
    ///
    /// let context = EvalContext::for_building(&building, Some(&parcel));
    /// assert_eq!(context.get_field("assessed_value").unwrap(), 2_000_000.0);
    /// assert_eq!(context.get_category("juris").unwrap(), "Oakland");
    /// ```
    pub fn for_building(building: &Building, parcel: Option<&Parcel>) -> Self {
        let mut context = Self::new();

        context.insert_number("building_id", building.building_id as f64);
        context.insert_number("parcel_id", building.parcel_id as f64);
        context.insert_number("residential_units", building.residential_units as f64);
        context.insert_number("non_residential_sqft", building.non_residential_sqft);
        context.insert_number("year_built", building.year_built as f64);
        context.insert_number("regional", 1.0);
        context.join_attributes(&building.attributes);

        if let Some(parcel) = parcel {
            context.join_parcel(parcel);
        }

        context
    }

    /// Add a numeric column, replacing any previous value
    pub fn insert_number(&mut self, name: impl Into<String>, value: f64) {
        self.fields.insert(name.into(), value);
    }

    /// Add a categorical column, replacing any previous value
    pub fn insert_category(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.categories.insert(name.into(), value.into());
    }

    pub fn with_number(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert_number(name, value);
        self
    }

    pub fn with_category(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert_category(name, value);
        self
    }

    /// Add attribute columns that are not already present
    pub fn join_attributes(&mut self, attributes: &Attributes) {
        for (name, value) in &attributes.numeric {
            if !self.has_field(name) {
                self.fields.insert(name.clone(), *value);
            }
        }
        for (name, value) in &attributes.categorical {
            if !self.has_field(name) {
                self.categories.insert(name.clone(), value.clone());
            }
        }
    }

    /// Add parcel columns and geography that are not already present
    pub fn join_parcel(&mut self, parcel: &Parcel) {
        let parcel_columns = Attributes::new()
            .with_number("parcel_size", parcel.parcel_size)
            .with_number("ave_sqft_per_unit", parcel.ave_sqft_per_unit)
            .with_number("total_residential_units", parcel.total_residential_units as f64);
        self.join_attributes(&parcel_columns);
        self.join_attributes(&parcel.geography);
    }

    /// Get a numeric field value by name
    pub fn get_field(&self, name: &str) -> Result<f64, ContextError> {
        match self.fields.get(name) {
            Some(value) => Ok(*value),
            None if self.categories.contains_key(name) => {
                Err(ContextError::NotNumeric(name.to_string()))
            }
            None => Err(ContextError::FieldNotFound(name.to_string())),
        }
    }

    /// Get a categorical field value by name
    pub fn get_category(&self, name: &str) -> Result<&str, ContextError> {
        self.categories
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| ContextError::FieldNotFound(name.to_string()))
    }

    /// Check if a field of either kind exists
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.categories.contains_key(name)
    }

    pub fn is_categorical(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    /// Get all field names (for debugging)
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .fields
            .keys()
            .chain(self.categories.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }
}

/// The set of columns a row type is known to carry
///
/// Settings expressions are validated against a schema before the run starts,
/// so a misspelled column is a startup error instead of a mid-run failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSchema {
    numeric: BTreeSet<String>,
    categorical: BTreeSet<String>,
}

impl FieldSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_numeric<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.numeric.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_categorical<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categorical.extend(names.into_iter().map(Into::into));
        self
    }

    /// Schema of the columns present in a context
    pub fn from_context(context: &EvalContext) -> Self {
        Self {
            numeric: context.fields.keys().cloned().collect(),
            categorical: context.categories.keys().cloned().collect(),
        }
    }

    /// Columns present in any of the given contexts
    pub fn union_of<'a>(contexts: impl IntoIterator<Item = &'a EvalContext>) -> Self {
        let mut schema = Self::new();
        for context in contexts {
            schema.extend(&Self::from_context(context));
        }
        schema
    }

    pub fn extend(&mut self, other: &FieldSchema) {
        self.numeric.extend(other.numeric.iter().cloned());
        self.categorical.extend(other.categorical.iter().cloned());
    }

    pub fn has_numeric(&self, name: &str) -> bool {
        self.numeric.contains(name)
    }

    pub fn has_categorical(&self, name: &str) -> bool {
        self.categorical.contains(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.has_numeric(name) || self.has_categorical(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_building() -> Building {
        Building {
            building_id: 11,
            parcel_id: 5,
            residential_units: 4,
            non_residential_sqft: 1200.0,
            year_built: 1955,
            attributes: Attributes::new()
                .with_number("assessed_value", 850_000.0)
                .with_category("building_type", "HM"),
        }
    }

    #[test]
    fn test_context_contains_building_fields() {
        let context = EvalContext::for_building(&sample_building(), None);
        assert_eq!(context.get_field("building_id").unwrap(), 11.0);
        assert_eq!(context.get_field("residential_units").unwrap(), 4.0);
        assert_eq!(context.get_field("regional").unwrap(), 1.0);
        assert_eq!(context.get_category("building_type").unwrap(), "HM");
    }

    #[test]
    fn test_context_joins_parcel_geography() {
        let parcel = Parcel::new(5, 1000.0)
            .with_existing_units(4)
            .with_geography(Attributes::new().with_category("juris", "Albany"));
        let context = EvalContext::for_building(&sample_building(), Some(&parcel));

        assert_eq!(context.get_field("ave_sqft_per_unit").unwrap(), 1000.0);
        assert_eq!(context.get_category("juris").unwrap(), "Albany");
    }

    #[test]
    fn test_missing_field_returns_error() {
        let context = EvalContext::for_building(&sample_building(), None);
        assert_eq!(
            context.get_field("nonexistent"),
            Err(ContextError::FieldNotFound("nonexistent".to_string()))
        );
    }

    #[test]
    fn test_categorical_field_is_not_numeric() {
        let context = EvalContext::new().with_category("juris", "Oakland");
        assert_eq!(
            context.get_field("juris"),
            Err(ContextError::NotNumeric("juris".to_string()))
        );
    }

    #[test]
    fn test_schema_from_context() {
        let context = EvalContext::new()
            .with_number("max_profit", -5.0)
            .with_category("juris", "Oakland");
        let schema = FieldSchema::from_context(&context);

        assert!(schema.has_numeric("max_profit"));
        assert!(schema.has_categorical("juris"));
        assert!(!schema.contains("pda"));
    }
}
