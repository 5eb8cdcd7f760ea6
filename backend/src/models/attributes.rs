//! Named row attributes
//!
//! Buildings, parcels and feasibility rows carry open-ended columns (geography
//! keys, assessed values, zoning categories) that settings expressions refer
//! to by name. Numeric and categorical columns are kept apart so an
//! expression can be checked against the right kind at validation time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric and categorical columns of one row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attributes {
    #[serde(default)]
    pub numeric: BTreeMap<String, f64>,

    #[serde(default)]
    pub categorical: BTreeMap<String, String>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_number(mut self, name: impl Into<String>, value: f64) -> Self {
        self.numeric.insert(name.into(), value);
        self
    }

    pub fn with_category(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.categorical.insert(name.into(), value.into());
        self
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.numeric.get(name).copied()
    }

    pub fn category(&self, name: &str) -> Option<&str> {
        self.categorical.get(name).map(String::as_str)
    }

    /// Add columns from `other` that this row does not already have
    ///
    /// Existing columns win, mirroring a left join that keeps the row's own
    /// values.
    pub fn join(&mut self, other: &Attributes) {
        for (name, value) in &other.numeric {
            self.numeric.entry(name.clone()).or_insert(*value);
        }
        for (name, value) in &other.categorical {
            self.categorical
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }
}
