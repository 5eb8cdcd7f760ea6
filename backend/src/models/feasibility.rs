//! Feasibility results
//!
//! The feasibility model evaluates each parcel once per development form.
//! Rows carry the form explicitly so callers query by form instead of relying
//! on a grouped column layout.

use crate::models::attributes::Attributes;
use crate::models::parcel::{ParcelId, ParcelTable};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Development form evaluated by the feasibility model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevelopmentForm {
    Residential,
    Retail,
    Office,
    Industrial,
    #[serde(rename = "mixedresidential")]
    MixedResidential,
    #[serde(rename = "mixedoffice")]
    MixedOffice,
}

impl fmt::Display for DevelopmentForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DevelopmentForm::Residential => "residential",
            DevelopmentForm::Retail => "retail",
            DevelopmentForm::Office => "office",
            DevelopmentForm::Industrial => "industrial",
            DevelopmentForm::MixedResidential => "mixedresidential",
            DevelopmentForm::MixedOffice => "mixedoffice",
        };
        f.write_str(name)
    }
}

/// One candidate development: a parcel evaluated for one form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityRow {
    pub parcel_id: ParcelId,
    pub form: DevelopmentForm,

    /// Projected residential floor area
    #[serde(default)]
    pub residential_sqft: f64,

    #[serde(default)]
    pub non_residential_sqft: f64,

    #[serde(default)]
    pub building_sqft: f64,

    /// Projected profit; negative means the project needs a subsidy
    pub max_profit: f64,

    /// Extra columns, including joined parcel geography
    #[serde(default)]
    pub attributes: Attributes,
}

/// All feasibility rows for one run of the feasibility model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeasibilityTable {
    rows: Vec<FeasibilityRow>,
}

impl FeasibilityTable {
    pub fn new(rows: Vec<FeasibilityRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[FeasibilityRow] {
        &self.rows
    }

    /// Rows evaluated for a single form
    pub fn for_form(&self, form: DevelopmentForm) -> impl Iterator<Item = &FeasibilityRow> {
        self.rows.iter().filter(move |row| row.form == form)
    }

    /// A new table holding only the rows for `form`
    pub fn restrict_to_form(self, form: DevelopmentForm) -> Self {
        Self {
            rows: self.rows.into_iter().filter(|row| row.form == form).collect(),
        }
    }

    /// Join each row's parcel geography into its attributes
    ///
    /// Rows whose parcel is not in `parcels` are kept unchanged.
    pub fn join_geography(mut self, parcels: &ParcelTable) -> Self {
        for row in &mut self.rows {
            if let Some(parcel) = parcels.get(row.parcel_id) {
                row.attributes.join(&parcel.geography);
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
