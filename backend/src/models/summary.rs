//! Construction summary
//!
//! Accumulates every building the developer models complete during the run.
//! The subsidized developer appends to it; the VMT fee step reads it to find
//! new, fee-liable construction.

use crate::models::attributes::Attributes;
use crate::models::feasibility::DevelopmentForm;
use crate::models::parcel::ParcelId;
use crate::models::transaction::BuildingId;
use serde::{Deserialize, Serialize};

/// A building produced by a developer model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBuilding {
    pub building_id: BuildingId,
    pub parcel_id: ParcelId,
    pub form: DevelopmentForm,
    pub year_built: u32,
    pub residential_units: u32,

    #[serde(default)]
    pub non_residential_sqft: f64,

    /// Building type code assigned by the form-to-type mapping
    #[serde(default)]
    pub building_type: u32,

    /// Profit that justified construction; the subsidy when negative
    pub max_profit: f64,

    /// Whether public funds paid for this building
    #[serde(default)]
    pub subsidized: bool,

    /// Extra columns (e.g. `vmt_res_cat`) filled in by the developer model
    #[serde(default)]
    pub attributes: Attributes,
}

/// Per-run record of completed construction
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstructionSummary {
    parcel_output: Vec<NewBuilding>,
}

impl ConstructionSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly completed buildings
    pub fn add_parcel_output(&mut self, buildings: impl IntoIterator<Item = NewBuilding>) {
        self.parcel_output.extend(buildings);
    }

    pub fn parcel_output(&self) -> &[NewBuilding] {
        &self.parcel_output
    }

    /// Buildings completed in `[start_year, end_year)`
    pub fn built_between(
        &self,
        start_year: u32,
        end_year: u32,
    ) -> impl Iterator<Item = &NewBuilding> {
        self.parcel_output
            .iter()
            .filter(move |b| (start_year..end_year).contains(&b.year_built))
    }

    pub fn subsidized(&self) -> impl Iterator<Item = &NewBuilding> {
        self.parcel_output.iter().filter(|b| b.subsidized)
    }

    pub fn len(&self) -> usize {
        self.parcel_output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcel_output.is_empty()
    }
}
