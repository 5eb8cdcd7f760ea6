//! Parcel and building records
//!
//! Only the columns the subsidy steps read are typed; everything else a
//! settings expression may need travels in `Attributes`.

use crate::models::attributes::Attributes;
use crate::models::transaction::BuildingId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a parcel
pub type ParcelId = u64;

/// A parcel with the columns the allocator and feasibility adapter use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub parcel_id: ParcelId,

    /// Parcel area in square feet
    #[serde(default)]
    pub parcel_size: f64,

    /// Average residential unit size for new construction on this parcel
    pub ave_sqft_per_unit: f64,

    /// Residential units currently on the parcel
    #[serde(default)]
    pub total_residential_units: u32,

    /// Geography columns (jurisdiction, zone, PDA, VMT category, ...)
    #[serde(default)]
    pub geography: Attributes,
}

impl Parcel {
    pub fn new(parcel_id: ParcelId, ave_sqft_per_unit: f64) -> Self {
        Self {
            parcel_id,
            parcel_size: 0.0,
            ave_sqft_per_unit,
            total_residential_units: 0,
            geography: Attributes::new(),
        }
    }

    pub fn with_existing_units(mut self, units: u32) -> Self {
        self.total_residential_units = units;
        self
    }

    pub fn with_geography(mut self, geography: Attributes) -> Self {
        self.geography = geography;
        self
    }
}

/// Parcels indexed by id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParcelTable {
    parcels: BTreeMap<ParcelId, Parcel>,
}

impl ParcelTable {
    pub fn new(parcels: Vec<Parcel>) -> Self {
        Self {
            parcels: parcels
                .into_iter()
                .map(|parcel| (parcel.parcel_id, parcel))
                .collect(),
        }
    }

    pub fn get(&self, parcel_id: ParcelId) -> Option<&Parcel> {
        self.parcels.get(&parcel_id)
    }

    /// Insert or replace a parcel
    pub fn insert(&mut self, parcel: Parcel) {
        self.parcels.insert(parcel.parcel_id, parcel);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parcel> {
        self.parcels.values()
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }
}

/// An existing building, as seen by the tax collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub building_id: BuildingId,
    pub parcel_id: ParcelId,

    #[serde(default)]
    pub residential_units: u32,

    #[serde(default)]
    pub non_residential_sqft: f64,

    #[serde(default)]
    pub year_built: u32,

    /// Other building columns (assessed value, building type, ...)
    #[serde(default)]
    pub attributes: Attributes,
}
