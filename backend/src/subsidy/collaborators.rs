//! Collaborator interfaces
//!
//! The generic feasibility and developer models belong to the surrounding
//! simulation. The subsidy steps only call them through these traits; the
//! implementor owns the household and building tables they need.

use crate::models::{DevelopmentForm, FeasibilityTable, NewBuilding, ParcelTable};
use crate::settings::FeasibilitySettings;
use crate::subsidy::allocator::SubsidyCandidate;
use std::fmt;
use thiserror::Error;

/// Failure reported by a collaborator model
#[derive(Debug, Error, PartialEq)]
pub enum CollaboratorError {
    #[error("Feasibility model failed: {0}")]
    Feasibility(String),

    #[error("Developer model failed: {0}")]
    Developer(String),
}

/// Evaluates development feasibility for every parcel
pub trait FeasibilityModel {
    /// Evaluate `parcels` for the forms in `config`
    ///
    /// When `config.only_built` is false the result must include
    /// unprofitable rows.
    fn run(
        &mut self,
        parcels: &ParcelTable,
        config: &FeasibilitySettings,
    ) -> Result<FeasibilityTable, CollaboratorError>;
}

/// Callbacks the developer model applies to each building it creates
///
/// Supplied by the simulation and passed through unchanged.
pub struct DeveloperCallbacks {
    form_to_btype: Box<dyn Fn(DevelopmentForm) -> u32>,
    add_extra_columns: Box<dyn Fn(&mut NewBuilding)>,
}

impl DeveloperCallbacks {
    pub fn new(
        form_to_btype: impl Fn(DevelopmentForm) -> u32 + 'static,
        add_extra_columns: impl Fn(&mut NewBuilding) + 'static,
    ) -> Self {
        Self {
            form_to_btype: Box::new(form_to_btype),
            add_extra_columns: Box::new(add_extra_columns),
        }
    }

    /// Building type code for a development form
    pub fn form_to_btype(&self, form: DevelopmentForm) -> u32 {
        (self.form_to_btype)(form)
    }

    /// Fill in simulation-specific columns on a new building
    pub fn add_extra_columns(&self, building: &mut NewBuilding) {
        (self.add_extra_columns)(building)
    }
}

impl Default for DeveloperCallbacks {
    /// Every form maps to building type 1; no extra columns
    fn default() -> Self {
        Self::new(|_| 1, |_| {})
    }
}

impl fmt::Debug for DeveloperCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeveloperCallbacks").finish_non_exhaustive()
    }
}

/// One construction request from the subsidized developer
#[derive(Debug)]
pub struct DeveloperRequest<'a> {
    /// Form being built
    pub form: DevelopmentForm,

    /// Candidates to build, in funding priority order
    pub candidates: &'a [SubsidyCandidate],

    /// Name of the unit-count column ("residential_units")
    pub unit_field: &'a str,

    /// Year buildings are completed in
    pub year: u32,

    /// The opaque `residential_developer` settings
    pub settings: &'a serde_json::Map<String, serde_json::Value>,

    pub parcels: &'a ParcelTable,

    pub callbacks: &'a DeveloperCallbacks,
}

/// Turns feasible candidates into buildings, subject to demand
pub trait DeveloperModel {
    /// Build some or all of the requested candidates
    ///
    /// Returns `None` (or an empty list) when nothing is built. Every
    /// returned building must sit on a distinct parcel from
    /// `request.candidates` and carry that candidate's `max_profit`.
    fn build(
        &mut self,
        request: DeveloperRequest<'_>,
    ) -> Result<Option<Vec<NewBuilding>>, CollaboratorError>;
}
