//! Subsidized feasibility
//!
//! The regular feasibility run keeps only profitable projects. The subsidy
//! programs need the unprofitable ones too, so feasibility is re-run for the
//! residential form with every row kept.

use crate::models::{DevelopmentForm, FeasibilityTable, ParcelTable};
use crate::settings::FeasibilitySettings;
use crate::subsidy::collaborators::FeasibilityModel;
use crate::subsidy::SubsidyError;
use tracing::info;

/// Re-run feasibility for residential projects, unprofitable rows included
///
/// Starts from the configured feasibility settings, forces
/// `only_built = false` and `forms_to_test = [residential]`, keeps only
/// residential rows and joins parcel geography into each row.
pub fn subsidized_residential_feasibility(
    model: &mut dyn FeasibilityModel,
    parcels: &ParcelTable,
    settings: &FeasibilitySettings,
) -> Result<FeasibilityTable, SubsidyError> {
    let mut config = settings.clone();
    config.only_built = false;
    config.forms_to_test = Some(vec![DevelopmentForm::Residential]);

    let feasibility = model
        .run(parcels, &config)?
        .restrict_to_form(DevelopmentForm::Residential)
        .join_geography(parcels);

    info!(
        rows = feasibility.len(),
        unprofitable = feasibility.rows().iter().filter(|r| r.max_profit < 0.0).count(),
        "Computed subsidized residential feasibility"
    );

    Ok(feasibility)
}
