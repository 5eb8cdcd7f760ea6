//! Scenario-backed collaborators
//!
//! A scenario file stands in for the land-use simulation: it supplies the
//! parcel and building tables, a fixed set of feasibility rows, market-rate
//! construction and the yearly housing demand the developer may build to.

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;
use urban_subsidy_core::models::{
    Building, DevelopmentForm, FeasibilityRow, FeasibilityTable, NewBuilding, Parcel, ParcelTable,
};
use urban_subsidy_core::settings::FeasibilitySettings;
use urban_subsidy_core::subsidy::{
    CollaboratorError, DeveloperModel, DeveloperRequest, FeasibilityModel,
};

/// Scenario file contents
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub start_year: u32,

    pub parcels: Vec<Parcel>,

    #[serde(default)]
    pub buildings: Vec<Building>,

    /// Rows the feasibility model returns every year
    #[serde(default)]
    pub feasibility: Vec<FeasibilityRow>,

    /// Unsubsidized construction, liable for VMT fees in its window
    #[serde(default)]
    pub market_construction: Vec<NewBuilding>,

    /// Units the developer may build, by year; missing years use `default_demand`
    #[serde(default)]
    pub housing_demand: BTreeMap<u32, u32>,

    #[serde(default)]
    pub default_demand: u32,

    /// VMT category assigned to subsidized buildings
    #[serde(default = "default_vmt_category")]
    pub vmt_res_cat: String,
}

fn default_vmt_category() -> String {
    "S".to_string()
}

impl Scenario {
    pub fn parcel_table(&self) -> ParcelTable {
        ParcelTable::new(self.parcels.clone())
    }

    fn next_building_id(&self) -> u64 {
        let existing = self.buildings.iter().map(|b| b.building_id);
        let market = self.market_construction.iter().map(|b| b.building_id);
        existing.chain(market).max().map_or(1, |id| id + 1)
    }
}

/// Returns the scenario's rows, honouring `forms_to_test` and `only_built`
pub struct ScenarioFeasibility {
    rows: Vec<FeasibilityRow>,
}

impl ScenarioFeasibility {
    pub fn new(scenario: &Scenario) -> Self {
        Self {
            rows: scenario.feasibility.clone(),
        }
    }
}

impl FeasibilityModel for ScenarioFeasibility {
    fn run(
        &mut self,
        _parcels: &ParcelTable,
        config: &FeasibilitySettings,
    ) -> Result<FeasibilityTable, CollaboratorError> {
        let rows = self
            .rows
            .iter()
            .filter(|row| match &config.forms_to_test {
                Some(forms) => forms.contains(&row.form),
                None => true,
            })
            .filter(|row| !config.only_built || row.max_profit > 0.0)
            .cloned()
            .collect();
        Ok(FeasibilityTable::new(rows))
    }
}

/// Builds candidates in the order offered until the year's demand runs out
///
/// Demand is shared by every developer call in the same year.
pub struct ScenarioDeveloper {
    demand: BTreeMap<u32, u32>,
    default_demand: u32,
    next_building_id: u64,
}

impl ScenarioDeveloper {
    pub fn new(scenario: &Scenario) -> Self {
        Self {
            demand: scenario.housing_demand.clone(),
            default_demand: scenario.default_demand,
            next_building_id: scenario.next_building_id(),
        }
    }
}

impl DeveloperModel for ScenarioDeveloper {
    fn build(
        &mut self,
        request: DeveloperRequest<'_>,
    ) -> Result<Option<Vec<NewBuilding>>, CollaboratorError> {
        if request.form != DevelopmentForm::Residential {
            return Err(CollaboratorError::Developer(format!(
                "scenario developer only builds residential, got {}",
                request.form
            )));
        }

        let remaining = self
            .demand
            .entry(request.year)
            .or_insert(self.default_demand);

        let mut built = Vec::new();
        for candidate in request.candidates {
            if candidate.residential_units > *remaining {
                break;
            }
            *remaining -= candidate.residential_units;

            let mut building = NewBuilding {
                building_id: self.next_building_id,
                parcel_id: candidate.parcel_id(),
                form: request.form,
                year_built: request.year,
                residential_units: candidate.residential_units,
                non_residential_sqft: candidate.row.non_residential_sqft,
                building_type: request.callbacks.form_to_btype(request.form),
                max_profit: candidate.max_profit(),
                subsidized: false,
                attributes: Default::default(),
            };
            request.callbacks.add_extra_columns(&mut building);
            self.next_building_id += 1;
            built.push(building);
        }

        debug!(
            year = request.year,
            offered = request.candidates.len(),
            built = built.len(),
            remaining_demand = *remaining,
            "Scenario developer"
        );

        if built.is_empty() {
            Ok(None)
        } else {
            Ok(Some(built))
        }
    }
}
