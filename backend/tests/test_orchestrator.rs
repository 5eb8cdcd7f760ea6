//! Yearly Driver Tests
//!
//! Runs the full step sequence over several iterations:
//! tax, OBAG, VMT fees, subsidized feasibility, VMT developer, OBAG developer.

use std::collections::BTreeSet;
use urban_subsidy_core::models::{
    Attributes, Building, DevelopmentForm, FeasibilityRow, FeasibilityTable, FundingProgram,
    NewBuilding, Parcel, ParcelId, ParcelTable,
};
use urban_subsidy_core::orchestrator::{
    OrchestratorConfig, SimulationError, SubsidyOrchestrator, YearInputs,
};
use urban_subsidy_core::settings::{FeasibilitySettings, Settings, SettingsSchema};
use urban_subsidy_core::subsidy::{
    CollaboratorError, DeveloperCallbacks, DeveloperModel, DeveloperRequest, FeasibilityModel,
    SubsidyError,
};

// ============================================================================
// Test Helpers
// ============================================================================

const SETTINGS: &str = r#"{
    "years_per_iter": 5,
    "acct_settings": {
        "sending_buildings_filter": {"op": ">", "left": {"field": "residential_units"}, "right": {"value": 0}},
        "sending_buildings_tax": {"compute": {"op": "*", "left": {"field": "residential_units"}, "right": {"param": "per_unit"}}},
        "sending_buildings_subaccount_def": {"field": "regional"},
        "parameters": {"per_unit": 100},
        "vmt_settings": {
            "sending_buildings_subaccount_def": {"field": "regional"},
            "fee_amounts": {"S": 1000}
        },
        "obag_settings": {
            "sending_buildings_subaccount_def": {"field": "regional"},
            "total_amount": 100000
        }
    },
    "feasibility": {"only_built": true}
}"#;

/// Returns fixed rows, recording the config it was called with
struct FixedFeasibility {
    rows: Vec<FeasibilityRow>,
    configs: Vec<FeasibilitySettings>,
}

impl FeasibilityModel for FixedFeasibility {
    fn run(
        &mut self,
        _parcels: &ParcelTable,
        config: &FeasibilitySettings,
    ) -> Result<FeasibilityTable, CollaboratorError> {
        self.configs.push(config.clone());
        Ok(FeasibilityTable::new(self.rows.clone()))
    }
}

/// Builds each parcel at most once over the whole run
#[derive(Default)]
struct OncePerParcel {
    built: BTreeSet<ParcelId>,
    next_id: u64,
}

impl DeveloperModel for OncePerParcel {
    fn build(
        &mut self,
        request: DeveloperRequest<'_>,
    ) -> Result<Option<Vec<NewBuilding>>, CollaboratorError> {
        let mut buildings = Vec::new();
        for candidate in request.candidates {
            if !self.built.insert(candidate.parcel_id()) {
                continue;
            }
            self.next_id += 1;
            let mut building = NewBuilding {
                building_id: 1_000 + self.next_id,
                parcel_id: candidate.parcel_id(),
                form: request.form,
                year_built: request.year,
                residential_units: candidate.residential_units,
                non_residential_sqft: 0.0,
                building_type: request.callbacks.form_to_btype(request.form),
                max_profit: candidate.max_profit(),
                subsidized: false,
                attributes: Attributes::new(),
            };
            request.callbacks.add_extra_columns(&mut building);
            buildings.push(building);
        }
        Ok(if buildings.is_empty() { None } else { Some(buildings) })
    }
}

fn parcels() -> ParcelTable {
    ParcelTable::new((1..=3).map(|id| Parcel::new(id, 1_000.0)).collect())
}

fn buildings() -> Vec<Building> {
    vec![Building {
        building_id: 1,
        parcel_id: 1,
        residential_units: 10,
        non_residential_sqft: 0.0,
        year_built: 1990,
        attributes: Attributes::new(),
    }]
}

fn row(parcel_id: ParcelId, max_profit: f64) -> FeasibilityRow {
    FeasibilityRow {
        parcel_id,
        form: DevelopmentForm::Residential,
        residential_sqft: 10_000.0,
        non_residential_sqft: 0.0,
        building_sqft: 10_000.0,
        max_profit,
        attributes: Attributes::new(),
    }
}

fn market_building(id: u64, year_built: u32, units: u32) -> NewBuilding {
    NewBuilding {
        building_id: id,
        parcel_id: 3,
        form: DevelopmentForm::Residential,
        year_built,
        residential_units: units,
        non_residential_sqft: 0.0,
        building_type: 1,
        max_profit: 25_000.0,
        subsidized: false,
        attributes: Attributes::new().with_category("vmt_res_cat", "S"),
    }
}

fn orchestrator() -> SubsidyOrchestrator {
    let parcels = parcels();
    let config = OrchestratorConfig {
        settings: Settings::from_json_str(SETTINGS).unwrap(),
        start_year: 2010,
        schema: SettingsSchema::from_tables(&buildings(), &parcels, &FeasibilityTable::default()),
    };
    SubsidyOrchestrator::new(config).unwrap()
}

fn callbacks() -> DeveloperCallbacks {
    DeveloperCallbacks::new(
        |_| 2,
        |b: &mut NewBuilding| {
            b.attributes
                .categorical
                .insert("vmt_res_cat".to_string(), "S".to_string());
        },
    )
}

// ============================================================================
// Multi-year Runs
// ============================================================================

#[test]
fn test_two_iterations_fund_vmt_then_obag() {
    let mut orchestrator = orchestrator();
    orchestrator
        .summary_mut()
        .add_parcel_output(vec![market_building(50, 2010, 50), market_building(51, 2015, 20)]);

    let parcels = parcels();
    let buildings = buildings();
    let mut model = FixedFeasibility {
        rows: vec![row(1, -30_000.0), row(2, -400_000.0), row(3, 50.0)],
        configs: Vec::new(),
    };
    let mut developer = OncePerParcel::default();
    let callbacks = callbacks();

    let first = orchestrator
        .run_year(YearInputs {
            buildings: &buildings,
            parcels: &parcels,
            feasibility_model: &mut model,
            developer: &mut developer,
            callbacks: &callbacks,
        })
        .unwrap();

    assert_eq!(first.year, 2010);
    assert_eq!(first.property_tax.get("1"), Some(&1_000.0));
    assert_eq!(first.obag_funds, 500_000.0);
    assert_eq!(first.vmt_fees, Some(50_000.0));
    assert_eq!(first.feasibility_rows, 3);
    // VMT's 50k covers the 30k project only; OBAG then funds the other
    assert_eq!(first.vmt_allocation.buildings_built(), 1);
    assert_eq!(first.vmt_allocation.outcome("1").map(|o| o.selected), Some(1));
    assert_eq!(first.obag_allocation.buildings_built(), 1);
    assert_eq!(first.subsidized_units(), 20);
    assert!((first.subsidy_spent() - 430_000.0).abs() < 1e-6);

    let second = orchestrator
        .run_year(YearInputs {
            buildings: &buildings,
            parcels: &parcels,
            feasibility_model: &mut model,
            developer: &mut developer,
            callbacks: &callbacks,
        })
        .unwrap();

    // Subsidized buildings from 2010 owe no fees; the 2015 market building does
    assert_eq!(second.year, 2015);
    assert_eq!(second.vmt_fees, Some(20_000.0));
    assert_eq!(second.subsidized_units(), 0);
    assert_eq!(orchestrator.current_year(), 2020);

    let coffer = orchestrator.coffer();
    let vmt = coffer.account(FundingProgram::VmtFee);
    let obag = coffer.account(FundingProgram::Obag);
    let tax = coffer.account(FundingProgram::PropertyTax);
    assert!((vmt.subaccount_balance("1") - 40_000.0).abs() < 1e-6);
    assert!((obag.subaccount_balance("1") - 600_000.0).abs() < 1e-6);
    assert!((tax.subaccount_balance("1") - 2_000.0).abs() < 1e-6);

    let subsidized: Vec<&NewBuilding> = orchestrator.summary().subsidized().collect();
    assert_eq!(subsidized.len(), 2);
    assert!(subsidized.iter().all(|b| b.building_type == 2));
    assert!(subsidized
        .iter()
        .all(|b| b.attributes.category("vmt_res_cat") == Some("S")));

    for config in &model.configs {
        assert!(!config.only_built);
        assert_eq!(config.forms_to_test, Some(vec![DevelopmentForm::Residential]));
    }
}

#[test]
fn test_steps_callable_individually() {
    let mut orchestrator = orchestrator();
    let parcels = parcels();
    let mut model = FixedFeasibility {
        rows: vec![row(1, -30_000.0)],
        configs: Vec::new(),
    };
    let mut developer = OncePerParcel::default();
    let callbacks = callbacks();

    orchestrator.add_obag_funds().unwrap();
    assert_eq!(orchestrator.calculate_vmt_fees().unwrap(), None);
    orchestrator
        .subsidized_residential_feasibility(&mut model, &parcels)
        .unwrap();
    let vmt = orchestrator
        .subsidized_residential_developer_vmt(&parcels, &mut developer, &callbacks)
        .unwrap();
    let obag = orchestrator
        .subsidized_residential_developer_obag(&parcels, &mut developer, &callbacks)
        .unwrap();
    orchestrator.release_feasibility();

    assert_eq!(vmt.buildings_built(), 0);
    assert_eq!(obag.buildings_built(), 1);
    assert!(orchestrator.feasibility().is_none());
    // Individual steps never move the clock
    assert_eq!(orchestrator.current_year(), 2010);
}

// ============================================================================
// Failure Handling
// ============================================================================

#[test]
fn test_failed_step_does_not_advance_clock() {
    let mut orchestrator = orchestrator();
    let mut untagged = market_building(60, 2010, 5);
    untagged.attributes = Attributes::new();
    orchestrator.summary_mut().add_parcel_output(vec![untagged]);

    let parcels = parcels();
    let buildings = buildings();
    let mut model = FixedFeasibility {
        rows: vec![row(1, -30_000.0)],
        configs: Vec::new(),
    };
    let mut developer = OncePerParcel::default();
    let callbacks = callbacks();

    let err = orchestrator
        .run_year(YearInputs {
            buildings: &buildings,
            parcels: &parcels,
            feasibility_model: &mut model,
            developer: &mut developer,
            callbacks: &callbacks,
        })
        .unwrap_err();

    assert!(matches!(
        err,
        SimulationError::Step {
            step: "calculate_vmt_fees",
            source: SubsidyError::MissingFeeCategory { building_id: 60, .. },
        }
    ));
    assert_eq!(orchestrator.current_year(), 2010);
    assert!(orchestrator.feasibility().is_none());
    assert!(model.configs.is_empty());
}

#[test]
fn test_collaborator_failure_surfaces_as_step_error() {
    struct Broken;
    impl FeasibilityModel for Broken {
        fn run(
            &mut self,
            _parcels: &ParcelTable,
            _config: &FeasibilitySettings,
        ) -> Result<FeasibilityTable, CollaboratorError> {
            Err(CollaboratorError::Feasibility("pro forma table missing".to_string()))
        }
    }

    let mut orchestrator = orchestrator();
    let parcels = parcels();

    let err = orchestrator
        .subsidized_residential_feasibility(&mut Broken, &parcels)
        .unwrap_err();

    assert!(matches!(
        err,
        SimulationError::Step {
            step: "subsidized_residential_feasibility",
            source: SubsidyError::Collaborator(CollaboratorError::Feasibility(_)),
        }
    ));
    assert!(orchestrator.feasibility().is_none());
}
