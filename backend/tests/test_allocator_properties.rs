//! Property tests for the subsidized developer
//!
//! Random project sets and balances, checking:
//! - Spending never exceeds the starting balance
//! - The funded set is the longest affordable prefix of the ranking
//! - Offers are ordered cheapest subsidy per unit first
//! - Projects with non-negative profit are never offered

use proptest::prelude::*;
use std::collections::BTreeMap;
use urban_subsidy_core::expr::SubaccountDef;
use urban_subsidy_core::models::{
    Account, Attributes, ConstructionSummary, DevelopmentForm, FeasibilityRow, FeasibilityTable,
    NewBuilding, Parcel, ParcelTable, TransactionMetadata,
};
use urban_subsidy_core::settings::ProgramSettings;
use urban_subsidy_core::subsidy::{
    run_subsidized_developer, CollaboratorError, DeveloperCallbacks, DeveloperModel,
    DeveloperRequest, SubsidyCandidate,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Builds everything and keeps the offered candidates
#[derive(Default)]
struct BuildEverything {
    offered: Vec<SubsidyCandidate>,
}

impl DeveloperModel for BuildEverything {
    fn build(
        &mut self,
        request: DeveloperRequest<'_>,
    ) -> Result<Option<Vec<NewBuilding>>, CollaboratorError> {
        self.offered.extend(request.candidates.iter().cloned());
        Ok(Some(
            request
                .candidates
                .iter()
                .enumerate()
                .map(|(i, c)| NewBuilding {
                    building_id: i as u64,
                    parcel_id: c.parcel_id(),
                    form: request.form,
                    year_built: request.year,
                    residential_units: c.residential_units,
                    non_residential_sqft: 0.0,
                    building_type: 1,
                    max_profit: c.max_profit(),
                    subsidized: false,
                    attributes: Attributes::new(),
                })
                .collect(),
        ))
    }
}

fn program() -> ProgramSettings {
    ProgramSettings {
        receiving_buildings_filter: None,
        sending_buildings_subaccount_def: SubaccountDef::Field {
            field: "regional".to_string(),
        },
        fee_amounts: BTreeMap::new(),
        fee_category_field: "vmt_res_cat".to_string(),
        total_amount: None,
        parameters: Default::default(),
    }
}

/// (units, profit in thousands) per project; parcel ids are 1-based positions
fn scenario(projects: &[(u32, i64)]) -> (FeasibilityTable, ParcelTable) {
    let rows = projects
        .iter()
        .enumerate()
        .map(|(i, (units, profit_k))| FeasibilityRow {
            parcel_id: i as u64 + 1,
            form: DevelopmentForm::Residential,
            residential_sqft: *units as f64 * 1_000.0,
            non_residential_sqft: 0.0,
            building_sqft: *units as f64 * 1_000.0,
            max_profit: *profit_k as f64 * 1_000.0,
            attributes: Attributes::new(),
        })
        .collect();
    let parcels = (0..projects.len())
        .map(|i| Parcel::new(i as u64 + 1, 1_000.0))
        .collect();
    (FeasibilityTable::new(rows), ParcelTable::new(parcels))
}

fn project_strategy() -> impl Strategy<Value = Vec<(u32, i64)>> {
    proptest::collection::vec((1u32..200, -5_000i64..500), 0..25)
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(128))]

    #[test]
    fn prop_allocation_respects_budget_and_ranking(
        projects in project_strategy(),
        balance_k in 0i64..20_000,
    ) {
        let (feasibility, parcels) = scenario(&projects);
        let balance = balance_k as f64 * 1_000.0;
        let mut account = Account::new("obag_acct");
        account
            .add_transaction(balance, "1", TransactionMetadata::new("OBAG regional subsidies", 2020))
            .unwrap();
        let mut developer = BuildEverything::default();
        let mut summary = ConstructionSummary::new();

        let report = run_subsidized_developer(
            &feasibility,
            &parcels,
            &program(),
            &serde_json::Map::new(),
            &mut account,
            2020,
            &mut developer,
            &DeveloperCallbacks::default(),
            &mut summary,
        )
        .unwrap();

        // Budget
        let spent = report.total_spent();
        prop_assert!(spent <= balance + 1e-6);
        prop_assert!(account.subaccount_balance("1") >= -1e-6);
        prop_assert!((account.subaccount_balance("1") - (balance - spent)).abs() < 1e-3);

        // Only unprofitable projects
        for candidate in &developer.offered {
            prop_assert!(candidate.max_profit() < 0.0);
        }

        // Cheapest per unit first
        for pair in developer.offered.windows(2) {
            prop_assert!(pair[0].subsidy_per_unit >= pair[1].subsidy_per_unit);
        }

        // Maximal prefix: the next-ranked project would not have fit
        let mut ranked: Vec<(f64, f64)> = projects
            .iter()
            .filter(|(_, profit_k)| *profit_k < 0)
            .map(|(units, profit_k)| {
                let profit = *profit_k as f64 * 1_000.0;
                (profit / *units as f64, -profit)
            })
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        let offered = developer.offered.len();
        prop_assert!(offered <= ranked.len());
        if offered < ranked.len() {
            let prefix: f64 = ranked[..=offered].iter().map(|(_, cost)| cost).sum();
            prop_assert!(prefix > balance);
        }
    }

    #[test]
    fn prop_empty_account_funds_nothing(projects in project_strategy()) {
        let (feasibility, parcels) = scenario(&projects);
        let mut account = Account::new("vmt_fee_acct");
        let mut developer = BuildEverything::default();
        let mut summary = ConstructionSummary::new();

        let report = run_subsidized_developer(
            &feasibility,
            &parcels,
            &program(),
            &serde_json::Map::new(),
            &mut account,
            2020,
            &mut developer,
            &DeveloperCallbacks::default(),
            &mut summary,
        )
        .unwrap();

        prop_assert!(developer.offered.is_empty());
        prop_assert_eq!(report.buildings_built(), 0);
        prop_assert_eq!(account.num_transactions(), 0);
    }
}
