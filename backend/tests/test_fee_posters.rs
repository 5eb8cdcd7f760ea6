//! OBAG and VMT Revenue Tests
//!
//! Critical invariants tested:
//! - OBAG posts `total_amount * years_per_iter` to the regional subaccount
//! - VMT fees cover only unsubsidized buildings completed in the window
//! - A year with no qualifying construction posts nothing

use urban_subsidy_core::models::{
    Account, Attributes, ConstructionSummary, DevelopmentForm, NewBuilding, REGIONAL_SUBACCOUNT,
};
use urban_subsidy_core::settings::ProgramSettings;
use urban_subsidy_core::subsidy::{add_obag_funds, calculate_vmt_fees, SubsidyError};

// ============================================================================
// Test Helpers
// ============================================================================

fn obag_settings(total_amount: f64) -> ProgramSettings {
    serde_json::from_value(serde_json::json!({
        "sending_buildings_subaccount_def": {"field": "regional"},
        "total_amount": total_amount,
    }))
    .unwrap()
}

fn vmt_settings() -> ProgramSettings {
    serde_json::from_value(serde_json::json!({
        "sending_buildings_subaccount_def": {"field": "regional"},
        "fee_amounts": {"S": 1000.0, "M": 500.0, "L": 0.0},
    }))
    .unwrap()
}

fn new_building(id: u64, year_built: u32, units: u32, category: &str) -> NewBuilding {
    NewBuilding {
        building_id: id,
        parcel_id: id,
        form: DevelopmentForm::Residential,
        year_built,
        residential_units: units,
        non_residential_sqft: 0.0,
        building_type: 1,
        max_profit: 10_000.0,
        subsidized: false,
        attributes: Attributes::new().with_category("vmt_res_cat", category),
    }
}

// ============================================================================
// OBAG
// ============================================================================

#[test]
fn test_obag_scales_with_years_per_iter() {
    let mut account = Account::new("obag_acct");

    add_obag_funds(&obag_settings(250_000.0), &mut account, 2010, 5).unwrap();
    add_obag_funds(&obag_settings(250_000.0), &mut account, 2015, 5).unwrap();

    assert_eq!(account.num_transactions(), 2);
    assert_eq!(account.subaccount_balance(REGIONAL_SUBACCOUNT), 2_500_000.0);
    assert!(account
        .transactions()
        .iter()
        .all(|t| t.description() == "OBAG regional subsidies"));
    assert_eq!(account.transactions()[1].year(), 2015);
}

#[test]
fn test_obag_without_total_is_rejected() {
    let settings: ProgramSettings = serde_json::from_value(serde_json::json!({
        "sending_buildings_subaccount_def": {"field": "regional"},
    }))
    .unwrap();
    let mut account = Account::new("obag_acct");

    let err = add_obag_funds(&settings, &mut account, 2010, 1).unwrap_err();

    assert!(matches!(err, SubsidyError::MissingSetting(_)));
    assert_eq!(account.num_transactions(), 0);
}

// ============================================================================
// VMT
// ============================================================================

#[test]
fn test_vmt_fees_by_category() {
    let mut summary = ConstructionSummary::new();
    summary.add_parcel_output(vec![
        new_building(1, 2015, 10, "S"),
        new_building(2, 2016, 8, "M"),
        new_building(3, 2019, 100, "L"),
        new_building(4, 2017, 3, "unknown"),
    ]);
    let mut account = Account::new("vmt_fee_acct");

    let posted = calculate_vmt_fees(&vmt_settings(), &summary, &mut account, 2015, 5).unwrap();

    assert_eq!(posted, Some(14_000.0));
    assert_eq!(account.num_transactions(), 1);
    assert_eq!(account.subaccount_balance(REGIONAL_SUBACCOUNT), 14_000.0);
    assert_eq!(account.transactions()[0].description(), "VMT development fees");
}

#[test]
fn test_vmt_window_is_half_open() {
    let mut summary = ConstructionSummary::new();
    summary.add_parcel_output(vec![
        new_building(1, 2014, 10, "S"),
        new_building(2, 2015, 1, "S"),
        new_building(3, 2020, 10, "S"),
    ]);
    let mut account = Account::new("vmt_fee_acct");

    let posted = calculate_vmt_fees(&vmt_settings(), &summary, &mut account, 2015, 5).unwrap();

    assert_eq!(posted, Some(1_000.0));
}

#[test]
fn test_vmt_excludes_subsidized_buildings() {
    let mut subsidized = new_building(1, 2015, 50, "S");
    subsidized.subsidized = true;
    let mut summary = ConstructionSummary::new();
    summary.add_parcel_output(vec![subsidized]);
    let mut account = Account::new("vmt_fee_acct");

    let posted = calculate_vmt_fees(&vmt_settings(), &summary, &mut account, 2015, 1).unwrap();

    assert_eq!(posted, None);
    assert_eq!(account.num_transactions(), 0);
}

#[test]
fn test_vmt_no_construction_is_a_no_op() {
    let summary = ConstructionSummary::new();
    let mut account = Account::new("vmt_fee_acct");

    let posted = calculate_vmt_fees(&vmt_settings(), &summary, &mut account, 2015, 1).unwrap();

    assert_eq!(posted, None);
    assert_eq!(account.num_subaccounts(), 0);
}

#[test]
fn test_vmt_missing_category_column() {
    let mut building = new_building(7, 2015, 5, "S");
    building.attributes = Attributes::new();
    let mut summary = ConstructionSummary::new();
    summary.add_parcel_output(vec![building]);
    let mut account = Account::new("vmt_fee_acct");

    let err = calculate_vmt_fees(&vmt_settings(), &summary, &mut account, 2015, 1).unwrap_err();

    assert!(matches!(
        err,
        SubsidyError::MissingFeeCategory { building_id: 7, .. }
    ));
    assert_eq!(account.num_transactions(), 0);
}
