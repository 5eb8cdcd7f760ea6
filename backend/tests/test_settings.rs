//! Settings Loading and Validation Tests
//!
//! A settings document is checked against the columns the simulation tables
//! carry. Every problem is reported at once, and nothing is read as zero.

use urban_subsidy_core::expr::ValidationError;
use urban_subsidy_core::models::{
    Attributes, Building, DevelopmentForm, FeasibilityRow, FeasibilityTable, Parcel, ParcelTable,
};
use urban_subsidy_core::settings::{Settings, SettingsError, SettingsSchema};

// ============================================================================
// Test Helpers
// ============================================================================

const SETTINGS: &str = r#"{
    "years_per_iter": 5,
    "acct_settings": {
        "sending_buildings_filter": {
            "op": "and",
            "conditions": [
                {"op": ">", "left": {"field": "residential_units"}, "right": {"value": 0}},
                {"op": "==", "left": {"field": "pda_flag"}, "right": {"value": 1}}
            ]
        },
        "sending_buildings_tax": {
            "compute": {"op": "*", "left": {"field": "assessed_value"}, "right": {"param": "tax_rate"}}
        },
        "sending_buildings_subaccount_def": {"field": "juris"},
        "parameters": {"tax_rate": 0.01},
        "vmt_settings": {
            "receiving_buildings_filter": {
                "op": ">=", "left": {"field": "residential_units"}, "right": {"param": "min_units"}
            },
            "sending_buildings_subaccount_def": {"field": "regional"},
            "fee_amounts": {"S": 1000, "M": 500, "L": 0},
            "parameters": {"min_units": 5}
        },
        "obag_settings": {
            "sending_buildings_subaccount_def": {"field": "regional"},
            "total_amount": 1000000
        }
    },
    "feasibility": {"parcel_filter": "total_residential_units == 0", "only_built": true},
    "residential_developer": {"target_vacancy": 0.03, "min_unit_size": 400}
}"#;

fn schema() -> SettingsSchema {
    let parcels = ParcelTable::new(vec![Parcel::new(1, 900.0).with_geography(
        Attributes::new()
            .with_category("juris", "Oakland")
            .with_number("pda_flag", 1.0),
    )]);
    let buildings = vec![Building {
        building_id: 1,
        parcel_id: 1,
        residential_units: 10,
        non_residential_sqft: 0.0,
        year_built: 1990,
        attributes: Attributes::new().with_number("assessed_value", 1_000_000.0),
    }];
    let feasibility = FeasibilityTable::new(vec![FeasibilityRow {
        parcel_id: 1,
        form: DevelopmentForm::Residential,
        residential_sqft: 9_000.0,
        non_residential_sqft: 0.0,
        building_sqft: 9_000.0,
        max_profit: -1_000.0,
        attributes: Attributes::new(),
    }]);
    SettingsSchema::from_tables(&buildings, &parcels, &feasibility)
}

fn invalid(settings: &Settings) -> Vec<ValidationError> {
    match settings.validate(&schema()) {
        Err(SettingsError::Invalid(errors)) => errors,
        other => panic!("expected validation errors, got {:?}", other),
    }
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_full_document_loads_and_validates() {
    let settings = Settings::from_json_str(SETTINGS).unwrap();

    assert_eq!(settings.years_per_iter, 5);
    assert_eq!(settings.acct_settings.parameters["tax_rate"], 0.01);
    assert_eq!(settings.acct_settings.vmt_settings.fee_amounts["S"], 1000.0);
    assert_eq!(settings.acct_settings.obag_settings.total_amount, Some(1_000_000.0));
    assert_eq!(settings.residential_developer["min_unit_size"], 400);
    assert_eq!(
        settings.feasibility.extra["parcel_filter"],
        "total_residential_units == 0"
    );

    settings.validate(&schema()).unwrap();
}

#[test]
fn test_from_path_reports_missing_file() {
    let path = std::env::temp_dir().join("urban-subsidy-no-such-settings.json");
    let result = Settings::from_path(&path);
    assert!(matches!(result, Err(SettingsError::Io { .. })));
}

#[test]
fn test_from_path_reads_document() {
    let path = std::env::temp_dir().join(format!("settings-{}.json", uuid::Uuid::new_v4()));
    std::fs::write(&path, SETTINGS).unwrap();

    let settings = Settings::from_path(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(settings, Settings::from_json_str(SETTINGS).unwrap());
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_unknown_column_rejected() {
    let json = SETTINGS.replace("assessed_value", "assesed_value");
    let settings = Settings::from_json_str(&json).unwrap();

    let errors = invalid(&settings);

    assert!(errors.iter().any(|e| matches!(
        e,
        ValidationError::InvalidFieldReference { field, .. } if field == "assesed_value"
    )));
}

#[test]
fn test_unknown_parameter_rejected() {
    let json = SETTINGS.replace(r#""parameters": {"min_units": 5}"#, r#""parameters": {}"#);
    let settings = Settings::from_json_str(&json).unwrap();

    let errors = invalid(&settings);

    assert!(errors.iter().any(|e| matches!(
        e,
        ValidationError::InvalidParameterReference { param, .. } if param == "min_units"
    )));
}

#[test]
fn test_missing_obag_total_rejected() {
    let mut document: serde_json::Value = serde_json::from_str(SETTINGS).unwrap();
    document["acct_settings"]["obag_settings"]
        .as_object_mut()
        .unwrap()
        .remove("total_amount");
    let settings: Settings = serde_json::from_value(document).unwrap();
    assert_eq!(settings.acct_settings.obag_settings.total_amount, None);

    let errors = invalid(&settings);

    assert!(errors.iter().any(|e| matches!(
        e,
        ValidationError::InvalidSetting { location, .. }
            if location == "acct_settings.obag_settings.total_amount"
    )));
}

#[test]
fn test_zero_years_per_iter_rejected() {
    let json = SETTINGS.replace(r#""years_per_iter": 5"#, r#""years_per_iter": 0"#);
    let settings = Settings::from_json_str(&json).unwrap();

    let errors = invalid(&settings);

    assert!(errors.iter().any(|e| matches!(
        e,
        ValidationError::InvalidSetting { location, .. } if location == "years_per_iter"
    )));
}

#[test]
fn test_all_problems_reported_together() {
    let json = SETTINGS
        .replace("assessed_value", "nope_a")
        .replace(r#"{"field": "juris"}"#, r#"{"field": "nope_b"}"#);
    let settings = Settings::from_json_str(&json).unwrap();

    let errors = invalid(&settings);

    assert!(errors.len() >= 2);
    let message = SettingsError::Invalid(errors).to_string();
    assert!(message.contains("nope_a"));
    assert!(message.contains("nope_b"));
}
