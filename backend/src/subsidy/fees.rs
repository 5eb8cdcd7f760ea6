//! Grant and fee revenue
//!
//! Both programs post to the regional subaccount: OBAG as a yearly lump sum,
//! VMT as a per-unit fee on new, unsubsidized construction.

use crate::models::{Account, ConstructionSummary, TransactionMetadata, REGIONAL_SUBACCOUNT};
use crate::settings::ProgramSettings;
use crate::subsidy::SubsidyError;
use tracing::{debug, info};

/// Post one iteration's OBAG funding to the regional subaccount
///
/// # Returns
///
/// The amount posted, `total_amount * years_per_iter`
///
/// # Example
///
/// ```rust
/// use urban_subsidy_core::models::Account;
/// use urban_subsidy_core::settings::ProgramSettings;
/// use urban_subsidy_core::subsidy::add_obag_funds;
///
/// let settings: ProgramSettings = serde_json::from_str(
///     r#"{"sending_buildings_subaccount_def": {"value": 1}, "total_amount": 1000000}"#,
/// ).unwrap();
/// let mut account = Account::new("obag_acct");
///
/// let posted = add_obag_funds(&settings, &mut account, 2015, 5).unwrap();
/// assert_eq!(posted, 5_000_000.0);
/// assert_eq!(account.subaccount_balance("1"), 5_000_000.0);
/// ```
pub fn add_obag_funds(
    settings: &ProgramSettings,
    account: &mut Account,
    year: u32,
    years_per_iter: u32,
) -> Result<f64, SubsidyError> {
    let total_amount = settings.total_amount.ok_or_else(|| {
        SubsidyError::MissingSetting("acct_settings.obag_settings.total_amount".to_string())
    })?;
    let amt = total_amount * years_per_iter as f64;

    let metadata = TransactionMetadata::new("OBAG regional subsidies", year);
    account.add_transaction(amt, REGIONAL_SUBACCOUNT, metadata)?;

    info!(year, amount = amt, "Added OBAG regional subsidies");
    Ok(amt)
}

/// Charge VMT fees on buildings completed in the current window
///
/// Qualifying buildings were built in `[year, year + years_per_iter)` and are
/// not subsidized. Each pays `units * fee_amounts[category]`; categories
/// without a fee pay nothing.
///
/// # Returns
///
/// The amount posted, or `None` when no building qualified (nothing is
/// posted in that case)
///
/// # Errors
///
/// A qualifying building without the category column is a data error.
pub fn calculate_vmt_fees(
    settings: &ProgramSettings,
    summary: &ConstructionSummary,
    account: &mut Account,
    year: u32,
    years_per_iter: u32,
) -> Result<Option<f64>, SubsidyError> {
    let window_end = year.saturating_add(years_per_iter);
    let field = settings.fee_category_field.as_str();

    let mut num_buildings = 0usize;
    let mut num_units = 0u64;
    let mut total_vmt_fees = 0.0;

    for building in summary
        .built_between(year, window_end)
        .filter(|b| !b.subsidized)
    {
        let category = building.attributes.category(field).ok_or_else(|| {
            SubsidyError::MissingFeeCategory {
                building_id: building.building_id,
                field: field.to_string(),
            }
        })?;

        let fee = settings.fee_amounts.get(category).copied().unwrap_or(0.0);
        total_vmt_fees += fee * building.residential_units as f64;
        num_buildings += 1;
        num_units += building.residential_units as u64;
    }

    debug!(year, projects = num_buildings, "Projects pass the VMT filter");
    if num_buildings == 0 {
        return Ok(None);
    }

    let metadata = TransactionMetadata::new("VMT development fees", year);
    account.add_transaction(total_vmt_fees, REGIONAL_SUBACCOUNT, metadata)?;

    info!(
        year,
        units = num_units,
        amount = total_vmt_fees,
        "Added VMT development fees"
    );
    Ok(Some(total_vmt_fees))
}
