//! Property tax collection
//!
//! Taxes "sending zone" buildings and posts the proceeds to an account, one
//! transaction per subaccount.

use crate::expr::{evaluate_expression, evaluate_value, resolve_subaccount, EvalContext};
use crate::models::{Account, AccountError, SubaccountId, TransactionError, TransactionMetadata};
use crate::settings::AcctSettings;
use crate::subsidy::SubsidyError;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Rows shown in the post-collection ledger sample
const LEDGER_SAMPLE_ROWS: usize = 7;

/// Tax buildings and add the tax to an account by subaccount
///
/// # Arguments
///
/// * `buildings` - One evaluation context per building, joined with parcel geography
/// * `acct_settings` - Sending filter, tax expression and subaccount mapping
/// * `account` - Account receiving the tax
/// * `year` - Current simulation year (recorded as metadata)
///
/// # Returns
///
/// Tax collected per subaccount. Nothing is posted if any building fails to
/// evaluate: a filter or formula that references a missing column is a
/// configuration error, never zero tax.
pub fn tax_buildings(
    buildings: &[EvalContext],
    acct_settings: &AcctSettings,
    account: &mut Account,
    year: u32,
) -> Result<BTreeMap<SubaccountId, f64>, SubsidyError> {
    let params = &acct_settings.parameters;
    let mut tot_tax_by_subaccount: BTreeMap<SubaccountId, f64> = BTreeMap::new();
    let mut num_taxed = 0usize;

    for building in buildings {
        if !evaluate_expression(&acct_settings.sending_buildings_filter, building, params)? {
            continue;
        }

        let tax = evaluate_value(&acct_settings.sending_buildings_tax, building, params)?;
        let subaccount = resolve_subaccount(&acct_settings.sending_buildings_subaccount_def, building)?;

        *tot_tax_by_subaccount.entry(subaccount).or_insert(0.0) += tax;
        num_taxed += 1;
    }

    if let Some(bad) = tot_tax_by_subaccount.values().find(|amt| !amt.is_finite()) {
        return Err(AccountError::InvalidTransaction {
            account: account.name().to_string(),
            source: TransactionError::NonFiniteAmount(*bad),
        }
        .into());
    }

    for (subacct, amt) in &tot_tax_by_subaccount {
        let metadata = TransactionMetadata::new("Collecting property tax", year);
        account.add_transaction(*amt, subacct.clone(), metadata)?;
    }

    info!(
        year,
        buildings = num_taxed,
        subaccounts = tot_tax_by_subaccount.len(),
        total = tot_tax_by_subaccount.values().sum::<f64>(),
        "Collected property tax"
    );
    log_ledger_sample(account);

    Ok(tot_tax_by_subaccount)
}

/// Log the largest postings in the account
fn log_ledger_sample(account: &Account) {
    let mut rows = account.to_frame();
    rows.sort_by(|a, b| b.amount.total_cmp(&a.amount));
    for row in rows.iter().take(LEDGER_SAMPLE_ROWS) {
        debug!(
            account = %row.account,
            subaccount = %row.subaccount,
            amount = row.amount,
            year = row.year,
            "Property tax ledger sample"
        );
    }
}
