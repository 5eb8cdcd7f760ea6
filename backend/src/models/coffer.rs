//! Coffer: the fixed set of program accounts for one simulation run

use crate::models::account::Account;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder subaccount for regional accounts
///
/// Regional programs (OBAG, VMT fees) are not split by jurisdiction; both the
/// fee posters and the `regional` mapping field use this id.
pub const REGIONAL_SUBACCOUNT: &str = "1";

/// The funding programs that own an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingProgram {
    /// Property tax collected from sending-zone buildings
    PropertyTax,
    /// Development fees charged per unit by VMT category
    VmtFee,
    /// One Bay Area Grant regional subsidies
    Obag,
}

impl FundingProgram {
    pub const ALL: [FundingProgram; 3] = [
        FundingProgram::PropertyTax,
        FundingProgram::VmtFee,
        FundingProgram::Obag,
    ];

    /// Ledger name of the program's account
    pub fn account_name(&self) -> &'static str {
        match self {
            FundingProgram::PropertyTax => "prop_tax_act",
            FundingProgram::VmtFee => "vmt_fee_acct",
            FundingProgram::Obag => "obag_acct",
        }
    }
}

impl fmt::Display for FundingProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.account_name())
    }
}

/// All program accounts, created once at simulation start
///
/// # Example
/// ```
/// use urban_subsidy_core::{Coffer, FundingProgram};
///
/// let coffer = Coffer::new();
/// assert_eq!(coffer.account(FundingProgram::Obag).name(), "obag_acct");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coffer {
    prop_tax_acct: Account,
    vmt_fee_acct: Account,
    obag_acct: Account,
}

impl Coffer {
    pub fn new() -> Self {
        Self {
            prop_tax_acct: Account::new(FundingProgram::PropertyTax.account_name()),
            vmt_fee_acct: Account::new(FundingProgram::VmtFee.account_name()),
            obag_acct: Account::new(FundingProgram::Obag.account_name()),
        }
    }

    /// Assemble a coffer from restored accounts
    pub fn from_accounts(prop_tax_acct: Account, vmt_fee_acct: Account, obag_acct: Account) -> Self {
        Self {
            prop_tax_acct,
            vmt_fee_acct,
            obag_acct,
        }
    }

    pub fn account(&self, program: FundingProgram) -> &Account {
        match program {
            FundingProgram::PropertyTax => &self.prop_tax_acct,
            FundingProgram::VmtFee => &self.vmt_fee_acct,
            FundingProgram::Obag => &self.obag_acct,
        }
    }

    pub fn account_mut(&mut self, program: FundingProgram) -> &mut Account {
        match program {
            FundingProgram::PropertyTax => &mut self.prop_tax_acct,
            FundingProgram::VmtFee => &mut self.vmt_fee_acct,
            FundingProgram::Obag => &mut self.obag_acct,
        }
    }

    /// Iterate `(program, account)` pairs in a fixed order
    pub fn accounts(&self) -> impl Iterator<Item = (FundingProgram, &Account)> {
        FundingProgram::ALL
            .into_iter()
            .map(move |program| (program, self.account(program)))
    }
}

impl Default for Coffer {
    fn default() -> Self {
        Self::new()
    }
}
