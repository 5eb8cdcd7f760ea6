//! Account (ledger) model
//!
//! An account holds public funds for one program and records every posting
//! against a named subaccount. Subaccounts are created lazily by their first
//! transaction.
//!
//! # Critical Invariants
//!
//! 1. **Append-only log**: transactions are never mutated or removed
//! 2. **Balance conservation**: each subaccount balance equals the sum of the
//!    transactions posted to it, and the account total equals the sum of all
//!    subaccount balances
//! 3. **Single target**: every transaction targets exactly one subaccount

use crate::models::transaction::{
    BuildingId, SubaccountId, Transaction, TransactionError, TransactionMetadata,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur during account operations
#[derive(Debug, Error, PartialEq)]
pub enum AccountError {
    #[error("Cannot post to account '{account}': {source}")]
    InvalidTransaction {
        account: String,
        #[source]
        source: TransactionError,
    },
}

/// One flattened ledger row, for reporting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub account: String,
    pub transaction_id: String,
    pub amount: f64,
    pub subaccount: SubaccountId,
    pub description: String,
    pub year: u32,
    pub building_id: Option<BuildingId>,
    pub residential_units: Option<u32>,
}

/// A program ledger partitioned into subaccounts
///
/// # Example
/// ```
/// use urban_subsidy_core::{Account, TransactionMetadata};
///
/// let mut acct = Account::new("prop_tax_act");
/// acct.add_transaction(500.0, "Oakland", TransactionMetadata::new("Collecting property tax", 2010))
///     .unwrap();
/// acct.add_transaction(-200.0, "Oakland", TransactionMetadata::new("Developing subsidized building", 2010))
///     .unwrap();
///
/// assert_eq!(acct.total_transactions_by_subacct("Oakland"), 300.0);
/// assert_eq!(acct.iter_subaccounts().collect::<Vec<_>>(), vec![("Oakland", 300.0)]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account name (e.g. "vmt_fee_acct")
    name: String,

    /// Every posting, in the order it was made
    transactions: Vec<Transaction>,

    /// Running balance per subaccount
    ///
    /// Ordered by subaccount id so that iteration, and therefore allocation,
    /// is deterministic.
    balances: BTreeMap<SubaccountId, f64>,
}

impl Account {
    /// Create an empty account
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transactions: Vec::new(),
            balances: BTreeMap::new(),
        }
    }

    /// Rebuild an account from a previously recorded transaction log
    ///
    /// Balances are recomputed from the log, never trusted from outside.
    pub fn from_transactions(name: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        let mut balances = BTreeMap::new();
        for tx in &transactions {
            *balances.entry(tx.subaccount().to_string()).or_insert(0.0) += tx.amount();
        }
        Self {
            name: name.into(),
            transactions,
            balances,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Post a signed amount to a subaccount
    ///
    /// Creates the subaccount if this is its first transaction.
    ///
    /// # Returns
    /// The recorded transaction
    pub fn add_transaction(
        &mut self,
        amount: f64,
        subaccount: impl Into<SubaccountId>,
        metadata: TransactionMetadata,
    ) -> Result<&Transaction, AccountError> {
        let tx = Transaction::new(amount, subaccount.into(), metadata).map_err(|source| {
            AccountError::InvalidTransaction {
                account: self.name.clone(),
                source,
            }
        })?;

        *self
            .balances
            .entry(tx.subaccount().to_string())
            .or_insert(0.0) += tx.amount();
        self.transactions.push(tx);

        let last = self.transactions.len() - 1;
        Ok(&self.transactions[last])
    }

    /// Iterate `(subaccount, balance)` pairs in subaccount order
    pub fn iter_subaccounts(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.balances
            .iter()
            .map(|(id, balance)| (id.as_str(), *balance))
    }

    /// Current balance of a subaccount (zero if it has never been used)
    pub fn subaccount_balance(&self, subaccount: &str) -> f64 {
        self.balances.get(subaccount).copied().unwrap_or(0.0)
    }

    /// Sum of all transactions ever posted to a subaccount
    ///
    /// Recomputed from the log; always equals `subaccount_balance`.
    pub fn total_transactions_by_subacct(&self, subaccount: &str) -> f64 {
        self.transactions_for(subaccount).map(Transaction::amount).sum()
    }

    /// Sum of all transactions in the account
    pub fn total_transactions(&self) -> f64 {
        self.transactions.iter().map(Transaction::amount).sum()
    }

    /// Transactions posted to one subaccount, oldest first
    pub fn transactions_for<'a>(
        &'a self,
        subaccount: &'a str,
    ) -> impl Iterator<Item = &'a Transaction> + 'a {
        self.transactions
            .iter()
            .filter(move |tx| tx.subaccount() == subaccount)
    }

    /// Full transaction log, oldest first
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn num_transactions(&self) -> usize {
        self.transactions.len()
    }

    pub fn num_subaccounts(&self) -> usize {
        self.balances.len()
    }

    /// Flatten the ledger into reporting rows
    pub fn to_frame(&self) -> Vec<LedgerRow> {
        self.transactions
            .iter()
            .map(|tx| LedgerRow {
                account: self.name.clone(),
                transaction_id: tx.id().to_string(),
                amount: tx.amount(),
                subaccount: tx.subaccount().to_string(),
                description: tx.description().to_string(),
                year: tx.year(),
                building_id: tx.metadata().building_id,
                residential_units: tx.metadata().residential_units,
            })
            .collect()
    }
}
