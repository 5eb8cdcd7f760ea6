//! Checkpoint - Save/Load Coffer State
//!
//! Serializes the ledgers, the construction summary and the clock so a
//! multi-year run can be resumed.
//!
//! # Critical Invariants
//!
//! - **Ledger is the source of truth**: balances are rebuilt from the
//!   transaction logs on restore, never stored
//! - **Settings Matching**: a snapshot can only be restored with the settings
//!   it was taken under
//! - **Complete Coffer**: every program account is present exactly once

use crate::core::time::SimulationClock;
use crate::models::{Account, Coffer, ConstructionSummary, FundingProgram, NewBuilding, Transaction};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while saving, loading or restoring a snapshot
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to access snapshot file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot was taken with different settings (expected hash {expected}, found {found})")]
    SettingsMismatch { expected: String, found: String },

    #[error("Invalid snapshot: {0}")]
    Invalid(String),
}

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete coffer snapshot
///
/// Captures everything a resumed run needs besides the simulation's own
/// tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CofferSnapshot {
    /// Year the next iteration will run
    pub year: u32,

    pub years_per_iter: u32,

    /// Transaction logs of every program account
    pub accounts: Vec<AccountSnapshot>,

    /// Construction summary to date
    pub parcel_output: Vec<NewBuilding>,

    /// SHA256 hash of the settings (for validation)
    pub settings_hash: String,
}

/// One account's transaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub name: String,
    pub transactions: Vec<Transaction>,
}

impl From<&Account> for AccountSnapshot {
    fn from(account: &Account) -> Self {
        AccountSnapshot {
            name: account.name().to_string(),
            transactions: account.transactions().to_vec(),
        }
    }
}

impl From<AccountSnapshot> for Account {
    fn from(snapshot: AccountSnapshot) -> Self {
        Account::from_transactions(snapshot.name, snapshot.transactions)
    }
}

impl CofferSnapshot {
    /// Capture the current coffer state
    pub fn capture<S: Serialize>(
        clock: &SimulationClock,
        coffer: &Coffer,
        summary: &ConstructionSummary,
        settings: &S,
    ) -> Result<Self, CheckpointError> {
        Ok(Self {
            year: clock.current_year(),
            years_per_iter: clock.years_per_iter(),
            accounts: coffer.accounts().map(|(_, a)| AccountSnapshot::from(a)).collect(),
            parcel_output: summary.parcel_output().to_vec(),
            settings_hash: compute_settings_hash(settings)?,
        })
    }

    pub fn to_json(&self) -> Result<String, CheckpointError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, CheckpointError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the snapshot as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| CheckpointError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Fail unless the snapshot was taken under `settings`
    pub fn verify_settings<S: Serialize>(&self, settings: &S) -> Result<(), CheckpointError> {
        let expected = compute_settings_hash(settings)?;
        if expected != self.settings_hash {
            return Err(CheckpointError::SettingsMismatch {
                expected,
                found: self.settings_hash.clone(),
            });
        }
        Ok(())
    }

    pub fn clock(&self) -> SimulationClock {
        SimulationClock::new(self.year, self.years_per_iter)
    }

    /// Rebuild the coffer; balances are recomputed from the logs
    pub fn restore_coffer(&self) -> Result<Coffer, CheckpointError> {
        validate_snapshot(self)?;

        let take = |program: FundingProgram| -> Result<Account, CheckpointError> {
            self.accounts
                .iter()
                .find(|a| a.name == program.account_name())
                .cloned()
                .map(Account::from)
                .ok_or_else(|| {
                    CheckpointError::Invalid(format!("missing account {}", program.account_name()))
                })
        };

        Ok(Coffer::from_accounts(
            take(FundingProgram::PropertyTax)?,
            take(FundingProgram::VmtFee)?,
            take(FundingProgram::Obag)?,
        ))
    }

    pub fn restore_summary(&self) -> ConstructionSummary {
        let mut summary = ConstructionSummary::new();
        summary.add_parcel_output(self.parcel_output.iter().cloned());
        summary
    }
}

// ============================================================================
// Settings Hashing
// ============================================================================

/// Compute deterministic SHA256 hash of the settings
///
/// Serializes through `serde_json::Value` with every object's keys sorted,
/// so `HashMap` iteration order never changes the hash.
pub fn compute_settings_hash<T: Serialize>(settings: &T) -> Result<String, CheckpointError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let canonical = canonicalize(serde_json::to_value(settings)?);
    let json = serde_json::to_string(&canonical)?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation
// ============================================================================

/// Validate snapshot integrity
///
/// Checks:
/// - A positive iteration length
/// - Exactly one log per program account, and no unknown accounts
/// - Transaction ids unique across the coffer
pub fn validate_snapshot(snapshot: &CofferSnapshot) -> Result<(), CheckpointError> {
    if snapshot.years_per_iter == 0 {
        return Err(CheckpointError::Invalid(
            "years_per_iter must be positive".to_string(),
        ));
    }

    for program in FundingProgram::ALL {
        let count = snapshot
            .accounts
            .iter()
            .filter(|a| a.name == program.account_name())
            .count();
        if count != 1 {
            return Err(CheckpointError::Invalid(format!(
                "expected one {} log, found {}",
                program.account_name(),
                count
            )));
        }
    }
    if let Some(unknown) = snapshot.accounts.iter().find(|a| {
        !FundingProgram::ALL
            .iter()
            .any(|p| p.account_name() == a.name)
    }) {
        return Err(CheckpointError::Invalid(format!(
            "unknown account {}",
            unknown.name
        )));
    }

    let mut seen = HashSet::new();
    for account in &snapshot.accounts {
        for tx in &account.transactions {
            if !seen.insert(tx.id()) {
                return Err(CheckpointError::Invalid(format!(
                    "duplicate transaction {} in {}",
                    tx.id(),
                    account.name
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TransactionMetadata;
    use std::collections::HashMap;

    fn funded_coffer() -> Coffer {
        let mut coffer = Coffer::new();
        coffer
            .account_mut(FundingProgram::Obag)
            .add_transaction(1_000.0, "1", TransactionMetadata::new("OBAG regional subsidies", 2010))
            .unwrap();
        coffer
    }

    #[test]
    fn test_settings_hash_ignores_map_order() {
        let mut a = HashMap::new();
        let mut b = HashMap::new();
        for i in 0..20 {
            a.insert(format!("k{}", i), i);
        }
        for i in (0..20).rev() {
            b.insert(format!("k{}", i), i);
        }
        assert_eq!(
            compute_settings_hash(&a).unwrap(),
            compute_settings_hash(&b).unwrap()
        );
        a.insert("extra".to_string(), 1);
        assert_ne!(
            compute_settings_hash(&a).unwrap(),
            compute_settings_hash(&b).unwrap()
        );
    }

    #[test]
    fn test_restore_rebuilds_balances() {
        let clock = SimulationClock::new(2015, 5);
        let snapshot =
            CofferSnapshot::capture(&clock, &funded_coffer(), &ConstructionSummary::new(), &"s")
                .unwrap();

        let restored = CofferSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        let coffer = restored.restore_coffer().unwrap();

        assert_eq!(coffer.account(FundingProgram::Obag).subaccount_balance("1"), 1_000.0);
        assert_eq!(coffer.account(FundingProgram::VmtFee).num_transactions(), 0);
        assert_eq!(restored.clock(), clock);
    }

    #[test]
    fn test_settings_mismatch_rejected() {
        let snapshot = CofferSnapshot::capture(
            &SimulationClock::new(2015, 1),
            &Coffer::new(),
            &ConstructionSummary::new(),
            &"original",
        )
        .unwrap();

        assert!(snapshot.verify_settings(&"original").is_ok());
        assert!(matches!(
            snapshot.verify_settings(&"edited"),
            Err(CheckpointError::SettingsMismatch { .. })
        ));
    }

    #[test]
    fn test_duplicate_transactions_rejected() {
        let mut snapshot = CofferSnapshot::capture(
            &SimulationClock::new(2015, 1),
            &funded_coffer(),
            &ConstructionSummary::new(),
            &"s",
        )
        .unwrap();
        let obag = snapshot
            .accounts
            .iter_mut()
            .find(|a| a.name == "obag_acct")
            .unwrap();
        let copy = obag.transactions[0].clone();
        obag.transactions.push(copy);

        assert!(matches!(
            snapshot.restore_coffer(),
            Err(CheckpointError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_account_rejected() {
        let mut snapshot = CofferSnapshot::capture(
            &SimulationClock::new(2015, 1),
            &Coffer::new(),
            &ConstructionSummary::new(),
            &"s",
        )
        .unwrap();
        snapshot.accounts.retain(|a| a.name != "vmt_fee_acct");

        assert!(snapshot.restore_coffer().is_err());
    }
}
