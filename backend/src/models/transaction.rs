//! Ledger transaction model
//!
//! A transaction is one signed posting against a single subaccount.
//! Each transaction has:
//! - A unique id (UUID)
//! - Signed amount in dollars (positive = revenue, negative = expenditure)
//! - Target subaccount
//! - Metadata (description, year, optional building id and unit count)
//!
//! Transactions are append-only: once posted they are never mutated.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifier of a subaccount (usually a jurisdiction or a regional bucket)
pub type SubaccountId = String;

/// Identifier of a building in the simulation's building table
pub type BuildingId = u64;

/// Errors that can occur when constructing a transaction
#[derive(Debug, Error, PartialEq)]
pub enum TransactionError {
    #[error("Transaction amount must be finite, got {0}")]
    NonFiniteAmount(f64),

    #[error("Subaccount id must not be empty")]
    EmptySubaccount,
}

/// Metadata attached to every posting
///
/// # Example
/// ```
/// use urban_subsidy_core::TransactionMetadata;
///
/// let meta = TransactionMetadata::new("Developing subsidized building", 2025)
///     .with_building(42, 18);
/// assert_eq!(meta.building_id, Some(42));
/// assert_eq!(meta.residential_units, Some(18));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    /// Human-readable reason for the posting
    pub description: String,

    /// Simulation year the posting belongs to
    pub year: u32,

    /// Building the posting pays for (subsidy expenditures only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_id: Option<BuildingId>,

    /// Residential units in that building (subsidy expenditures only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residential_units: Option<u32>,
}

impl TransactionMetadata {
    pub fn new(description: impl Into<String>, year: u32) -> Self {
        Self {
            description: description.into(),
            year,
            building_id: None,
            residential_units: None,
        }
    }

    /// Attach the building this posting pays for
    pub fn with_building(mut self, building_id: BuildingId, residential_units: u32) -> Self {
        self.building_id = Some(building_id);
        self.residential_units = Some(residential_units);
        self
    }
}

/// A single posting in an account ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier (UUID)
    id: String,

    /// Signed amount in dollars
    amount: f64,

    /// Subaccount the amount is posted to
    subaccount: SubaccountId,

    /// Description, year and optional building details
    metadata: TransactionMetadata,
}

impl Transaction {
    /// Create a new transaction with a fresh id
    ///
    /// # Errors
    /// Rejects non-finite amounts and empty subaccount ids, since either would
    /// corrupt every balance derived from the log.
    ///
    /// # Example
    /// ```
    /// use urban_subsidy_core::{Transaction, TransactionMetadata};
    ///
    /// let tx = Transaction::new(
    ///     1_500_000.0,
    ///     "Oakland".to_string(),
    ///     TransactionMetadata::new("Collecting property tax", 2020),
    /// ).unwrap();
    /// assert_eq!(tx.amount(), 1_500_000.0);
    /// assert_eq!(tx.subaccount(), "Oakland");
    /// ```
    pub fn new(
        amount: f64,
        subaccount: SubaccountId,
        metadata: TransactionMetadata,
    ) -> Result<Self, TransactionError> {
        if !amount.is_finite() {
            return Err(TransactionError::NonFiniteAmount(amount));
        }
        if subaccount.is_empty() {
            return Err(TransactionError::EmptySubaccount);
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            amount,
            subaccount,
            metadata,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn subaccount(&self) -> &str {
        &self.subaccount
    }

    pub fn metadata(&self) -> &TransactionMetadata {
        &self.metadata
    }

    pub fn description(&self) -> &str {
        &self.metadata.description
    }

    pub fn year(&self) -> u32 {
        self.metadata.year
    }

    /// Whether this posting removes funds from the subaccount
    pub fn is_expenditure(&self) -> bool {
        self.amount < 0.0
    }
}
