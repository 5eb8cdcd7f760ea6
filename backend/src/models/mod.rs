//! Domain models for the subsidy simulation

pub mod account;
pub mod attributes;
pub mod coffer;
pub mod feasibility;
pub mod parcel;
pub mod summary;
pub mod transaction;

// Re-exports
pub use account::{Account, AccountError, LedgerRow};
pub use attributes::Attributes;
pub use coffer::{Coffer, FundingProgram, REGIONAL_SUBACCOUNT};
pub use feasibility::{DevelopmentForm, FeasibilityRow, FeasibilityTable};
pub use parcel::{Building, Parcel, ParcelId, ParcelTable};
pub use summary::{ConstructionSummary, NewBuilding};
pub use transaction::{BuildingId, SubaccountId, Transaction, TransactionError, TransactionMetadata};
