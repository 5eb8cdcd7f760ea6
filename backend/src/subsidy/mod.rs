//! Subsidy steps
//!
//! Revenue in (property tax, OBAG grants, VMT fees) and expenditure out
//! (the subsidized residential developer).
//!
//! - **tax**: per-building property tax collected by subaccount
//! - **fees**: OBAG lump sums and VMT per-unit development fees
//! - **feasibility**: re-runs feasibility keeping unprofitable projects
//! - **allocator**: funds the cheapest-per-unit projects each subaccount can afford
//! - **collaborators**: traits for the feasibility and developer models

pub mod allocator;
pub mod collaborators;
pub mod feasibility;
pub mod fees;
pub mod tax;

use crate::expr::EvalError;
use crate::models::{AccountError, ParcelId, SubaccountId};
use thiserror::Error;

pub use allocator::{
    affordable_prefix_len, prepare_candidates, rank_candidates, run_subsidized_developer,
    AllocationReport, SubaccountOutcome, SubsidyCandidate,
};
pub use collaborators::{
    CollaboratorError, DeveloperCallbacks, DeveloperModel, DeveloperRequest, FeasibilityModel,
};
pub use feasibility::subsidized_residential_feasibility;
pub use fees::{add_obag_funds, calculate_vmt_fees};
pub use tax::tax_buildings;

/// Errors raised by a subsidy step
///
/// Every variant is fatal for the step; the yearly driver decides whether to
/// abort the run.
#[derive(Debug, Error)]
pub enum SubsidyError {
    #[error("Expression evaluation failed: {0}")]
    Eval(#[from] EvalError),

    #[error("Ledger error: {0}")]
    Account(#[from] AccountError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("Missing setting: {0}")]
    MissingSetting(String),

    #[error("New building {building_id} has no '{field}' column")]
    MissingFeeCategory { building_id: u64, field: String },

    #[error("Developer built on parcel {parcel_id}, which was not submitted for subaccount {subaccount}")]
    UnexpectedBuilding {
        parcel_id: ParcelId,
        subaccount: SubaccountId,
    },

    #[error("Developer returned parcel {parcel_id} more than once for subaccount {subaccount}")]
    DuplicateBuilding {
        parcel_id: ParcelId,
        subaccount: SubaccountId,
    },

    #[error("Developer changed max_profit on parcel {parcel_id} from {expected:.2} to {found:.2}")]
    ProfitMismatch {
        parcel_id: ParcelId,
        expected: f64,
        found: f64,
    },

    #[error("Subsidy of {requested:.2} exceeds subaccount {subaccount} balance of {available:.2}")]
    BudgetExceeded {
        subaccount: SubaccountId,
        requested: f64,
        available: f64,
    },
}
