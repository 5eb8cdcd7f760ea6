//! Urban Subsidy Core - Rust Engine
//!
//! Fund accounting and subsidized residential development for an urban
//! land-use simulation.
//!
//! # Architecture
//!
//! - **core**: Simulation clock
//! - **models**: Domain types (Account, Transaction, Coffer, feasibility and construction tables)
//! - **expr**: JSON expression DSL for filters, tax formulas and subaccount mappings
//! - **settings**: Typed settings document and schema validation
//! - **subsidy**: Yearly steps (tax, grants, fees, subsidized feasibility and developer)
//! - **orchestrator**: Yearly driver and checkpoints
//!
//! # Critical Invariants
//!
//! 1. Account balances always equal the sum of their transactions
//! 2. A subsidy step never books more than a subaccount held when it started
//! 3. Settings referencing unknown columns are rejected, never read as zero

// Module declarations
pub mod core;
pub mod expr;
pub mod models;
pub mod orchestrator;
pub mod settings;
pub mod subsidy;

// Re-exports for convenience
pub use crate::core::time::SimulationClock;
pub use models::{
    Account, AccountError, Attributes, Building, Coffer, ConstructionSummary, FeasibilityTable,
    FundingProgram, NewBuilding, Parcel, ParcelTable, Transaction, TransactionError,
    TransactionMetadata,
};
pub use orchestrator::{
    CofferSnapshot, OrchestratorConfig, SimulationError, SubsidyOrchestrator, YearInputs,
    YearResult,
};
pub use settings::{Settings, SettingsError, SettingsSchema};
pub use subsidy::{AllocationReport, DeveloperModel, FeasibilityModel, SubsidyError};

// FFI module (when feature enabled)
#[cfg(feature = "pyo3")]
pub mod ffi;

// PyO3 exports (when feature enabled)
#[cfg(feature = "pyo3")]
use pyo3::prelude::*;

#[cfg(feature = "pyo3")]
#[pymodule]
fn urban_subsidy_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<ffi::account::PyAccount>()?;
    Ok(())
}
