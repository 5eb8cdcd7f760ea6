//! Orchestrator - yearly subsidy driver
//!
//! See `engine.rs` for the step order and `checkpoint.rs` for save/resume.

pub mod checkpoint;
pub mod engine;

// Re-export main types for convenience
pub use engine::{
    OrchestratorConfig, SimulationError, SubsidyOrchestrator, YearInputs, YearResult,
};

// Re-export checkpoint types
pub use checkpoint::{
    compute_settings_hash, validate_snapshot, AccountSnapshot, CheckpointError, CofferSnapshot,
};
