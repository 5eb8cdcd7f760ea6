//! Orchestrator Engine
//!
//! Yearly driver for the subsidy steps. Owns the settings, clock, coffer and
//! construction summary; the surrounding land-use simulation supplies its
//! tables and collaborator models each year.
//!
//! # Architecture
//!
//! ```text
//! For each iteration (year):
//! 1. Collect property tax        (prop_tax_acct)
//! 2. Add OBAG funds              (obag_acct)
//! 3. Charge VMT fees             (vmt_fee_acct)
//! 4. Run subsidized feasibility  (keeps unprofitable projects)
//! 5. Subsidized developer, VMT   (spends vmt_fee_acct)
//! 6. Subsidized developer, OBAG  (spends obag_acct)
//! 7. Release the feasibility table
//! 8. Advance the clock by years_per_iter
//! ```
//!
//! Property tax is collected but not spent by either developer step.
//!
//! # Example
//!
//! ```rust,ignore
//! use urban_subsidy_core::orchestrator::{OrchestratorConfig, SubsidyOrchestrator, YearInputs};
//!
//! let mut orchestrator = SubsidyOrchestrator::new(config)?;
//!
//! for _ in 0..4 {
//!     let result = orchestrator.run_year(YearInputs {
//!         buildings: &buildings,
//!         parcels: &parcels,
//!         feasibility_model: &mut feasibility_model,
//!         developer: &mut developer,
//!         callbacks: &callbacks,
//!     })?;
//!     println!("{}: {} subsidized units", result.year, result.subsidized_units());
//! }
//! ```

use crate::core::time::SimulationClock;
use crate::expr::EvalContext;
use crate::models::{
    Building, Coffer, ConstructionSummary, FeasibilityTable, FundingProgram, ParcelTable,
    SubaccountId,
};
use crate::orchestrator::checkpoint::{CheckpointError, CofferSnapshot};
use crate::settings::{AcctSettings, ProgramSettings, Settings, SettingsError, SettingsSchema};
use crate::subsidy::{
    self, AllocationReport, DeveloperCallbacks, DeveloperModel, FeasibilityModel, SubsidyError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

// ============================================================================
// Configuration
// ============================================================================

/// Everything needed to start a run
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub settings: Settings,

    /// First simulated year
    pub start_year: u32,

    /// Columns the simulation tables carry; settings are validated against it
    pub schema: SettingsSchema,
}

/// Tables and collaborators the simulation supplies for one iteration
pub struct YearInputs<'a> {
    /// Buildings standing at the start of the year
    pub buildings: &'a [Building],

    pub parcels: &'a ParcelTable,

    pub feasibility_model: &'a mut dyn FeasibilityModel,

    pub developer: &'a mut dyn DeveloperModel,

    pub callbacks: &'a DeveloperCallbacks,
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Yearly driver owning the coffer
///
/// The coffer is created once and threaded through every step; nothing is
/// global. Steps may be called individually (for a simulation that
/// interleaves its own models) or together via [`run_year`].
///
/// [`run_year`]: SubsidyOrchestrator::run_year
pub struct SubsidyOrchestrator {
    settings: Settings,

    clock: SimulationClock,

    coffer: Coffer,

    /// Every building completed during the run
    summary: ConstructionSummary,

    /// Result of the subsidized feasibility step, until released
    feasibility: Option<FeasibilityTable>,
}

/// Result of one iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct YearResult {
    pub year: u32,

    /// Property tax collected by subaccount
    pub property_tax: BTreeMap<SubaccountId, f64>,

    pub obag_funds: f64,

    /// `None` when no building owed VMT fees
    pub vmt_fees: Option<f64>,

    /// Rows returned by the subsidized feasibility step
    pub feasibility_rows: usize,

    pub vmt_allocation: AllocationReport,

    pub obag_allocation: AllocationReport,
}

impl YearResult {
    pub fn subsidized_units(&self) -> u64 {
        self.vmt_allocation.total_units() + self.obag_allocation.total_units()
    }

    pub fn subsidy_spent(&self) -> f64 {
        self.vmt_allocation.total_spent() + self.obag_allocation.total_spent()
    }
}

/// Simulation error types
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Step '{step}' failed: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: SubsidyError,
    },

    #[error("Subsidized feasibility has not been run for {0}")]
    FeasibilityNotComputed(u32),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

/// Attach the step name to a step error
fn step_err(step: &'static str) -> impl FnOnce(SubsidyError) -> SimulationError {
    move |source| SimulationError::Step { step, source }
}

impl SubsidyOrchestrator {
    /// Create an orchestrator with an empty coffer
    ///
    /// # Errors
    ///
    /// Settings that fail validation against `config.schema` are rejected
    /// before any step runs.
    pub fn new(config: OrchestratorConfig) -> Result<Self, SimulationError> {
        Self::validate_config(&config)?;

        info!(
            start_year = config.start_year,
            years_per_iter = config.settings.years_per_iter,
            "Created subsidy coffer"
        );

        Ok(Self {
            clock: SimulationClock::new(config.start_year, config.settings.years_per_iter),
            settings: config.settings,
            coffer: Coffer::new(),
            summary: ConstructionSummary::new(),
            feasibility: None,
        })
    }

    /// Resume a run from a snapshot
    ///
    /// The snapshot must have been taken under the same settings.
    /// `config.start_year` is ignored in favour of the snapshot's year.
    pub fn restore(config: OrchestratorConfig, snapshot: &CofferSnapshot) -> Result<Self, SimulationError> {
        Self::validate_config(&config)?;
        snapshot.verify_settings(&config.settings)?;

        let coffer = snapshot.restore_coffer()?;
        info!(year = snapshot.year, "Restored subsidy coffer");

        Ok(Self {
            clock: snapshot.clock(),
            settings: config.settings,
            coffer,
            summary: snapshot.restore_summary(),
            feasibility: None,
        })
    }

    fn validate_config(config: &OrchestratorConfig) -> Result<(), SimulationError> {
        if config.settings.years_per_iter == 0 {
            return Err(SimulationError::InvalidConfig(
                "years_per_iter must be positive".to_string(),
            ));
        }
        config.settings.validate(&config.schema)?;
        Ok(())
    }

    /// Snapshot the coffer, summary and clock
    pub fn snapshot(&self) -> Result<CofferSnapshot, SimulationError> {
        Ok(CofferSnapshot::capture(
            &self.clock,
            &self.coffer,
            &self.summary,
            &self.settings,
        )?)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    pub fn current_year(&self) -> u32 {
        self.clock.current_year()
    }

    pub fn coffer(&self) -> &Coffer {
        &self.coffer
    }

    pub fn coffer_mut(&mut self) -> &mut Coffer {
        &mut self.coffer
    }

    pub fn summary(&self) -> &ConstructionSummary {
        &self.summary
    }

    /// Construction summary, for unsubsidized developer models to append to
    pub fn summary_mut(&mut self) -> &mut ConstructionSummary {
        &mut self.summary
    }

    pub fn feasibility(&self) -> Option<&FeasibilityTable> {
        self.feasibility.as_ref()
    }

    // ========================================================================
    // Steps
    // ========================================================================

    /// Collect property tax from buildings into `prop_tax_acct`
    pub fn calc_prop_taxes(
        &mut self,
        buildings: &[Building],
        parcels: &ParcelTable,
    ) -> Result<BTreeMap<SubaccountId, f64>, SimulationError> {
        let contexts: Vec<EvalContext> = buildings
            .iter()
            .map(|b| EvalContext::for_building(b, parcels.get(b.parcel_id)))
            .collect();

        subsidy::tax_buildings(
            &contexts,
            &self.settings.acct_settings,
            self.coffer.account_mut(FundingProgram::PropertyTax),
            self.clock.current_year(),
        )
        .map_err(step_err("calc_prop_taxes"))
    }

    pub fn add_obag_funds(&mut self) -> Result<f64, SimulationError> {
        subsidy::add_obag_funds(
            &self.settings.acct_settings.obag_settings,
            self.coffer.account_mut(FundingProgram::Obag),
            self.clock.current_year(),
            self.clock.years_per_iter(),
        )
        .map_err(step_err("add_obag_funds"))
    }

    pub fn calculate_vmt_fees(&mut self) -> Result<Option<f64>, SimulationError> {
        subsidy::calculate_vmt_fees(
            &self.settings.acct_settings.vmt_settings,
            &self.summary,
            self.coffer.account_mut(FundingProgram::VmtFee),
            self.clock.current_year(),
            self.clock.years_per_iter(),
        )
        .map_err(step_err("calculate_vmt_fees"))
    }

    /// Run feasibility with unprofitable projects kept and hold the result
    pub fn subsidized_residential_feasibility(
        &mut self,
        model: &mut dyn FeasibilityModel,
        parcels: &ParcelTable,
    ) -> Result<&FeasibilityTable, SimulationError> {
        let table = subsidy::subsidized_residential_feasibility(model, parcels, &self.settings.feasibility)
            .map_err(step_err("subsidized_residential_feasibility"))?;
        Ok(self.feasibility.insert(table))
    }

    /// Spend the VMT fee account on subsidized housing
    pub fn subsidized_residential_developer_vmt(
        &mut self,
        parcels: &ParcelTable,
        developer: &mut dyn DeveloperModel,
        callbacks: &DeveloperCallbacks,
    ) -> Result<AllocationReport, SimulationError> {
        self.run_program(
            "subsidized_residential_developer_vmt",
            FundingProgram::VmtFee,
            |acct| &acct.vmt_settings,
            parcels,
            developer,
            callbacks,
        )
    }

    /// Spend the OBAG account on subsidized housing
    pub fn subsidized_residential_developer_obag(
        &mut self,
        parcels: &ParcelTable,
        developer: &mut dyn DeveloperModel,
        callbacks: &DeveloperCallbacks,
    ) -> Result<AllocationReport, SimulationError> {
        self.run_program(
            "subsidized_residential_developer_obag",
            FundingProgram::Obag,
            |acct| &acct.obag_settings,
            parcels,
            developer,
            callbacks,
        )
    }

    fn run_program(
        &mut self,
        step: &'static str,
        program: FundingProgram,
        program_settings: fn(&AcctSettings) -> &ProgramSettings,
        parcels: &ParcelTable,
        developer: &mut dyn DeveloperModel,
        callbacks: &DeveloperCallbacks,
    ) -> Result<AllocationReport, SimulationError> {
        let year = self.clock.current_year();
        let feasibility = self
            .feasibility
            .as_ref()
            .ok_or(SimulationError::FeasibilityNotComputed(year))?;

        subsidy::run_subsidized_developer(
            feasibility,
            parcels,
            program_settings(&self.settings.acct_settings),
            &self.settings.residential_developer,
            self.coffer.account_mut(program),
            year,
            developer,
            callbacks,
            &mut self.summary,
        )
        .map_err(step_err(step))
    }

    /// Drop the feasibility table once both developer steps have run
    pub fn release_feasibility(&mut self) {
        self.feasibility = None;
    }

    /// Run one iteration and advance the clock
    ///
    /// Any step error aborts the iteration; the clock is not advanced and
    /// the feasibility table is released.
    pub fn run_year(&mut self, inputs: YearInputs<'_>) -> Result<YearResult, SimulationError> {
        let year = self.clock.current_year();
        let result = self.run_steps(inputs);
        self.release_feasibility();
        let result = result?;

        info!(
            year,
            units = result.subsidized_units(),
            subsidy = result.subsidy_spent(),
            "Finished subsidy year"
        );

        self.clock.advance();
        Ok(result)
    }

    fn run_steps(&mut self, inputs: YearInputs<'_>) -> Result<YearResult, SimulationError> {
        let year = self.clock.current_year();

        let property_tax = self.calc_prop_taxes(inputs.buildings, inputs.parcels)?;
        let obag_funds = self.add_obag_funds()?;
        let vmt_fees = self.calculate_vmt_fees()?;
        let feasibility_rows = self
            .subsidized_residential_feasibility(inputs.feasibility_model, inputs.parcels)?
            .len();

        let vmt_allocation =
            self.subsidized_residential_developer_vmt(inputs.parcels, inputs.developer, inputs.callbacks)?;
        let obag_allocation =
            self.subsidized_residential_developer_obag(inputs.parcels, inputs.developer, inputs.callbacks)?;

        Ok(YearResult {
            year,
            property_tax,
            obag_funds,
            vmt_fees,
            feasibility_rows,
            vmt_allocation,
            obag_allocation,
        })
    }
}

impl std::fmt::Debug for SubsidyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsidyOrchestrator")
            .field("current_year", &self.clock.current_year())
            .field("years_per_iter", &self.clock.years_per_iter())
            .field("buildings_built", &self.summary.len())
            .field("feasibility_rows", &self.feasibility.as_ref().map(FeasibilityTable::len))
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
