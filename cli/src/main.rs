//! Subsidy simulation driver
//!
//! Runs the yearly subsidy steps against a scenario file and prints the
//! coffer balances.
//!
//! Usage:
//!   subsidy-sim --settings settings.json --scenario scenario.json --years 4
//!
//! Environment:
//!   RUST_LOG - Log filter (default: urban_subsidy_core=info,subsidy_sim=info)

mod scenario;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use urban_subsidy_core::models::{DevelopmentForm, NewBuilding};
use urban_subsidy_core::orchestrator::{
    CofferSnapshot, OrchestratorConfig, SubsidyOrchestrator, YearInputs,
};
use urban_subsidy_core::settings::{Settings, SettingsSchema};
use urban_subsidy_core::subsidy::DeveloperCallbacks;
use urban_subsidy_core::FeasibilityTable;

use crate::scenario::{Scenario, ScenarioDeveloper, ScenarioFeasibility};

#[derive(Parser, Debug)]
#[command(name = "subsidy-sim")]
#[command(about = "Run subsidized residential development against a scenario")]
struct Args {
    /// Settings JSON (acct_settings, feasibility, residential_developer)
    #[arg(long, env = "SUBSIDY_SETTINGS")]
    settings: PathBuf,

    /// Scenario JSON (parcels, buildings, feasibility rows, demand)
    #[arg(long, env = "SUBSIDY_SCENARIO")]
    scenario: PathBuf,

    /// Number of iterations to run
    #[arg(long, default_value = "1")]
    years: u32,

    /// Resume from a snapshot written by a previous run
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Write a snapshot of the coffer after the last iteration
    #[arg(long)]
    snapshot: Option<PathBuf>,
}

/// Building type codes used by the scenario tables
fn form_to_btype(form: DevelopmentForm) -> u32 {
    match form {
        DevelopmentForm::Residential => 1,
        DevelopmentForm::MixedResidential => 3,
        DevelopmentForm::Office => 4,
        DevelopmentForm::Retail => 10,
        DevelopmentForm::Industrial => 7,
        DevelopmentForm::MixedOffice => 5,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "urban_subsidy_core=info,subsidy_sim=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let settings = Settings::from_path(&args.settings)
        .with_context(|| format!("loading settings from {}", args.settings.display()))?;
    let scenario_json = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("reading scenario {}", args.scenario.display()))?;
    let scenario: Scenario = serde_json::from_str(&scenario_json)
        .with_context(|| format!("parsing scenario {}", args.scenario.display()))?;

    let parcels = scenario.parcel_table();
    let schema = SettingsSchema::from_tables(
        &scenario.buildings,
        &parcels,
        &FeasibilityTable::new(scenario.feasibility.clone()),
    );
    let config = OrchestratorConfig {
        settings,
        start_year: scenario.start_year,
        schema,
    };

    let mut orchestrator = match &args.resume {
        Some(path) => {
            let snapshot = CofferSnapshot::load(path)
                .with_context(|| format!("loading snapshot {}", path.display()))?;
            SubsidyOrchestrator::restore(config, &snapshot).context("restoring snapshot")?
        }
        None => {
            let mut orchestrator =
                SubsidyOrchestrator::new(config).context("validating settings")?;
            orchestrator
                .summary_mut()
                .add_parcel_output(scenario.market_construction.iter().cloned());
            orchestrator
        }
    };

    let mut feasibility_model = ScenarioFeasibility::new(&scenario);
    let mut developer = ScenarioDeveloper::new(&scenario);
    let vmt_res_cat = scenario.vmt_res_cat.clone();
    let callbacks = DeveloperCallbacks::new(form_to_btype, move |building: &mut NewBuilding| {
        building
            .attributes
            .categorical
            .insert("vmt_res_cat".to_string(), vmt_res_cat.clone());
    });

    info!(
        start_year = orchestrator.current_year(),
        years = args.years,
        parcels = parcels.len(),
        "Starting subsidy run"
    );

    for _ in 0..args.years {
        let year = orchestrator.current_year();
        let result = orchestrator
            .run_year(YearInputs {
                buildings: &scenario.buildings,
                parcels: &parcels,
                feasibility_model: &mut feasibility_model,
                developer: &mut developer,
                callbacks: &callbacks,
            })
            .with_context(|| format!("running year {}", year))?;

        println!(
            "{}: property tax {:.2}, OBAG {:.2}, VMT fees {:.2}, subsidized units {}, subsidy {:.2}",
            result.year,
            result.property_tax.values().sum::<f64>(),
            result.obag_funds,
            result.vmt_fees.unwrap_or(0.0),
            result.subsidized_units(),
            result.subsidy_spent(),
        );
    }

    println!();
    for (program, account) in orchestrator.coffer().accounts() {
        println!("{} ({})", account.name(), program);
        for (subaccount, balance) in account.iter_subaccounts() {
            println!("  {:<24} {:>16.2}", subaccount, balance);
        }
    }

    if let Some(path) = &args.snapshot {
        orchestrator
            .snapshot()?
            .save(path)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        info!(path = %path.display(), "Wrote snapshot");
    }

    Ok(())
}
