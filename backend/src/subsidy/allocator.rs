//! Subsidized residential developer
//!
//! Funds unprofitable residential projects from an account. Every subaccount
//! buys the cheapest-per-unit projects it can afford with the balance it held
//! when the step started; the developer model then decides how many of those
//! are actually built (it may be demand constrained), and only built projects
//! are charged.
//!
//! # Algorithm
//!
//! 1. Keep feasibility rows with finite, negative `max_profit`
//! 2. Derive `residential_units` from the parcel's average unit size and drop
//!    rows that would not add units to the parcel
//! 3. `subsidy_per_unit = max_profit / residential_units`
//! 4. Apply the receiving filter and assign each candidate a subaccount
//! 5. Per subaccount: rank by `subsidy_per_unit` descending, take the longest
//!    prefix whose cumulative cost fits the balance, hand it to the developer
//!    and book one expenditure per building returned

use crate::expr::{evaluate_expression, resolve_subaccount, EvalContext};
use crate::models::{
    Account, AccountError, ConstructionSummary, DevelopmentForm, FeasibilityRow,
    FeasibilityTable, NewBuilding, Parcel, ParcelId, ParcelTable, SubaccountId,
    TransactionError, TransactionMetadata,
};
use crate::settings::ProgramSettings;
use crate::subsidy::collaborators::{DeveloperCallbacks, DeveloperModel, DeveloperRequest};
use crate::subsidy::SubsidyError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Numeric columns every candidate row carries
///
/// Receiving filters and subaccount mappings may reference these in addition
/// to the feasibility attributes and parcel geography.
pub const CANDIDATE_NUMERIC_FIELDS: [&str; 11] = [
    "parcel_id",
    "residential_sqft",
    "non_residential_sqft",
    "building_sqft",
    "max_profit",
    "parcel_size",
    "ave_sqft_per_unit",
    "residential_units",
    "total_residential_units",
    "subsidy_per_unit",
    "regional",
];

/// Column the developer model reads unit counts from
pub const UNIT_FIELD: &str = "residential_units";

/// Slack allowed when comparing a developer's booked cost to the balance
///
/// The developer may return buildings in a different order than they were
/// submitted, so the float sums can differ in the last bits.
const BUDGET_TOLERANCE: f64 = 1e-6;

/// An unprofitable residential project eligible for a subsidy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsidyCandidate {
    /// The feasibility row, with parcel geography joined
    pub row: FeasibilityRow,

    /// Units the project would deliver
    pub residential_units: u32,

    /// Units already on the parcel
    pub existing_units: u32,

    pub ave_sqft_per_unit: f64,

    /// `max_profit / residential_units`; negative
    pub subsidy_per_unit: f64,

    /// Subaccount that would pay the subsidy
    pub subaccount: SubaccountId,
}

impl SubsidyCandidate {
    pub fn parcel_id(&self) -> ParcelId {
        self.row.parcel_id
    }

    pub fn max_profit(&self) -> f64 {
        self.row.max_profit
    }

    /// Subsidy needed to make the project break even
    pub fn subsidy_cost(&self) -> f64 {
        -self.row.max_profit
    }
}

/// Outcome of one subaccount in one allocator call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubaccountOutcome {
    pub subaccount: SubaccountId,

    /// Balance at the start of the call
    pub balance: f64,

    /// Candidates assigned to this subaccount
    pub candidates: usize,

    /// Candidates within budget, submitted to the developer
    pub selected: usize,

    /// Buildings the developer actually built
    pub built: usize,

    pub units: u64,

    /// Subsidy booked (positive dollars)
    pub spent: f64,
}

/// Per-subaccount outcome of one allocator call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub year: u32,
    pub outcomes: Vec<SubaccountOutcome>,
}

impl AllocationReport {
    fn new(year: u32) -> Self {
        Self {
            year,
            outcomes: Vec::new(),
        }
    }

    pub fn total_spent(&self) -> f64 {
        self.outcomes.iter().map(|o| o.spent).sum()
    }

    pub fn total_units(&self) -> u64 {
        self.outcomes.iter().map(|o| o.units).sum()
    }

    pub fn buildings_built(&self) -> usize {
        self.outcomes.iter().map(|o| o.built).sum()
    }

    pub fn outcome(&self, subaccount: &str) -> Option<&SubaccountOutcome> {
        self.outcomes.iter().find(|o| o.subaccount == subaccount)
    }
}

/// Build the evaluation context for a candidate row
fn candidate_context(
    row: &FeasibilityRow,
    parcel: &Parcel,
    residential_units: u32,
    subsidy_per_unit: f64,
) -> EvalContext {
    let mut context = EvalContext::new()
        .with_number("parcel_id", row.parcel_id as f64)
        .with_number("residential_sqft", row.residential_sqft)
        .with_number("non_residential_sqft", row.non_residential_sqft)
        .with_number("building_sqft", row.building_sqft)
        .with_number("max_profit", row.max_profit)
        .with_number("residential_units", residential_units as f64)
        .with_number("subsidy_per_unit", subsidy_per_unit)
        .with_number("regional", 1.0);
    context.join_attributes(&row.attributes);
    context.join_parcel(parcel);
    context
}

/// Turn feasibility rows into subsidy candidates
///
/// Rows that are profitable, have non-finite profit, sit on an unknown
/// parcel, or would not add units to their parcel are dropped. Rows failing
/// the receiving filter are dropped. The remaining rows keep their input
/// order.
///
/// # Errors
///
/// A filter or subaccount mapping that cannot be evaluated (missing column,
/// unknown parameter) aborts the step.
pub fn prepare_candidates(
    feasibility: &FeasibilityTable,
    parcels: &ParcelTable,
    settings: &ProgramSettings,
) -> Result<Vec<SubsidyCandidate>, SubsidyError> {
    let mut candidates = Vec::new();
    let mut num_unknown_parcel = 0usize;

    for row in feasibility.for_form(DevelopmentForm::Residential) {
        if !row.max_profit.is_finite() || row.max_profit >= 0.0 {
            continue;
        }

        let parcel = match parcels.get(row.parcel_id) {
            Some(parcel)
                if parcel.ave_sqft_per_unit.is_finite() && parcel.ave_sqft_per_unit > 0.0 =>
            {
                parcel
            }
            _ => {
                num_unknown_parcel += 1;
                continue;
            }
        };

        let units = (row.residential_sqft / parcel.ave_sqft_per_unit).floor();
        if !units.is_finite() || units <= parcel.total_residential_units as f64 {
            continue;
        }
        let residential_units = units.min(u32::MAX as f64) as u32;
        let subsidy_per_unit = row.max_profit / residential_units as f64;

        let context = candidate_context(row, parcel, residential_units, subsidy_per_unit);

        if let Some(filter) = &settings.receiving_buildings_filter {
            if !evaluate_expression(filter, &context, &settings.parameters)? {
                continue;
            }
        }

        let subaccount = resolve_subaccount(&settings.sending_buildings_subaccount_def, &context)?;

        let mut row = row.clone();
        row.attributes.join(&parcel.geography);

        candidates.push(SubsidyCandidate {
            row,
            residential_units,
            existing_units: parcel.total_residential_units,
            ave_sqft_per_unit: parcel.ave_sqft_per_unit,
            subsidy_per_unit,
            subaccount,
        });
    }

    if num_unknown_parcel > 0 {
        debug!(
            rows = num_unknown_parcel,
            "Dropped subsidy rows without a usable parcel unit size"
        );
    }

    Ok(candidates)
}

/// Sort candidates cheapest subsidy per unit first
///
/// `subsidy_per_unit` is negative, so this is a descending sort. The sort is
/// stable: ties keep their input order.
pub fn rank_candidates(candidates: &mut [SubsidyCandidate]) {
    candidates.sort_by(|a, b| b.subsidy_per_unit.total_cmp(&a.subsidy_per_unit));
}

/// Length of the longest prefix of `costs` whose running total fits `balance`
///
/// # Example
///
/// ```rust
/// use urban_subsidy_core::subsidy::affordable_prefix_len;
///
/// let costs = [200_000.0, 500_000.0, 900_000.0];
/// assert_eq!(affordable_prefix_len(&costs, 1_000_000.0), 2);
/// assert_eq!(affordable_prefix_len(&costs, 700_000.0), 2);
/// assert_eq!(affordable_prefix_len(&costs, 100_000.0), 0);
/// ```
pub fn affordable_prefix_len(costs: &[f64], balance: f64) -> usize {
    let mut cumulative = 0.0;
    for (i, cost) in costs.iter().enumerate() {
        cumulative += cost;
        if cumulative > balance {
            return i;
        }
    }
    costs.len()
}

/// Run the subsidized developer for one program account
///
/// Balances are read once, before any booking, so money spent by one
/// subaccount never changes what another can afford in the same call.
/// Subaccounts are visited in the order the account reports them.
///
/// # Arguments
///
/// * `feasibility` - Feasibility table from the subsidized feasibility step
/// * `parcels` - Parcel table (average unit size, existing units, geography)
/// * `settings` - Receiving filter and subaccount mapping for this program
/// * `developer_settings` - Opaque settings for the developer model
/// * `account` - Program account paying the subsidies
/// * `year` - Current simulation year
/// * `developer` - Developer model that builds (a subset of) the candidates
/// * `callbacks` - Passed through to the developer model
/// * `summary` - Receives every subsidized building
///
/// # Errors
///
/// Every subaccount's developer result is checked before anything is booked.
/// A developer error, a building on a parcel that was not offered, a parcel
/// returned twice, or a changed `max_profit` aborts the step with the account
/// and the summary untouched.
#[allow(clippy::too_many_arguments)]
pub fn run_subsidized_developer(
    feasibility: &FeasibilityTable,
    parcels: &ParcelTable,
    settings: &ProgramSettings,
    developer_settings: &serde_json::Map<String, serde_json::Value>,
    account: &mut Account,
    year: u32,
    developer: &mut dyn DeveloperModel,
    callbacks: &DeveloperCallbacks,
    summary: &mut ConstructionSummary,
) -> Result<AllocationReport, SubsidyError> {
    let mut report = AllocationReport::new(year);

    let candidates = prepare_candidates(feasibility, parcels, settings)?;
    if candidates.is_empty() {
        info!(account = account.name(), year, "No subsidy candidates");
        return Ok(report);
    }

    let balances: Vec<(SubaccountId, f64)> = account
        .iter_subaccounts()
        .map(|(subaccount, balance)| (subaccount.to_string(), balance))
        .collect();

    // Checked results, booked only once every subaccount has passed
    let mut accepted: Vec<(SubaccountId, Vec<NewBuilding>)> = Vec::new();

    for (subaccount, balance) in balances {
        let mut assigned: Vec<SubsidyCandidate> = candidates
            .iter()
            .filter(|c| c.subaccount == subaccount)
            .cloned()
            .collect();
        if assigned.is_empty() {
            continue;
        }

        rank_candidates(&mut assigned);
        let costs: Vec<f64> = assigned.iter().map(SubsidyCandidate::subsidy_cost).collect();
        let selected = affordable_prefix_len(&costs, balance);

        let mut outcome = SubaccountOutcome {
            subaccount: subaccount.clone(),
            balance,
            candidates: assigned.len(),
            selected,
            built: 0,
            units: 0,
            spent: 0.0,
        };

        debug!(
            account = account.name(),
            subaccount = %subaccount,
            balance,
            candidates = assigned.len(),
            selected,
            "Subaccount selection"
        );

        if selected == 0 {
            report.outcomes.push(outcome);
            continue;
        }

        let submitted = &assigned[..selected];
        let built = developer.build(DeveloperRequest {
            form: DevelopmentForm::Residential,
            candidates: submitted,
            unit_field: UNIT_FIELD,
            year,
            settings: developer_settings,
            parcels,
            callbacks,
        })?;

        let built = match built {
            Some(buildings) if !buildings.is_empty() => buildings,
            _ => {
                report.outcomes.push(outcome);
                continue;
            }
        };

        outcome.spent = check_developer_result(&built, submitted, &subaccount, balance, account)?;
        outcome.built = built.len();
        outcome.units = built.iter().map(|b| b.residential_units as u64).sum();
        report.outcomes.push(outcome);
        accepted.push((subaccount, built));
    }

    let mut new_buildings: Vec<NewBuilding> = Vec::new();
    for (subaccount, built) in accepted {
        for building in &built {
            let metadata = TransactionMetadata::new("Developing subsidized building", year)
                .with_building(building.building_id, building.residential_units);
            account.add_transaction(building.max_profit, subaccount.clone(), metadata)?;
        }
        new_buildings.extend(built);
    }

    if new_buildings.is_empty() {
        info!(account = account.name(), year, "No subsidized buildings built");
        return Ok(report);
    }

    for building in &mut new_buildings {
        building.subsidized = true;
    }
    summary.add_parcel_output(new_buildings);

    info!(
        account = account.name(),
        year,
        buildings = report.buildings_built(),
        units = report.total_units(),
        subsidy = report.total_spent(),
        "Subsidized residential development"
    );

    Ok(report)
}

/// Validate a developer result before anything is booked
///
/// Returns the total subsidy the buildings would book.
fn check_developer_result(
    built: &[NewBuilding],
    submitted: &[SubsidyCandidate],
    subaccount: &str,
    balance: f64,
    account: &Account,
) -> Result<f64, SubsidyError> {
    let offered: BTreeMap<ParcelId, f64> = submitted
        .iter()
        .map(|c| (c.parcel_id(), c.max_profit()))
        .collect();
    let mut seen: BTreeSet<ParcelId> = BTreeSet::new();

    for building in built {
        let expected = match offered.get(&building.parcel_id) {
            Some(&max_profit) => max_profit,
            None => {
                return Err(SubsidyError::UnexpectedBuilding {
                    parcel_id: building.parcel_id,
                    subaccount: subaccount.to_string(),
                })
            }
        };
        if !seen.insert(building.parcel_id) {
            return Err(SubsidyError::DuplicateBuilding {
                parcel_id: building.parcel_id,
                subaccount: subaccount.to_string(),
            });
        }
        if !building.max_profit.is_finite() {
            return Err(AccountError::InvalidTransaction {
                account: account.name().to_string(),
                source: TransactionError::NonFiniteAmount(building.max_profit),
            }
            .into());
        }
        // Candidates all have max_profit < 0, so this also rejects gains
        if building.max_profit != expected {
            return Err(SubsidyError::ProfitMismatch {
                parcel_id: building.parcel_id,
                expected,
                found: building.max_profit,
            });
        }
    }

    let spent: f64 = built.iter().map(|b| -b.max_profit).sum();
    if spent > balance + BUDGET_TOLERANCE {
        return Err(SubsidyError::BudgetExceeded {
            subaccount: subaccount.to_string(),
            requested: spent,
            available: balance,
        });
    }

    Ok(spent)
}
