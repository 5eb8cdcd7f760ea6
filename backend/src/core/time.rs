//! Year management for the simulation
//!
//! The land-use simulation advances in iterations, each of which represents
//! one or more calendar years. This module tracks the current year and the
//! construction window an iteration covers.

use serde::{Deserialize, Serialize};

/// Tracks the simulation year and how many years one iteration represents
///
/// # Example
/// ```
/// use urban_subsidy_core::SimulationClock;
///
/// let mut clock = SimulationClock::new(2015, 5);
/// assert_eq!(clock.current_year(), 2015);
/// assert!(clock.in_current_window(2019));
/// assert!(!clock.in_current_window(2020));
///
/// clock.advance();
/// assert_eq!(clock.current_year(), 2020);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationClock {
    /// First calendar year of the current iteration
    current_year: u32,
    /// Number of calendar years represented by one iteration
    years_per_iter: u32,
}

impl SimulationClock {
    /// Create a clock starting at `start_year`
    ///
    /// # Panics
    /// Panics if `years_per_iter` is zero
    pub fn new(start_year: u32, years_per_iter: u32) -> Self {
        assert!(years_per_iter > 0, "years_per_iter must be positive");
        Self {
            current_year: start_year,
            years_per_iter,
        }
    }

    /// Move to the next iteration
    pub fn advance(&mut self) {
        self.current_year += self.years_per_iter;
    }

    /// First year of the current iteration
    pub fn current_year(&self) -> u32 {
        self.current_year
    }

    /// Years represented by one iteration
    pub fn years_per_iter(&self) -> u32 {
        self.years_per_iter
    }

    /// Exclusive end of the current construction window
    pub fn window_end(&self) -> u32 {
        self.current_year + self.years_per_iter
    }

    /// Whether a building completed in `year_built` falls in this iteration
    ///
    /// The window is half-open: `current_year <= year_built < window_end`.
    pub fn in_current_window(&self, year_built: u32) -> bool {
        (self.current_year..self.window_end()).contains(&year_built)
    }
}
