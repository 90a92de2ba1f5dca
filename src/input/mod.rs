//! # Observed data
//!
//! A validated container for the two observed daily series the model is
//! fitted against: the population/scale series and the wild-compartment
//! removal counts. Smoothing and unit conversion happen upstream; this module
//! only checks that what arrives is usable.
//!
//! # Examples
//!
//! ```
//! use seir_mcmc::ObservedSeries;
//!
//! let observed = ObservedSeries::new(vec![500, 500, 500], vec![0, 1, 2]);
//! assert!(observed.validate().is_ok());
//! assert_eq!(observed.horizon(), 3);
//! ```
//!
//! ```
//! use seir_mcmc::ObservedSeries;
//!
//! let observed = ObservedSeries::new(vec![500, 500], vec![0, 1, 2]);
//! assert!(observed.validate().is_err());
//! ```

use thiserror::Error;

/// Errors returned when validating observed data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("population length ({population}) must match removal length ({removals})")]
    LengthMismatch { population: usize, removals: usize },
    #[error("observation horizon must cover at least 2 days; found {found}")]
    HorizonTooShort { found: usize },
    #[error("population must be positive on every day; day {day} holds {value}")]
    NonPositivePopulation { day: usize, value: i64 },
    #[error("observed removals must be non-negative; day {day} holds {value}")]
    NegativeRemovals { day: usize, value: i64 },
}

/// Daily observed inputs over the full observation horizon.
///
/// `population` is the (externally smoothed and scaled) per-day population
/// size; `wild_removals` is the observed count of removals from the wild
/// infectious compartment per day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedSeries {
    pub population: Vec<i64>,
    pub wild_removals: Vec<i64>,
}

impl ObservedSeries {
    #[must_use]
    pub const fn new(population: Vec<i64>, wild_removals: Vec<i64>) -> Self {
        Self {
            population,
            wild_removals,
        }
    }

    /// Number of observed days.
    #[must_use]
    pub const fn horizon(&self) -> usize {
        self.population.len()
    }

    /// # Errors
    ///
    /// Returns `InputError` if the two series disagree in length, are too
    /// short to support the day-to-day recursion, or contain out-of-domain
    /// values.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.population.len() != self.wild_removals.len() {
            return Err(InputError::LengthMismatch {
                population: self.population.len(),
                removals: self.wild_removals.len(),
            });
        }
        if self.population.len() < 2 {
            return Err(InputError::HorizonTooShort {
                found: self.population.len(),
            });
        }
        for (day, value) in self.population.iter().copied().enumerate() {
            if value < 1 {
                return Err(InputError::NonPositivePopulation { day, value });
            }
        }
        for (day, value) in self.wild_removals.iter().copied().enumerate() {
            if value < 0 {
                return Err(InputError::NegativeRemovals { day, value });
            }
        }
        Ok(())
    }
}
