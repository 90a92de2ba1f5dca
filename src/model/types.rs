//! Core public types for the SEIR model.

use super::posterior::{ParamsSummary, TrajectorySummary};
use super::state::InvariantViolation;
use crate::inference::ProposalStats;
use crate::input::InputError;
use thiserror::Error;

/// Number of transmission-dynamics parameters.
pub const PARAM_COUNT: usize = 7;

/// Parameter names in the canonical field order used by
/// [`Params::to_array`], [`PriorConfig::as_array`], [`ParamBounds::as_array`],
/// and [`RandomWalkScales::as_array`].
pub const PARAM_NAMES: [&str; PARAM_COUNT] = [
    "beta",
    "q",
    "delta",
    "rho",
    "gamma_mild",
    "gamma_wild",
    "k",
];

/// Errors returned by SEIR configuration, validation, and fitting.
#[derive(Debug, Error)]
pub enum SeirError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error("iterations must be positive")]
    InvalidIterations,
    #[error("burn-in ({burn_in}) must be smaller than iterations ({iterations})")]
    InvalidBurnIn { burn_in: usize, iterations: usize },
    #[error("sample save frequency must be positive")]
    InvalidSaveFrequency,
    #[error("observation horizon ({horizon}) must end before the epidemic horizon ({tau})")]
    HorizonBeyondEpidemicEnd { horizon: usize, tau: usize },
    #[error("control day ({t_ctrl}) must lie before the epidemic horizon ({tau})")]
    ControlBeyondEpidemicEnd { t_ctrl: usize, tau: usize },
    #[error("invalid gamma prior configuration")]
    InvalidPriorConfig,
    #[error("invalid parameter bounds")]
    InvalidBounds,
    #[error("random-walk scales must be positive and finite")]
    InvalidWalkScales,
    #[error("initial compartment count {name} must be non-negative; found {value}")]
    NegativeInit { name: &'static str, value: i64 },
    #[error("initial parameter {name} must be strictly positive; found {value}")]
    NonPositiveParam { name: &'static str, value: f64 },
    #[error("initial parameter {name} = {value} lies outside its bound [{low}, {high}]")]
    ParamOutOfBounds {
        name: &'static str,
        value: f64,
        low: f64,
        high: f64,
    },
    #[error("forward simulation failed on day {day}: {detail}")]
    InitializationFailure { day: usize, detail: String },
    #[error("state invariant violated after {context}: {violation}")]
    Invariant {
        context: &'static str,
        violation: InvariantViolation,
    },
}

/// The seven transmission-dynamics parameters.
///
/// Named fields replace positional indexing: every companion record
/// ([`PriorConfig`], [`ParamBounds`], [`RandomWalkScales`]) pairs with this
/// struct through the field order fixed by [`PARAM_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Base (uncontrolled) transmission rate.
    pub beta: f64,
    /// Decay rate of the transmission rate once control measures start.
    pub q: f64,
    /// Fraction of newly infectious individuals entering the mild compartment.
    pub delta: f64,
    /// Exposed-to-infectious transition rate.
    pub rho: f64,
    /// Removal rate from the mild infectious compartment.
    pub gamma_mild: f64,
    /// Removal rate from the wild infectious compartment.
    pub gamma_wild: f64,
    /// Population-scaling/reporting factor.
    pub k: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            beta: 1.9,
            q: 0.01,
            delta: 0.5,
            rho: 0.5,
            gamma_mild: 0.12,
            gamma_wild: 0.2,
            k: 0.2,
        }
    }
}

impl Params {
    /// Components in [`PARAM_NAMES`] order.
    #[must_use]
    pub const fn to_array(self) -> [f64; PARAM_COUNT] {
        [
            self.beta,
            self.q,
            self.delta,
            self.rho,
            self.gamma_mild,
            self.gamma_wild,
            self.k,
        ]
    }

    /// Rebuild from components in [`PARAM_NAMES`] order.
    #[must_use]
    pub const fn from_array(values: [f64; PARAM_COUNT]) -> Self {
        Self {
            beta: values[0],
            q: values[1],
            delta: values[2],
            rho: values[3],
            gamma_mild: values[4],
            gamma_wild: values[5],
            k: values[6],
        }
    }

    /// Whether every component is strictly positive.
    #[must_use]
    pub fn is_strictly_positive(self) -> bool {
        self.to_array().iter().all(|value| *value > 0.0)
    }
}

/// Shape/rate hyperparameters of one gamma prior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GammaPrior {
    pub shape: f64,
    pub rate: f64,
}

impl GammaPrior {
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.shape > 0.0 && self.rate > 0.0
    }
}

/// Gamma priors for all seven parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorConfig {
    pub beta: GammaPrior,
    pub q: GammaPrior,
    pub delta: GammaPrior,
    pub rho: GammaPrior,
    pub gamma_mild: GammaPrior,
    pub gamma_wild: GammaPrior,
    pub k: GammaPrior,
}

impl Default for PriorConfig {
    fn default() -> Self {
        let prior = GammaPrior {
            shape: 2.0,
            rate: 10.0,
        };
        Self {
            beta: prior,
            q: prior,
            delta: prior,
            rho: prior,
            gamma_mild: prior,
            gamma_wild: prior,
            k: prior,
        }
    }
}

impl PriorConfig {
    /// Priors in [`PARAM_NAMES`] order.
    #[must_use]
    pub const fn as_array(self) -> [GammaPrior; PARAM_COUNT] {
        [
            self.beta,
            self.q,
            self.delta,
            self.rho,
            self.gamma_mild,
            self.gamma_wild,
            self.k,
        ]
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.as_array().iter().all(|prior| prior.is_valid())
    }
}

/// Closed feasibility interval for one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamBound {
    pub low: f64,
    pub high: f64,
}

impl ParamBound {
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.low <= self.high && !self.low.is_nan() && !self.high.is_nan()
    }

    #[must_use]
    pub fn contains(self, value: f64) -> bool {
        value >= self.low && value <= self.high
    }
}

/// Box constraints for all seven parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamBounds {
    pub beta: ParamBound,
    pub q: ParamBound,
    pub delta: ParamBound,
    pub rho: ParamBound,
    pub gamma_mild: ParamBound,
    pub gamma_wild: ParamBound,
    pub k: ParamBound,
}

impl Default for ParamBounds {
    fn default() -> Self {
        Self {
            beta: ParamBound {
                low: 0.0,
                high: 6.0,
            },
            q: ParamBound {
                low: 0.0,
                high: f64::INFINITY,
            },
            delta: ParamBound {
                low: 0.08,
                high: 0.92,
            },
            rho: ParamBound {
                low: 0.0,
                high: 0.9,
            },
            gamma_mild: ParamBound {
                low: 0.0,
                high: 0.9,
            },
            gamma_wild: ParamBound {
                low: 0.0,
                high: 0.9,
            },
            k: ParamBound {
                low: 0.0,
                high: 1.0,
            },
        }
    }
}

impl ParamBounds {
    /// Bounds in [`PARAM_NAMES`] order.
    #[must_use]
    pub const fn as_array(self) -> [ParamBound; PARAM_COUNT] {
        [
            self.beta,
            self.q,
            self.delta,
            self.rho,
            self.gamma_mild,
            self.gamma_wild,
            self.k,
        ]
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.as_array().iter().all(|bound| bound.is_valid())
    }

    /// Whether every component of `params` lies within its interval.
    #[must_use]
    pub fn contain(self, params: Params) -> bool {
        self.as_array()
            .iter()
            .zip(params.to_array())
            .all(|(bound, value)| bound.contains(value))
    }
}

/// Per-parameter standard deviations of the Gaussian random-walk proposal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomWalkScales {
    pub beta: f64,
    pub q: f64,
    pub delta: f64,
    pub rho: f64,
    pub gamma_mild: f64,
    pub gamma_wild: f64,
    pub k: f64,
}

impl Default for RandomWalkScales {
    fn default() -> Self {
        Self {
            beta: 0.001,
            q: 0.001,
            delta: 0.001,
            rho: 0.001,
            gamma_mild: 0.001,
            gamma_wild: 0.001,
            k: 0.001,
        }
    }
}

impl RandomWalkScales {
    /// Scales in [`PARAM_NAMES`] order.
    #[must_use]
    pub const fn as_array(self) -> [f64; PARAM_COUNT] {
        [
            self.beta,
            self.q,
            self.delta,
            self.rho,
            self.gamma_mild,
            self.gamma_wild,
            self.k,
        ]
    }

    #[must_use]
    pub fn is_valid(self) -> bool {
        self.as_array()
            .iter()
            .all(|scale| *scale > 0.0 && scale.is_finite())
    }
}

/// Day-zero compartment counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inits {
    pub exposed: i64,
    pub infectious_mild: i64,
    pub infectious_wild: i64,
}

impl Inits {
    /// # Errors
    ///
    /// Returns `SeirError::NegativeInit` for any negative count.
    pub const fn validate(self) -> Result<(), SeirError> {
        if self.exposed < 0 {
            return Err(SeirError::NegativeInit {
                name: "exposed",
                value: self.exposed,
            });
        }
        if self.infectious_mild < 0 {
            return Err(SeirError::NegativeInit {
                name: "infectious_mild",
                value: self.infectious_mild,
            });
        }
        if self.infectious_wild < 0 {
            return Err(SeirError::NegativeInit {
                name: "infectious_wild",
                value: self.infectious_wild,
            });
        }
        Ok(())
    }
}

/// Schedule and horizon configuration for one training run.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    /// Total MCMC iterations.
    pub iterations: usize,
    /// Iterations discarded before any draw is recorded.
    pub burn_in: usize,
    /// Record every iteration whose index is a multiple of this value.
    pub save_freq: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
    /// First day on which control measures dampen transmission.
    pub t_ctrl: usize,
    /// Assumed end of the epidemic, in days; must lie beyond the observation
    /// horizon and the control day.
    pub tau: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            iterations: 4_000,
            burn_in: 1_000,
            save_freq: 4,
            seed: 42,
            t_ctrl: 0,
            tau: 1_000,
        }
    }
}

impl FitOptions {
    /// # Errors
    ///
    /// Returns `SeirError` if the schedule is internally inconsistent or the
    /// horizons do not fit inside the epidemic end `tau`.
    pub const fn validate(self, horizon: usize) -> Result<(), SeirError> {
        if self.iterations == 0 {
            return Err(SeirError::InvalidIterations);
        }
        if self.burn_in >= self.iterations {
            return Err(SeirError::InvalidBurnIn {
                burn_in: self.burn_in,
                iterations: self.iterations,
            });
        }
        if self.save_freq == 0 {
            return Err(SeirError::InvalidSaveFrequency);
        }
        if horizon >= self.tau {
            return Err(SeirError::HorizonBeyondEpidemicEnd {
                horizon,
                tau: self.tau,
            });
        }
        if self.t_ctrl >= self.tau {
            return Err(SeirError::ControlBeyondEpidemicEnd {
                t_ctrl: self.t_ctrl,
                tau: self.tau,
            });
        }
        Ok(())
    }

    /// Number of recorded draws implied by the schedule.
    #[must_use]
    pub fn retained_draws(self) -> usize {
        (self.burn_in..self.iterations)
            .filter(|iteration| iteration % self.save_freq == 0)
            .count()
    }
}

/// Full configuration for SEIR fitting.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeirConfig {
    pub options: FitOptions,
    pub priors: PriorConfig,
    pub bounds: ParamBounds,
    pub walk_scales: RandomWalkScales,
}

impl SeirConfig {
    /// # Errors
    ///
    /// Returns `SeirError` if any configuration block is invalid.
    pub fn validate(self, horizon: usize) -> Result<(), SeirError> {
        self.options.validate(horizon)?;
        if !self.priors.is_valid() {
            return Err(SeirError::InvalidPriorConfig);
        }
        if !self.bounds.is_valid() {
            return Err(SeirError::InvalidBounds);
        }
        if !self.walk_scales.is_valid() {
            return Err(SeirError::InvalidWalkScales);
        }
        Ok(())
    }
}

/// Block-wise acceptance rates from one training run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeirAcceptanceRates {
    pub new_exposures: f64,
    pub new_infectious: f64,
    pub mild_removals: f64,
    pub params: f64,
}

/// Sampler diagnostics: per-block proposal counters and schedule facts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeirSamplerDiagnostics {
    pub iterations_completed: usize,
    pub retained_draws: usize,
    pub new_exposures: ProposalStats,
    pub new_infectious: ProposalStats,
    pub mild_removals: ProposalStats,
    pub params: ProposalStats,
}

impl SeirSamplerDiagnostics {
    /// Acceptance rates for all four sampler blocks.
    #[must_use]
    pub fn acceptance_rates(&self) -> SeirAcceptanceRates {
        SeirAcceptanceRates {
            new_exposures: self.new_exposures.acceptance_rate(),
            new_infectious: self.new_infectious.acceptance_rate(),
            mild_removals: self.mild_removals.acceptance_rate(),
            params: self.params.acceptance_rate(),
        }
    }
}

/// Posterior summaries computed from the recorded draws.
#[derive(Debug, Clone)]
pub struct SeirPosteriorSummary {
    /// Component-wise posterior mean and standard deviation of the parameters.
    pub params: ParamsSummary,
    /// Normal-approximation 95% interval for the aggregate basic reproduction
    /// number.
    pub basic_reproduction_interval: (f64, f64),
    /// Elementwise mean and standard deviation of the effective
    /// reproduction-number trajectory across draws.
    pub reproduction_trajectory: TrajectorySummary,
    pub draw_count: usize,
}

/// Output report from SEIR fitting.
#[derive(Debug, Clone)]
pub struct SeirFitReport {
    /// Final latent daily new-infectious series.
    pub new_infectious: Vec<i64>,
    /// Posterior summaries; `None` when the schedule recorded no draws.
    pub posterior: Option<SeirPosteriorSummary>,
    pub diagnostics: SeirSamplerDiagnostics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(Params::default().is_strictly_positive());
        assert!(PriorConfig::default().is_valid());
        assert!(ParamBounds::default().is_valid());
        assert!(RandomWalkScales::default().is_valid());
        assert!(SeirConfig::default().validate(100).is_ok());
    }

    #[test]
    fn params_array_round_trip_preserves_field_order() {
        let params = Params {
            beta: 1.0,
            q: 2.0,
            delta: 3.0,
            rho: 4.0,
            gamma_mild: 5.0,
            gamma_wild: 6.0,
            k: 7.0,
        };
        let array = params.to_array();
        assert_eq!(array, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(Params::from_array(array), params);
        assert_eq!(PARAM_NAMES.len(), PARAM_COUNT);
    }

    #[test]
    fn default_bounds_contain_default_params() {
        assert!(ParamBounds::default().contain(Params::default()));
    }

    #[test]
    fn options_reject_burn_in_at_or_beyond_iterations() {
        let options = FitOptions {
            iterations: 10,
            burn_in: 10,
            ..FitOptions::default()
        };
        assert!(matches!(
            options.validate(5),
            Err(SeirError::InvalidBurnIn {
                burn_in: 10,
                iterations: 10,
            })
        ));
    }

    #[test]
    fn options_reject_zero_save_frequency() {
        let options = FitOptions {
            save_freq: 0,
            ..FitOptions::default()
        };
        assert!(matches!(
            options.validate(5),
            Err(SeirError::InvalidSaveFrequency)
        ));
    }

    #[test]
    fn options_reject_horizon_past_epidemic_end() {
        let options = FitOptions {
            tau: 30,
            ..FitOptions::default()
        };
        assert!(matches!(
            options.validate(30),
            Err(SeirError::HorizonBeyondEpidemicEnd { horizon: 30, tau: 30 })
        ));
    }

    #[test]
    fn retained_draws_counts_aligned_iterations() {
        let options = FitOptions {
            iterations: 10,
            burn_in: 3,
            save_freq: 2,
            ..FitOptions::default()
        };
        // Recorded at iterations 4, 6, 8.
        assert_eq!(options.retained_draws(), 3);
    }

    #[test]
    fn negative_init_is_rejected() {
        let inits = Inits {
            exposed: 1,
            infectious_mild: -2,
            infectious_wild: 0,
        };
        assert!(matches!(
            inits.validate(),
            Err(SeirError::NegativeInit {
                name: "infectious_mild",
                value: -2,
            })
        ));
    }

    #[test]
    fn invalid_walk_scales_are_rejected() {
        let config = SeirConfig {
            walk_scales: RandomWalkScales {
                q: 0.0,
                ..RandomWalkScales::default()
            },
            ..SeirConfig::default()
        };
        assert!(matches!(
            config.validate(10),
            Err(SeirError::InvalidWalkScales)
        ));
    }
}
