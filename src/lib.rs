#![forbid(unsafe_code)]

//! # `seir_mcmc`
//!
//! Bayesian inference for a discrete-time stochastic SEIR epidemic model with
//! split "mild"/"wild" infectious sub-populations. The model is fitted to
//! observed daily case and removal counts with Markov-Chain Monte Carlo:
//! single-site resampling of the latent daily-count series and a joint
//! Gaussian random-walk update of the seven transmission parameters, yielding
//! a posterior over the parameters and derived reproduction-number
//! trajectories.
//!
//! The crate is a pure library. Data ingestion, smoothing, report formatting,
//! and plotting are left to callers; the entry point is [`fit_seir`], which
//! consumes a prepared [`ObservedSeries`] and a validated configuration.

pub mod inference;
pub mod input;
pub mod model;

pub use inference::{
    MetropolisOutcome, ProposalOutcome, ProposalStats, StepRecord, metropolis_step,
    propose_with_retries,
};
pub use input::{InputError, ObservedSeries};

pub use model::posterior::{
    ParamsSummary, PosteriorDraw, PosteriorSamples, TrajectorySummary,
    basic_reproduction_interval, summarize_params, summarize_reproduction_trajectories,
};
pub use model::recursion::{
    exposed_series, infection_probability, infectious_series, round_half_up,
    split_infectious_inflow, susceptible_series, transmission_rate,
};
pub use model::sampler::fit_seir;
pub use model::state::{EpidemicState, InvariantViolation, initialize_state};
pub use model::types::{
    FitOptions, GammaPrior, Inits, PARAM_COUNT, PARAM_NAMES, ParamBound, ParamBounds, Params,
    PriorConfig, RandomWalkScales, SeirAcceptanceRates, SeirConfig, SeirError, SeirFitReport,
    SeirPosteriorSummary, SeirSamplerDiagnostics,
};
