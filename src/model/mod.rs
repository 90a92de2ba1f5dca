//! Split-infectious SEIR model: recursion library, latent state, likelihoods,
//! samplers, and posterior summaries.
//!
//! The model tracks susceptible, exposed, and two infectious compartments
//! ("mild" and "wild") in discrete daily time. Three latent daily-count
//! series and the seven-parameter transmission vector are resampled by
//! Metropolis-Hastings; every derived compartment series is recomputed from
//! the latent counts through the recursion functions and re-validated after
//! each update.

pub mod likelihood;
pub mod posterior;
pub mod recursion;
pub mod sampler;
pub mod state;
pub mod types;

pub use posterior::{
    ParamsSummary, PosteriorDraw, PosteriorSamples, TrajectorySummary,
    basic_reproduction_interval, summarize_params, summarize_reproduction_trajectories,
};
pub use sampler::fit_seir;
pub use state::{EpidemicState, InvariantViolation, initialize_state};
pub use types::{
    FitOptions, GammaPrior, Inits, PARAM_COUNT, PARAM_NAMES, ParamBound, ParamBounds, Params,
    PriorConfig, RandomWalkScales, SeirAcceptanceRates, SeirConfig, SeirError, SeirFitReport,
    SeirPosteriorSummary, SeirSamplerDiagnostics,
};
