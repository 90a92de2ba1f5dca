//! Sampler entrypoints: the constrained single-site resampler, the three
//! latent-series samplers, the joint parameter sampler, and the training
//! loop that drives them.
//!
//! Within one iteration the update order is fixed: new exposures, then new
//! infectious, then mild removals, then the parameter vector. Each step
//! consumes the snapshot produced by the previous one, and the invariant
//! checker runs after every step.

use log::{debug, error, trace, warn};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::inference::{
    MetropolisOutcome, ProposalOutcome, StepRecord, metropolis_step, propose_with_retries,
};
use crate::input::ObservedSeries;

use super::likelihood::{
    binomial_series_log_likelihood, binomial_series_log_likelihood_scalar, log_gamma_floor,
};
use super::posterior::{
    PosteriorDraw, PosteriorSamples, basic_reproduction_interval, summarize_params,
    summarize_reproduction_trajectories,
};
use super::recursion::{
    count_to_f64, exposed_series, infection_probability, infectious_series, round_half_up,
    split_infectious_inflow, susceptible_series, transmission_rate,
};
use super::state::{EpidemicState, initialize_state};
use super::types::{
    Inits, PARAM_NAMES, Params, SeirConfig, SeirError, SeirFitReport, SeirPosteriorSummary,
    SeirSamplerDiagnostics,
};

/// Attempt budget shared by the single-site and parameter proposals.
const MAX_PROPOSAL_ATTEMPTS: usize = 100;
/// At most this many source/destination index pairs per single-site move.
const MAX_SWAP_SITES: usize = 15;
/// Divisor for the mass taken from each source in a proportional move.
const SOURCE_DIVISOR: i64 = 80;
/// Divisor for the mass added to each destination in a proportional move.
/// 79 is paired with 80 so the expected forward and backward step sizes
/// match, keeping the move symmetric in distribution.
const DESTINATION_DIVISOR: i64 = 79;
const PROGRESS_LOG_INTERVAL: usize = 20;

/// Joint sample of the parameter vector and the state it implies.
#[derive(Debug, Clone)]
struct ParameterSample {
    params: Params,
    state: EpidemicState,
}

/// Fit the split-infectious SEIR model to observed daily counts.
///
/// Validates all configuration up front, forward-initializes the latent
/// state, then runs the configured number of MCMC iterations, recording the
/// parameter vector and the effective reproduction-number trajectory after
/// burn-in at the configured frequency.
///
/// # Errors
///
/// Returns `SeirError` for invalid configuration or observed data, for a
/// forward simulation that leaves the model's domain, and for any state
/// invariant violation detected mid-run (a defect, never a data property).
pub fn fit_seir(
    observed: &ObservedSeries,
    inits: Inits,
    initial_params: Params,
    config: &SeirConfig,
) -> Result<SeirFitReport, SeirError> {
    observed.validate()?;
    config.validate(observed.horizon())?;
    inits.validate()?;
    validate_initial_params(initial_params, config)?;

    let options = config.options;
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut params = initial_params;
    let mut state = initialize_state(inits, params, observed, options.t_ctrl, &mut rng)?;
    checked(&state, inits, params, options.t_ctrl, observed, "initialization")?;

    let mut diagnostics = SeirSamplerDiagnostics::default();
    let mut draws = Vec::with_capacity(options.retained_draws());

    for iteration in 0..options.iterations {
        let outcome = resample_new_exposures(state, inits, &mut rng);
        diagnostics.new_exposures.record(step_record(&outcome));
        if outcome.exhausted {
            trace!("new-exposure proposal budget exhausted at iteration {iteration}");
        }
        state = outcome.sample;
        checked(&state, inits, params, options.t_ctrl, observed, "new-exposure update")?;

        let outcome =
            resample_new_infectious(state, inits, params, options.t_ctrl, observed, &mut rng);
        diagnostics.new_infectious.record(step_record(&outcome));
        if outcome.exhausted {
            trace!("new-infectious proposal budget exhausted at iteration {iteration}");
        }
        state = outcome.sample;
        checked(&state, inits, params, options.t_ctrl, observed, "new-infectious update")?;

        let outcome =
            resample_mild_removals(state, inits, params, options.t_ctrl, &mut rng);
        diagnostics.mild_removals.record(step_record(&outcome));
        if outcome.exhausted {
            trace!("mild-removal proposal budget exhausted at iteration {iteration}");
        }
        state = outcome.sample;
        checked(&state, inits, params, options.t_ctrl, observed, "mild-removal update")?;

        let outcome = resample_params(params, state, inits, observed, config, &mut rng);
        diagnostics.params.record(step_record(&outcome));
        if outcome.exhausted {
            warn!("parameter proposal budget exhausted at iteration {iteration}");
        }
        let log_prob = outcome.log_prob;
        let log_prob_delta = outcome.log_prob - outcome.previous_log_prob;
        params = outcome.sample.params;
        state = outcome.sample.state;
        checked(&state, inits, params, options.t_ctrl, observed, "parameter update")?;

        if iteration >= options.burn_in && iteration % options.save_freq == 0 {
            draws.push(PosteriorDraw {
                params,
                reproduction: reproduction_trajectory(params, &state, options.t_ctrl),
            });
        }

        if iteration % PROGRESS_LOG_INTERVAL == 0 {
            debug!(
                "iteration {iteration}: {params:?}, log-prob {log_prob:.5} ({log_prob_delta:+.5})"
            );
        }
    }

    diagnostics.iterations_completed = options.iterations;
    diagnostics.retained_draws = draws.len();
    debug!(
        "run complete: {} draws retained, acceptance rates {:?}",
        diagnostics.retained_draws,
        diagnostics.acceptance_rates()
    );

    let samples = PosteriorSamples { draws };
    let posterior = if samples.is_empty() {
        None
    } else {
        let mild_total: i64 = state.mild_removals.iter().sum();
        let wild_total: i64 = observed.wild_removals.iter().sum();
        Some(SeirPosteriorSummary {
            params: summarize_params(&samples),
            basic_reproduction_interval: basic_reproduction_interval(
                &samples, mild_total, wild_total,
            ),
            reproduction_trajectory: summarize_reproduction_trajectories(&samples),
            draw_count: samples.len(),
        })
    };

    Ok(SeirFitReport {
        new_infectious: state.new_infectious,
        posterior,
        diagnostics,
    })
}

fn validate_initial_params(params: Params, config: &SeirConfig) -> Result<(), SeirError> {
    for ((name, value), bound) in PARAM_NAMES
        .iter()
        .copied()
        .zip(params.to_array())
        .zip(config.bounds.as_array())
    {
        if value <= 0.0 {
            return Err(SeirError::NonPositiveParam { name, value });
        }
        if !bound.contains(value) {
            return Err(SeirError::ParamOutOfBounds {
                name,
                value,
                low: bound.low,
                high: bound.high,
            });
        }
    }
    Ok(())
}

fn checked(
    state: &EpidemicState,
    inits: Inits,
    params: Params,
    t_ctrl: usize,
    observed: &ObservedSeries,
    context: &'static str,
) -> Result<(), SeirError> {
    state
        .check_consistency(inits, params, t_ctrl, &observed.wild_removals)
        .map_err(|violation| {
            error!("aborting after {context}: {violation}; state dump: {state:?}");
            SeirError::Invariant { context, violation }
        })
}

fn step_record<T>(outcome: &MetropolisOutcome<T>) -> StepRecord {
    StepRecord {
        accepted: outcome.accepted,
        exhausted: outcome.exhausted,
    }
}

/// One Metropolis step on the latent new-exposure series.
///
/// Likelihood: each day's count is binomial in the susceptible pool with the
/// day's infection probability. Feasibility: the recomputed susceptible and
/// exposed series must stay non-negative.
fn resample_new_exposures(
    state: EpidemicState,
    inits: Inits,
    rng: &mut StdRng,
) -> MetropolisOutcome<EpidemicState> {
    metropolis_step(
        state,
        1,
        rng,
        |s| {
            binomial_series_log_likelihood(
                &s.susceptible,
                &s.infection_probability,
                &s.new_exposures,
            )
        },
        |current, rng| {
            single_site_proposal(
                current,
                &current.new_exposures,
                rng,
                |s, new_exposures| {
                    let susceptible = susceptible_series(&new_exposures, &s.population);
                    let exposed =
                        exposed_series(inits.exposed, &new_exposures, &s.new_infectious);
                    EpidemicState {
                        susceptible,
                        exposed,
                        new_exposures,
                        ..s.clone()
                    }
                },
                |candidate| {
                    all_non_negative(&candidate.susceptible)
                        && all_non_negative(&candidate.exposed)
                },
            )
        },
    )
}

/// One Metropolis step on the latent new-infectious series.
///
/// Likelihood: binomial in the exposed pool with the shared daily
/// progression probability `1 - exp(-rho)`. Feasibility: recomputed exposed
/// and both infectious series non-negative.
fn resample_new_infectious(
    state: EpidemicState,
    inits: Inits,
    params: Params,
    t_ctrl: usize,
    observed: &ObservedSeries,
    rng: &mut StdRng,
) -> MetropolisOutcome<EpidemicState> {
    let p_progress = 1.0 - (-params.rho).exp();
    metropolis_step(
        state,
        1,
        rng,
        |s| binomial_series_log_likelihood_scalar(&s.exposed, p_progress, &s.new_infectious),
        |current, rng| {
            single_site_proposal(
                current,
                &current.new_infectious,
                rng,
                |s, new_infectious| {
                    let exposed =
                        exposed_series(inits.exposed, &s.new_exposures, &new_infectious);
                    let (mild_inflow, wild_inflow) =
                        split_infectious_inflow(&new_infectious, params.delta);
                    let infectious_mild = infectious_series(
                        inits.infectious_mild,
                        &mild_inflow,
                        &s.mild_removals,
                    );
                    let infectious_wild = infectious_series(
                        inits.infectious_wild,
                        &wild_inflow,
                        &observed.wild_removals,
                    );
                    let rate =
                        transmission_rate(params.beta, params.q, t_ctrl, s.horizon());
                    let infection_probability = infection_probability(
                        &rate,
                        &infectious_mild,
                        &infectious_wild,
                        &s.population,
                    );
                    EpidemicState {
                        exposed,
                        infectious_mild,
                        infectious_wild,
                        new_infectious,
                        infection_probability,
                        ..s.clone()
                    }
                },
                |candidate| {
                    all_non_negative(&candidate.exposed)
                        && all_non_negative(&candidate.infectious_mild)
                        && all_non_negative(&candidate.infectious_wild)
                },
            )
        },
    )
}

/// One Metropolis step on the latent mild-removal series.
///
/// Likelihood: binomial in the mild infectious pool with the shared daily
/// removal probability `1 - exp(-gamma_mild)`. Feasibility: recomputed mild
/// infectious series non-negative.
fn resample_mild_removals(
    state: EpidemicState,
    inits: Inits,
    params: Params,
    t_ctrl: usize,
    rng: &mut StdRng,
) -> MetropolisOutcome<EpidemicState> {
    let p_remove = 1.0 - (-params.gamma_mild).exp();
    metropolis_step(
        state,
        1,
        rng,
        |s| binomial_series_log_likelihood_scalar(&s.infectious_mild, p_remove, &s.mild_removals),
        |current, rng| {
            single_site_proposal(
                current,
                &current.mild_removals,
                rng,
                |s, mild_removals| {
                    let (mild_inflow, _) =
                        split_infectious_inflow(&s.new_infectious, params.delta);
                    let infectious_mild = infectious_series(
                        inits.infectious_mild,
                        &mild_inflow,
                        &mild_removals,
                    );
                    let rate =
                        transmission_rate(params.beta, params.q, t_ctrl, s.horizon());
                    let infection_probability = infection_probability(
                        &rate,
                        &infectious_mild,
                        &s.infectious_wild,
                        &s.population,
                    );
                    EpidemicState {
                        infectious_mild,
                        mild_removals,
                        infection_probability,
                        ..s.clone()
                    }
                },
                |candidate| all_non_negative(&candidate.infectious_mild),
            )
        },
    )
}

/// One Metropolis step on the joint parameter vector.
///
/// Proposal: independent Gaussian random walk per component; the population
/// series is rescaled by the ratio of old to new `k` (floored at 1) and every
/// derived series is rebuilt from the candidate parameters before
/// feasibility is checked. Log-density: the four series likelihoods plus the
/// gamma priors.
fn resample_params(
    params: Params,
    state: EpidemicState,
    inits: Inits,
    observed: &ObservedSeries,
    config: &SeirConfig,
    rng: &mut StdRng,
) -> MetropolisOutcome<ParameterSample> {
    let t_ctrl = config.options.t_ctrl;
    let priors = config.priors.as_array();

    metropolis_step(
        ParameterSample { params, state },
        1,
        rng,
        |sample| {
            let s = &sample.state;
            let p = sample.params;
            let p_progress = 1.0 - (-p.rho).exp();
            let p_remove_mild = 1.0 - (-p.gamma_mild).exp();
            let p_remove_wild = 1.0 - (-p.gamma_wild).exp();

            let log_likelihood = binomial_series_log_likelihood(
                &s.susceptible,
                &s.infection_probability,
                &s.new_exposures,
            ) + binomial_series_log_likelihood_scalar(
                &s.exposed,
                p_progress,
                &s.new_infectious,
            ) + binomial_series_log_likelihood_scalar(
                &s.infectious_mild,
                p_remove_mild,
                &s.mild_removals,
            ) + binomial_series_log_likelihood_scalar(
                &s.infectious_wild,
                p_remove_wild,
                &observed.wild_removals,
            );

            let log_prior: f64 = priors
                .iter()
                .zip(p.to_array())
                .map(|(prior, value)| log_gamma_floor(value, *prior))
                .sum();

            log_likelihood + log_prior
        },
        |current, rng| {
            propose_with_retries(MAX_PROPOSAL_ATTEMPTS, || {
                let mut values = current.params.to_array();
                for (value, scale) in values.iter_mut().zip(config.walk_scales.as_array()) {
                    let noise: f64 = StandardNormal.sample(rng);
                    *value += scale * noise;
                }
                let candidate = Params::from_array(values);
                if !candidate.is_strictly_positive() || !config.bounds.contain(candidate) {
                    return None;
                }

                let population =
                    rescaled_population(&current.state.population, current.params.k, candidate.k);
                let susceptible =
                    susceptible_series(&current.state.new_exposures, &population);
                let exposed = exposed_series(
                    inits.exposed,
                    &current.state.new_exposures,
                    &current.state.new_infectious,
                );
                let (mild_inflow, wild_inflow) =
                    split_infectious_inflow(&current.state.new_infectious, candidate.delta);
                let infectious_mild = infectious_series(
                    inits.infectious_mild,
                    &mild_inflow,
                    &current.state.mild_removals,
                );
                let infectious_wild = infectious_series(
                    inits.infectious_wild,
                    &wild_inflow,
                    &observed.wild_removals,
                );

                let feasible = all_non_negative(&susceptible)
                    && all_non_negative(&exposed)
                    && all_non_negative(&infectious_mild)
                    && all_non_negative(&infectious_wild);
                if !feasible {
                    return None;
                }

                let rate = transmission_rate(
                    candidate.beta,
                    candidate.q,
                    t_ctrl,
                    population.len(),
                );
                let infection_probability = infection_probability(
                    &rate,
                    &infectious_mild,
                    &infectious_wild,
                    &population,
                );

                Some(ParameterSample {
                    params: candidate,
                    state: EpidemicState {
                        susceptible,
                        exposed,
                        infectious_mild,
                        infectious_wild,
                        new_exposures: current.state.new_exposures.clone(),
                        new_infectious: current.state.new_infectious.clone(),
                        mild_removals: current.state.mild_removals.clone(),
                        infection_probability,
                        population,
                    },
                })
            })
        },
    )
}

/// Effective reproduction number per day for the given parameters and state:
/// `R0(t) = rate(t) / (delta * gamma_mild + (1 - delta) * gamma_wild)
///        * S(t) / N(t)`.
fn reproduction_trajectory(params: Params, state: &EpidemicState, t_ctrl: usize) -> Vec<f64> {
    let rate = transmission_rate(params.beta, params.q, t_ctrl, state.horizon());
    let removal = params.delta.mul_add(
        params.gamma_mild,
        (1.0 - params.delta) * params.gamma_wild,
    );
    rate.iter()
        .zip(state.susceptible.iter().zip(state.population.iter()))
        .map(|(rate, (s, n))| rate / removal * count_to_f64(*s) / count_to_f64(*n))
        .collect()
}

/// Rescale the population series by `old_k / new_k`, never dropping a day
/// below one individual.
fn rescaled_population(population: &[i64], old_k: f64, new_k: f64) -> Vec<i64> {
    population
        .iter()
        .map(|n| round_half_up(count_to_f64(*n) * old_k / new_k).max(1))
        .collect()
}

/// Single-site proposal shared by the three latent-series samplers.
///
/// Each attempt perturbs the target series mass-conservatively, rebuilds the
/// dependent derived series into a fresh snapshot, and hands the candidate to
/// the feasibility predicate; an infeasible candidate is dropped whole, so no
/// partial mutation can leak into the current state.
fn single_site_proposal(
    current: &EpidemicState,
    series: &[i64],
    rng: &mut StdRng,
    rebuild: impl Fn(&EpidemicState, Vec<i64>) -> EpidemicState,
    feasible: impl Fn(&EpidemicState) -> bool,
) -> ProposalOutcome<EpidemicState> {
    propose_with_retries(MAX_PROPOSAL_ATTEMPTS, || {
        let perturbed = perturb_series(series, rng);
        let candidate = rebuild(current, perturbed);
        feasible(&candidate).then_some(candidate)
    })
}

/// Mass-conserving symmetric perturbation of one integer-count series.
///
/// Picks up to [`MAX_SWAP_SITES`] distinct sources among entries >= 1 and an
/// equal number of distinct destinations over the full range, then either
/// moves one unit per pair (probability one half) or moves a proportional
/// share using the [`SOURCE_DIVISOR`]/[`DESTINATION_DIVISOR`] pair.
fn perturb_series(series: &[i64], rng: &mut StdRng) -> Vec<i64> {
    let mut candidate = series.to_vec();

    let nonzero: Vec<usize> = series
        .iter()
        .enumerate()
        .filter(|(_, value)| **value >= 1)
        .map(|(day, _)| day)
        .collect();
    let site_count = nonzero.len().min(MAX_SWAP_SITES);
    if site_count == 0 {
        return candidate;
    }

    let sources: Vec<usize> = index::sample(rng, nonzero.len(), site_count)
        .iter()
        .map(|pick| nonzero[pick])
        .collect();
    let destinations: Vec<usize> = index::sample(rng, series.len(), site_count).into_vec();

    if rng.random::<f64>() < 0.5 {
        for day in &sources {
            candidate[*day] -= 1;
        }
        for day in &destinations {
            candidate[*day] += 1;
        }
    } else {
        // Both shares are read before either side is applied, since a day can
        // be a source and a destination at once.
        let taken: Vec<i64> = sources
            .iter()
            .map(|day| candidate[*day] / SOURCE_DIVISOR)
            .collect();
        let given: Vec<i64> = destinations
            .iter()
            .map(|day| candidate[*day] / DESTINATION_DIVISOR)
            .collect();
        for (day, amount) in sources.iter().zip(taken) {
            candidate[*day] -= amount;
        }
        for (day, amount) in destinations.iter().zip(given) {
            candidate[*day] += amount;
        }
    }

    candidate
}

fn all_non_negative(series: &[i64]) -> bool {
    series.iter().all(|value| *value >= 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn perturbation_conserves_total_mass_for_small_counts() {
        // All entries stay below both divisors, so proportional moves shift
        // nothing and unit moves shift one unit per pair in each direction.
        let series = vec![5, 0, 3, 7, 1, 0, 4, 2, 6, 1];
        let total: i64 = series.iter().sum();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let candidate = perturb_series(&series, &mut rng);
            assert_eq!(candidate.len(), series.len());
            assert_eq!(candidate.iter().sum::<i64>(), total);
        }
    }

    #[test]
    fn perturbation_of_all_zero_series_is_identity() {
        let series = vec![0; 6];
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(perturb_series(&series, &mut rng), series);
    }

    #[test]
    fn infeasible_proposal_leaves_the_current_state_untouched() {
        let current = EpidemicState {
            susceptible: vec![10, 9, 8],
            exposed: vec![2, 3, 4],
            infectious_mild: vec![1, 1, 1],
            infectious_wild: vec![1, 1, 1],
            new_exposures: vec![1, 1, 1],
            new_infectious: vec![0, 0, 0],
            mild_removals: vec![0, 0, 0],
            infection_probability: vec![0.1, 0.1, 0.1],
            population: vec![10, 10, 10],
        };
        let snapshot = current.clone();
        let mut rng = StdRng::seed_from_u64(9);
        let outcome = single_site_proposal(
            &current,
            &current.new_exposures,
            &mut rng,
            |s, new_exposures| EpidemicState {
                new_exposures,
                ..s.clone()
            },
            |_| false,
        );
        assert_eq!(outcome, ProposalOutcome::Exhausted);
        assert_eq!(current, snapshot);
    }

    #[test]
    fn population_rescaling_floors_at_one() {
        let population = vec![100, 3, 1];
        assert_eq!(rescaled_population(&population, 1.0, 2.0), vec![50, 2, 1]);
        assert_eq!(rescaled_population(&population, 1.0, 1_000.0), vec![1, 1, 1]);
        assert_eq!(rescaled_population(&population, 2.0, 1.0), vec![200, 6, 2]);
    }

    #[test]
    fn reproduction_trajectory_matches_the_closed_form() {
        let params = Params {
            beta: 2.0,
            q: 0.1,
            delta: 0.5,
            rho: 0.3,
            gamma_mild: 0.2,
            gamma_wild: 0.4,
            k: 1.0,
        };
        let state = EpidemicState {
            susceptible: vec![100, 50],
            exposed: vec![0, 0],
            infectious_mild: vec![0, 0],
            infectious_wild: vec![0, 0],
            new_exposures: vec![0, 0],
            new_infectious: vec![0, 0],
            mild_removals: vec![0, 0],
            infection_probability: vec![0.0, 0.0],
            population: vec![100, 100],
        };
        let trajectory = reproduction_trajectory(params, &state, 5);
        // Removal denominator: 0.5 * 0.2 + 0.5 * 0.4 = 0.3.
        assert!((trajectory[0] - 2.0 / 0.3).abs() < 1.0e-12);
        assert!((trajectory[1] - 2.0 / 0.3 * 0.5).abs() < 1.0e-12);
    }
}
