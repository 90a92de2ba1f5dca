//! Latent epidemic state: construction by forward simulation and the
//! representation-invariant checker.

use num_traits::ToPrimitive;
use rand::rngs::StdRng;
use rand_distr::{Binomial, Distribution};
use thiserror::Error;

use crate::input::ObservedSeries;

use super::recursion::{
    count_to_f64, exposed_series, infection_probability, infectious_series, round_half_up,
    split_infectious_inflow, susceptible_series, transmission_rate,
};
use super::types::{Inits, Params, SeirError};

/// One violated state invariant, with enough detail to locate the defect.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum InvariantViolation {
    #[error("{series} is negative on day {day}: {value}")]
    NegativeCount {
        series: &'static str,
        day: usize,
        value: i64,
    },
    #[error("infection probability on day {day} is outside [0, 1]: {value}")]
    ProbabilityOutOfRange { day: usize, value: f64 },
    #[error(
        "{series} on day {day} disagrees with its recursion: stored {stored}, recomputed {recomputed}"
    )]
    InconsistentSeries {
        series: &'static str,
        day: usize,
        stored: i64,
        recomputed: i64,
    },
    #[error(
        "infection probability on day {day} disagrees with its recursion: stored {stored}, recomputed {recomputed}"
    )]
    InconsistentProbability {
        day: usize,
        stored: f64,
        recomputed: f64,
    },
}

/// Immutable snapshot of the full simulation state over the horizon.
///
/// Samplers never mutate a snapshot in place; each proposal builds a fresh
/// value with the perturbed latent series and every dependent derived series
/// recomputed through the recursion functions. The previous snapshot stays
/// untouched, so a rejected proposal leaves no trace.
#[derive(Debug, Clone, PartialEq)]
pub struct EpidemicState {
    pub susceptible: Vec<i64>,
    pub exposed: Vec<i64>,
    pub infectious_mild: Vec<i64>,
    pub infectious_wild: Vec<i64>,
    /// Latent daily new-exposure counts (S to E flow).
    pub new_exposures: Vec<i64>,
    /// Latent daily new-infectious counts (E to I flow).
    pub new_infectious: Vec<i64>,
    /// Latent daily removals from the mild infectious compartment.
    pub mild_removals: Vec<i64>,
    /// Per-day infection probability.
    pub infection_probability: Vec<f64>,
    /// Per-day population, rescaled when the scaling parameter `k` moves.
    pub population: Vec<i64>,
}

impl EpidemicState {
    /// Number of days covered by the snapshot.
    #[must_use]
    pub const fn horizon(&self) -> usize {
        self.population.len()
    }

    /// Check every representation invariant.
    ///
    /// All counts must be non-negative, the infection probability must stay
    /// in `[0, 1]`, and every derived series must exactly equal what the
    /// recursion functions compute from the latent series and `params`. A
    /// violation is a programming defect in a sampler, never a property of
    /// the data.
    ///
    /// # Errors
    ///
    /// Returns the first detected `InvariantViolation`.
    pub fn check_consistency(
        &self,
        inits: Inits,
        params: Params,
        t_ctrl: usize,
        wild_removals: &[i64],
    ) -> Result<(), InvariantViolation> {
        check_non_negative("susceptible", &self.susceptible)?;
        check_non_negative("exposed", &self.exposed)?;
        check_non_negative("infectious_mild", &self.infectious_mild)?;
        check_non_negative("infectious_wild", &self.infectious_wild)?;
        check_non_negative("new_exposures", &self.new_exposures)?;
        check_non_negative("new_infectious", &self.new_infectious)?;
        check_non_negative("mild_removals", &self.mild_removals)?;
        check_non_negative("wild_removals", wild_removals)?;

        for (day, value) in self.infection_probability.iter().copied().enumerate() {
            if !(0.0..=1.0).contains(&value) {
                return Err(InvariantViolation::ProbabilityOutOfRange { day, value });
            }
        }

        compare_series(
            "susceptible",
            &self.susceptible,
            &susceptible_series(&self.new_exposures, &self.population),
        )?;
        compare_series(
            "exposed",
            &self.exposed,
            &exposed_series(inits.exposed, &self.new_exposures, &self.new_infectious),
        )?;
        let (mild_inflow, wild_inflow) = split_infectious_inflow(&self.new_infectious, params.delta);
        compare_series(
            "infectious_mild",
            &self.infectious_mild,
            &infectious_series(inits.infectious_mild, &mild_inflow, &self.mild_removals),
        )?;
        compare_series(
            "infectious_wild",
            &self.infectious_wild,
            &infectious_series(inits.infectious_wild, &wild_inflow, wild_removals),
        )?;

        let rate = transmission_rate(params.beta, params.q, t_ctrl, self.horizon());
        let recomputed = infection_probability(
            &rate,
            &self.infectious_mild,
            &self.infectious_wild,
            &self.population,
        );
        for (day, (stored, recomputed)) in self
            .infection_probability
            .iter()
            .zip(recomputed.iter())
            .enumerate()
        {
            if stored != recomputed {
                return Err(InvariantViolation::InconsistentProbability {
                    day,
                    stored: *stored,
                    recomputed: *recomputed,
                });
            }
        }

        Ok(())
    }
}

fn check_non_negative(series: &'static str, values: &[i64]) -> Result<(), InvariantViolation> {
    for (day, value) in values.iter().copied().enumerate() {
        if value < 0 {
            return Err(InvariantViolation::NegativeCount { series, day, value });
        }
    }
    Ok(())
}

fn compare_series(
    series: &'static str,
    stored: &[i64],
    recomputed: &[i64],
) -> Result<(), InvariantViolation> {
    for (day, (stored, recomputed)) in stored.iter().zip(recomputed.iter()).enumerate() {
        if stored != recomputed {
            return Err(InvariantViolation::InconsistentSeries {
                series,
                day,
                stored: *stored,
                recomputed: *recomputed,
            });
        }
    }
    Ok(())
}

/// Construct the initial state by forward-simulating the expected-count
/// recursion from the day-zero compartments.
///
/// Each day flows the rounded expected counts through the compartments, with
/// the observed wild removals as the wild outflow; the final day's
/// new-exposure count is drawn from its binomial distribution so the chain
/// does not start on an atypical boundary value.
///
/// # Errors
///
/// Returns `SeirError::InitializationFailure` if the simulation produces an
/// infection probability outside `[0, 1]` or drives a compartment negative,
/// both signs that the configuration is inconsistent with the observed data.
pub fn initialize_state(
    inits: Inits,
    params: Params,
    observed: &ObservedSeries,
    t_ctrl: usize,
    rng: &mut StdRng,
) -> Result<EpidemicState, SeirError> {
    let t_end = observed.horizon();
    let population = &observed.population;
    let rate = transmission_rate(params.beta, params.q, t_ctrl, t_end);
    let p_progress = 1.0 - (-params.rho).exp();
    let p_remove_mild = 1.0 - (-params.gamma_mild).exp();

    let mut susceptible = vec![population[0]];
    let mut exposed = vec![inits.exposed];
    let mut infectious_mild = vec![inits.infectious_mild];
    let mut infectious_wild = vec![inits.infectious_wild];
    let mut new_exposures = Vec::with_capacity(t_end);
    let mut new_infectious = Vec::with_capacity(t_end);
    let mut mild_removals = Vec::with_capacity(t_end);
    let mut probability = Vec::with_capacity(t_end);

    for t in 0..t_end - 1 {
        let p = daily_probability(rate[t], infectious_mild[t], infectious_wild[t], population[t]);
        if !(0.0..=1.0).contains(&p) {
            return Err(SeirError::InitializationFailure {
                day: t,
                detail: format!("infection probability {p} outside [0, 1]"),
            });
        }

        let b = round_half_up(count_to_f64(susceptible[t]) * p);
        let c = round_half_up(count_to_f64(exposed[t]) * p_progress);
        let d_mild = round_half_up(count_to_f64(infectious_mild[t]) * p_remove_mild);
        let c_mild = round_half_up(count_to_f64(c) * params.delta);
        let c_wild = c - c_mild;

        let next_wild = infectious_wild[t] + c_wild - observed.wild_removals[t];
        if next_wild < 0 {
            return Err(SeirError::InitializationFailure {
                day: t + 1,
                detail: format!(
                    "wild infectious count {next_wild}: observed removals exceed the compartment"
                ),
            });
        }

        susceptible.push(susceptible[t] - b + population[t + 1] - population[t]);
        exposed.push(exposed[t] + b - c);
        infectious_mild.push(infectious_mild[t] + c_mild - d_mild);
        infectious_wild.push(next_wild);
        new_exposures.push(b);
        new_infectious.push(c);
        mild_removals.push(d_mild);
        probability.push(p);
    }

    // Final day: no successor compartments to fill, only the latent counts.
    let last = t_end - 1;
    let p = daily_probability(
        rate[last],
        infectious_mild[last],
        infectious_wild[last],
        population[last],
    );
    if !(0.0..=1.0).contains(&p) {
        return Err(SeirError::InitializationFailure {
            day: last,
            detail: format!("infection probability {p} outside [0, 1]"),
        });
    }
    let trials = u64::try_from(susceptible[last]).map_err(|_| SeirError::InitializationFailure {
        day: last,
        detail: format!("susceptible count {} is negative", susceptible[last]),
    })?;
    let b = Binomial::new(trials, p)
        .map_err(|source| SeirError::InitializationFailure {
            day: last,
            detail: format!("binomial draw failed: {source}"),
        })?
        .sample(rng);
    new_exposures.push(i64::try_from(b).unwrap_or(i64::MAX));
    new_infectious.push(round_half_up(count_to_f64(exposed[last]) * p_progress));
    mild_removals.push(
        (count_to_f64(infectious_mild[last]) * p_remove_mild)
            .floor()
            .to_i64()
            .unwrap_or(0),
    );
    probability.push(p);

    Ok(EpidemicState {
        susceptible,
        exposed,
        infectious_mild,
        infectious_wild,
        new_exposures,
        new_infectious,
        mild_removals,
        infection_probability: probability,
        population: population.clone(),
    })
}

fn daily_probability(rate: f64, mild: i64, wild: i64, population: i64) -> f64 {
    1.0 - (-rate * count_to_f64(mild + wild) / count_to_f64(population)).exp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn scenario_observed() -> ObservedSeries {
        ObservedSeries::new(vec![500, 500, 500, 500, 500], vec![0, 0, 1, 2, 1])
    }

    fn scenario_inits() -> Inits {
        Inits {
            exposed: 50,
            infectious_mild: 10,
            infectious_wild: 10,
        }
    }

    fn scenario_params() -> Params {
        Params {
            beta: 1.0,
            q: 0.1,
            delta: 0.5,
            rho: 0.3,
            gamma_mild: 0.2,
            gamma_wild: 0.2,
            k: 1.0,
        }
    }

    fn scenario_state() -> EpidemicState {
        let mut rng = StdRng::seed_from_u64(7);
        initialize_state(
            scenario_inits(),
            scenario_params(),
            &scenario_observed(),
            2,
            &mut rng,
        )
        .expect("forward simulation should succeed")
    }

    #[test]
    fn forward_simulation_stays_in_domain() {
        let state = scenario_state();
        assert_eq!(state.horizon(), 5);
        for day in 0..5 {
            assert!(state.susceptible[day] >= 0);
            assert!(state.exposed[day] >= 0);
            assert!(state.infectious_mild[day] >= 0);
            assert!(state.infectious_wild[day] >= 0);
            assert!((0.0..=1.0).contains(&state.infection_probability[day]));
        }
    }

    #[test]
    fn forward_simulation_satisfies_the_recursion_round_trip() {
        let state = scenario_state();
        let observed = scenario_observed();
        assert!(
            state
                .check_consistency(scenario_inits(), scenario_params(), 2, &observed.wild_removals)
                .is_ok()
        );
    }

    #[test]
    fn tampered_latent_series_is_detected() {
        let mut state = scenario_state();
        state.new_exposures[1] += 1;
        let observed = scenario_observed();
        let violation = state
            .check_consistency(scenario_inits(), scenario_params(), 2, &observed.wild_removals)
            .expect_err("tampering must be caught");
        assert!(matches!(
            violation,
            InvariantViolation::InconsistentSeries {
                series: "susceptible",
                ..
            }
        ));
    }

    #[test]
    fn negative_count_is_detected() {
        let mut state = scenario_state();
        state.mild_removals[0] = -1;
        let observed = scenario_observed();
        let violation = state
            .check_consistency(scenario_inits(), scenario_params(), 2, &observed.wild_removals)
            .expect_err("negative count must be caught");
        assert!(matches!(
            violation,
            InvariantViolation::NegativeCount {
                series: "mild_removals",
                day: 0,
                value: -1,
            }
        ));
    }

    #[test]
    fn out_of_range_probability_is_detected() {
        let mut state = scenario_state();
        state.infection_probability[3] = 1.5;
        let observed = scenario_observed();
        let violation = state
            .check_consistency(scenario_inits(), scenario_params(), 2, &observed.wild_removals)
            .expect_err("probability bound must be enforced");
        assert!(matches!(
            violation,
            InvariantViolation::ProbabilityOutOfRange { day: 3, .. }
        ));
    }

    #[test]
    fn excess_observed_removals_fail_initialization() {
        let observed = ObservedSeries::new(vec![500, 500, 500], vec![400, 0, 0]);
        let mut rng = StdRng::seed_from_u64(7);
        let result = initialize_state(
            scenario_inits(),
            scenario_params(),
            &observed,
            0,
            &mut rng,
        );
        assert!(matches!(
            result,
            Err(SeirError::InitializationFailure { day: 1, .. })
        ));
    }
}
