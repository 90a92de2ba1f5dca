//! Deterministic recursion functions for the compartment trajectories.
//!
//! Everything here is pure: given the latent daily counts and the parameters,
//! these functions reproduce the full compartment series day by day. Every
//! derived series stored in an [`super::state::EpidemicState`] must equal what
//! these functions compute from its generating inputs; the invariant checker
//! enforces exactly that.

use num_traits::ToPrimitive;

/// Round half-up: `floor(x + 0.5)`.
///
/// Used wherever a continuous expected count is cast to an integer series, so
/// that e.g. splitting the new-infectious counts by the mild fraction is
/// reproducible across call sites.
#[must_use]
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor().to_i64().unwrap_or(0)
}

/// Time-varying transmission rate over `t_end` days.
///
/// Equal to `beta` before the control day and decaying as
/// `beta * exp(-q * (t - t_ctrl))` from the control day onwards. A control
/// day at or beyond the horizon never activates.
#[must_use]
pub fn transmission_rate(beta: f64, q: f64, t_ctrl: usize, t_end: usize) -> Vec<f64> {
    let mut rate = vec![beta; t_end];
    for (t, value) in rate.iter_mut().enumerate().skip(t_ctrl) {
        let since_ctrl = usize_to_f64(t - t_ctrl);
        *value = beta * (-q * since_ctrl).exp();
        debug_assert!(*value >= 0.0);
    }
    rate
}

/// Susceptible counts: `S(0) = N(0)`, depleted by cumulative new exposures
/// and tracking external population change, i.e.
/// `S(t) = N(t) - sum(B[..t])`.
#[must_use]
pub fn susceptible_series(new_exposures: &[i64], population: &[i64]) -> Vec<i64> {
    let mut cumulative = 0;
    population
        .iter()
        .zip(std::iter::once(&0).chain(new_exposures.iter()))
        .map(|(n, b)| {
            cumulative += b;
            n - cumulative
        })
        .collect()
}

/// Exposed counts: `E(0) = e0`, `E(t+1) = E(t) + B(t) - C(t)`.
#[must_use]
pub fn exposed_series(e0: i64, new_exposures: &[i64], new_infectious: &[i64]) -> Vec<i64> {
    running_balance(e0, new_exposures, new_infectious)
}

/// Infectious counts from a generic inflow/outflow pair:
/// `I(0) = i0`, `I(t+1) = I(t) + inflow(t) - outflow(t)`.
///
/// Serves both the mild and the wild compartment with series-specific
/// arguments.
#[must_use]
pub fn infectious_series(i0: i64, inflow: &[i64], outflow: &[i64]) -> Vec<i64> {
    running_balance(i0, inflow, outflow)
}

/// Split the new-infectious counts into mild and wild inflows by the mild
/// fraction `delta`, with the wild share absorbing the rounding remainder.
#[must_use]
pub fn split_infectious_inflow(new_infectious: &[i64], delta: f64) -> (Vec<i64>, Vec<i64>) {
    let mild: Vec<i64> = new_infectious
        .iter()
        .map(|c| round_half_up(count_to_f64(*c) * delta))
        .collect();
    let wild: Vec<i64> = new_infectious
        .iter()
        .zip(mild.iter())
        .map(|(c, m)| c - m)
        .collect();
    (mild, wild)
}

/// Per-day infection probability,
/// `P(t) = 1 - exp(-rate(t) * (I_mild(t) + I_wild(t)) / N(t))`.
#[must_use]
pub fn infection_probability(
    trans_rate: &[f64],
    infectious_mild: &[i64],
    infectious_wild: &[i64],
    population: &[i64],
) -> Vec<f64> {
    trans_rate
        .iter()
        .zip(infectious_mild.iter().zip(infectious_wild.iter()))
        .zip(population.iter())
        .map(|((rate, (mild, wild)), n)| {
            let infectious = count_to_f64(mild + wild);
            1.0 - (-rate * infectious / count_to_f64(*n)).exp()
        })
        .collect()
}

fn running_balance(start: i64, inflow: &[i64], outflow: &[i64]) -> Vec<i64> {
    let mut series = Vec::with_capacity(inflow.len());
    let mut level = start;
    for (t, (inflow_t, outflow_t)) in inflow.iter().zip(outflow.iter()).enumerate() {
        if t == 0 {
            series.push(level);
        }
        if t + 1 < inflow.len() {
            level += inflow_t - outflow_t;
            series.push(level);
        }
    }
    series
}

pub(crate) fn count_to_f64(value: i64) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

pub(crate) fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
