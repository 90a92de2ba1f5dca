//! Posterior storage and summaries.

use super::recursion::count_to_f64;
use super::types::{PARAM_COUNT, Params};

/// Multiplier for the normal-approximation 95% interval on the aggregate
/// basic reproduction number.
const CI_FACTOR: f64 = 1.96;

/// A single recorded draw: the parameter vector and the effective
/// reproduction-number trajectory it implied.
#[derive(Debug, Clone)]
pub struct PosteriorDraw {
    pub params: Params,
    pub reproduction: Vec<f64>,
}

/// Recorded draw collection.
#[derive(Debug, Clone, Default)]
pub struct PosteriorSamples {
    pub draws: Vec<PosteriorDraw>,
}

impl PosteriorSamples {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.draws.len()
    }
}

/// Component-wise posterior mean and standard deviation of the parameters.
#[derive(Debug, Clone, Copy)]
pub struct ParamsSummary {
    pub mean: Params,
    pub std_dev: Params,
}

/// Elementwise mean and standard deviation of a per-day trajectory across
/// draws.
#[derive(Debug, Clone, Default)]
pub struct TrajectorySummary {
    pub mean: Vec<f64>,
    pub std_dev: Vec<f64>,
}

/// Component-wise mean and standard deviation of the recorded parameter
/// draws. Callers gate on [`PosteriorSamples::is_empty`] first.
#[must_use]
pub fn summarize_params(samples: &PosteriorSamples) -> ParamsSummary {
    let mut mean = [0.0; PARAM_COUNT];
    let mut std_dev = [0.0; PARAM_COUNT];
    for component in 0..PARAM_COUNT {
        let values: Vec<f64> = samples
            .draws
            .iter()
            .map(|draw| draw.params.to_array()[component])
            .collect();
        let (value_mean, value_std) = mean_and_std(&values);
        mean[component] = value_mean;
        std_dev[component] = value_std;
    }
    ParamsSummary {
        mean: Params::from_array(mean),
        std_dev: Params::from_array(std_dev),
    }
}

/// Elementwise mean and standard deviation of the recorded
/// reproduction-number trajectories.
#[must_use]
pub fn summarize_reproduction_trajectories(samples: &PosteriorSamples) -> TrajectorySummary {
    let horizon = samples
        .draws
        .first()
        .map_or(0, |draw| draw.reproduction.len());
    let mut mean = Vec::with_capacity(horizon);
    let mut std_dev = Vec::with_capacity(horizon);
    for day in 0..horizon {
        let values: Vec<f64> = samples
            .draws
            .iter()
            .map(|draw| draw.reproduction[day])
            .collect();
        let (value_mean, value_std) = mean_and_std(&values);
        mean.push(value_mean);
        std_dev.push(value_std);
    }
    TrajectorySummary { mean, std_dev }
}

/// Normal-approximation 95% interval for the aggregate basic reproduction
/// number,
/// `R0 = (sum D_mild + sum D_wild) * beta
///     / (sum D_mild * gamma_mild + sum D_wild * gamma_wild)`,
/// evaluated per recorded draw against the final latent mild-removal total
/// and the observed wild-removal total.
#[must_use]
pub fn basic_reproduction_interval(
    samples: &PosteriorSamples,
    mild_removal_total: i64,
    wild_removal_total: i64,
) -> (f64, f64) {
    let mild = count_to_f64(mild_removal_total);
    let wild = count_to_f64(wild_removal_total);
    let values: Vec<f64> = samples
        .draws
        .iter()
        .map(|draw| {
            let params = draw.params;
            (mild + wild) * params.beta
                / mild.mul_add(params.gamma_mild, wild * params.gamma_wild)
        })
        .collect();
    let (mean, std_dev) = mean_and_std(&values);
    (
        CI_FACTOR.mul_add(-std_dev, mean),
        CI_FACTOR.mul_add(std_dev, mean),
    )
}

fn mean_and_std(values: &[f64]) -> (f64, f64) {
    let n = usize_to_f64(values.len());
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|value| {
            let centered = value - mean;
            centered * centered
        })
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}
