//! Likelihood and prior log-density helpers.
//!
//! Every log is taken of `density + LOG_FLOOR_EPSILON` so that a single
//! zero-probability observation floors its term at `ln(epsilon)` instead of
//! collapsing the whole trajectory log-likelihood to negative infinity and
//! stalling the chain.

use statrs::function::gamma::ln_gamma;

use super::recursion::count_to_f64;
use super::types::GammaPrior;

/// Additive floor applied inside every log-density evaluation.
pub const LOG_FLOOR_EPSILON: f64 = 1.0e-16;

/// Binomial probability mass `P(X = k)` for `X ~ Binomial(n, p)`.
///
/// Returns `0` outside the support, including for negative trial counts,
/// which infeasible candidate states can produce.
#[must_use]
pub fn binomial_pmf(trials: i64, success: f64, count: i64) -> f64 {
    if trials < 0 || count < 0 || count > trials {
        return 0.0;
    }
    if success <= 0.0 {
        return if count == 0 { 1.0 } else { 0.0 };
    }
    if success >= 1.0 {
        return if count == trials { 1.0 } else { 0.0 };
    }

    let n = count_to_f64(trials);
    let k = count_to_f64(count);
    let ln_choose = ln_gamma(n + 1.0) - ln_gamma(k + 1.0) - ln_gamma(n - k + 1.0);
    (ln_choose + k * success.ln() + (n - k) * (-success).ln_1p()).exp()
}

/// `ln(Binomial(n, p).pmf(k) + epsilon)`.
#[must_use]
pub fn log_binomial_floor(trials: i64, success: f64, count: i64) -> f64 {
    (binomial_pmf(trials, success, count) + LOG_FLOOR_EPSILON).ln()
}

/// Whole-series binomial log-likelihood with a per-day success probability.
#[must_use]
pub fn binomial_series_log_likelihood(trials: &[i64], success: &[f64], counts: &[i64]) -> f64 {
    trials
        .iter()
        .zip(success.iter())
        .zip(counts.iter())
        .map(|((n, p), k)| log_binomial_floor(*n, *p, *k))
        .sum()
}

/// Whole-series binomial log-likelihood with one shared success probability.
#[must_use]
pub fn binomial_series_log_likelihood_scalar(trials: &[i64], success: f64, counts: &[i64]) -> f64 {
    trials
        .iter()
        .zip(counts.iter())
        .map(|(n, k)| log_binomial_floor(*n, success, *k))
        .sum()
}

/// Gamma density with shape/rate parameterization; `0` for `value <= 0`.
#[must_use]
pub fn gamma_pdf(value: f64, prior: GammaPrior) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    let GammaPrior { shape, rate } = prior;
    (shape.mul_add(rate.ln(), -ln_gamma(shape)) + (shape - 1.0) * value.ln() - rate * value).exp()
}

/// `ln(Gamma(shape, rate).pdf(value) + epsilon)`.
#[must_use]
pub fn log_gamma_floor(value: f64, prior: GammaPrior) -> f64 {
    (gamma_pdf(value, prior) + LOG_FLOOR_EPSILON).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn binomial_pmf_matches_closed_form() {
        // Binomial(4, 0.5) is 1/16, 4/16, 6/16, 4/16, 1/16.
        assert_relative_eq!(binomial_pmf(4, 0.5, 0), 0.0625, epsilon = 1.0e-12);
        assert_relative_eq!(binomial_pmf(4, 0.5, 2), 0.375, epsilon = 1.0e-12);
        assert_relative_eq!(binomial_pmf(4, 0.5, 4), 0.0625, epsilon = 1.0e-12);
    }

    #[test]
    fn binomial_pmf_sums_to_one() {
        let total: f64 = (0..=10).map(|k| binomial_pmf(10, 0.37, k)).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1.0e-10);
    }

    #[test]
    fn binomial_pmf_is_zero_outside_support() {
        assert_relative_eq!(binomial_pmf(5, 0.4, 6), 0.0);
        assert_relative_eq!(binomial_pmf(5, 0.4, -1), 0.0);
        assert_relative_eq!(binomial_pmf(-3, 0.4, 0), 0.0);
    }

    #[test]
    fn binomial_pmf_handles_degenerate_probabilities() {
        assert_relative_eq!(binomial_pmf(5, 0.0, 0), 1.0);
        assert_relative_eq!(binomial_pmf(5, 0.0, 1), 0.0);
        assert_relative_eq!(binomial_pmf(5, 1.0, 5), 1.0);
        assert_relative_eq!(binomial_pmf(5, 1.0, 4), 0.0);
    }

    #[test]
    fn log_floor_keeps_impossible_observations_finite() {
        let term = log_binomial_floor(5, 0.4, 9);
        assert_relative_eq!(term, LOG_FLOOR_EPSILON.ln());
        assert!(term.is_finite());
    }

    #[test]
    fn series_log_likelihood_sums_day_terms() {
        let trials = vec![10, 10];
        let success = vec![0.3, 0.6];
        let counts = vec![3, 6];
        let expected = log_binomial_floor(10, 0.3, 3) + log_binomial_floor(10, 0.6, 6);
        assert_relative_eq!(
            binomial_series_log_likelihood(&trials, &success, &counts),
            expected,
        );
    }

    #[test]
    fn gamma_pdf_matches_exponential_special_case() {
        // Gamma(1, rate) is Exponential(rate).
        let prior = GammaPrior {
            shape: 1.0,
            rate: 2.0,
        };
        assert_relative_eq!(gamma_pdf(0.5, prior), 2.0 * (-1.0_f64).exp(), epsilon = 1.0e-12);
    }

    #[test]
    fn gamma_density_floors_at_epsilon_for_non_positive_values() {
        let prior = GammaPrior {
            shape: 2.0,
            rate: 10.0,
        };
        assert_relative_eq!(log_gamma_floor(0.0, prior), LOG_FLOOR_EPSILON.ln());
        assert_relative_eq!(log_gamma_floor(-1.0, prior), LOG_FLOOR_EPSILON.ln());
    }
}
