//! Reusable Metropolis-Hastings plumbing.
//!
//! The driver in this module is model-agnostic: it owns the accept/reject
//! decision and nothing else. Proposal generation, feasibility filtering, and
//! retry bookkeeping live in [`propose_with_retries`], which returns a tagged
//! outcome so callers can tell an accepted candidate apart from a retry-budget
//! exhaustion instead of inferring it from output equality.

use rand::Rng;

/// Result of a bounded-retry proposal attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposalOutcome<T> {
    /// A feasible candidate was found within the attempt budget.
    Candidate(T),
    /// Every attempt was rejected by the feasibility predicate.
    Exhausted,
}

/// Run `attempt` until it yields a feasible candidate or `budget` attempts
/// have failed.
///
/// `attempt` returns `None` when the generated candidate violated its
/// feasibility predicate; any partial work from that attempt must already be
/// discarded by the closure itself.
pub fn propose_with_retries<T>(
    budget: usize,
    mut attempt: impl FnMut() -> Option<T>,
) -> ProposalOutcome<T> {
    for _ in 0..budget {
        if let Some(candidate) = attempt() {
            return ProposalOutcome::Candidate(candidate);
        }
    }
    ProposalOutcome::Exhausted
}

/// Proposal counters for a single Metropolis-Hastings block.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProposalStats {
    pub proposed: usize,
    pub accepted: usize,
    pub exhausted: usize,
}

impl ProposalStats {
    /// Record one driver step.
    pub const fn record(&mut self, outcome: StepRecord) {
        self.proposed += 1;
        if outcome.accepted {
            self.accepted += 1;
        }
        if outcome.exhausted {
            self.exhausted += 1;
        }
    }

    /// Acceptance rate in `[0, 1]`, or `0` if no proposals were made.
    #[must_use]
    pub fn acceptance_rate(self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            usize_to_f64(self.accepted) / usize_to_f64(self.proposed)
        }
    }
}

/// What a single driver step did, for diagnostics accounting.
#[derive(Debug, Clone, Copy)]
pub struct StepRecord {
    pub accepted: bool,
    pub exhausted: bool,
}

/// Outcome of one or more Metropolis steps.
#[derive(Debug, Clone)]
pub struct MetropolisOutcome<T> {
    /// The retained sample: the last accepted candidate, or the input sample
    /// if every step rejected or exhausted.
    pub sample: T,
    /// Log-density of the retained sample.
    pub log_prob: f64,
    /// Log-density of the sample as it was before the first step.
    pub previous_log_prob: f64,
    /// Whether the final step accepted its candidate.
    pub accepted: bool,
    /// Whether any step fell back to a self-transition because its proposal
    /// budget was exhausted.
    pub exhausted: bool,
}

/// Perform `steps` Metropolis accept/reject steps starting from `sample`.
///
/// `log_density` evaluates the (unnormalized) target log-density.
/// `propose` must implement a symmetric proposal, `q(x'|x) = q(x|x')`, and is
/// expected to return only feasibility-filtered candidates (see
/// [`propose_with_retries`]); a [`ProposalOutcome::Exhausted`] outcome is
/// treated as a self-transition, which is always a valid (if mixing-free)
/// Metropolis move.
///
/// Acceptance draws `u ~ Uniform(0, 1)` and compares `ln u` against the
/// log-density difference capped at zero, which is stable even for large
/// differences in either direction.
pub fn metropolis_step<T, R: Rng + ?Sized>(
    sample: T,
    steps: usize,
    rng: &mut R,
    log_density: impl Fn(&T) -> f64,
    mut propose: impl FnMut(&T, &mut R) -> ProposalOutcome<T>,
) -> MetropolisOutcome<T> {
    let previous_log_prob = log_density(&sample);
    let mut current = sample;
    let mut current_log_prob = previous_log_prob;
    let mut accepted = false;
    let mut exhausted = false;

    for _ in 0..steps {
        accepted = false;
        match propose(&current, rng) {
            ProposalOutcome::Exhausted => {
                exhausted = true;
            }
            ProposalOutcome::Candidate(candidate) => {
                let candidate_log_prob = log_density(&candidate);
                let accept_log_prob = (candidate_log_prob - current_log_prob).min(0.0);
                if rng.random::<f64>().ln() <= accept_log_prob {
                    current = candidate;
                    current_log_prob = candidate_log_prob;
                    accepted = true;
                }
            }
        }
    }

    MetropolisOutcome {
        sample: current,
        log_prob: current_log_prob,
        previous_log_prob,
        accepted,
        exhausted,
    }
}

fn usize_to_f64(value: usize) -> f64 {
    f64::from(u32::try_from(value).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn retry_combinator_returns_first_feasible_candidate() {
        let mut attempts = 0;
        let outcome = propose_with_retries(100, || {
            attempts += 1;
            if attempts < 4 { None } else { Some(attempts) }
        });
        assert_eq!(outcome, ProposalOutcome::Candidate(4));
    }

    #[test]
    fn retry_combinator_reports_exhaustion_after_budget() {
        let mut attempts = 0;
        let outcome: ProposalOutcome<i32> = propose_with_retries(7, || {
            attempts += 1;
            None
        });
        assert_eq!(attempts, 7);
        assert_eq!(outcome, ProposalOutcome::Exhausted);
    }

    #[test]
    fn proposal_stats_tracks_acceptance_and_exhaustion() {
        let mut stats = ProposalStats::default();
        stats.record(StepRecord {
            accepted: true,
            exhausted: false,
        });
        stats.record(StepRecord {
            accepted: false,
            exhausted: true,
        });
        assert!((stats.acceptance_rate() - 0.5).abs() < 1.0e-12);
        assert_eq!(stats.exhausted, 1);
    }

    #[test]
    fn uphill_moves_are_always_accepted() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let outcome = metropolis_step(
                0_i32,
                1,
                &mut rng,
                |x| f64::from(*x),
                |_, _| ProposalOutcome::Candidate(3),
            );
            assert!(outcome.accepted);
            assert_eq!(outcome.sample, 3);
            assert!((outcome.log_prob - 3.0).abs() < 1.0e-12);
            assert!((outcome.previous_log_prob - 0.0).abs() < 1.0e-12);
        }
    }

    #[test]
    fn downhill_acceptance_frequency_matches_metropolis_bound() {
        // Fixed log-density gap of -0.5; acceptance frequency should converge
        // to exp(-0.5) over repeated independent steps.
        let delta = -0.5_f64;
        let mut rng = StdRng::seed_from_u64(42);
        let trials = 20_000_u32;
        let mut accepted = 0_u32;
        for _ in 0..trials {
            let outcome = metropolis_step(
                0_i32,
                1,
                &mut rng,
                |x| if *x == 0 { 0.0 } else { delta },
                |_, _| ProposalOutcome::Candidate(1),
            );
            if outcome.accepted {
                accepted += 1;
            }
        }
        let frequency = f64::from(accepted) / f64::from(trials);
        assert!((frequency - delta.exp()).abs() < 0.02);
    }

    #[test]
    fn exhausted_proposal_is_a_self_transition() {
        let mut rng = StdRng::seed_from_u64(5);
        let outcome = metropolis_step(
            9_i32,
            1,
            &mut rng,
            |x| f64::from(*x),
            |_, _| ProposalOutcome::<i32>::Exhausted,
        );
        assert_eq!(outcome.sample, 9);
        assert!(!outcome.accepted);
        assert!(outcome.exhausted);
        assert!((outcome.log_prob - outcome.previous_log_prob).abs() < 1.0e-12);
    }
}
