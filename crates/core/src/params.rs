//! Framework configuration.

use crate::acceptance::AcceptanceCriterion;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration of the PALNS framework.
///
/// Every field has a documented default, so a parameters file only needs
/// to list the keys it overrides.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FrameworkParams {
    /// Maximum number of iterations per worker.
    pub max_iterations: usize,

    /// Warm-up iterations before `on_prerun_end` fires.
    pub prerun_iterations: usize,

    /// Wall-clock budget in milliseconds (0 = unlimited). Workers stop
    /// at the end of their current iteration once it is exhausted.
    pub time_limit_ms: u64,

    /// Iterations per weight-update segment.
    pub segment_size: usize,

    /// Geometric weight decay per segment, in (0, 1).
    pub score_decay: f64,

    /// Score added when an iteration produces a new global best.
    pub score_mult_global_best: f64,

    /// Score added when an iteration improves on the current solution.
    pub score_mult_improved: f64,

    /// Score added when a non-improving iteration is accepted.
    pub score_mult_accepted: f64,

    /// Weight floor; operators never fall below this.
    pub min_weight: f64,

    /// Iterations without improvement before the visitor's
    /// `on_many_iters_without_improvement` hook fires (and fires again
    /// every further multiple).
    pub iters_without_improvement_alarm: usize,

    /// Number of parallel multi-start workers.
    pub n_workers: usize,

    /// Acceptance criterion and its parameters.
    pub acceptance: AcceptanceCriterion,
}

impl Default for FrameworkParams {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
            prerun_iterations: 500,
            time_limit_ms: 0,
            segment_size: 100,
            score_decay: 0.9,
            score_mult_global_best: 33.0,
            score_mult_improved: 9.0,
            score_mult_accepted: 3.0,
            min_weight: 0.1,
            iters_without_improvement_alarm: 100,
            n_workers: 4,
            acceptance: AcceptanceCriterion::default(),
        }
    }
}

impl FrameworkParams {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the iteration budget.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Sets the wall-clock budget in milliseconds.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    /// Sets the segment size for weight updates.
    pub fn with_segment_size(mut self, size: usize) -> Self {
        self.segment_size = size.max(1);
        self
    }

    /// Sets the three score multipliers.
    pub fn with_scores(mut self, global_best: f64, improved: f64, accepted: f64) -> Self {
        self.score_mult_global_best = global_best;
        self.score_mult_improved = improved;
        self.score_mult_accepted = accepted;
        self
    }

    /// Sets the geometric weight decay.
    pub fn with_score_decay(mut self, decay: f64) -> Self {
        self.score_decay = decay.clamp(f64::MIN_POSITIVE, 1.0 - f64::EPSILON);
        self
    }

    /// Sets the number of workers.
    pub fn with_workers(mut self, n: usize) -> Self {
        self.n_workers = n.max(1);
        self
    }

    /// Sets the acceptance criterion.
    pub fn with_acceptance(mut self, acceptance: AcceptanceCriterion) -> Self {
        self.acceptance = acceptance;
        self
    }
}
