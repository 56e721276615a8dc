//! Operator traits and adaptive weight bookkeeping.
//!
//! A PALNS run maintains one weight per destroy and repair operator and
//! samples operators proportionally to those weights. Scores accrue per
//! segment and weights decay geometrically when a segment ends, so
//! recently successful operators are picked more often.

use rand::rngs::StdRng;
use rand::Rng;

/// A solution the framework can optimize.
///
/// Costs are minimized; the framework never interprets the cost beyond
/// comparing values, so any non-negative measure works.
pub trait Solution: Clone + Send {
    /// Cost of the solution (lower is better).
    fn cost(&self) -> f64;
}

/// A destroy operator: removes part of a solution.
///
/// Operators are registered once and cloned into every worker, so they
/// may carry mutable state (adaptive degrees, tabu memory) that stays
/// worker-local.
pub trait DestroyOperator<S>: Send + Sync {
    /// Display name, also used as the key in the score artifact.
    fn name(&self) -> &str;

    /// Destroys part of the solution in place.
    fn destroy(&mut self, solution: &mut S, rng: &mut StdRng);

    /// Clones the operator into a fresh, worker-owned box.
    fn clone_box(&self) -> Box<dyn DestroyOperator<S> + '_>;

    /// Current removal fraction, for operators that expose one.
    ///
    /// Visitors use this pair of accessors to steer destroy
    /// aggressiveness without knowing the concrete operator type.
    fn removal_fraction(&self) -> Option<f64> {
        None
    }

    /// Sets the removal fraction, for operators that expose one.
    fn set_removal_fraction(&mut self, _fraction: f64) {}
}

/// A repair operator: reinserts removed elements into a solution.
pub trait RepairOperator<S>: Send + Sync {
    /// Display name, also used as the key in the score artifact.
    fn name(&self) -> &str;

    /// Repairs the solution in place.
    fn repair(&mut self, solution: &mut S, rng: &mut StdRng);

    /// Clones the operator into a fresh, worker-owned box.
    fn clone_box(&self) -> Box<dyn RepairOperator<S> + '_>;
}

/// Adaptive weights over a set of operators.
///
/// Selection is roulette-wheel over the current weights. Scores recorded
/// during a segment are averaged into the weights when the segment ends:
/// `w ← w·decay + (1 − decay)·segment_avg`, floored at `min_weight`.
#[derive(Debug, Clone)]
pub struct OperatorWeights {
    weights: Vec<f64>,
    segment_scores: Vec<f64>,
    segment_uses: Vec<usize>,
    decay: f64,
    min_weight: f64,
}

impl OperatorWeights {
    /// Creates uniform weights for `n` operators.
    pub fn new(n: usize, decay: f64, min_weight: f64) -> Self {
        Self {
            weights: vec![1.0; n],
            segment_scores: vec![0.0; n],
            segment_uses: vec![0; n],
            decay,
            min_weight,
        }
    }

    /// Number of operators tracked.
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    /// True if no operators are tracked.
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Current weight of operator `i`.
    pub fn weight(&self, i: usize) -> f64 {
        self.weights[i]
    }

    /// Roulette-wheel selection proportional to the current weights.
    pub fn select(&self, rng: &mut StdRng) -> usize {
        let total: f64 = self.weights.iter().sum();
        if total <= 0.0 {
            return 0;
        }

        let mut roll = rng.gen::<f64>() * total;
        for (i, w) in self.weights.iter().enumerate() {
            roll -= w;
            if roll <= 0.0 {
                return i;
            }
        }
        self.weights.len() - 1
    }

    /// Records a score for operator `i` in the running segment.
    pub fn record(&mut self, i: usize, score: f64) {
        self.segment_scores[i] += score;
        self.segment_uses[i] += 1;
    }

    /// Ends the segment: folds accrued scores into the weights.
    pub fn end_segment(&mut self) {
        for i in 0..self.weights.len() {
            if self.segment_uses[i] > 0 {
                let avg = self.segment_scores[i] / self.segment_uses[i] as f64;
                self.weights[i] = self.weights[i] * self.decay + (1.0 - self.decay) * avg;
                self.weights[i] = self.weights[i].max(self.min_weight);
            }
            self.segment_scores[i] = 0.0;
            self.segment_uses[i] = 0;
        }
    }
}
