//! Acceptance criteria for the adaptive search loop.
//!
//! Three criteria are supported:
//!
//! - **Record-to-Record Travel**: accept a candidate iff its cost is at
//!   most `best · (1 + d)`, with the deviation `d` shrinking linearly
//!   from `start_deviation` to `end_deviation` over the run.
//! - **Simulated Annealing**: accept a worse candidate with probability
//!   `exp(-Δ / T)`. Start and end temperatures are calibrated so that a
//!   move with relative cost gap `init_accept_ratio_50p` (resp.
//!   `end_accept_ratio_50p`) is accepted with probability one half.
//!   Supports linear or exponential cooling and bounded reheating.
//! - **Threshold Acceptance**: accept iff cost ≤ `current · (1 + θ)`,
//!   with `θ` shrinking linearly.

use rand::rngs::StdRng;
use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cooling schedule for simulated annealing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CoolingSchedule {
    /// Temperature interpolates linearly between start and end.
    #[default]
    Linear,
    /// Temperature interpolates geometrically between start and end.
    Exponential,
}

/// Acceptance criterion selection and parameters.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "criterion", rename_all = "snake_case"))]
pub enum AcceptanceCriterion {
    /// Record-to-Record Travel.
    RecordToRecord {
        /// Deviation from the best cost at the start of the run.
        start_deviation: f64,
        /// Deviation from the best cost at the end of the run.
        end_deviation: f64,
    },
    /// Simulated Annealing.
    SimulatedAnnealing {
        /// Relative cost gap accepted with probability 1/2 at the start.
        init_accept_ratio_50p: f64,
        /// Relative cost gap accepted with probability 1/2 at the end.
        end_accept_ratio_50p: f64,
        /// Cooling schedule between the calibrated temperatures.
        schedule: CoolingSchedule,
        /// Maximum number of reheats.
        reheat_times: usize,
        /// Temperature multiplier applied on each reheat.
        reheat_factor: f64,
        /// Iterations without improvement that trigger a reheat.
        reheat_after: usize,
    },
    /// Threshold Acceptance.
    ThresholdAcceptance {
        /// Threshold over the current cost at the start of the run.
        start_threshold: f64,
        /// Threshold over the current cost at the end of the run.
        end_threshold: f64,
    },
}

impl Default for AcceptanceCriterion {
    fn default() -> Self {
        Self::RecordToRecord {
            start_deviation: 0.05,
            end_deviation: 0.0,
        }
    }
}

/// Worker-local acceptance state, calibrated on the initial cost.
#[derive(Debug, Clone)]
pub struct AcceptanceState {
    criterion: AcceptanceCriterion,
    t_start: f64,
    t_end: f64,
    reheat_boost: f64,
    reheats_done: usize,
}

impl AcceptanceState {
    /// Calibrates the acceptance state for one worker.
    pub fn new(criterion: AcceptanceCriterion, initial_cost: f64) -> Self {
        let (t_start, t_end) = match &criterion {
            AcceptanceCriterion::SimulatedAnnealing {
                init_accept_ratio_50p,
                end_accept_ratio_50p,
                ..
            } => {
                // exp(-gap·c0 / T) = 1/2  =>  T = gap·c0 / ln 2.
                let base = initial_cost.abs().max(1.0);
                (
                    (init_accept_ratio_50p * base / std::f64::consts::LN_2).max(f64::MIN_POSITIVE),
                    (end_accept_ratio_50p * base / std::f64::consts::LN_2).max(f64::MIN_POSITIVE),
                )
            }
            _ => (0.0, 0.0),
        };

        Self {
            criterion,
            t_start,
            t_end,
            reheat_boost: 1.0,
            reheats_done: 0,
        }
    }

    /// Current simulated-annealing temperature at run progress `p`.
    pub fn temperature(&self, progress: f64) -> f64 {
        let p = progress.clamp(0.0, 1.0);
        let t = match &self.criterion {
            AcceptanceCriterion::SimulatedAnnealing { schedule, .. } => match schedule {
                CoolingSchedule::Linear => self.t_start + (self.t_end - self.t_start) * p,
                CoolingSchedule::Exponential => {
                    self.t_start * (self.t_end / self.t_start).powf(p)
                }
            },
            _ => 0.0,
        };
        t * self.reheat_boost
    }

    /// Offers the state a chance to reheat after an improvement drought.
    ///
    /// Only meaningful for simulated annealing; a no-op otherwise.
    pub fn maybe_reheat(&mut self, iters_without_improvement: usize) {
        if let AcceptanceCriterion::SimulatedAnnealing {
            reheat_times,
            reheat_factor,
            reheat_after,
            ..
        } = &self.criterion
        {
            if *reheat_after > 0
                && self.reheats_done < *reheat_times
                && iters_without_improvement >= *reheat_after * (self.reheats_done + 1)
            {
                self.reheat_boost *= reheat_factor;
                self.reheats_done += 1;
                log::debug!(
                    "reheated to boost {:.3} ({}/{})",
                    self.reheat_boost,
                    self.reheats_done,
                    reheat_times
                );
            }
        }
    }

    /// Decides whether to accept a non-improving candidate.
    ///
    /// `progress` is the fraction of the iteration budget consumed.
    pub fn accept(
        &self,
        progress: f64,
        candidate_cost: f64,
        current_cost: f64,
        best_cost: f64,
        rng: &mut StdRng,
    ) -> bool {
        let p = progress.clamp(0.0, 1.0);
        match &self.criterion {
            AcceptanceCriterion::RecordToRecord {
                start_deviation,
                end_deviation,
            } => {
                let d = start_deviation + (end_deviation - start_deviation) * p;
                candidate_cost <= best_cost * (1.0 + d)
            }
            AcceptanceCriterion::SimulatedAnnealing { .. } => {
                let delta = candidate_cost - current_cost;
                if delta <= 0.0 {
                    return true;
                }
                let t = self.temperature(p);
                t > 0.0 && rng.gen::<f64>() < (-delta / t).exp()
            }
            AcceptanceCriterion::ThresholdAcceptance {
                start_threshold,
                end_threshold,
            } => {
                let theta = start_threshold + (end_threshold - start_threshold) * p;
                candidate_cost <= current_cost * (1.0 + theta)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_record_to_record_accepts_within_deviation() {
        let state = AcceptanceState::new(
            AcceptanceCriterion::RecordToRecord {
                start_deviation: 0.1,
                end_deviation: 0.0,
            },
            100.0,
        );
        let mut rng = StdRng::seed_from_u64(1);

        assert!(state.accept(0.0, 109.0, 120.0, 100.0, &mut rng));
        assert!(!state.accept(0.0, 111.0, 120.0, 100.0, &mut rng));
        // At the end of the run only the record itself passes.
        assert!(!state.accept(1.0, 100.5, 120.0, 100.0, &mut rng));
    }

    #[test]
    fn test_threshold_acceptance_compares_to_current() {
        let state = AcceptanceState::new(
            AcceptanceCriterion::ThresholdAcceptance {
                start_threshold: 0.05,
                end_threshold: 0.0,
            },
            100.0,
        );
        let mut rng = StdRng::seed_from_u64(1);

        assert!(state.accept(0.0, 104.0, 100.0, 90.0, &mut rng));
        assert!(!state.accept(0.0, 106.0, 100.0, 90.0, &mut rng));
    }

    #[test]
    fn test_sa_accepts_half_of_calibrated_gap_moves() {
        let state = AcceptanceState::new(
            AcceptanceCriterion::SimulatedAnnealing {
                init_accept_ratio_50p: 0.05,
                end_accept_ratio_50p: 0.005,
                schedule: CoolingSchedule::Linear,
                reheat_times: 0,
                reheat_factor: 1.5,
                reheat_after: 0,
            },
            100.0,
        );
        let mut rng = StdRng::seed_from_u64(42);

        // A move 5% worse than current should be accepted roughly half
        // the time at the start of the run.
        let accepted = (0..2000)
            .filter(|_| state.accept(0.0, 105.0, 100.0, 100.0, &mut rng))
            .count();
        assert!((800..1200).contains(&accepted), "accepted = {accepted}");
    }

    #[test]
    fn test_sa_cooling_reduces_acceptance() {
        let state = AcceptanceState::new(
            AcceptanceCriterion::SimulatedAnnealing {
                init_accept_ratio_50p: 0.05,
                end_accept_ratio_50p: 0.0005,
                schedule: CoolingSchedule::Exponential,
                reheat_times: 0,
                reheat_factor: 1.5,
                reheat_after: 0,
            },
            100.0,
        );
        assert!(state.temperature(1.0) < state.temperature(0.0));
    }

    #[test]
    fn test_sa_reheat_is_bounded() {
        let mut state = AcceptanceState::new(
            AcceptanceCriterion::SimulatedAnnealing {
                init_accept_ratio_50p: 0.05,
                end_accept_ratio_50p: 0.005,
                schedule: CoolingSchedule::Linear,
                reheat_times: 2,
                reheat_factor: 2.0,
                reheat_after: 10,
            },
            100.0,
        );

        let t0 = state.temperature(0.5);
        state.maybe_reheat(10);
        state.maybe_reheat(20);
        state.maybe_reheat(30);
        state.maybe_reheat(40);

        // Only two reheats may fire.
        assert!((state.temperature(0.5) / t0 - 4.0).abs() < 1e-9);
    }
}
