//! The parallel adaptive search runner.
//!
//! Each worker owns its solution, RNG, operator clones and visitor
//! clone; the shared problem data behind the solutions is read-only.
//! Within a worker the iteration order is strict: destroy → repair →
//! acceptance → score update, with the visitor running local search on
//! every new incumbent.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::acceptance::AcceptanceState;
use crate::error::{Error, Result};
use crate::operators::{DestroyOperator, OperatorWeights, RepairOperator, Solution};
use crate::params::FrameworkParams;

/// Outcome of one iteration, handed to the visitor.
///
/// The visitor may improve `best_solution` in place (local search); the
/// runner re-reads its cost afterwards.
pub struct AlgorithmStatus<'s, S> {
    /// Iteration index within the worker.
    pub iteration: usize,
    /// True iff this iteration produced a new global best.
    pub new_best: bool,
    /// True iff the candidate improved on the current solution.
    pub improved: bool,
    /// True iff the candidate was accepted as the new current solution.
    pub accepted: bool,
    /// Index of the destroy operator used.
    pub destroy_id: usize,
    /// Index of the repair operator used.
    pub repair_id: usize,
    /// The incumbent best solution of this worker.
    pub best_solution: &'s mut S,
}

/// Hooks invoked by the runner at well-defined points of a worker run.
///
/// Visitors are cloned per worker and may keep worker-local state.
pub trait AlgorithmVisitor<S>: Send + Sync {
    /// Called once before the first iteration.
    fn on_algorithm_start(
        &mut self,
        _destroy: &mut [Box<dyn DestroyOperator<S> + '_>],
        _repair: &mut [Box<dyn RepairOperator<S> + '_>],
    ) {
    }

    /// Called once when the warm-up phase ends.
    fn on_prerun_end(
        &mut self,
        _destroy: &mut [Box<dyn DestroyOperator<S> + '_>],
        _repair: &mut [Box<dyn RepairOperator<S> + '_>],
    ) {
    }

    /// Called after every iteration.
    fn on_iteration_end(&mut self, _status: &mut AlgorithmStatus<'_, S>, _rng: &mut StdRng) {}

    /// Called when the improvement-drought alarm fires.
    fn on_many_iters_without_improvement(
        &mut self,
        _destroy: &mut [Box<dyn DestroyOperator<S> + '_>],
        _repair: &mut [Box<dyn RepairOperator<S> + '_>],
    ) {
    }

    /// Clones the visitor into a fresh, worker-owned box.
    fn clone_box(&self) -> Box<dyn AlgorithmVisitor<S> + '_>;
}

/// A visitor with no behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopVisitor;

impl<S> AlgorithmVisitor<S> for NoopVisitor {
    fn clone_box(&self) -> Box<dyn AlgorithmVisitor<S> + '_> {
        Box::new(*self)
    }
}

/// Result of one worker run.
#[derive(Debug, Clone)]
pub struct WorkerOutcome<S> {
    /// Worker index.
    pub worker: usize,
    /// Best solution found by this worker.
    pub best_solution: S,
    /// Cost of the best solution.
    pub best_cost: f64,
    /// Iterations actually performed.
    pub iterations: usize,
    /// Milliseconds from worker start to the last best update.
    pub time_to_best_ms: u64,
    /// New-best count per destroy operator.
    pub destroy_best: Vec<u64>,
    /// New-best count per repair operator.
    pub repair_best: Vec<u64>,
}

/// Result of a full multi-start run.
#[derive(Debug, Clone)]
pub struct PalnsResult<S> {
    /// Best solution across workers (ties broken by worker index).
    pub best_solution: S,
    /// Cost of the best solution.
    pub best_cost: f64,
    /// Total iterations across workers.
    pub total_iterations: usize,
    /// Wall-clock time of the whole run.
    pub elapsed_ms: u64,
    /// Per-worker outcomes, for domain-level tie-breaking and stats.
    pub workers: Vec<WorkerOutcome<S>>,
    /// Registered destroy operator names, index-aligned with the
    /// per-worker new-best counts.
    pub destroy_names: Vec<String>,
    /// Registered repair operator names.
    pub repair_names: Vec<String>,
}

impl<S> PalnsResult<S> {
    /// Sums new-best counts per operator name across workers.
    pub fn operator_best_counts(&self) -> Vec<(String, u64)> {
        let mut counts = Vec::new();
        for (i, name) in self.destroy_names.iter().enumerate() {
            let total = self.workers.iter().map(|w| w.destroy_best[i]).sum();
            counts.push((name.clone(), total));
        }
        for (i, name) in self.repair_names.iter().enumerate() {
            let total = self.workers.iter().map(|w| w.repair_best[i]).sum();
            counts.push((name.clone(), total));
        }
        counts
    }
}

/// The multi-start PALNS runner.
pub struct PalnsRunner {
    params: FrameworkParams,
}

impl PalnsRunner {
    /// Creates a runner with the given framework parameters.
    pub fn new(params: FrameworkParams) -> Self {
        Self { params }
    }

    /// The framework parameters in use.
    pub fn params(&self) -> &FrameworkParams {
        &self.params
    }

    /// Runs `n_workers` independent searches and reduces to the best.
    ///
    /// Operators and the visitor are prototypes: every worker gets its
    /// own clones, seeded with `base_seed + worker_index`.
    pub fn run<S: Solution>(
        &self,
        initial: S,
        destroy: &[Box<dyn DestroyOperator<S> + '_>],
        repair: &[Box<dyn RepairOperator<S> + '_>],
        visitor: &dyn AlgorithmVisitor<S>,
        base_seed: u64,
    ) -> Result<PalnsResult<S>> {
        if destroy.is_empty() {
            return Err(Error::NoDestroyOperators);
        }
        if repair.is_empty() {
            return Err(Error::NoRepairOperators);
        }
        if !(0.0..1.0).contains(&self.params.score_decay) || self.params.score_decay == 0.0 {
            return Err(Error::InvalidParameter(format!(
                "score_decay must be in (0, 1), got {}",
                self.params.score_decay
            )));
        }

        let start = Instant::now();
        let n_workers = self.params.n_workers.max(1);

        log::info!(
            "starting PALNS: {} workers, {} destroy, {} repair operators",
            n_workers,
            destroy.len(),
            repair.len()
        );

        // Clone one starting solution per worker up front; the clones,
        // not references to `initial`, cross the thread boundary.
        let initials: Vec<S> = (0..n_workers).map(|_| initial.clone()).collect();

        let mut workers: Vec<WorkerOutcome<S>> = initials
            .into_par_iter()
            .enumerate()
            .map(|(w, init)| {
                self.run_worker(
                    w,
                    init,
                    destroy,
                    repair,
                    visitor,
                    base_seed.wrapping_add(w as u64),
                )
            })
            .collect();

        workers.sort_by_key(|w| w.worker);

        let best = workers
            .iter()
            .min_by(|a, b| {
                a.best_cost
                    .partial_cmp(&b.best_cost)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.worker.cmp(&b.worker))
            })
            .expect("at least one worker ran");

        log::info!(
            "PALNS finished: best cost {:.2} from worker {}",
            best.best_cost,
            best.worker
        );

        Ok(PalnsResult {
            best_solution: best.best_solution.clone(),
            best_cost: best.best_cost,
            total_iterations: workers.iter().map(|w| w.iterations).sum(),
            elapsed_ms: start.elapsed().as_millis() as u64,
            workers,
            destroy_names: destroy.iter().map(|d| d.name().to_owned()).collect(),
            repair_names: repair.iter().map(|r| r.name().to_owned()).collect(),
        })
    }

    fn run_worker<S: Solution>(
        &self,
        worker: usize,
        initial: S,
        destroy_protos: &[Box<dyn DestroyOperator<S> + '_>],
        repair_protos: &[Box<dyn RepairOperator<S> + '_>],
        visitor_proto: &dyn AlgorithmVisitor<S>,
        seed: u64,
    ) -> WorkerOutcome<S> {
        let params = &self.params;
        let start = Instant::now();
        let mut rng = StdRng::seed_from_u64(seed);

        let mut destroy: Vec<Box<dyn DestroyOperator<S> + '_>> =
            destroy_protos.iter().map(|d| d.clone_box()).collect();
        let mut repair: Vec<Box<dyn RepairOperator<S> + '_>> =
            repair_protos.iter().map(|r| r.clone_box()).collect();
        let mut visitor = visitor_proto.clone_box();

        let mut current = initial.clone();
        let mut best = initial;
        let mut best_cost = best.cost();

        let mut acceptance = AcceptanceState::new(params.acceptance.clone(), best_cost);
        let mut destroy_weights =
            OperatorWeights::new(destroy.len(), params.score_decay, params.min_weight);
        let mut repair_weights =
            OperatorWeights::new(repair.len(), params.score_decay, params.min_weight);

        let mut destroy_best = vec![0u64; destroy.len()];
        let mut repair_best = vec![0u64; repair.len()];

        visitor.on_algorithm_start(&mut destroy, &mut repair);

        let alarm = params.iters_without_improvement_alarm.max(1);
        let mut iters_without_improvement = 0usize;
        let mut time_to_best_ms = 0u64;
        let mut prerun_over = params.prerun_iterations == 0;
        let mut iteration = 0usize;

        while iteration < params.max_iterations {
            if params.time_limit_ms > 0
                && start.elapsed().as_millis() as u64 >= params.time_limit_ms
            {
                log::debug!("worker {worker}: time budget exhausted at iteration {iteration}");
                break;
            }

            if !prerun_over && iteration >= params.prerun_iterations {
                visitor.on_prerun_end(&mut destroy, &mut repair);
                prerun_over = true;
            }

            let d = destroy_weights.select(&mut rng);
            let r = repair_weights.select(&mut rng);

            let mut candidate = current.clone();
            destroy[d].destroy(&mut candidate, &mut rng);
            repair[r].repair(&mut candidate, &mut rng);

            let candidate_cost = candidate.cost();
            let current_cost = current.cost();
            let progress = iteration as f64 / params.max_iterations as f64;

            let new_best = candidate_cost < best_cost;
            let improved = candidate_cost < current_cost;
            let accepted = new_best
                || improved
                || acceptance.accept(progress, candidate_cost, current_cost, best_cost, &mut rng);

            let score = if new_best {
                params.score_mult_global_best
            } else if improved {
                params.score_mult_improved
            } else if accepted {
                params.score_mult_accepted
            } else {
                0.0
            };
            destroy_weights.record(d, score);
            repair_weights.record(r, score);

            if new_best {
                best = candidate.clone();
                best_cost = candidate_cost;
                destroy_best[d] += 1;
                repair_best[r] += 1;
                time_to_best_ms = start.elapsed().as_millis() as u64;
                iters_without_improvement = 0;
            } else {
                iters_without_improvement += 1;
            }

            if accepted {
                current = candidate;
            }

            let mut status = AlgorithmStatus {
                iteration,
                new_best,
                improved,
                accepted,
                destroy_id: d,
                repair_id: r,
                best_solution: &mut best,
            };
            visitor.on_iteration_end(&mut status, &mut rng);

            if new_best {
                // The visitor may have run local search on the best.
                best_cost = best.cost();
            }

            if iters_without_improvement > 0 && iters_without_improvement % alarm == 0 {
                visitor.on_many_iters_without_improvement(&mut destroy, &mut repair);
                acceptance.maybe_reheat(iters_without_improvement);
            }

            iteration += 1;
            if iteration % params.segment_size.max(1) == 0 {
                destroy_weights.end_segment();
                repair_weights.end_segment();
            }
        }

        log::debug!(
            "worker {worker}: {} iterations, best cost {:.2}",
            iteration,
            best_cost
        );

        WorkerOutcome {
            worker,
            best_solution: best,
            best_cost,
            iterations: iteration,
            time_to_best_ms,
            destroy_best,
            repair_best,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    // A toy problem: the solution is a vector of booleans and the cost
    // is the number of `false` entries. Destroy flips random entries to
    // false, repair flips random entries to true.
    #[derive(Debug, Clone)]
    struct BitSolution {
        bits: Vec<bool>,
    }

    impl Solution for BitSolution {
        fn cost(&self) -> f64 {
            self.bits.iter().filter(|&&b| !b).count() as f64
        }
    }

    #[derive(Clone)]
    struct FlipOff {
        fraction: f64,
    }

    impl DestroyOperator<BitSolution> for FlipOff {
        fn name(&self) -> &str {
            "flip-off"
        }

        fn destroy(&mut self, solution: &mut BitSolution, rng: &mut StdRng) {
            let n = solution.bits.len();
            for _ in 0..((n as f64 * self.fraction) as usize).max(1) {
                let i = rng.gen_range(0..n);
                solution.bits[i] = false;
            }
        }

        fn clone_box(&self) -> Box<dyn DestroyOperator<BitSolution> + '_> {
            Box::new(self.clone())
        }

        fn removal_fraction(&self) -> Option<f64> {
            Some(self.fraction)
        }

        fn set_removal_fraction(&mut self, fraction: f64) {
            self.fraction = fraction;
        }
    }

    #[derive(Clone)]
    struct FlipOn;

    impl RepairOperator<BitSolution> for FlipOn {
        fn name(&self) -> &str {
            "flip-on"
        }

        fn repair(&mut self, solution: &mut BitSolution, rng: &mut StdRng) {
            let n = solution.bits.len();
            for _ in 0..(n / 2).max(1) {
                let i = rng.gen_range(0..n);
                solution.bits[i] = true;
            }
        }

        fn clone_box(&self) -> Box<dyn RepairOperator<BitSolution> + '_> {
            Box::new(self.clone())
        }
    }

    fn setup() -> (
        BitSolution,
        Vec<Box<dyn DestroyOperator<BitSolution> + 'static>>,
        Vec<Box<dyn RepairOperator<BitSolution> + 'static>>,
    ) {
        let initial = BitSolution {
            bits: vec![false; 32],
        };
        let destroy: Vec<Box<dyn DestroyOperator<BitSolution>>> =
            vec![Box::new(FlipOff { fraction: 0.2 })];
        let repair: Vec<Box<dyn RepairOperator<BitSolution>>> = vec![Box::new(FlipOn)];
        (initial, destroy, repair)
    }

    #[test]
    fn test_runner_improves_cost() {
        let (initial, destroy, repair) = setup();
        let runner = PalnsRunner::new(
            FrameworkParams::default()
                .with_max_iterations(500)
                .with_workers(2),
        );

        let result = runner
            .run(initial.clone(), &destroy, &repair, &NoopVisitor, 42)
            .unwrap();

        assert!(result.best_cost < initial.cost());
        assert_eq!(result.workers.len(), 2);
        assert_eq!(result.destroy_names, vec!["flip-off".to_owned()]);
    }

    #[test]
    fn test_runner_requires_operators() {
        let (initial, destroy, _) = setup();
        let runner = PalnsRunner::new(FrameworkParams::default());
        let no_repair: Vec<Box<dyn RepairOperator<BitSolution>>> = Vec::new();

        assert!(matches!(
            runner.run(initial, &destroy, &no_repair, &NoopVisitor, 0),
            Err(Error::NoRepairOperators)
        ));
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let (initial, destroy, repair) = setup();
        let runner = PalnsRunner::new(
            FrameworkParams::default()
                .with_max_iterations(300)
                .with_workers(1),
        );

        let a = runner
            .run(initial.clone(), &destroy, &repair, &NoopVisitor, 7)
            .unwrap();
        let b = runner
            .run(initial, &destroy, &repair, &NoopVisitor, 7)
            .unwrap();

        assert_eq!(a.best_cost, b.best_cost);
        assert_eq!(a.total_iterations, b.total_iterations);
    }

    #[test]
    fn test_visitor_hooks_fire() {
        #[derive(Clone, Default)]
        struct CountingVisitor {
            started: bool,
            iterations: usize,
        }

        impl AlgorithmVisitor<BitSolution> for CountingVisitor {
            fn on_algorithm_start(
                &mut self,
                destroy: &mut [Box<dyn DestroyOperator<BitSolution> + '_>],
                _repair: &mut [Box<dyn RepairOperator<BitSolution> + '_>],
            ) {
                self.started = true;
                // The adaptive-fraction hooks are reachable through the
                // trait objects.
                assert!(destroy[0].removal_fraction().is_some());
                destroy[0].set_removal_fraction(0.5);
            }

            fn on_iteration_end(
                &mut self,
                status: &mut AlgorithmStatus<'_, BitSolution>,
                _rng: &mut StdRng,
            ) {
                assert!(self.started);
                self.iterations += 1;
                assert_eq!(status.iteration + 1, self.iterations);
            }

            fn clone_box(&self) -> Box<dyn AlgorithmVisitor<BitSolution> + '_> {
                Box::new(self.clone())
            }
        }

        let (initial, destroy, repair) = setup();
        let runner = PalnsRunner::new(
            FrameworkParams::default()
                .with_max_iterations(50)
                .with_workers(1),
        );

        let result = runner
            .run(initial, &destroy, &repair, &CountingVisitor::default(), 1)
            .unwrap();
        assert_eq!(result.total_iterations, 50);
    }

    #[test]
    fn test_operator_best_counts_sum_over_workers() {
        let (initial, destroy, repair) = setup();
        let runner = PalnsRunner::new(
            FrameworkParams::default()
                .with_max_iterations(400)
                .with_workers(3),
        );

        let result = runner
            .run(initial, &destroy, &repair, &NoopVisitor, 9)
            .unwrap();

        let counts = result.operator_best_counts();
        assert_eq!(counts.len(), 2);
        let destroy_total: u64 = result.workers.iter().map(|w| w.destroy_best[0]).sum();
        assert_eq!(counts[0], ("flip-off".to_owned(), destroy_total));
    }
}
