//! Search-loop hooks: incumbent polishing and destroy-aggressiveness
//! control.
//!
//! On every new incumbent the visitor shortens the tour (2-opt or an
//! external TSP re-solve), greedily fills the freed budget, and flags a
//! pending reset of the removal fraction. During improvement droughts
//! the fraction either resets (after a recent best) or grows by 10%
//! towards its configured maximum, a gradual diversification of the
//! destroy step.

use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;

use u_orienteering_core::{AlgorithmStatus, AlgorithmVisitor, DestroyOperator, RepairOperator};

use crate::palns::repair::GreedyRepair;
use crate::palns::solution::PalnsSolution;
use crate::params::ProblemParams;
use crate::tour::Tour;
use crate::tsp::TspSolver;

/// Growth factor of the removal fraction per drought alarm.
const FRACTION_GROWTH: f64 = 1.1;

/// Distinguishes concurrent TSP artifact sets.
static TSP_INVOCATIONS: AtomicU64 = AtomicU64::new(0);

/// The visitor wired into every worker.
#[derive(Clone)]
pub struct OpVisitor<'a> {
    params: &'a ProblemParams,
    tsp: &'a dyn TspSolver,
    reset_fraction: bool,
}

impl<'a> OpVisitor<'a> {
    /// Creates the visitor.
    pub fn new(params: &'a ProblemParams, tsp: &'a dyn TspSolver) -> Self {
        debug_assert!(
            !(params.local_search.use_2opt && params.local_search.use_tsp),
            "2-opt and TSP local search are mutually exclusive"
        );
        Self {
            params,
            tsp,
            reset_fraction: false,
        }
    }

    fn for_each_fraction_operator(
        destroy: &mut [Box<dyn DestroyOperator<PalnsSolution<'a>> + '_>],
        f: impl Fn(f64) -> f64,
    ) {
        for op in destroy {
            if let Some(fraction) = op.removal_fraction() {
                op.set_removal_fraction(f(fraction));
            }
        }
    }

    /// Re-solves the incumbent tour as a TSP; keeps the result when it
    /// is shorter.
    fn tsp_shorten(&self, solution: &mut PalnsSolution<'a>) {
        let tag = format!(
            "ls-{:?}-{}",
            std::thread::current().id(),
            TSP_INVOCATIONS.fetch_add(1, Ordering::Relaxed)
        );

        let vertices = solution.tour.vertices().to_vec();
        match self.tsp.solve_tsp(solution.graph(), &vertices, &tag) {
            Ok(tour) => {
                if tour.travel_time() < solution.tour.travel_time() {
                    log::debug!(
                        "TSP re-solve saved {:.2} travel time",
                        solution.tour.travel_time() - tour.travel_time()
                    );
                    // Rotate so the depot anchors position 0 again.
                    let mut order = tour.vertices().to_vec();
                    let depot_at = order
                        .iter()
                        .position(|&v| v == 0)
                        .expect("incumbent tours visit the depot");
                    order.rotate_left(depot_at);
                    *solution =
                        PalnsSolution::from_tour(Tour::new(solution.graph(), order), self.params);
                }
            }
            Err(e) => log::error!("TSP local search failed: {e}"),
        }
    }
}

impl<'a> AlgorithmVisitor<PalnsSolution<'a>> for OpVisitor<'a> {
    fn on_algorithm_start(
        &mut self,
        destroy: &mut [Box<dyn DestroyOperator<PalnsSolution<'a>> + '_>],
        _repair: &mut [Box<dyn RepairOperator<PalnsSolution<'a>> + '_>],
    ) {
        // Aggressive warm-up: destroy at the configured maximum.
        if self.params.destroy.adaptive {
            let max = self.params.destroy.max_fraction_of_vertices_to_remove;
            Self::for_each_fraction_operator(destroy, |_| max);
        }
    }

    fn on_prerun_end(
        &mut self,
        destroy: &mut [Box<dyn DestroyOperator<PalnsSolution<'a>> + '_>],
        _repair: &mut [Box<dyn RepairOperator<PalnsSolution<'a>> + '_>],
    ) {
        if self.params.destroy.adaptive {
            let default = self.params.destroy.fraction_of_vertices_to_remove;
            Self::for_each_fraction_operator(destroy, |_| default);
        }
    }

    fn on_iteration_end(
        &mut self,
        status: &mut AlgorithmStatus<'_, PalnsSolution<'a>>,
        rng: &mut StdRng,
    ) {
        if !status.new_best {
            return;
        }

        if self.params.local_search.use_2opt {
            status.best_solution.tour.do_2opt();
        }
        if self.params.local_search.use_tsp {
            self.tsp_shorten(status.best_solution);
        }

        if self.params.local_search.fill_tour {
            let mut fill = GreedyRepair::new(self.params);
            fill.repair(status.best_solution, rng);
        }

        if self.params.destroy.adaptive {
            self.reset_fraction = true;
        }
    }

    fn on_many_iters_without_improvement(
        &mut self,
        destroy: &mut [Box<dyn DestroyOperator<PalnsSolution<'a>> + '_>],
        _repair: &mut [Box<dyn RepairOperator<PalnsSolution<'a>> + '_>],
    ) {
        if !self.params.destroy.adaptive {
            return;
        }

        if self.reset_fraction {
            let default = self.params.destroy.fraction_of_vertices_to_remove;
            Self::for_each_fraction_operator(destroy, |_| default);
            self.reset_fraction = false;
        } else {
            let max = self.params.destroy.max_fraction_of_vertices_to_remove;
            Self::for_each_fraction_operator(destroy, |fraction| {
                (fraction * FRACTION_GROWTH).min(max)
            });
        }
    }

    fn clone_box(&self) -> Box<dyn AlgorithmVisitor<PalnsSolution<'a>> + '_> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_graphs::grid_graph;
    use crate::palns::destroy::RandomRemove;
    use crate::tsp::NearestNeighbourTspSolver;
    use rand::SeedableRng;

    fn boxed_destroy<'a>(
        params: &'a ProblemParams,
    ) -> Vec<Box<dyn DestroyOperator<PalnsSolution<'a>> + 'a>> {
        vec![Box::new(RandomRemove::new(params))]
    }

    #[test]
    fn test_warmup_and_prerun_fraction_schedule() {
        let params = ProblemParams::default();
        let tsp = NearestNeighbourTspSolver;
        let mut visitor = OpVisitor::new(&params, &tsp);
        let mut destroy = boxed_destroy(&params);
        let mut repair: Vec<Box<dyn RepairOperator<PalnsSolution<'_>> + '_>> = Vec::new();

        visitor.on_algorithm_start(&mut destroy, &mut repair);
        assert!((destroy[0].removal_fraction().unwrap() - 0.75).abs() < 1e-9);

        visitor.on_prerun_end(&mut destroy, &mut repair);
        assert!((destroy[0].removal_fraction().unwrap() - 0.33).abs() < 1e-9);
    }

    #[test]
    fn test_drought_grows_fraction_up_to_max() {
        let params = ProblemParams::default();
        let tsp = NearestNeighbourTspSolver;
        let mut visitor = OpVisitor::new(&params, &tsp);
        let mut destroy = boxed_destroy(&params);
        let mut repair: Vec<Box<dyn RepairOperator<PalnsSolution<'_>> + '_>> = Vec::new();

        for _ in 0..20 {
            visitor.on_many_iters_without_improvement(&mut destroy, &mut repair);
        }

        // 0.33 · 1.1^k caps at 0.75.
        assert!((destroy[0].removal_fraction().unwrap() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_new_best_polishes_and_schedules_reset() {
        let graph = grid_graph(
            &[
                (0.0, 0.0, 0.0),
                (10.0, 0.0, 1.0),
                (10.0, 10.0, 1.0),
                (0.0, 10.0, 1.0),
            ],
            100.0,
        );
        let params = ProblemParams::default();
        let tsp = NearestNeighbourTspSolver;
        let mut visitor = OpVisitor::new(&params, &tsp);

        // A crossing tour; the visitor's 2-opt uncrosses it.
        let mut best = PalnsSolution::from_tour(Tour::new(&graph, vec![0, 2, 1, 3]), &params);
        let crossed = best.tour.travel_time();
        let mut rng = StdRng::seed_from_u64(11);

        let mut status = AlgorithmStatus {
            iteration: 10,
            new_best: true,
            improved: true,
            accepted: true,
            destroy_id: 0,
            repair_id: 0,
            best_solution: &mut best,
        };
        visitor.on_iteration_end(&mut status, &mut rng);

        assert!(best.tour.travel_time() < crossed);
        assert!(visitor.reset_fraction);
    }

    #[test]
    fn test_drought_after_best_resets_then_grows() {
        let params = ProblemParams::default();
        let tsp = NearestNeighbourTspSolver;
        let mut visitor = OpVisitor::new(&params, &tsp);
        let mut destroy = boxed_destroy(&params);
        let mut repair: Vec<Box<dyn RepairOperator<PalnsSolution<'_>> + '_>> = Vec::new();

        destroy[0].set_removal_fraction(0.6);
        visitor.reset_fraction = true;

        visitor.on_many_iters_without_improvement(&mut destroy, &mut repair);
        assert!((destroy[0].removal_fraction().unwrap() - 0.33).abs() < 1e-9);

        visitor.on_many_iters_without_improvement(&mut destroy, &mut repair);
        assert!((destroy[0].removal_fraction().unwrap() - 0.363).abs() < 1e-9);
    }
}
