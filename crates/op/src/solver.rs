//! The solver façade: wires the graph, parameters, operators and
//! visitor into the PALNS framework and post-processes the result.

use std::fs::OpenOptions;
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use u_orienteering_core::{DestroyOperator, FrameworkParams, PalnsRunner, RepairOperator};

use crate::cluster::Clustering;
use crate::error::Result;
use crate::graph::Graph;
use crate::greedy::GreedyHeuristic;
use crate::palns::destroy::{RandomClusterRemove, RandomRemove, RandomSeqRemove};
use crate::palns::repair::{GreedyRepair, RandomClusterRepair, SeqOrder, SeqVertexRepair};
use crate::palns::solution::PalnsSolution;
use crate::palns::visitor::OpVisitor;
use crate::params::ProblemParams;
use crate::tour::Tour;
use crate::tsp::{NearestNeighbourTspSolver, TspSolver};

/// Outcome of a full solver run.
#[derive(Debug)]
pub struct SolveReport<'a> {
    /// The best tour found, budget-feasible.
    pub tour: Tour<'a>,
    /// Wall-clock time of the whole run, in seconds.
    pub total_time_s: f64,
    /// Seconds from start to the winning worker's last improvement.
    pub time_to_best_s: f64,
    /// Iterations summed over all workers.
    pub iterations: usize,
}

/// The PALNS solver for the orienteering problem.
pub struct PalnsSolver<'a> {
    graph: &'a Graph,
    problem_params: ProblemParams,
    framework_params: FrameworkParams,
    tsp: Box<dyn TspSolver>,
    scores_path: Option<PathBuf>,
}

impl<'a> PalnsSolver<'a> {
    /// Creates a solver with the given parameter sets.
    pub fn new(
        graph: &'a Graph,
        problem_params: ProblemParams,
        framework_params: FrameworkParams,
    ) -> Self {
        Self {
            graph,
            problem_params,
            framework_params,
            tsp: Box::new(NearestNeighbourTspSolver),
            scores_path: None,
        }
    }

    /// Replaces the TSP capability (e.g. with an external executable).
    pub fn with_tsp_solver(mut self, tsp: Box<dyn TspSolver>) -> Self {
        self.tsp = tsp;
        self
    }

    /// Enables operator-score aggregation into the given JSON artifact.
    pub fn with_scores_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.scores_path = Some(path.into());
        self
    }

    /// Runs the search, optionally from a caller-supplied initial tour.
    ///
    /// The returned tour is feasible and cannot be improved by any
    /// single feasible insertion.
    pub fn solve(&self, initial: Option<Tour<'a>>, seed: u64) -> Result<SolveReport<'a>> {
        let start = Instant::now();
        let mut rng = StdRng::seed_from_u64(seed);

        let initial_tour = match initial {
            Some(tour) => tour,
            None => GreedyHeuristic::new(self.graph, &self.problem_params, self.tsp.as_ref())
                .solve(&mut rng)?,
        };
        log::info!(
            "initial solution: prize {:.2}, travel time {:.2}",
            initial_tour.total_prize(),
            initial_tour.travel_time()
        );

        let initial_solution = PalnsSolution::from_tour(initial_tour, &self.problem_params);

        let clustering = Clustering::new(self.graph);
        let cluster_ops_usable = clustering.is_proper() && clustering.n_clusters() > 1;

        // Destroy pool.
        let mut destroy: Vec<Box<dyn DestroyOperator<PalnsSolution<'_>> + '_>> = Vec::new();
        if self.problem_params.destroy.enable_random {
            destroy.push(Box::new(RandomRemove::new(&self.problem_params)));
        }
        if self.problem_params.destroy.enable_random_seq {
            destroy.push(Box::new(RandomSeqRemove::new(&self.problem_params)));
        }
        if self.problem_params.destroy.enable_random_cluster && cluster_ops_usable {
            destroy.push(Box::new(RandomClusterRemove::new(
                &self.problem_params,
                &clustering,
            )));
        }

        // Repair pool.
        let mut repair: Vec<Box<dyn RepairOperator<PalnsSolution<'_>> + '_>> = Vec::new();
        if self.problem_params.repair.enable_greedy {
            repair.push(Box::new(GreedyRepair::new(&self.problem_params)));
        }
        if self.problem_params.repair.enable_seq_random {
            repair.push(Box::new(SeqVertexRepair::new(
                &self.problem_params,
                SeqOrder::Random,
            )));
        }
        if self.problem_params.repair.enable_seq_by_prize {
            repair.push(Box::new(SeqVertexRepair::new(
                &self.problem_params,
                SeqOrder::ByPrize,
            )));
        }
        if self.problem_params.repair.enable_cluster && cluster_ops_usable {
            repair.push(Box::new(RandomClusterRepair::new(
                &self.problem_params,
                &clustering,
            )));
        }

        let visitor = OpVisitor::new(&self.problem_params, self.tsp.as_ref());

        let runner = PalnsRunner::new(self.framework_params.clone());
        let result = runner.run(initial_solution, &destroy, &repair, &visitor, seed)?;

        // Reduce across workers: prize, then travel time, then index.
        let winner = result
            .workers
            .iter()
            .min_by(|a, b| {
                a.best_cost
                    .partial_cmp(&b.best_cost)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(
                        a.best_solution
                            .tour
                            .travel_time()
                            .total_cmp(&b.best_solution.tour.travel_time()),
                    )
                    .then(a.worker.cmp(&b.worker))
            })
            .expect("at least one worker ran");

        // Final polish: no heuristic shortcuts, no tabu.
        let mut best = winner.best_solution.clone();
        GreedyRepair::fill_exhaustive(&mut best);

        if let Some(path) = &self.scores_path {
            if let Err(e) = merge_score_artifact(path, &result.operator_best_counts()) {
                log::error!("cannot update score artifact {}: {e}", path.display());
            }
        }

        // Rebuild on the solver's graph reference so the report only
        // borrows the graph.
        let tour = Tour::new(self.graph, best.tour.vertices().to_vec());
        debug_assert!(tour.is_feasible());

        log::info!(
            "best solution: prize {:.2}, travel time {:.2}",
            tour.total_prize(),
            tour.travel_time()
        );

        Ok(SolveReport {
            tour,
            total_time_s: start.elapsed().as_secs_f64(),
            time_to_best_s: winner.time_to_best_ms as f64 / 1000.0,
            iterations: result.total_iterations,
        })
    }
}

/// Adds per-operator new-best counts into a JSON artifact shared by
/// concurrent runs, under an advisory file lock.
fn merge_score_artifact(path: &Path, counts: &[(String, u64)]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    file.lock()?;
    let result = (|| {
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let mut scores: serde_json::Map<String, serde_json::Value> = if contents.trim().is_empty() {
            serde_json::Map::new()
        } else {
            serde_json::from_str(&contents).unwrap_or_else(|e| {
                log::warn!("score artifact is not valid JSON ({e}); starting over");
                serde_json::Map::new()
            })
        };

        for (name, count) in counts {
            let previous = scores.get(name).and_then(|v| v.as_u64()).unwrap_or(0);
            scores.insert(name.clone(), serde_json::json!(previous + count));
        }

        let serialized = serde_json::to_string_pretty(&serde_json::Value::Object(scores))?;
        file.rewind()?;
        file.set_len(0)?;
        file.write_all(serialized.as_bytes())?;
        file.flush()
    })();
    file.unlock()?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_graphs::grid_graph;
    use rand::Rng;

    fn random_instance(n: usize, seed: u64) -> Graph {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut points = vec![(50.0, 50.0, 0.0)];
        for _ in 1..n {
            points.push((
                rng.gen_range(0.0..100.0),
                rng.gen_range(0.0..100.0),
                rng.gen_range(1.0..10.0),
            ));
        }
        grid_graph(&points, 150.0)
    }

    fn quick_framework_params() -> FrameworkParams {
        FrameworkParams::default()
            .with_max_iterations(1000)
            .with_workers(2)
    }

    #[test]
    fn test_solver_improves_on_the_initial_tour() {
        let graph = random_instance(50, 7);
        let problem_params = ProblemParams::default();

        let mut rng = StdRng::seed_from_u64(7);
        let tsp = NearestNeighbourTspSolver;
        let initial = GreedyHeuristic::new(&graph, &problem_params, &tsp)
            .solve(&mut rng)
            .unwrap();
        let initial_prize = initial.total_prize();

        let solver = PalnsSolver::new(&graph, problem_params.clone(), quick_framework_params());
        let report = solver.solve(Some(initial), 7).unwrap();

        assert!(report.tour.total_prize() >= initial_prize);
        assert!(report.tour.travel_time() <= graph.max_travel_time() + 1e-6);
        assert!(report.tour.is_simple());
        assert_eq!(report.tour.vertices()[0], 0);
        assert!(report.iterations > 0);
    }

    #[test]
    fn test_solver_output_has_no_feasible_insertion_left() {
        let graph = random_instance(30, 9);
        let problem_params = ProblemParams::default();
        let solver = PalnsSolver::new(&graph, problem_params.clone(), quick_framework_params());

        let report = solver.solve(None, 9).unwrap();

        let solution = PalnsSolution::from_tour(
            Tour::new(&graph, report.tour.vertices().to_vec()),
            &problem_params,
        );
        assert!(solution.feas_insertions().is_empty());
    }

    #[test]
    fn test_score_artifact_accumulates_across_runs() {
        let graph = random_instance(25, 11);
        let dir = std::env::temp_dir();
        let path = dir.join(format!(
            "u-orienteering-scores-{}-{:?}.json",
            std::process::id(),
            std::thread::current().id()
        ));
        let _ = std::fs::remove_file(&path);

        let solver = PalnsSolver::new(
            &graph,
            ProblemParams::default(),
            FrameworkParams::default()
                .with_max_iterations(200)
                .with_workers(1),
        )
        .with_scores_path(&path);

        solver.solve(None, 1).unwrap();
        let first: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        solver.solve(None, 2).unwrap();
        let second: serde_json::Map<String, serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        let total = |m: &serde_json::Map<String, serde_json::Value>| -> u64 {
            m.values().filter_map(|v| v.as_u64()).sum()
        };
        assert!(total(&second) >= total(&first));
        assert!(first.keys().all(|k| second.contains_key(k)));

        let _ = std::fs::remove_file(&path);
    }
}
