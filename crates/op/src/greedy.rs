//! Greedy construction of the initial tour.
//!
//! When the instance clusters well, the search starts from the reduced
//! graph: either solved exactly by the MIP (with an inflated budget, so
//! the projection has material to trim) or filled constructively, then
//! projected back. Otherwise vertices are inserted one by one on the
//! original graph in a configurable order. Either way the result is
//! made budget-feasible before the search begins.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::Result;
use crate::graph::Graph;
use crate::palns::solution::PalnsSolution;
use crate::params::{ProblemParams, VertexOrder};
use crate::reduce::ReducedGraph;
use crate::tour::Tour;
use crate::tsp::TspSolver;

/// Budget inflation applied to the reduced graph before the exact
/// solve; the projection re-tightens to the real budget afterwards.
#[cfg(feature = "milp")]
const MIP_BUDGET_INFLATION: f64 = 2.75;

/// Default reduction factor for the recursive clustering.
const REDUCTION_FACTOR: f64 = 0.5;

/// Greedy initial-solution heuristic.
pub struct GreedyHeuristic<'a> {
    graph: &'a Graph,
    params: &'a ProblemParams,
    tsp: &'a dyn TspSolver,
}

impl<'a> GreedyHeuristic<'a> {
    /// Creates the heuristic.
    pub fn new(graph: &'a Graph, params: &'a ProblemParams, tsp: &'a dyn TspSolver) -> Self {
        Self { graph, params, tsp }
    }

    /// Builds a feasible initial tour.
    pub fn solve(&self, rng: &mut StdRng) -> Result<Tour<'a>> {
        let mut tour = if self.params.initial_solution.use_clustering {
            match ReducedGraph::recursive_reduction(self.graph, REDUCTION_FACTOR, self.tsp)? {
                Some(reduction) => {
                    if self.params.initial_solution.use_mip {
                        self.solve_with_clustering_and_mip(&reduction)?
                    } else {
                        self.solve_with_clustering_constructive(&reduction)?
                    }
                }
                None => self.solve_without_clustering(rng)?,
            }
        } else {
            self.solve_without_clustering(rng)?
        };

        if self.params.initial_solution.local_search {
            tour.do_2opt();
            let mut solution = PalnsSolution::from_tour(tour, self.params);
            crate::palns::repair::GreedyRepair::fill_exhaustive(&mut solution);
            tour = solution.tour;
        }

        if rng.gen::<f64>() < self.params.repair.restore_feasibility_optimal {
            tour.make_travel_time_feasible_optimal();
        } else {
            tour.make_travel_time_feasible_naive();
        }

        Ok(tour)
    }

    #[cfg(feature = "milp")]
    fn solve_with_clustering_and_mip(&self, reduction: &ReducedGraph<'a>) -> Result<Tour<'a>> {
        use crate::bc::BcSolver;

        if reduction.reduced().n_vertices() <= 2 {
            let tour = Tour::new(reduction.reduced(), vec![0, 1]);
            return Ok(reduction.project_back_tour(&tour));
        }

        let inflated = reduction
            .reduced()
            .clone_with_max_travel_time(reduction.reduced().max_travel_time() * MIP_BUDGET_INFLATION);

        let mut tour = BcSolver::new(&inflated).solve()?;
        tour.do_2opt();

        Ok(reduction.project_back_tour(&tour))
    }

    #[cfg(not(feature = "milp"))]
    fn solve_with_clustering_and_mip(&self, reduction: &ReducedGraph<'a>) -> Result<Tour<'a>> {
        log::warn!("built without the 'milp' feature; using constructive insertion instead");
        self.solve_with_clustering_constructive(reduction)
    }

    fn solve_with_clustering_constructive(&self, reduction: &ReducedGraph<'a>) -> Result<Tour<'a>> {
        let reduced = reduction.reduced();
        debug_assert!(reduced.n_vertices() >= 2);

        let tour = Tour::new(reduced, vec![0, 1]);
        let mut solution = PalnsSolution::from_tour(tour, self.params);

        for v in 2..reduced.n_vertices() {
            if reduced.vertex(v).reachable {
                solution.add_vertex_in_best_pos_any(v);
            }
        }

        Ok(reduction.project_back_tour(&solution.tour))
    }

    fn solve_without_clustering(&self, rng: &mut StdRng) -> Result<Tour<'a>> {
        // Seed the tour with the first reachable non-depot vertex.
        let seed = self.graph.reachable_non_depot().next().ok_or_else(|| {
            crate::error::Error::InvalidInstance(
                "no reachable non-depot vertex to start a tour from".to_owned(),
            )
        })?;

        let mut others: Vec<usize> = self
            .graph
            .reachable_non_depot()
            .filter(|&v| v != seed)
            .collect();

        match self.params.initial_solution.parsed_vertex_order() {
            VertexOrder::Random => others.shuffle(rng),
            VertexOrder::Prize => others.sort_by(|&a, &b| {
                self.graph
                    .vertex(a)
                    .prize
                    .total_cmp(&self.graph.vertex(b).prize)
            }),
            VertexOrder::Distance => others.sort_by(|&a, &b| {
                self.graph
                    .travel_time(0, a)
                    .total_cmp(&self.graph.travel_time(0, b))
            }),
        }

        let tour = Tour::new(self.graph, vec![0, seed]);
        let mut solution = PalnsSolution::from_tour(tour, self.params);

        for v in others {
            solution.add_vertex_in_best_pos_any(v);
        }

        Ok(solution.tour)
    }
}
