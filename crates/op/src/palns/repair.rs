//! Repair operators.
//!
//! The greedy repair inserts budget-feasible vertices cheapest-first
//! under a short-term tabu that forbids immediately recreating an arc
//! it just built; the sequential and cluster repairs insert in a
//! prescribed order and, when intermediate infeasibility is allowed,
//! finish with 2-opt and feasibility restoration.

use std::sync::atomic::{AtomicU32, Ordering};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

use u_orienteering_core::RepairOperator;

use crate::cluster::Clustering;
use crate::palns::solution::PalnsSolution;
use crate::params::ProblemParams;
use crate::tour::InsertionPrice;

/// Tabu lifetime, in greedy-repair invocations.
const TABU_LIFETIME: u32 = 10_000;

/// Monotonic greedy-repair invocation counter.
///
/// Process-wide on purpose: the tabu is advisory diversification, so a
/// shared clock across workers is harmless and keeps expiries uniform.
static GREEDY_REPAIR_CALLS: AtomicU32 = AtomicU32::new(0);

/// An arc the greedy repair must not immediately recreate.
#[derive(Debug, Clone, Copy)]
struct TabuArc {
    from: usize,
    to: usize,
    expire: u32,
}

impl TabuArc {
    /// True iff performing `insertion` would recreate this arc.
    fn is_compatible(&self, insertion: &InsertionPrice, solution: &PalnsSolution<'_>) -> bool {
        let vertices = solution.tour.vertices();
        if self.from == vertices[insertion.position] && self.to == insertion.vertex {
            return false;
        }
        !(self.from == insertion.vertex
            && self.to == vertices[(insertion.position + 1) % vertices.len()])
    }
}

/// Cheapest-first feasible insertion with tabu diversification.
///
/// The candidate list is maintained incrementally: after each
/// insertion, entries for the inserted vertex, the used position and
/// newly infeasible deltas are dropped, later positions shift by one,
/// and the two positions around the new vertex are re-priced for every
/// vertex that could still fit.
#[derive(Debug, Clone)]
pub struct GreedyRepair<'a> {
    params: &'a ProblemParams,
    tabu: Vec<TabuArc>,
}

impl<'a> GreedyRepair<'a> {
    /// Creates the operator.
    pub fn new(params: &'a ProblemParams) -> Self {
        Self {
            params,
            tabu: Vec::new(),
        }
    }

    /// One exhaustive, tabu-free fill; used for the final polish after
    /// the search ends.
    pub fn fill_exhaustive(solution: &mut PalnsSolution<'a>) {
        let mut repair = GreedyRepair {
            params: solution.params(),
            tabu: Vec::new(),
        };
        repair.run(solution, false);
    }

    fn run(&mut self, solution: &mut PalnsSolution<'a>, heuristic: bool) {
        let now = GREEDY_REPAIR_CALLS.fetch_add(1, Ordering::Relaxed) + 1;
        self.tabu.retain(|arc| arc.expire > now);

        let mut insertions = if heuristic {
            solution.heur_feas_insertions()
        } else {
            solution.feas_insertions()
        };

        while !insertions.is_empty() {
            insertions.sort_by(|a, b| a.score.total_cmp(&b.score));

            let chosen = match insertions.iter().find(|insertion| {
                self.tabu
                    .iter()
                    .all(|arc| arc.is_compatible(insertion, solution))
            }) {
                Some(&insertion) => insertion,
                None => return,
            };

            let vertices = solution.tour.vertices();
            self.tabu.push(TabuArc {
                from: vertices[chosen.position],
                to: chosen.vertex,
                expire: now + TABU_LIFETIME,
            });
            self.tabu.push(TabuArc {
                from: chosen.vertex,
                to: vertices[(chosen.position + 1) % vertices.len()],
                expire: now + TABU_LIFETIME,
            });

            solution.add_vertex(chosen.vertex, chosen.position);

            // Prune and shift the surviving candidates, remembering
            // which vertices may still fit somewhere.
            let budget = solution.graph().max_travel_time();
            let travel_time = solution.tour.travel_time();
            let mut can_add = std::collections::HashSet::new();

            insertions.retain_mut(|insertion| {
                if insertion.vertex == chosen.vertex
                    || travel_time + insertion.delta_travel_time > budget
                    || insertion.position == chosen.position
                {
                    return false;
                }
                if insertion.position > chosen.position {
                    insertion.position += 1;
                }
                can_add.insert(insertion.vertex);
                true
            });

            // Re-price the two positions that changed.
            for &vertex in &can_add {
                for position in [chosen.position, chosen.position + 1] {
                    let price = solution.tour.price_vertex_insertion(vertex, position);
                    if travel_time + price.delta_travel_time <= budget {
                        insertions.push(price);
                    }
                }
            }
        }
    }
}

impl<'a> RepairOperator<PalnsSolution<'a>> for GreedyRepair<'a> {
    fn name(&self) -> &str {
        "greedy-repair"
    }

    fn repair(&mut self, solution: &mut PalnsSolution<'a>, _rng: &mut StdRng) {
        let heuristic = self.params.repair.heuristic;
        self.run(solution, heuristic);
    }

    fn clone_box(&self) -> Box<dyn RepairOperator<PalnsSolution<'a>> + '_> {
        Box::new(self.clone())
    }
}

/// Order in which the sequential repair feeds free vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqOrder {
    /// Uniform random shuffle.
    Random,
    /// Descending prize.
    ByPrize,
}

/// Inserts a random-length prefix of the ordered free vertices.
#[derive(Debug, Clone)]
pub struct SeqVertexRepair<'a> {
    params: &'a ProblemParams,
    order: SeqOrder,
}

impl<'a> SeqVertexRepair<'a> {
    /// Creates the operator with the given feeding order.
    pub fn new(params: &'a ProblemParams, order: SeqOrder) -> Self {
        Self { params, order }
    }
}

impl<'a> RepairOperator<PalnsSolution<'a>> for SeqVertexRepair<'a> {
    fn name(&self) -> &str {
        match self.order {
            SeqOrder::Random => "seq-repair-random",
            SeqOrder::ByPrize => "seq-repair-by-prize",
        }
    }

    fn repair(&mut self, solution: &mut PalnsSolution<'a>, rng: &mut StdRng) {
        let mut vertices = solution.free_vertices().to_vec();
        match self.order {
            SeqOrder::Random => vertices.shuffle(rng),
            SeqOrder::ByPrize => {
                let graph = solution.graph();
                vertices.sort_by(|&a, &b| {
                    graph
                        .vertex(b)
                        .prize
                        .total_cmp(&graph.vertex(a).prize)
                });
            }
        }

        let n_to_insert = (vertices.len() as f64 * rng.gen::<f64>()) as usize;
        for &vertex in &vertices[..n_to_insert] {
            insert_with_configured_mode(solution, vertex, self.params);
        }

        finish_repair(solution, self.params, rng);
    }

    fn clone_box(&self) -> Box<dyn RepairOperator<PalnsSolution<'a>> + '_> {
        Box::new(self.clone())
    }
}

/// Re-inserts the free members of one random cluster.
#[derive(Debug, Clone)]
pub struct RandomClusterRepair<'a> {
    params: &'a ProblemParams,
    clustering: &'a Clustering,
}

impl<'a> RandomClusterRepair<'a> {
    /// Creates the operator over a proper clustering.
    pub fn new(params: &'a ProblemParams, clustering: &'a Clustering) -> Self {
        debug_assert!(clustering.n_clusters() > 0);
        Self { params, clustering }
    }
}

impl<'a> RepairOperator<PalnsSolution<'a>> for RandomClusterRepair<'a> {
    fn name(&self) -> &str {
        "random-cluster-repair"
    }

    fn repair(&mut self, solution: &mut PalnsSolution<'a>, rng: &mut StdRng) {
        let cluster = self
            .clustering
            .cluster(rng.gen_range(0..self.clustering.n_clusters()))
            .to_vec();

        for vertex in cluster {
            if solution.tour.visits(vertex) || !solution.graph().vertex(vertex).reachable {
                continue;
            }
            insert_with_configured_mode(solution, vertex, self.params);
        }

        finish_repair(solution, self.params, rng);
    }

    fn clone_box(&self) -> Box<dyn RepairOperator<PalnsSolution<'a>> + '_> {
        Box::new(self.clone())
    }
}

/// One insertion in the configured (heuristic × feasibility) mode.
fn insert_with_configured_mode(
    solution: &mut PalnsSolution<'_>,
    vertex: usize,
    params: &ProblemParams,
) {
    match (
        params.repair.heuristic,
        params.repair.intermediate_infeasible,
    ) {
        (true, true) => solution.heur_add_vertex_in_best_pos_any(vertex),
        (true, false) => {
            solution.heur_add_vertex_in_best_pos_feasible(vertex);
        }
        (false, true) => solution.add_vertex_in_best_pos_any(vertex),
        (false, false) => {
            solution.add_vertex_in_best_pos_feasible(vertex);
        }
    }
}

/// Shared tail of the sequential and cluster repairs.
fn finish_repair(solution: &mut PalnsSolution<'_>, params: &ProblemParams, rng: &mut StdRng) {
    if params.repair.intermediate_infeasible && params.repair.use_2opt_before_restoring_feasibility
    {
        solution.tour.do_2opt();
    }
    solution.make_travel_time_feasible(rng);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_graphs::grid_graph;
    use crate::graph::Graph;
    use crate::tour::Tour;
    use rand::SeedableRng;

    fn line_graph(n: usize) -> Graph {
        let mut points = vec![(0.0, 0.0, 0.0)];
        for i in 1..n {
            points.push((i as f64, 0.0, i as f64));
        }
        grid_graph(&points, 1000.0)
    }

    #[test]
    fn test_greedy_repair_fills_to_budget() {
        let graph = grid_graph(
            &[
                (0.0, 0.0, 0.0),
                (1.0, 0.0, 1.0),
                (2.0, 0.0, 1.0),
                (3.0, 0.0, 1.0),
            ],
            6.5,
        );
        let params = ProblemParams::default();
        let mut solution = PalnsSolution::from_tour(Tour::new(&graph, vec![0, 1]), &params);
        let mut rng = StdRng::seed_from_u64(1);

        GreedyRepair::new(&params).repair(&mut solution, &mut rng);

        // Budget 6.5 fits the full line (length 6).
        assert_eq!(solution.tour.len(), 4);
        assert!(solution.tour.is_feasible());
        assert!(solution.free_vertices().is_empty());
    }

    #[test]
    fn test_greedy_repair_inserts_only_feasible() {
        let graph = grid_graph(
            &[
                (0.0, 0.0, 0.0),
                (1.0, 0.0, 1.0),
                (2.0, 0.0, 1.0),
                (3.0, 0.0, 1.0),
            ],
            4.5,
        );
        let params = ProblemParams::default();
        let mut solution = PalnsSolution::from_tour(Tour::new(&graph, vec![0, 1]), &params);
        let mut rng = StdRng::seed_from_u64(1);

        GreedyRepair::new(&params).repair(&mut solution, &mut rng);

        // Budget 4.5 only fits vertices up to x = 2 (tour length 4).
        assert!(solution.tour.is_feasible());
        assert!(solution.tour.visits(2));
        assert!(!solution.tour.visits(3));
    }

    #[test]
    fn test_greedy_repair_tabu_blocks_immediate_rebuild() {
        let graph = line_graph(6);
        let params = ProblemParams::default();
        let mut rng = StdRng::seed_from_u64(2);

        let mut repair = GreedyRepair::new(&params);
        let mut solution = PalnsSolution::from_tour(Tour::new(&graph, vec![0, 1]), &params);
        repair.repair(&mut solution, &mut rng);
        let first = solution.tour.vertices().to_vec();
        assert!(!repair.tabu.is_empty());

        // Remove everything again and repair with the same operator:
        // the tabu arcs from the first pass constrain the rebuild.
        for v in first.iter().skip(1).copied().collect::<Vec<_>>() {
            solution.remove_vertex_if_present(v);
        }
        repair.repair(&mut solution, &mut rng);

        // The repair still terminates and stays consistent.
        assert!(solution.tour.is_feasible());
        let on_tour = solution.tour.len() - 1;
        assert_eq!(
            on_tour + solution.free_vertices().len(),
            graph.reachable_non_depot().count()
        );
    }

    #[test]
    fn test_seq_repair_by_prize_prefers_valuable_vertices() {
        let graph = line_graph(8);
        let params = ProblemParams {
            repair: crate::params::RepairParams {
                intermediate_infeasible: false,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut solution = PalnsSolution::from_tour(Tour::new(&graph, vec![0, 1]), &params);
        let mut rng = StdRng::seed_from_u64(7);

        let mut op = SeqVertexRepair::new(&params, SeqOrder::ByPrize);
        // Run until the random prefix actually inserts something.
        for _ in 0..8 {
            op.repair(&mut solution, &mut rng);
        }

        // With descending-prize feeding, whenever anything beyond the
        // seed is on the tour, the top-prize vertex 7 is among them.
        if solution.tour.len() > 2 {
            assert!(solution.tour.visits(7));
        }
        assert!(solution.tour.is_feasible());
    }

    #[test]
    fn test_cluster_repair_inserts_free_members() {
        let mut points = vec![(50.0, -40.0, 0.0)];
        for i in 0..5 {
            points.push((i as f64 * 0.5, 0.0, 1.0));
        }
        for i in 0..5 {
            points.push((100.0 + i as f64 * 0.5, 0.0, 1.0));
        }
        let graph = grid_graph(&points, 1000.0);
        let clustering = Clustering::with_params(&graph, 1.0, 2);
        let params = ProblemParams::default();

        let mut solution = PalnsSolution::from_tour(Tour::new(&graph, vec![0, 1]), &params);
        let mut rng = StdRng::seed_from_u64(9);

        let mut op = RandomClusterRepair::new(&params, &clustering);
        op.repair(&mut solution, &mut rng);
        op.repair(&mut solution, &mut rng);

        // After touching both clusters everything fits in the huge
        // budget.
        assert!(solution.tour.is_feasible());
        let on_tour = solution.tour.len() - 1;
        assert_eq!(
            on_tour + solution.free_vertices().len(),
            graph.reachable_non_depot().count()
        );
    }

    #[test]
    fn test_fill_exhaustive_leaves_no_addable_vertex() {
        let graph = line_graph(6);
        let params = ProblemParams::default();
        let mut solution = PalnsSolution::from_tour(Tour::new(&graph, vec![0, 1]), &params);

        GreedyRepair::fill_exhaustive(&mut solution);

        assert!(solution.feas_insertions().is_empty());
        assert!(solution.tour.is_feasible());
    }
}
