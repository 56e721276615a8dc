//! Branch-and-cut MIP solver for the orienteering problem.
//!
//! Binary `x_e` selects edges, binary `y_v` selects vertices. The depot
//! is forced in, unreachable vertices are forced out, and every
//! selected vertex has degree two, so an integer solution decomposes
//! into vertex-disjoint cycles. Subtour elimination is separated
//! lazily: solve, walk the cycle through the depot, and for every other
//! selected cycle C add `Σ x_e ≤ |C| − 1` over the edges inside C, then
//! re-solve. The backend exposes no solver callbacks, so the lazy
//! constraints run as a cutting-plane loop around full re-solves; the
//! cut pool only grows, and the loop ends on the first cycle-free
//! incumbent, which is then provably optimal.
//!
//! The cut is expressed over the edges with both endpoints inside the
//! component. Indexing it by vertex id instead silently weakens the
//! relaxation; `test_two_triangles_regression` pins the correct form.

use std::collections::{HashMap, HashSet};

use good_lp::{
    constraint, default_solver, variable, variables, Expression, Solution as _, SolverModel,
    Variable,
};

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::tour::Tour;

/// Threshold above which a relaxed binary counts as selected.
const SELECTED: f64 = 0.5;

/// Exact solver over a graph's reachable clique.
pub struct BcSolver<'a> {
    graph: &'a Graph,
}

impl<'a> BcSolver<'a> {
    /// Creates a solver for the graph.
    pub fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    /// Solves the orienteering problem to optimality.
    ///
    /// Returns the optimal tour; fails if the backend reports an error
    /// or the instance admits no cycle through the depot.
    pub fn solve(&self) -> Result<Tour<'a>> {
        let graph = self.graph;

        log::debug!(
            "running branch-and-cut on a graph with {} vertices",
            graph.n_vertices()
        );

        // Accumulated subtour-elimination cuts: edge-id sets.
        let mut cuts: Vec<Vec<usize>> = Vec::new();

        loop {
            let (x_values, _y_values) = self.solve_with_cuts(&cuts)?;

            let selected_adjacency = self.selected_adjacency(&x_values);
            let depot_cycle = walk_cycle(&selected_adjacency, 0);

            let other_cycles = self.other_selected_cycles(&selected_adjacency, &depot_cycle);
            if other_cycles.is_empty() {
                log::debug!(
                    "branch-and-cut converged with {} subtour cuts",
                    cuts.len()
                );
                return Ok(Tour::new(graph, depot_cycle));
            }

            for component in other_cycles {
                cuts.push(self.internal_edges(&component));
            }
        }
    }

    /// One MIP solve under the current cut pool; returns the selected
    /// edge and vertex values.
    fn solve_with_cuts(&self, cuts: &[Vec<usize>]) -> Result<(Vec<f64>, Vec<f64>)> {
        let graph = self.graph;
        let mut vars = variables!();

        let x: Vec<Variable> = graph
            .edges()
            .iter()
            .map(|_| vars.add(variable().binary()))
            .collect();
        let y: Vec<Variable> = graph
            .vertices()
            .iter()
            .map(|_| vars.add(variable().binary()))
            .collect();

        let objective: Expression = graph
            .vertices()
            .iter()
            .map(|v| v.prize * y[v.id])
            .sum();

        let mut model = vars.maximise(objective).using(default_solver);

        // Budget.
        let budget_expr: Expression = graph
            .edges()
            .iter()
            .map(|e| e.travel_time * x[e.id])
            .sum();
        model = model.with(constraint!(budget_expr <= graph.max_travel_time()));

        // The depot is always visited; unreachable vertices never are.
        model = model.with(constraint!(y[0] == 1.0));
        for v in graph.vertices() {
            if !v.reachable {
                model = model.with(constraint!(y[v.id] == 0.0));
            }
        }

        // Degree and coupling.
        let mut incident: Vec<Vec<usize>> = vec![Vec::new(); graph.n_vertices()];
        for e in graph.edges() {
            incident[e.source].push(e.id);
            incident[e.target].push(e.id);
        }
        for v in graph.vertices() {
            let degree: Expression = incident[v.id].iter().map(|&e| Expression::from(x[e])).sum();
            model = model.with(constraint!(degree - 2.0 * y[v.id] == 0.0));
            for &e in &incident[v.id] {
                model = model.with(constraint!(x[e] - y[v.id] <= 0.0));
            }
        }

        // Subtour-elimination cuts gathered so far.
        for cut in cuts {
            let lhs: Expression = cut.iter().map(|&e| Expression::from(x[e])).sum();
            model = model.with(constraint!(lhs <= (cut.len() - 1) as f64));
        }

        let solution = model.solve().map_err(|e| Error::Mip(e.to_string()))?;

        Ok((
            x.iter().map(|&v| solution.value(v)).collect(),
            y.iter().map(|&v| solution.value(v)).collect(),
        ))
    }

    /// Adjacency restricted to the selected edges.
    fn selected_adjacency(&self, x_values: &[f64]) -> HashMap<usize, Vec<usize>> {
        let mut adjacency: HashMap<usize, Vec<usize>> = HashMap::new();
        for e in self.graph.edges() {
            if x_values[e.id] > SELECTED {
                adjacency.entry(e.source).or_default().push(e.target);
                adjacency.entry(e.target).or_default().push(e.source);
            }
        }
        adjacency
    }

    /// Every selected cycle not through the depot.
    fn other_selected_cycles(
        &self,
        adjacency: &HashMap<usize, Vec<usize>>,
        depot_cycle: &[usize],
    ) -> Vec<Vec<usize>> {
        let mut assigned: HashSet<usize> = depot_cycle.iter().copied().collect();
        let mut cycles = Vec::new();

        for &v in adjacency.keys() {
            if assigned.contains(&v) {
                continue;
            }
            let cycle = walk_cycle(adjacency, v);
            assigned.extend(cycle.iter().copied());
            cycles.push(cycle);
        }

        cycles
    }

    /// Edge ids with both endpoints inside the component.
    fn internal_edges(&self, component: &[usize]) -> Vec<usize> {
        let inside: HashSet<usize> = component.iter().copied().collect();
        let mut edges = Vec::new();
        for &v in component {
            for &w in component {
                if v < w && inside.contains(&w) {
                    if let Some(edge) = self.graph.edge(v, w) {
                        edges.push(edge.id);
                    }
                }
            }
        }
        edges
    }
}

/// Walks the selected cycle containing `start`: step to the unvisited
/// selected neighbour until none is left, then close back to the start.
fn walk_cycle(adjacency: &HashMap<usize, Vec<usize>>, start: usize) -> Vec<usize> {
    let mut cycle = vec![start];
    let mut visited = HashSet::from([start]);
    let mut current = start;

    loop {
        let next = adjacency
            .get(&current)
            .and_then(|ns| ns.iter().find(|n| !visited.contains(n)))
            .copied();

        match next {
            Some(v) => {
                cycle.push(v);
                visited.insert(v);
                current = v;
            }
            None => break,
        }
    }

    cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_graphs::grid_graph;

    #[test]
    fn test_line_instance_optimum() {
        // Depot between two unit-prize vertices; budget 4 fits both.
        let graph = grid_graph(
            &[(0.0, 0.0, 0.0), (1.0, 0.0, 1.0), (-1.0, 0.0, 1.0)],
            4.0,
        );
        let tour = BcSolver::new(&graph).solve().unwrap();

        assert!((tour.total_prize() - 2.0).abs() < 1e-6);
        assert!((tour.travel_time() - 4.0).abs() < 1e-6);
        assert_eq!(tour.vertices()[0], 0);
        assert_eq!(tour.len(), 3);
    }

    #[test]
    fn test_budget_constraint_shapes_the_optimum() {
        // The rich vertex at (5, 0) is only worth it on the tight tour
        // 0 → 1 → 3 → 0 of length exactly 10; adding vertex 2 blows
        // the budget.
        let graph = grid_graph(
            &[
                (0.0, 0.0, 0.0),
                (1.0, 0.0, 1.0),
                (1.0, 1.0, 1.0),
                (5.0, 0.0, 10.0),
            ],
            10.0,
        );
        let tour = BcSolver::new(&graph).solve().unwrap();

        assert!(tour.travel_time() <= 10.0 + 1e-6);
        assert!((tour.total_prize() - 11.0).abs() < 1e-6);
        assert!(tour.visits(3));
        assert!(!tour.visits(2));
    }

    #[test]
    fn test_two_triangles_regression() {
        // A cheap triangle at the depot and a prize-heavy one at
        // distance 40. The far vertices are (barely) reachable, but no
        // depot-anchored tour through them fits the budget; only as a
        // free-standing cycle would they be worth 150. A correctly
        // edge-indexed subtour cut forbids exactly that cycle, so the
        // optimum is the near triangle. A cut indexed by vertex ids
        // would leave the detached cycle selectable and report 152.
        let graph = grid_graph(
            &[
                (0.0, 0.0, 0.0),
                (1.0, 0.0, 1.0),
                (0.5, 1.0, 1.0),
                (40.0, 0.0, 50.0),
                (40.0, 0.5, 50.0),
                (40.0, -0.5, 50.0),
            ],
            80.02,
        );
        assert!(graph.vertex(4).reachable && graph.vertex(5).reachable);

        let tour = BcSolver::new(&graph).solve().unwrap();

        assert_eq!(tour.vertices()[0], 0);
        assert!(tour.is_feasible());
        let visits_far = tour.visits(3) || tour.visits(4) || tour.visits(5);
        assert!(tour.visits(1) && tour.visits(2) && !visits_far);
        assert!((tour.total_prize() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_depot_cycle_extraction_matches_selection() {
        let graph = grid_graph(
            &[
                (0.0, 0.0, 0.0),
                (1.0, 0.0, 1.0),
                (1.0, 1.0, 2.0),
                (0.0, 1.0, 3.0),
            ],
            100.0,
        );
        let tour = BcSolver::new(&graph).solve().unwrap();

        // The budget admits everything, so the optimum visits all.
        assert_eq!(tour.len(), 4);
        assert!((tour.total_prize() - 6.0).abs() < 1e-6);
        assert!(tour.is_simple());
        assert!(tour.are_edges_correct());
    }
}
