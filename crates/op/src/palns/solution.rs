//! The PALNS solution wrapper.
//!
//! Pairs a tour with the set of free vertices (reachable non-depot
//! vertices not on the tour) and keeps the two in sync through every
//! mutation. Cost is the prize left uncollected, so the framework's
//! minimization maximizes the collected prize.
//!
//! Insertion comes in four flavours along two axes: exhaustive vs
//! heuristic candidate positions, and any-position vs budget-feasible
//! only. The heuristic flavour prices only positions adjacent to one of
//! the vertex's proximity neighbours already on the tour, falling back
//! to growing annulus scans around the vertex when none is.

use rand::rngs::StdRng;
use rand::Rng;

use u_orienteering_core::Solution;

use crate::graph::Graph;
use crate::params::ProblemParams;
use crate::spatial::within_radii;
use crate::tour::{InsertionPrice, Tour};

/// Growth factor of the annulus scan radii.
const ANNULUS_GROWTH: f64 = 1.1;

/// Inner radius used for the first annulus on non-Euclidean instances,
/// where the proximity distances may overshoot the geometry.
const NON_EUCLIDEAN_MIN_RADIUS: f64 = 0.1;

/// A candidate solution: a tour plus its free vertices.
#[derive(Debug, Clone)]
pub struct PalnsSolution<'a> {
    graph: &'a Graph,
    params: &'a ProblemParams,
    /// The solution tour.
    pub tour: Tour<'a>,
    free_vertices: Vec<usize>,
}

impl Solution for PalnsSolution<'_> {
    fn cost(&self) -> f64 {
        self.graph.total_prize() - self.tour.total_prize()
    }
}

impl<'a> PalnsSolution<'a> {
    /// Wraps a tour, deriving the free-vertex set.
    pub fn from_tour(tour: Tour<'a>, params: &'a ProblemParams) -> Self {
        let graph = tour.graph();
        let free_vertices = graph
            .reachable_non_depot()
            .filter(|&v| !tour.visits(v))
            .collect();

        Self {
            graph,
            params,
            tour,
            free_vertices,
        }
    }

    /// The underlying graph.
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// The problem parameters.
    pub fn params(&self) -> &'a ProblemParams {
        self.params
    }

    /// Reachable non-depot vertices not on the tour.
    pub fn free_vertices(&self) -> &[usize] {
        &self.free_vertices
    }

    /// Removes a visited vertex from the tour into the free set.
    pub fn remove_vertex(&mut self, vertex: usize) {
        debug_assert!(self.tour.visits(vertex));
        debug_assert!(!self.free_vertices.contains(&vertex));

        // Removing the only non-depot vertex is refused by the tour.
        if self.tour.remove_vertex(vertex) {
            self.free_vertices.push(vertex);
        }
    }

    /// Removes the vertex if the tour visits it.
    pub fn remove_vertex_if_present(&mut self, vertex: usize) -> bool {
        if self.tour.remove_vertex_if_present(vertex) {
            self.free_vertices.push(vertex);
            return true;
        }
        false
    }

    /// Inserts a free vertex immediately after the given tour position.
    pub fn add_vertex(&mut self, vertex: usize, position: usize) {
        debug_assert!(self.free_vertices.contains(&vertex));

        self.tour.add_vertex(vertex, position);
        self.free_vertices.retain(|&v| v != vertex);
    }

    /// Inserts at the best-scoring position over an exhaustive scan,
    /// feasible or not.
    pub fn add_vertex_in_best_pos_any(&mut self, vertex: usize) {
        let mut best = self.tour.price_vertex_insertion(vertex, 0);
        for position in 1..self.tour.len() {
            let price = self.tour.price_vertex_insertion(vertex, position);
            if price.score < best.score {
                best = price;
            }
        }
        self.add_vertex(best.vertex, best.position);
    }

    /// Inserts at the best-scoring budget-feasible position over an
    /// exhaustive scan; false if no position is feasible.
    pub fn add_vertex_in_best_pos_feasible(&mut self, vertex: usize) -> bool {
        let mut insertions: Vec<InsertionPrice> = (0..self.tour.len())
            .map(|position| self.tour.price_vertex_insertion(vertex, position))
            .collect();
        insertions.sort_by(|a, b| a.score.total_cmp(&b.score));

        self.insert_first_feasible(&insertions)
    }

    /// Heuristic counterpart of [`add_vertex_in_best_pos_any`]: prices
    /// only spatially promising positions, falling back to the
    /// exhaustive scan when none exists.
    pub fn heur_add_vertex_in_best_pos_any(&mut self, vertex: usize) {
        let mut insertions = Vec::new();
        self.positions_next_to_neighbours(vertex, false, &mut insertions);
        if insertions.is_empty() {
            self.positions_next_to_nearby_vertices(vertex, false, &mut insertions);
        }

        match insertions
            .iter()
            .min_by(|a, b| a.score.total_cmp(&b.score))
            .copied()
        {
            Some(best) => self.add_vertex(best.vertex, best.position),
            None => self.add_vertex_in_best_pos_any(vertex),
        }
    }

    /// Heuristic counterpart of [`add_vertex_in_best_pos_feasible`].
    pub fn heur_add_vertex_in_best_pos_feasible(&mut self, vertex: usize) -> bool {
        let mut insertions = Vec::new();
        self.positions_next_to_neighbours(vertex, false, &mut insertions);
        if insertions.is_empty() {
            self.positions_next_to_nearby_vertices(vertex, false, &mut insertions);
        }
        if insertions.is_empty() {
            return false;
        }

        insertions.sort_by(|a, b| a.score.total_cmp(&b.score));
        self.insert_first_feasible(&insertions)
    }

    /// Every insertion of every free vertex at every position.
    pub fn all_insertions(&self) -> Vec<InsertionPrice> {
        let mut insertions = Vec::new();
        for &vertex in &self.free_vertices {
            for position in 0..self.tour.len() {
                insertions.push(self.tour.price_vertex_insertion(vertex, position));
            }
        }
        insertions
    }

    /// Every budget-feasible insertion of every free vertex.
    pub fn feas_insertions(&self) -> Vec<InsertionPrice> {
        let mut insertions = Vec::new();
        for &vertex in &self.free_vertices {
            for position in 0..self.tour.len() {
                let price = self.tour.price_vertex_insertion(vertex, position);
                if self.fits_budget(&price) {
                    insertions.push(price);
                }
            }
        }
        insertions
    }

    /// Heuristically chosen insertions of every free vertex.
    pub fn heur_all_insertions(&self) -> Vec<InsertionPrice> {
        let mut insertions = Vec::new();
        for &vertex in &self.free_vertices {
            let before = insertions.len();
            self.positions_next_to_neighbours(vertex, false, &mut insertions);
            if insertions.len() == before {
                self.positions_next_to_nearby_vertices(vertex, false, &mut insertions);
            }
        }
        insertions
    }

    /// Heuristically chosen budget-feasible insertions of every free
    /// vertex.
    pub fn heur_feas_insertions(&self) -> Vec<InsertionPrice> {
        let mut insertions = Vec::new();
        for &vertex in &self.free_vertices {
            let before = insertions.len();
            self.positions_next_to_neighbours(vertex, true, &mut insertions);
            if insertions.len() == before {
                self.positions_next_to_nearby_vertices(vertex, true, &mut insertions);
            }
        }
        insertions
    }

    /// Restores travel-time feasibility, moving every removed vertex
    /// back into the free set.
    ///
    /// Uses the optimal subsequence with probability
    /// `restore_feasibility_optimal`, the greedy removal otherwise.
    pub fn make_travel_time_feasible(&mut self, rng: &mut StdRng) {
        let removed = if rng.gen::<f64>() < self.params.repair.restore_feasibility_optimal {
            self.tour.make_travel_time_feasible_optimal()
        } else {
            self.tour.make_travel_time_feasible_naive()
        };

        debug_assert!(removed.iter().all(|&v| !self.tour.visits(v)));
        self.free_vertices.extend(removed);
    }

    fn fits_budget(&self, price: &InsertionPrice) -> bool {
        self.tour.travel_time() + price.delta_travel_time <= self.graph.max_travel_time()
    }

    fn insert_first_feasible(&mut self, sorted_insertions: &[InsertionPrice]) -> bool {
        for price in sorted_insertions {
            if self.fits_budget(price) {
                self.add_vertex(price.vertex, price.position);
                return true;
            }
        }
        false
    }

    /// Prices the two positions around one tour-present neighbour.
    fn positions_next_to_neighbour(
        &self,
        vertex: usize,
        neighbour: usize,
        feasible_only: bool,
        insertions: &mut Vec<InsertionPrice>,
    ) {
        let Some(position) = self.tour.position_of(neighbour) else {
            return;
        };
        debug_assert!(position >= 1);

        for price in [
            self.tour.price_vertex_insertion(vertex, position - 1),
            self.tour.price_vertex_insertion(vertex, position),
        ] {
            if !feasible_only || self.fits_budget(&price) {
                insertions.push(price);
            }
        }
    }

    /// Prices positions adjacent to the vertex's proximity neighbours.
    fn positions_next_to_neighbours(
        &self,
        vertex: usize,
        feasible_only: bool,
        insertions: &mut Vec<InsertionPrice>,
    ) {
        for entry in self.graph.proximity(vertex) {
            self.positions_next_to_neighbour(vertex, entry.vertex, feasible_only, insertions);
        }
    }

    /// Scans growing Euclidean annuli around the vertex until some
    /// candidate position turns up.
    ///
    /// The inner radius starts at the vertex's furthest proximity
    /// distance (or [`NON_EUCLIDEAN_MIN_RADIUS`] when travel times are
    /// not Euclidean) and both radii grow by [`ANNULUS_GROWTH`] per
    /// ring. Gives up after 2·|V| consecutive empty rings or once every
    /// non-depot vertex has been scanned.
    fn positions_next_to_nearby_vertices(
        &self,
        vertex: usize,
        feasible_only: bool,
        insertions: &mut Vec<InsertionPrice>,
    ) {
        let proximity = self.graph.proximity(vertex);
        debug_assert!(!proximity.is_empty());

        let mut min_r = proximity[proximity.len() - 1].travel_time;
        if !self.graph.is_euclidean() {
            min_r = NON_EUCLIDEAN_MIN_RADIUS;
        }
        let mut max_r = min_r * ANNULUS_GROWTH;

        let vertex_data = self.graph.vertex(vertex);
        let centre = [vertex_data.x, vertex_data.y];

        let initial_insertions = insertions.len();
        let mut points_scanned = 0usize;
        let max_failures = 2 * self.graph.n_vertices();
        let mut failures = 0usize;

        loop {
            let points = within_radii(self.graph, centre, min_r, max_r);

            if points.is_empty() {
                failures += 1;
            } else {
                for &(neighbour, _) in &points {
                    self.positions_next_to_neighbour(
                        vertex,
                        neighbour,
                        feasible_only,
                        insertions,
                    );
                }
                points_scanned += points.len();

                if insertions.len() > initial_insertions {
                    break;
                }
                if points_scanned >= self.graph.n_vertices().saturating_sub(2) {
                    break;
                }
            }

            if failures > max_failures {
                break;
            }

            min_r = max_r;
            max_r *= ANNULUS_GROWTH;
        }
    }
}
