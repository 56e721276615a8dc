//! Closed tours and their primitives.
//!
//! A tour stores its vertex and edge sequences as two parallel arrays:
//! `edges[i]` is the edge between `vertices[i]` and `vertices[(i + 1) %
//! len]`. Total travel time and prize are cached and maintained by
//! delta on every mutation; a from-scratch recomputation must agree
//! within [`TRAVEL_TIME_TOLERANCE`] or the tour is corrupt.

use std::collections::HashSet;

use crate::graph::{Graph, TRAVEL_TIME_TOLERANCE};
use crate::labelling;

/// Slack for feasibility checks against the travel-time budget.
///
/// Guards against accumulated rounding in the delta-maintained cache
/// without letting measurably over-budget tours pass.
pub const FEASIBILITY_EPSILON: f64 = 1e-6;

/// Priced insertion of a vertex at a tour position.
#[derive(Debug, Clone, Copy)]
pub struct InsertionPrice {
    /// The vertex to insert.
    pub vertex: usize,
    /// Insert immediately after this tour position.
    pub position: usize,
    /// Increase in travel time.
    pub delta_travel_time: f64,
    /// Increase in prize.
    pub delta_prize: f64,
    /// Δtravel-time / Δprize; lower is better.
    pub score: f64,
}

/// Priced removal of the vertex at a tour position.
#[derive(Debug, Clone, Copy)]
pub struct RemovalPrice {
    /// The vertex that would be removed.
    pub vertex: usize,
    /// Decrease in travel time.
    pub delta_travel_time: f64,
    /// Decrease in prize.
    pub delta_prize: f64,
    /// Δtravel-time / Δprize; higher is better.
    pub score: f64,
}

/// A simple closed tour on the graph.
#[derive(Debug, Clone)]
pub struct Tour<'a> {
    graph: &'a Graph,
    vertices: Vec<usize>,
    edges: Vec<usize>,
    travel_time: f64,
    total_prize: f64,
}

impl<'a> Tour<'a> {
    /// Builds a tour visiting the given vertices in order and closing
    /// back to the first.
    ///
    /// Solution tours start at the depot; tours produced by a TSP run
    /// over a vertex subset may start anywhere.
    pub fn new(graph: &'a Graph, vertices: Vec<usize>) -> Self {
        assert!(vertices.len() >= 2, "a tour visits at least 2 vertices");

        let mut tour = Self {
            graph,
            vertices,
            edges: Vec::new(),
            travel_time: 0.0,
            total_prize: 0.0,
        };
        tour.rebuild_edges();
        tour.travel_time = tour.recompute_travel_time();
        tour.total_prize = tour.vertices.iter().map(|&v| graph.vertex(v).prize).sum();

        debug_assert!(tour.is_simple());
        tour
    }

    /// The underlying graph.
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    /// The visited vertices, in order. The closing arc back to
    /// `vertices[0]` is implicit.
    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    /// Edge ids, parallel to the vertex sequence.
    pub fn edges(&self) -> &[usize] {
        &self.edges
    }

    /// Number of visited vertices.
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    /// True iff the tour has no vertices (never the case for a built
    /// tour, kept for slice-like symmetry).
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Cached total travel time.
    pub fn travel_time(&self) -> f64 {
        self.travel_time
    }

    /// Cached total collected prize.
    pub fn total_prize(&self) -> f64 {
        self.total_prize
    }

    /// True iff the tour visits the vertex.
    pub fn visits(&self, vertex: usize) -> bool {
        self.vertices.contains(&vertex)
    }

    /// Position of the vertex in the tour, if visited.
    pub fn position_of(&self, vertex: usize) -> Option<usize> {
        self.vertices.iter().position(|&v| v == vertex)
    }

    /// True iff the cached travel time respects the budget, within
    /// [`FEASIBILITY_EPSILON`].
    pub fn is_feasible(&self) -> bool {
        self.travel_time <= self.graph.max_travel_time() + FEASIBILITY_EPSILON
    }

    /// True iff no vertex repeats.
    pub fn is_simple(&self) -> bool {
        let unique: HashSet<usize> = self.vertices.iter().copied().collect();
        unique.len() == self.vertices.len()
    }

    /// True iff the cached travel time matches a from-scratch
    /// recomputation within [`TRAVEL_TIME_TOLERANCE`].
    pub fn is_travel_time_correct(&self) -> bool {
        (self.travel_time - self.recompute_travel_time()).abs() < TRAVEL_TIME_TOLERANCE
    }

    /// True iff the edge sequence agrees with the vertex sequence.
    pub fn are_edges_correct(&self) -> bool {
        if self.edges.len() != self.vertices.len() {
            return false;
        }
        self.vertices.iter().enumerate().all(|(i, &v)| {
            let w = self.vertices[(i + 1) % self.vertices.len()];
            self.graph
                .edge(v, w)
                .is_some_and(|edge| edge.id == self.edges[i])
        })
    }

    /// Inserts `vertex` immediately after tour position `position`,
    /// updating the caches by delta.
    pub fn add_vertex(&mut self, vertex: usize, position: usize) {
        assert!(position < self.vertices.len());
        assert!(!self.visits(vertex), "vertex {vertex} already on the tour");
        assert!(!self.graph.vertex(vertex).depot);
        assert!(self.graph.vertex(vertex).reachable);

        let before = self.vertices[position];
        let after = self.vertices[(position + 1) % self.vertices.len()];

        self.travel_time += self.graph.travel_time(before, vertex)
            + self.graph.travel_time(vertex, after)
            - self.graph.travel_time(before, after);
        self.total_prize += self.graph.vertex(vertex).prize;

        self.vertices.insert(position + 1, vertex);
        let e1 = self.graph.edge(before, vertex).expect("clique edge").id;
        let e2 = self.graph.edge(vertex, after).expect("clique edge").id;
        self.edges[position] = e1;
        self.edges.insert(position + 1, e2);

        debug_assert!(self.is_simple());
        debug_assert!(self.are_edges_correct());
        debug_assert!(self.is_travel_time_correct());
    }

    /// Removes the vertex at `position` (never position 0, the anchor).
    ///
    /// Removing the only non-anchor vertex would leave a degenerate
    /// tour, so that request is refused with a warning.
    pub fn remove_vertex_by_position(&mut self, position: usize) -> bool {
        assert!(position > 0, "cannot remove the tour anchor");
        assert!(position < self.vertices.len());

        if self.vertices.len() <= 2 {
            log::warn!("refusing to remove the only non-depot vertex of a tour");
            return false;
        }

        let n = self.vertices.len();
        let before = self.vertices[position - 1];
        let vertex = self.vertices[position];
        let after = self.vertices[(position + 1) % n];

        self.travel_time -= self.graph.travel_time(before, vertex)
            + self.graph.travel_time(vertex, after)
            - self.graph.travel_time(before, after);
        self.total_prize -= self.graph.vertex(vertex).prize;

        self.vertices.remove(position);
        self.edges[position - 1] = self.graph.edge(before, after).expect("clique edge").id;
        self.edges.remove(position);

        debug_assert!(self.are_edges_correct());
        debug_assert!(self.is_travel_time_correct());
        true
    }

    /// Removes a visited, non-anchor vertex.
    pub fn remove_vertex(&mut self, vertex: usize) -> bool {
        let position = self
            .position_of(vertex)
            .unwrap_or_else(|| panic!("vertex {vertex} is not on the tour"));
        self.remove_vertex_by_position(position)
    }

    /// Removes the vertex if it is on the tour; false otherwise.
    pub fn remove_vertex_if_present(&mut self, vertex: usize) -> bool {
        match self.position_of(vertex) {
            Some(position) => self.remove_vertex_by_position(position),
            None => false,
        }
    }

    /// Prices inserting `vertex` immediately after `position`, in three
    /// edge lookups.
    pub fn price_vertex_insertion(&self, vertex: usize, position: usize) -> InsertionPrice {
        debug_assert!(position < self.vertices.len());
        debug_assert!(!self.visits(vertex));

        let before = self.vertices[position];
        let after = self.vertices[(position + 1) % self.vertices.len()];

        let delta_travel_time = self.graph.travel_time(before, vertex)
            + self.graph.travel_time(vertex, after)
            - self.graph.travel_time(before, after);
        let delta_prize = self.graph.vertex(vertex).prize;

        InsertionPrice {
            vertex,
            position,
            delta_travel_time,
            delta_prize,
            score: delta_travel_time / delta_prize,
        }
    }

    /// Prices removing the vertex at `position`.
    pub fn price_vertex_removal(&self, position: usize) -> RemovalPrice {
        debug_assert!(position > 0);
        debug_assert!(position < self.vertices.len());

        let before = self.vertices[position - 1];
        let vertex = self.vertices[position];
        let after = self.vertices[(position + 1) % self.vertices.len()];

        let delta_travel_time = self.graph.travel_time(before, vertex)
            + self.graph.travel_time(vertex, after)
            - self.graph.travel_time(before, after);
        let delta_prize = self.graph.vertex(vertex).prize;

        RemovalPrice {
            vertex,
            delta_travel_time,
            delta_prize,
            score: delta_travel_time / delta_prize,
        }
    }

    /// Repeated best-improvement 2-opt.
    ///
    /// A swap is taken only when its gain exceeds 1.0, which bounds the
    /// number of rounds; the interior segment is reversed in place and
    /// the edge list rebuilt once at the end. Position 0 never moves.
    pub fn do_2opt(&mut self) {
        debug_assert!(self.is_simple());
        debug_assert!(self.is_travel_time_correct());

        if self.vertices.len() < 4 {
            return;
        }

        loop {
            let n = self.vertices.len();
            let mut best_gain = 0.0;
            let mut best = None;

            for i in 0..(n - 2) {
                for j in (i + 2)..n {
                    let next_i = i + 1;
                    let next_j = (j + 1) % n;
                    let gain = self.graph.travel_time(self.vertices[i], self.vertices[next_i])
                        + self.graph.travel_time(self.vertices[j], self.vertices[next_j])
                        - self.graph.travel_time(self.vertices[i], self.vertices[j])
                        - self
                            .graph
                            .travel_time(self.vertices[next_i], self.vertices[next_j]);

                    if gain > best_gain + 1.0 {
                        best_gain = gain;
                        best = Some((i, j));
                    }
                }
            }

            match best {
                Some((i, j)) => {
                    self.vertices[i + 1..=j].reverse();
                    self.travel_time -= best_gain;
                }
                None => break,
            }
        }

        self.rebuild_edges();

        debug_assert!(self.is_simple());
        debug_assert!(self.is_travel_time_correct());
    }

    /// Greedily removes vertices until the budget is respected.
    ///
    /// Each round removes the vertex with the highest Δtravel-time per
    /// Δprize and re-prices only the two adjacent positions. Returns
    /// the removed vertices.
    pub fn make_travel_time_feasible_naive(&mut self) -> Vec<usize> {
        debug_assert!(self.is_travel_time_correct());

        if self.is_feasible() {
            return Vec::new();
        }

        let mut removed = Vec::new();

        // removals[p] prices the removal of position p; position 0 is
        // the anchor and never priced.
        let mut removals: Vec<RemovalPrice> = (0..self.vertices.len())
            .map(|p| {
                if p == 0 {
                    RemovalPrice {
                        vertex: self.vertices[0],
                        delta_travel_time: 0.0,
                        delta_prize: 0.0,
                        score: f64::NEG_INFINITY,
                    }
                } else {
                    self.price_vertex_removal(p)
                }
            })
            .collect();

        while !self.is_feasible() {
            let best_position = match (1..removals.len())
                .max_by(|&a, &b| removals[a].score.total_cmp(&removals[b].score))
            {
                Some(p) => p,
                None => break,
            };

            if !self.remove_vertex_by_position(best_position) {
                // Down to the last non-depot vertex; nothing more to do.
                break;
            }
            removed.push(removals[best_position].vertex);
            removals.remove(best_position);

            debug_assert_eq!(removals.len(), self.vertices.len());

            if best_position > 1 {
                removals[best_position - 1] = self.price_vertex_removal(best_position - 1);
            }
            if best_position < removals.len() {
                removals[best_position] = self.price_vertex_removal(best_position);
            }
        }

        debug_assert!(self.is_travel_time_correct());
        removed
    }

    /// Removes the prize-minimal set of vertices that restores the
    /// budget, among all subsequences preserving the current order.
    ///
    /// Solves a resource-constrained longest-prize path on the position
    /// chain by label setting; see [`labelling`]. Returns the removed
    /// vertices.
    pub fn make_travel_time_feasible_optimal(&mut self) -> Vec<usize> {
        debug_assert!(self.is_simple());
        debug_assert!(self.is_travel_time_correct());

        let kept = labelling::max_prize_subsequence(
            self.graph,
            &self.vertices,
            self.graph.max_travel_time(),
        );

        let kept_set: HashSet<usize> = kept.iter().copied().collect();
        let removed: Vec<usize> = self
            .vertices
            .iter()
            .copied()
            .filter(|v| !kept_set.contains(v))
            .collect();

        for &vertex in &removed {
            debug_assert_ne!(vertex, self.vertices[0]);
            self.remove_vertex(vertex);
        }

        debug_assert!(self.is_simple());
        debug_assert!(self.is_travel_time_correct());
        removed
    }

    fn rebuild_edges(&mut self) {
        let n = self.vertices.len();
        self.edges = (0..n)
            .map(|i| {
                let v = self.vertices[i];
                let w = self.vertices[(i + 1) % n];
                self.graph
                    .edge(v, w)
                    .unwrap_or_else(|| panic!("tour uses non-adjacent vertices {v} and {w}"))
                    .id
            })
            .collect();
    }

    fn recompute_travel_time(&self) -> f64 {
        self.edges
            .iter()
            .map(|&e| self.graph.edges()[e].travel_time)
            .sum()
    }
}

impl std::fmt::Display for Tour<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(l: {}, tt: {:.2}, p: {:.2}) ",
            self.vertices.len(),
            self.travel_time,
            self.total_prize
        )?;
        let ids: Vec<String> = self.vertices.iter().map(|v| v.to_string()).collect();
        write!(f, "[{}]", ids.join(", "))
    }
}
