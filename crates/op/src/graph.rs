//! The immutable problem graph.
//!
//! The graph is built once, from a parsed instance or from a vertex
//! list, and then shared read-only by every worker. Construction
//! derives everything the search needs: the complete edge clique over
//! reachable vertices with O(1) endpoint-pair lookup, the R-tree over
//! vertex coordinates, the per-vertex proximity map, and cached
//! min/max/total statistics.

use std::collections::HashMap;

use rstar::RTree;

use crate::error::{Error, Result};
use crate::instance::InstanceData;
use crate::spatial::VertexPoint;

/// Number of neighbours kept in the proximity map per vertex.
pub const PROXIMITY_NEIGHBOURS: usize = 20;

/// Absolute tolerance for travel-time feasibility and cache checks.
///
/// Accumulated rounding over delta updates must never turn a feasible
/// tour infeasible, so every comparison against the budget allows this
/// slack.
pub const TRAVEL_TIME_TOLERANCE: f64 = 0.5;

/// A vertex of the problem graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Stable, progressive id; the depot has id 0.
    pub id: usize,
    /// True iff this vertex is the depot.
    pub depot: bool,
    /// True iff the vertex can appear on a feasible tour, i.e. its
    /// depot distance is at most half the travel-time budget.
    pub reachable: bool,
    /// X-coordinate.
    pub x: f64,
    /// Y-coordinate.
    pub y: f64,
    /// Prize collected when the vertex is visited.
    pub prize: f64,
}

/// An edge of the problem graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    /// Stable, progressive id.
    pub id: usize,
    /// Lower-id endpoint.
    pub source: usize,
    /// Higher-id endpoint.
    pub target: usize,
    /// Travel time along the edge.
    pub travel_time: f64,
}

/// A proximity-map entry: a nearby vertex and the travel time to it.
#[derive(Debug, Clone, Copy)]
pub struct ProximityEntry {
    /// The nearby vertex.
    pub vertex: usize,
    /// Travel time to it.
    pub travel_time: f64,
}

/// The graph on which the orienteering problem is defined.
#[derive(Debug, Clone)]
pub struct Graph {
    name: String,
    edge_weight_type: String,
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    edge_index: HashMap<(usize, usize), usize>,
    rtree: RTree<VertexPoint>,
    proximity_map: Vec<Vec<ProximityEntry>>,
    max_travel_time: f64,
    min_x: f64,
    max_x: f64,
    min_y: f64,
    max_y: f64,
    min_prize: f64,
    max_prize: f64,
    total_prize: f64,
}

impl Graph {
    /// Builds a graph from a parsed instance.
    ///
    /// Reachability is decided against the instance distances; the edge
    /// clique spans reachable vertices only.
    pub fn from_instance(data: &InstanceData) -> Result<Self> {
        if data.n_vertices < 2 {
            return Err(Error::InvalidInstance(format!(
                "need at least 2 vertices, got {}",
                data.n_vertices
            )));
        }

        let half_budget = data.max_travel_time / 2.0;
        let vertices: Vec<Vertex> = (0..data.n_vertices)
            .map(|i| Vertex {
                id: i,
                depot: i == 0,
                reachable: data.distance(0, i) <= half_budget,
                x: data.coordinates[i].0,
                y: data.coordinates[i].1,
                prize: data.prizes[i],
            })
            .collect();

        Ok(Self::build(
            data.name.clone(),
            data.edge_weight_type.clone(),
            vertices,
            data.max_travel_time,
            |v, w| data.distance(v.id, w.id),
        ))
    }

    /// Builds a graph from a vertex list with Euclidean travel times.
    ///
    /// Used for reduced graphs and synthetic instances; the reachable
    /// flags of the supplied vertices are taken as-is.
    pub fn from_vertices(vertices: Vec<Vertex>, max_travel_time: f64) -> Self {
        Self::from_vertices_with_distance(vertices, max_travel_time, |v, w| {
            ((v.x - w.x).powi(2) + (v.y - w.y).powi(2)).sqrt()
        })
    }

    /// Builds a graph from a vertex list with a caller-supplied travel
    /// time function.
    pub fn from_vertices_with_distance(
        vertices: Vec<Vertex>,
        max_travel_time: f64,
        distance: impl Fn(&Vertex, &Vertex) -> f64,
    ) -> Self {
        Self::build(
            "generated".to_owned(),
            "EUC_2D".to_owned(),
            vertices,
            max_travel_time,
            distance,
        )
    }

    fn build(
        name: String,
        edge_weight_type: String,
        vertices: Vec<Vertex>,
        max_travel_time: f64,
        distance: impl Fn(&Vertex, &Vertex) -> f64,
    ) -> Self {
        assert!(!vertices.is_empty());
        assert!(vertices[0].depot, "vertex 0 must be the depot");
        assert!(vertices[0].reachable, "the depot must be reachable");

        let n = vertices.len();

        // Complete clique over the reachable vertices.
        let mut edges = Vec::new();
        let mut edge_index = HashMap::new();
        for i in 0..n {
            if !vertices[i].reachable {
                continue;
            }
            for j in (i + 1)..n {
                if !vertices[j].reachable {
                    continue;
                }
                let id = edges.len();
                edges.push(Edge {
                    id,
                    source: i,
                    target: j,
                    travel_time: distance(&vertices[i], &vertices[j]),
                });
                edge_index.insert((i, j), id);
            }
        }

        log::debug!(
            "built graph '{}': {} vertices, {} edges",
            name,
            n,
            edges.len()
        );

        let rtree = RTree::bulk_load(
            vertices
                .iter()
                .map(|v| VertexPoint::new(v.id, [v.x, v.y]))
                .collect(),
        );

        let (min_x, max_x) = min_max(vertices.iter().map(|v| v.x));
        let (min_y, max_y) = min_max(vertices.iter().map(|v| v.y));
        let (min_prize, max_prize) = min_max(vertices.iter().map(|v| v.prize));
        let total_prize = vertices.iter().map(|v| v.prize).sum();

        let mut graph = Self {
            name,
            edge_weight_type,
            vertices,
            edges,
            edge_index,
            rtree,
            proximity_map: Vec::new(),
            max_travel_time,
            min_x,
            max_x,
            min_y,
            max_y,
            min_prize,
            max_prize,
            total_prize,
        };
        graph.proximity_map = graph.generate_proximity_map();
        graph
    }

    /// For every vertex, its nearest non-depot reachable neighbours,
    /// ascending by travel time, at most [`PROXIMITY_NEIGHBOURS`] each.
    fn generate_proximity_map(&self) -> Vec<Vec<ProximityEntry>> {
        self.vertices
            .iter()
            .map(|v| {
                if !v.reachable {
                    return Vec::new();
                }
                let mut entries: Vec<ProximityEntry> = self
                    .vertices
                    .iter()
                    .filter(|w| w.reachable && !w.depot && w.id != v.id)
                    .map(|w| ProximityEntry {
                        vertex: w.id,
                        travel_time: self.travel_time(v.id, w.id),
                    })
                    .collect();
                entries.sort_by(|a, b| a.travel_time.total_cmp(&b.travel_time));
                entries.truncate(PROXIMITY_NEIGHBOURS);
                entries
            })
            .collect()
    }

    /// Instance name.
    pub fn instance_name(&self) -> &str {
        &self.name
    }

    /// The instance's EDGE_WEIGHT_TYPE tag.
    pub fn edge_weight_type(&self) -> &str {
        &self.edge_weight_type
    }

    /// True iff travel times are Euclidean distances of the coordinates.
    pub fn is_euclidean(&self) -> bool {
        self.edge_weight_type == "EUC_2D"
    }

    /// Number of vertices.
    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// The travel-time budget of a tour.
    pub fn max_travel_time(&self) -> f64 {
        self.max_travel_time
    }

    /// A vertex by id.
    pub fn vertex(&self, v: usize) -> &Vertex {
        &self.vertices[v]
    }

    /// All vertices.
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// All edges of the reachable clique.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// The edge between two distinct vertices, if both are reachable.
    pub fn edge(&self, v: usize, w: usize) -> Option<&Edge> {
        let key = if v < w { (v, w) } else { (w, v) };
        self.edge_index.get(&key).map(|&id| &self.edges[id])
    }

    /// Travel time between two vertices; zero for `v == w`.
    ///
    /// # Panics
    ///
    /// Panics if the vertices are distinct and not adjacent: by
    /// construction that means at least one of them is unreachable, so a
    /// lookup is a bug in the caller.
    pub fn travel_time(&self, v: usize, w: usize) -> f64 {
        if v == w {
            return 0.0;
        }
        match self.edge(v, w) {
            Some(edge) => edge.travel_time,
            None => panic!(
                "requested travel time of non-adjacent vertices {v} (reachable: {}) and {w} (reachable: {})",
                self.vertices[v].reachable, self.vertices[w].reachable
            ),
        }
    }

    /// Sum of all vertex prizes, reachable or not.
    pub fn total_prize(&self) -> f64 {
        self.total_prize
    }

    /// Smallest and largest x-coordinate.
    pub fn x_range(&self) -> (f64, f64) {
        (self.min_x, self.max_x)
    }

    /// Smallest and largest y-coordinate.
    pub fn y_range(&self) -> (f64, f64) {
        (self.min_y, self.max_y)
    }

    /// Smallest and largest prize.
    pub fn prize_range(&self) -> (f64, f64) {
        (self.min_prize, self.max_prize)
    }

    /// The nearest non-depot reachable neighbours of `v`, ascending by
    /// travel time.
    pub fn proximity(&self, v: usize) -> &[ProximityEntry] {
        &self.proximity_map[v]
    }

    /// Iterator over the ids of reachable non-depot vertices.
    pub fn reachable_non_depot(&self) -> impl Iterator<Item = usize> + '_ {
        self.vertices
            .iter()
            .filter(|v| v.reachable && !v.depot)
            .map(|v| v.id)
    }

    /// The R-tree over vertex coordinates.
    pub(crate) fn rtree(&self) -> &RTree<VertexPoint> {
        &self.rtree
    }

    /// A copy of this graph with a different travel-time budget.
    ///
    /// Reachability and edges are kept as-is; used by the initial
    /// heuristic to solve a reduced graph with an inflated budget.
    pub fn clone_with_max_travel_time(&self, max_travel_time: f64) -> Self {
        let mut clone = self.clone();
        clone.max_travel_time = max_travel_time;
        clone
    }
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}
