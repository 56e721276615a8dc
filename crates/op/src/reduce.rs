//! Cluster-based graph reduction.
//!
//! Each cluster collapses into one meta-vertex carrying the cluster's
//! prize at its prize-weighted centre; noise vertices map through
//! unchanged. Visiting a meta-vertex implies walking the cluster's
//! internal TSP, so every reduced edge incident to it is surcharged by
//! half the TSP length; the two incident edges of a visit amortize the
//! full cost exactly once.

use std::collections::HashMap;

use crate::cluster::Clustering;
use crate::error::Result;
use crate::graph::{Graph, Vertex};
use crate::tour::Tour;
use crate::tsp::TspSolver;

/// Hard floor for the recursive-reduction target size.
const REDUCTION_TARGET_FLOOR: usize = 50;

/// A graph reduced by clustering, with the projection data to map tours
/// back to the original graph.
#[derive(Debug, Clone)]
pub struct ReducedGraph<'a> {
    original: &'a Graph,
    reduced: Graph,
    /// Reduced vertex id → original vertex ids.
    mapping: Vec<Vec<usize>>,
    /// Cluster TSPs (on the original graph), keyed by reduced vertex id.
    tsps: HashMap<usize, Tour<'a>>,
}

impl<'a> ReducedGraph<'a> {
    /// Reduces a graph along a clustering.
    ///
    /// Cluster TSPs are computed through the supplied solver; the
    /// artifact tag carries the reduced vertex id.
    pub fn new(
        original: &'a Graph,
        clustering: &Clustering,
        tsp: &dyn TspSolver,
    ) -> Result<Self> {
        let mut vertices = Vec::new();
        let mut mapping = Vec::new();
        let mut tsps = HashMap::new();

        // Reduced vertex 0 is the depot.
        vertices.push(*original.vertex(0));
        mapping.push(vec![0]);

        for k in 0..clustering.n_clusters() {
            let members = clustering.cluster(k).to_vec();
            debug_assert!(members.len() > 1);

            let (x, y) = clustering.centre(k);
            vertices.push(Vertex {
                id: k + 1,
                depot: false,
                reachable: true,
                x,
                y,
                prize: clustering.prize(k),
            });

            let tour = tsp.solve_tsp(original, &members, &format!("cluster-{}", k + 1))?;
            debug_assert_eq!(
                sorted(tour.vertices()),
                sorted(&members),
                "cluster TSP must visit exactly the cluster"
            );
            tsps.insert(k + 1, tour);
            mapping.push(members);
        }

        for &v in clustering.noise() {
            let mut vertex = *original.vertex(v);
            vertex.id = vertices.len();
            mapping.push(vec![v]);
            vertices.push(vertex);
        }

        let reduced = Self::build_reduced_graph(vertices, original.max_travel_time(), &tsps);

        Ok(Self {
            original,
            reduced,
            mapping,
            tsps,
        })
    }

    /// Reduces an already-reduced graph one level further, propagating
    /// the vertex mapping and carrying cluster TSPs through.
    pub fn reduce_again(
        &self,
        clustering: &Clustering,
        tsp: &dyn TspSolver,
    ) -> Result<ReducedGraph<'a>> {
        let mut vertices = Vec::new();
        let mut mapping = Vec::new();
        let mut tsps = HashMap::new();

        vertices.push(*self.original.vertex(0));
        mapping.push(vec![0]);

        for k in 0..clustering.n_clusters() {
            let (x, y) = clustering.centre(k);
            vertices.push(Vertex {
                id: k + 1,
                depot: false,
                reachable: true,
                x,
                y,
                prize: clustering.prize(k),
            });

            // Flatten the mapping down to original vertices.
            let members: Vec<usize> = clustering
                .cluster(k)
                .iter()
                .flat_map(|&red_v| self.mapping[red_v].iter().copied())
                .collect();

            let tour = tsp.solve_tsp(self.original, &members, &format!("recluster-{}", k + 1))?;
            debug_assert_eq!(sorted(tour.vertices()), sorted(&members));
            tsps.insert(k + 1, tour);
            mapping.push(members);
        }

        for &v in clustering.noise() {
            let new_id = vertices.len();
            let mut vertex = *self.reduced.vertex(v);
            vertex.id = new_id;

            mapping.push(self.mapping[v].clone());
            if let Some(tour) = self.tsps.get(&v) {
                tsps.insert(new_id, tour.clone());
            } else {
                debug_assert_eq!(self.mapping[v].len(), 1);
            }
            vertices.push(vertex);
        }

        let reduced = Self::build_reduced_graph(vertices, self.original.max_travel_time(), &tsps);

        Ok(ReducedGraph {
            original: self.original,
            reduced,
            mapping,
            tsps,
        })
    }

    /// Euclidean reduced graph with the half-TSP surcharge on every
    /// edge incident to a cluster vertex.
    fn build_reduced_graph(
        vertices: Vec<Vertex>,
        max_travel_time: f64,
        tsps: &HashMap<usize, Tour<'_>>,
    ) -> Graph {
        let surcharge: Vec<f64> = vertices
            .iter()
            .map(|v| {
                tsps.get(&v.id)
                    .map(|tour| tour.travel_time() / 2.0)
                    .unwrap_or(0.0)
            })
            .collect();

        Graph::from_vertices_with_distance(vertices, max_travel_time, move |v, w| {
            let euclidean = ((v.x - w.x).powi(2) + (v.y - w.y).powi(2)).sqrt();
            euclidean + surcharge[v.id] + surcharge[w.id]
        })
    }

    /// The original graph.
    pub fn original(&self) -> &'a Graph {
        self.original
    }

    /// The reduced graph.
    pub fn reduced(&self) -> &Graph {
        &self.reduced
    }

    /// Original vertices represented by a reduced vertex.
    pub fn mapped_vertices(&self, reduced_vertex: usize) -> &[usize] {
        &self.mapping[reduced_vertex]
    }

    /// The internal TSP of a cluster-derived reduced vertex, if any.
    pub fn cluster_tsp(&self, reduced_vertex: usize) -> Option<&Tour<'a>> {
        self.tsps.get(&reduced_vertex)
    }

    /// Applies clustering reduction recursively until the vertex count
    /// drops to `min(⌈|V| · red_factor⌉, 50)`.
    ///
    /// Returns `None` when the first clustering is not proper, or when
    /// a later clustering degenerates while the graph is still above
    /// the target size.
    pub fn recursive_reduction(
        graph: &'a Graph,
        red_factor: f64,
        tsp: &dyn TspSolver,
    ) -> Result<Option<ReducedGraph<'a>>> {
        let clustering = Clustering::new(graph);
        if !clustering.is_proper() {
            return Ok(None);
        }

        let mut red = ReducedGraph::new(graph, &clustering, tsp)?;

        let limit = usize::min(
            (graph.n_vertices() as f64 * red_factor).ceil() as usize,
            REDUCTION_TARGET_FLOOR,
        );

        loop {
            if red.reduced.n_vertices() <= limit {
                log::debug!(
                    "recursive reduction reached {} vertices (target {limit})",
                    red.reduced.n_vertices()
                );
                return Ok(Some(red));
            }

            let clustering = Clustering::new(&red.reduced);
            if !clustering.is_proper() {
                // Still too many vertices but no proper clustering left.
                return Ok(None);
            }

            red = red.reduce_again(&clustering, tsp)?;
        }
    }

    /// Expands a tour on the reduced graph into a tour on the original
    /// graph.
    ///
    /// Cluster TSPs are inlined starting at the member that minimizes
    /// `dist(prev, entry) + dist(exit, next) − dist(exit, entry)`, where
    /// `exit` is the entry's predecessor on the TSP. The caller restores
    /// travel-time feasibility afterwards if needed.
    pub fn project_back_tour(&self, tour: &Tour<'_>) -> Tour<'a> {
        debug_assert!(tour.is_simple());

        let reduced_vertices = tour.vertices();
        let n = reduced_vertices.len();
        let mut vertices = Vec::new();

        for (k, &v) in reduced_vertices.iter().enumerate() {
            match self.tsps.get(&v) {
                None => {
                    vertices.push(self.mapping[v][0]);
                }
                Some(tsp_tour) => {
                    debug_assert!(self.mapping[v].len() > 1);

                    let prev = reduced_vertices[(k + n - 1) % n];
                    let next = reduced_vertices[(k + 1) % n];
                    let prev_point = point(&self.reduced, prev);
                    let next_point = point(&self.reduced, next);

                    let start = best_tsp_rotation(self.original, tsp_tour, prev_point, next_point);
                    let members = tsp_tour.vertices();
                    for offset in 0..members.len() {
                        vertices.push(members[(start + offset) % members.len()]);
                    }
                }
            }
        }

        let projected = Tour::new(self.original, vertices);
        debug_assert!(projected.is_simple());
        projected
    }
}

fn point(graph: &Graph, v: usize) -> (f64, f64) {
    let vertex = graph.vertex(v);
    (vertex.x, vertex.y)
}

fn euclidean(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// The TSP rotation whose entry/exit points sit best between the
/// neighbouring reduced vertices.
fn best_tsp_rotation(
    graph: &Graph,
    tsp_tour: &Tour<'_>,
    prev: (f64, f64),
    next: (f64, f64),
) -> usize {
    let members = tsp_tour.vertices();
    let mut best_id = 0;
    let mut best_dist = f64::INFINITY;

    for (id, &entry_v) in members.iter().enumerate() {
        let exit_v = members[(id + members.len() - 1) % members.len()];
        let entry = point(graph, entry_v);
        let exit = point(graph, exit_v);

        let dist = euclidean(prev, entry) + euclidean(exit, next) - euclidean(exit, entry);
        if dist < best_dist {
            best_dist = dist;
            best_id = id;
        }
    }

    best_id
}

fn sorted(vertices: &[usize]) -> Vec<usize> {
    let mut v = vertices.to_vec();
    v.sort_unstable();
    v
}
