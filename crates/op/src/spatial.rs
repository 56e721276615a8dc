//! R-tree queries over vertex coordinates.
//!
//! Radius and annulus searches first prefilter with the axis-aligned
//! box inscribing the search circle, an O(log n) envelope query, and
//! only then apply the precise Euclidean check. The depot is excluded
//! from every result.

use rstar::{RTreeObject, AABB};

use crate::graph::Graph;

/// An R-tree entry: a vertex id at its coordinates.
#[derive(Debug, Clone)]
pub struct VertexPoint {
    /// Vertex id.
    pub vertex: usize,
    /// Coordinates.
    pub point: [f64; 2],
}

impl VertexPoint {
    /// Creates an entry for a vertex.
    pub fn new(vertex: usize, point: [f64; 2]) -> Self {
        Self { vertex, point }
    }

    fn distance_to(&self, centre: [f64; 2]) -> f64 {
        ((self.point[0] - centre[0]).powi(2) + (self.point[1] - centre[1]).powi(2)).sqrt()
    }
}

impl RTreeObject for VertexPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

/// Non-depot vertices within `radius` of `centre`, with their points.
pub fn within_radius(graph: &Graph, centre: [f64; 2], radius: f64) -> Vec<(usize, [f64; 2])> {
    let bounding = AABB::from_corners(
        [centre[0] - radius, centre[1] - radius],
        [centre[0] + radius, centre[1] + radius],
    );

    graph
        .rtree()
        .locate_in_envelope_intersecting(&bounding)
        .filter(|value| value.vertex != 0 && value.distance_to(centre) <= radius)
        .map(|value| (value.vertex, value.point))
        .collect()
}

/// Non-depot vertices in the annulus `min_radius ≤ d ≤ max_radius`
/// around `centre`.
pub fn within_radii(
    graph: &Graph,
    centre: [f64; 2],
    min_radius: f64,
    max_radius: f64,
) -> Vec<(usize, [f64; 2])> {
    let bounding = AABB::from_corners(
        [centre[0] - max_radius, centre[1] - max_radius],
        [centre[0] + max_radius, centre[1] + max_radius],
    );

    graph
        .rtree()
        .locate_in_envelope_intersecting(&bounding)
        .filter(|value| {
            if value.vertex == 0 {
                return false;
            }
            let d = value.distance_to(centre);
            min_radius <= d && d <= max_radius
        })
        .map(|value| (value.vertex, value.point))
        .collect()
}

/// Per-vertex distance to the nearest neighbour, ascending.
///
/// The minimum incident edge travel time of each vertex that has edges;
/// unreachable vertices contribute nothing.
pub fn nearest_neighbour_distances(graph: &Graph) -> Vec<f64> {
    let mut distances: Vec<f64> = graph
        .vertices()
        .iter()
        .filter(|v| v.reachable)
        .filter_map(|v| {
            graph
                .vertices()
                .iter()
                .filter(|w| w.reachable && w.id != v.id)
                .map(|w| graph.travel_time(v.id, w.id))
                .min_by(f64::total_cmp)
        })
        .collect();
    distances.sort_by(f64::total_cmp);
    distances
}

/// Per-vertex count of reachable non-depot points within `radius`,
/// ascending.
pub fn neighbourhood_sizes(graph: &Graph, radius: f64) -> Vec<usize> {
    let mut sizes: Vec<usize> = graph
        .vertices()
        .iter()
        .map(|v| {
            within_radius(graph, [v.x, v.y], radius)
                .iter()
                .filter(|&&(w, _)| {
                    let wv = graph.vertex(w);
                    wv.reachable && !wv.depot
                })
                .count()
        })
        .collect();
    sizes.sort_unstable();
    sizes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_graphs::grid_graph;

    fn line_graph() -> Graph {
        grid_graph(
            &[
                (0.0, 0.0, 0.0),
                (1.0, 0.0, 1.0),
                (2.0, 0.0, 1.0),
                (3.0, 0.0, 1.0),
            ],
            8.0,
        )
    }

    #[test]
    fn test_within_radius_exact_membership() {
        let graph = line_graph();

        let mut hits: Vec<usize> = within_radius(&graph, [0.0, 0.0], 2.0)
            .into_iter()
            .map(|(v, _)| v)
            .collect();
        hits.sort_unstable();

        // The depot itself is excluded even though it is at the centre.
        assert_eq!(hits, vec![1, 2]);
    }

    #[test]
    fn test_within_radius_boundary_is_inclusive() {
        let graph = line_graph();
        let hits = within_radius(&graph, [0.0, 0.0], 1.0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 1);
    }

    #[test]
    fn test_within_radii_annulus() {
        let graph = line_graph();

        let mut hits: Vec<usize> = within_radii(&graph, [0.0, 0.0], 1.5, 3.0)
            .into_iter()
            .map(|(v, _)| v)
            .collect();
        hits.sort_unstable();

        assert_eq!(hits, vec![2, 3]);
    }

    #[test]
    fn test_nearest_neighbour_distances_sorted() {
        let graph = line_graph();
        let distances = nearest_neighbour_distances(&graph);
        assert_eq!(distances.len(), 4);
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
        assert!((distances[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_neighbourhood_sizes_counts_reachable_non_depot() {
        let graph = line_graph();
        let sizes = neighbourhood_sizes(&graph, 1.0);
        // A non-depot vertex counts itself: the depot sees {1}, vertex 1
        // sees {1, 2}, vertex 2 sees {1, 2, 3}, vertex 3 sees {2, 3}.
        assert_eq!(sizes, vec![1, 2, 2, 3]);
    }
}
