//! The parsed-instance contract between the engine and instance readers.

/// Data an instance reader must supply to build a [`Graph`](crate::Graph).
///
/// Distances are a full symmetric matrix; readers working from
/// coordinates fill it with Euclidean distances, readers working from an
/// explicit weight section expand the triangular form.
#[derive(Debug, Clone)]
pub struct InstanceData {
    /// Instance name (file stem).
    pub name: String,
    /// Number of vertices; vertex 0 is the depot.
    pub n_vertices: usize,
    /// Vertex coordinates.
    pub coordinates: Vec<(f64, f64)>,
    /// Prize per vertex (the depot's prize is usually 0 but may not be).
    pub prizes: Vec<f64>,
    /// Full pairwise travel-time matrix.
    pub distances: Vec<Vec<f64>>,
    /// Maximum allowed travel time of a tour.
    pub max_travel_time: f64,
    /// The instance's EDGE_WEIGHT_TYPE tag (e.g. "EUC_2D", "EXPLICIT").
    pub edge_weight_type: String,
}

impl InstanceData {
    /// Travel time between two vertices.
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        self.distances[i][j]
    }

    /// True iff distances are plain Euclidean distances of the
    /// coordinates.
    pub fn is_euclidean(&self) -> bool {
        self.edge_weight_type == "EUC_2D"
    }
}
