//! Density-based clustering of the reachable vertices.
//!
//! Standard DBSCAN over Euclidean distances, driven by the graph's
//! R-tree. The depot and unreachable vertices are pre-labelled noise so
//! they can never join a cluster. When the caller supplies no
//! parameters they are auto-tuned from the instance geometry: the
//! radius covers every vertex's nearest-neighbour spacing, and the
//! minimum cluster size is read off the neighbourhood-size histogram,
//! past the initial run of isolated points.

use rayon::prelude::*;

use crate::graph::Graph;
use crate::spatial::{nearest_neighbour_distances, neighbourhood_sizes, within_radius};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Undefined,
    Noise,
    Cluster(usize),
}

/// Runs DBSCAN with explicit parameters.
///
/// Every returned cluster has at least `min_pts` members; the depot and
/// unreachable vertices are never clustered.
pub fn dbscan(graph: &Graph, radius: f64, min_pts: usize) -> Vec<Vec<usize>> {
    let n = graph.n_vertices();
    let mut label = vec![Label::Undefined; n];
    let mut current_cluster = 0usize;

    // The depot stays out of every cluster, as do unreachable vertices.
    label[0] = Label::Noise;
    for v in 1..n {
        if !graph.vertex(v).reachable {
            label[v] = Label::Noise;
        }
    }

    for v in 1..n {
        if label[v] != Label::Undefined {
            continue;
        }

        let vertex = graph.vertex(v);
        let mut neighbours = within_radius(graph, [vertex.x, vertex.y], radius);

        if neighbours.len() < min_pts {
            label[v] = Label::Noise;
            continue;
        }

        label[v] = Label::Cluster(current_cluster);
        neighbours.retain(|&(w, _)| w != v);

        while let Some((w, point)) = neighbours.pop() {
            if w == 0 || !graph.vertex(w).reachable {
                continue;
            }

            if label[w] == Label::Noise {
                label[w] = Label::Cluster(current_cluster);
            }
            if label[w] != Label::Undefined {
                continue;
            }

            label[w] = Label::Cluster(current_cluster);

            let further = within_radius(graph, point, radius);
            if further.len() >= min_pts {
                neighbours.extend(further);
            }
        }

        current_cluster += 1;
    }

    if current_cluster == 0 {
        log::warn!("DBSCAN could not create any cluster");
        return Vec::new();
    }

    let mut clustering = vec![Vec::new(); current_cluster];
    for v in 0..n {
        if let Label::Cluster(k) = label[v] {
            clustering[k].push(v);
        }
    }

    debug_assert!(clustering.iter().all(|c| c.len() >= min_pts));
    log::debug!("DBSCAN created {} clusters", current_cluster);

    clustering
}

/// Runs DBSCAN with auto-tuned parameters.
///
/// Radius: the largest nearest-neighbour distance, so every vertex sees
/// at least its closest peer. Minimum points: histogram the
/// neighbourhood sizes into 20 equal-width buckets and scan left to
/// right past the strictly-shrinking prefix (skipping empty buckets);
/// the largest size in the stopping bucket, floored at 2.
pub fn auto_tuned_dbscan(graph: &Graph) -> Vec<Vec<usize>> {
    let distances = nearest_neighbour_distances(graph);
    let Some(&radius) = distances.last() else {
        log::warn!("no nearest-neighbour distances; skipping clustering");
        return Vec::new();
    };

    log::debug!("DBSCAN auto-tuned radius: {radius}");

    let sizes = neighbourhood_sizes(graph, radius);
    debug_assert!(!sizes.is_empty());

    let min_size = sizes[0];
    let max_size = sizes[sizes.len() - 1];
    let interval = max_size - min_size;

    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); 20];
    for &size in &sizes {
        let bucket = if interval == 0 {
            0
        } else {
            ((size - min_size) as f64 / interval as f64 * 19.0) as usize
        };
        buckets[bucket].push(size);
    }

    // Walk past empty buckets and the initial descending run; stop at
    // the first bucket whose next non-empty successor is not smaller.
    let mut bucket_id = 0;
    while bucket_id < buckets.len() - 1 {
        if buckets[bucket_id].is_empty()
            || (!buckets[bucket_id + 1].is_empty()
                && buckets[bucket_id + 1].len() < buckets[bucket_id].len())
        {
            bucket_id += 1;
        } else {
            break;
        }
    }

    // Sizes are sorted, so the last entry is the bucket's largest.
    let min_pts = buckets[bucket_id].last().copied().unwrap_or(2).max(2);

    log::debug!("DBSCAN auto-tuned min_pts: {min_pts}");

    dbscan(graph, radius, min_pts)
}

/// A clustering of the reachable non-depot vertices.
#[derive(Debug, Clone)]
pub struct Clustering {
    clusters: Vec<Vec<usize>>,
    centres: Vec<(f64, f64)>,
    prizes: Vec<f64>,
    noise: Vec<usize>,
    n_vertices: usize,
}

impl Clustering {
    /// Clusters the graph with auto-tuned DBSCAN parameters.
    pub fn new(graph: &Graph) -> Self {
        Self::from_clusters(graph, auto_tuned_dbscan(graph))
    }

    /// Clusters the graph with explicit DBSCAN parameters.
    pub fn with_params(graph: &Graph, radius: f64, min_pts: usize) -> Self {
        Self::from_clusters(graph, dbscan(graph, radius, min_pts))
    }

    fn from_clusters(graph: &Graph, clusters: Vec<Vec<usize>>) -> Self {
        debug_assert!(clusters.iter().all(|c| c.len() > 1));

        let noise = graph
            .reachable_non_depot()
            .filter(|v| !clusters.iter().any(|c| c.contains(v)))
            .collect();

        // Prize-weighted centre of mass and total prize per cluster.
        let stats: Vec<((f64, f64), f64)> = clusters
            .par_iter()
            .map(|cluster| {
                let mut prize = 0.0;
                let mut x_tot = 0.0;
                let mut y_tot = 0.0;
                for &v in cluster {
                    let vertex = graph.vertex(v);
                    prize += vertex.prize;
                    x_tot += vertex.x * vertex.prize;
                    y_tot += vertex.y * vertex.prize;
                }
                if prize > 0.0 {
                    ((x_tot / prize, y_tot / prize), prize)
                } else {
                    // Zero-prize cluster: fall back to the plain mean.
                    let n = cluster.len() as f64;
                    let x = cluster.iter().map(|&v| graph.vertex(v).x).sum::<f64>() / n;
                    let y = cluster.iter().map(|&v| graph.vertex(v).y).sum::<f64>() / n;
                    ((x, y), 0.0)
                }
            })
            .collect();

        Self {
            centres: stats.iter().map(|&(c, _)| c).collect(),
            prizes: stats.iter().map(|&(_, p)| p).collect(),
            clusters,
            noise,
            n_vertices: graph.n_vertices(),
        }
    }

    /// Number of clusters.
    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// The clusters, each a list of original vertex ids.
    pub fn clusters(&self) -> &[Vec<usize>] {
        &self.clusters
    }

    /// One cluster by index.
    pub fn cluster(&self, k: usize) -> &[usize] {
        &self.clusters[k]
    }

    /// Prize-weighted centre of mass of cluster `k`.
    pub fn centre(&self, k: usize) -> (f64, f64) {
        self.centres[k]
    }

    /// Total prize collectable in cluster `k`.
    pub fn prize(&self, k: usize) -> f64 {
        self.prizes[k]
    }

    /// Reachable non-depot vertices in no cluster.
    pub fn noise(&self) -> &[usize] {
        &self.noise
    }

    /// A clustering is proper iff it partitions coarsely enough to be
    /// worth reducing: either 2..=|V|−1 clusters, or a single cluster
    /// covering 2..=|V|−1 vertices.
    pub fn is_proper(&self) -> bool {
        let n = self.n_clusters();
        if (2..self.n_vertices).contains(&n) {
            return true;
        }
        n == 1 && (2..self.n_vertices).contains(&self.clusters[0].len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_graphs::grid_graph;

    /// Two tight groups of five vertices, far apart, plus the depot.
    fn two_groups() -> Graph {
        let mut points = vec![(50.0, -40.0, 0.0)]; // depot, off to the side
        for i in 0..5 {
            points.push((i as f64 * 0.5, 0.0, 1.0));
        }
        for i in 0..5 {
            points.push((100.0 + i as f64 * 0.5, 0.0, 2.0));
        }
        grid_graph(&points, 500.0)
    }

    #[test]
    fn test_dbscan_separates_two_groups() {
        let graph = two_groups();
        let clusters = dbscan(&graph, 1.0, 2);

        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.len() == 5));
    }

    #[test]
    fn test_auto_tuned_dbscan_separates_two_groups() {
        let graph = two_groups();
        let clusters = auto_tuned_dbscan(&graph);

        assert_eq!(clusters.len(), 2);
        assert!(clusters.iter().all(|c| c.len() == 5));
    }

    #[test]
    fn test_clusters_exclude_depot_and_unreachable() {
        let mut points = vec![(0.0, 0.0, 0.0)];
        for i in 0..4 {
            points.push((0.1 + i as f64 * 0.2, 0.0, 1.0));
        }
        // A far group beyond half the budget: unreachable.
        for i in 0..3 {
            points.push((1000.0 + i as f64 * 0.2, 0.0, 1.0));
        }
        let graph = grid_graph(&points, 10.0);
        let clusters = dbscan(&graph, 0.5, 2);

        for cluster in &clusters {
            assert!(!cluster.contains(&0));
            assert!(cluster.iter().all(|&v| graph.vertex(v).reachable));
        }
    }

    #[test]
    fn test_min_pts_respected() {
        let graph = two_groups();
        // With min_pts higher than the group size nothing clusters.
        let clusters = dbscan(&graph, 1.0, 6);
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_noise_completes_the_partition() {
        let mut points = vec![(0.0, 0.0, 0.0)];
        for i in 0..4 {
            points.push((0.1 + i as f64 * 0.2, 0.0, 1.0));
        }
        points.push((30.0, 30.0, 5.0)); // isolated but reachable
        let graph = grid_graph(&points, 200.0);

        let clustering = Clustering::with_params(&graph, 0.5, 2);

        assert_eq!(clustering.n_clusters(), 1);
        assert_eq!(clustering.noise(), &[5]);

        let covered: usize =
            clustering.clusters().iter().map(|c| c.len()).sum::<usize>() + clustering.noise().len();
        assert_eq!(covered, graph.reachable_non_depot().count());
    }

    #[test]
    fn test_prize_weighted_centre() {
        let points = vec![
            (50.0, 0.0, 0.0),  // depot
            (0.0, 0.0, 1.0),
            (1.0, 0.0, 3.0),
        ];
        let graph = grid_graph(&points, 1000.0);
        let clustering = Clustering::with_params(&graph, 2.0, 2);

        assert_eq!(clustering.n_clusters(), 1);
        let (cx, cy) = clustering.centre(0);
        assert!((cx - 0.75).abs() < 1e-9);
        assert!(cy.abs() < 1e-9);
        assert!((clustering.prize(0) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_is_proper() {
        let graph = two_groups();
        let proper = Clustering::with_params(&graph, 1.0, 2);
        assert!(proper.is_proper());

        let degenerate = Clustering::with_params(&graph, 1.0, 6);
        assert!(!degenerate.is_proper());

        // A single cluster smaller than |V|−1 is proper too.
        let single = Clustering::with_params(&graph, 0.6, 5);
        if single.n_clusters() == 1 {
            assert!(single.is_proper());
        }
    }
}
