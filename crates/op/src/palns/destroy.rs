//! Destroy operators.
//!
//! All three preserve the depot and never shrink a tour below two
//! vertices (the tour itself refuses the last removal).

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use u_orienteering_core::DestroyOperator;

use crate::cluster::Clustering;
use crate::palns::solution::PalnsSolution;
use crate::params::ProblemParams;

/// Floor for the removal fraction; keeps the normal draw positive.
const MIN_REMOVAL_FRACTION: f64 = 0.01;

/// Removes a random subset of tour vertices.
///
/// The removal fraction is either fixed or, when adaptive, drawn per
/// call from `Normal(f, f/10)`; the visitor steers `f` over the run
/// through the framework's fraction accessors.
#[derive(Debug, Clone)]
pub struct RandomRemove<'a> {
    params: &'a ProblemParams,
    fraction: f64,
    fraction_dist: Normal<f64>,
}

impl<'a> RandomRemove<'a> {
    /// Creates the operator with the configured starting fraction.
    pub fn new(params: &'a ProblemParams) -> Self {
        let fraction = params
            .destroy
            .fraction_of_vertices_to_remove
            .max(MIN_REMOVAL_FRACTION);
        Self {
            params,
            fraction,
            fraction_dist: Self::distribution(fraction),
        }
    }

    fn distribution(fraction: f64) -> Normal<f64> {
        Normal::new(fraction, fraction / 10.0).expect("removal fraction is positive and finite")
    }
}

impl<'a> DestroyOperator<PalnsSolution<'a>> for RandomRemove<'a> {
    fn name(&self) -> &str {
        "random-remove"
    }

    fn destroy(&mut self, solution: &mut PalnsSolution<'a>, rng: &mut StdRng) {
        if solution.tour.is_empty() {
            return;
        }

        let fraction = if self.params.destroy.adaptive {
            self.fraction_dist
                .sample(rng)
                .max(MIN_REMOVAL_FRACTION)
        } else {
            self.fraction
        };

        let n_to_remove = usize::min(
            ((solution.tour.len() - 1) as f64 * fraction) as usize,
            self.params.destroy.max_n_of_vertices_to_remove,
        );

        // Everything but the depot is removable.
        let mut removable: Vec<usize> = solution.tour.vertices()[1..].to_vec();
        removable.shuffle(rng);
        removable.truncate(n_to_remove);

        for vertex in removable {
            solution.remove_vertex(vertex);
        }
    }

    fn clone_box(&self) -> Box<dyn DestroyOperator<PalnsSolution<'a>> + '_> {
        Box::new(self.clone())
    }

    fn removal_fraction(&self) -> Option<f64> {
        Some(self.fraction)
    }

    fn set_removal_fraction(&mut self, fraction: f64) {
        self.fraction = fraction.max(MIN_REMOVAL_FRACTION);
        self.fraction_dist = Self::distribution(self.fraction);
    }
}

/// Removes a cyclic run of consecutive tour positions.
#[derive(Debug, Clone)]
pub struct RandomSeqRemove<'a> {
    params: &'a ProblemParams,
}

impl<'a> RandomSeqRemove<'a> {
    /// Creates the operator.
    pub fn new(params: &'a ProblemParams) -> Self {
        Self { params }
    }
}

impl<'a> DestroyOperator<PalnsSolution<'a>> for RandomSeqRemove<'a> {
    fn name(&self) -> &str {
        "random-seq-remove"
    }

    fn destroy(&mut self, solution: &mut PalnsSolution<'a>, rng: &mut StdRng) {
        let n = solution.tour.len();
        if n < 2 {
            return;
        }

        let n_to_remove = usize::min(
            ((n - 1) as f64 * self.params.destroy.fraction_of_vertices_to_remove) as usize,
            self.params.destroy.max_n_of_vertices_to_remove,
        );
        if n_to_remove < 1 {
            return;
        }

        let mut pivot = rng.gen_range(1..n);
        let mut to_remove = Vec::with_capacity(n_to_remove);
        for _ in 0..n_to_remove {
            if pivot == 0 {
                pivot += 1; // Skip the depot.
            }
            to_remove.push(solution.tour.vertices()[pivot]);
            pivot = (pivot + 1) % n;
        }

        for vertex in to_remove {
            solution.remove_vertex(vertex);
        }
    }

    fn clone_box(&self) -> Box<dyn DestroyOperator<PalnsSolution<'a>> + '_> {
        Box::new(self.clone())
    }
}

/// Removes the tour-present vertices of one random cluster.
#[derive(Debug, Clone)]
pub struct RandomClusterRemove<'a> {
    params: &'a ProblemParams,
    clustering: &'a Clustering,
}

impl<'a> RandomClusterRemove<'a> {
    /// Creates the operator over a proper clustering.
    pub fn new(params: &'a ProblemParams, clustering: &'a Clustering) -> Self {
        debug_assert!(clustering.n_clusters() > 0);
        Self { params, clustering }
    }
}

impl<'a> DestroyOperator<PalnsSolution<'a>> for RandomClusterRemove<'a> {
    fn name(&self) -> &str {
        "random-cluster-remove"
    }

    fn destroy(&mut self, solution: &mut PalnsSolution<'a>, rng: &mut StdRng) {
        if solution.tour.is_empty() {
            return;
        }

        let cap = self.params.destroy.max_n_of_vertices_to_remove;
        let cluster = self
            .clustering
            .cluster(rng.gen_range(0..self.clustering.n_clusters()));

        if cluster.len() <= cap {
            for &vertex in cluster {
                if solution.tour.len() == 2 {
                    break;
                }
                solution.remove_vertex_if_present(vertex);
            }
        } else {
            let mut shuffled = cluster.to_vec();
            shuffled.shuffle(rng);

            let mut removed = 0usize;
            for vertex in shuffled {
                if solution.tour.len() == 2 || removed > cap {
                    break;
                }
                if solution.remove_vertex_if_present(vertex) {
                    removed += 1;
                }
            }
        }
    }

    fn clone_box(&self) -> Box<dyn DestroyOperator<PalnsSolution<'a>> + '_> {
        Box::new(self.clone())
    }
}
