//! Problem-specific parameters.
//!
//! Loaded from JSON; every key is optional and takes its documented
//! default when missing, so a parameters file only lists what it
//! overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which destroy operators run and how aggressively they remove.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DestroyParams {
    /// Enable the uniform random-removal operator.
    pub enable_random: bool,
    /// Enable the cyclic sequence-removal operator.
    pub enable_random_seq: bool,
    /// Enable the cluster-removal operator.
    pub enable_random_cluster: bool,
    /// Fraction of tour vertices removed per call.
    pub fraction_of_vertices_to_remove: f64,
    /// Ceiling the fraction may grow to when adaptive.
    pub max_fraction_of_vertices_to_remove: f64,
    /// Absolute ceiling on removals per call.
    pub max_n_of_vertices_to_remove: usize,
    /// Draw the fraction from a normal distribution and let the visitor
    /// steer it over the run.
    pub adaptive: bool,
}

impl Default for DestroyParams {
    fn default() -> Self {
        Self {
            enable_random: true,
            enable_random_seq: true,
            enable_random_cluster: true,
            fraction_of_vertices_to_remove: 0.33,
            max_fraction_of_vertices_to_remove: 0.75,
            max_n_of_vertices_to_remove: 40,
            adaptive: true,
        }
    }
}

/// Which repair operators run and how they insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairParams {
    /// Enable the greedy tabu-guarded repair.
    pub enable_greedy: bool,
    /// Enable sequential repair in random order.
    pub enable_seq_random: bool,
    /// Enable sequential repair in descending-prize order.
    pub enable_seq_by_prize: bool,
    /// Enable the cluster repair.
    pub enable_cluster: bool,
    /// Use the proximity/annulus insertion heuristics instead of
    /// exhaustive position scans.
    pub heuristic: bool,
    /// Allow intermediate over-budget tours during repair.
    pub intermediate_infeasible: bool,
    /// Run 2-opt before restoring feasibility (only meaningful with
    /// `intermediate_infeasible`).
    pub use_2opt_before_restoring_feasibility: bool,
    /// Probability that feasibility restoration uses the optimal
    /// subsequence instead of the greedy removal.
    pub restore_feasibility_optimal: f64,
}

impl Default for RepairParams {
    fn default() -> Self {
        Self {
            enable_greedy: true,
            enable_seq_random: true,
            enable_seq_by_prize: true,
            enable_cluster: true,
            heuristic: false,
            intermediate_infeasible: true,
            use_2opt_before_restoring_feasibility: true,
            restore_feasibility_optimal: 0.0,
        }
    }
}

/// Vertex orderings for the constructive initial heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexOrder {
    /// Random shuffle.
    Random,
    /// Ascending prize.
    Prize,
    /// Ascending distance from the depot.
    Distance,
}

/// How the initial solution is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialSolutionParams {
    /// Bootstrap from the cluster reduction when one is available.
    pub use_clustering: bool,
    /// Solve the reduced graph exactly with the MIP.
    pub use_mip: bool,
    /// Run local search (2-opt + greedy fill) on the initial tour.
    pub local_search: bool,
    /// Vertex order for the constructive path: "random", "prize" or
    /// "distance". Anything else falls back to random with a warning.
    pub vertex_order: String,
}

impl Default for InitialSolutionParams {
    fn default() -> Self {
        Self {
            use_clustering: true,
            use_mip: false,
            local_search: false,
            vertex_order: "random".to_owned(),
        }
    }
}

impl InitialSolutionParams {
    /// The parsed vertex order.
    pub fn parsed_vertex_order(&self) -> VertexOrder {
        match self.vertex_order.as_str() {
            "random" => VertexOrder::Random,
            "prize" => VertexOrder::Prize,
            "distance" => VertexOrder::Distance,
            other => {
                log::warn!("unknown vertex_order '{other}', falling back to random");
                VertexOrder::Random
            }
        }
    }
}

/// Local search applied to new incumbents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSearchParams {
    /// Shorten new incumbents with 2-opt.
    pub use_2opt: bool,
    /// Shorten new incumbents by re-solving their TSP (mutually
    /// exclusive with `use_2opt`).
    pub use_tsp: bool,
    /// Greedily fill freed budget after shortening.
    pub fill_tour: bool,
}

impl Default for LocalSearchParams {
    fn default() -> Self {
        Self {
            use_2opt: true,
            use_tsp: false,
            fill_tour: true,
        }
    }
}

/// All problem-specific parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProblemParams {
    /// Destroy-side settings.
    pub destroy: DestroyParams,
    /// Repair-side settings.
    pub repair: RepairParams,
    /// Initial-solution settings.
    pub initial_solution: InitialSolutionParams,
    /// Incumbent local-search settings.
    pub local_search: LocalSearchParams,
}

impl ProblemParams {
    /// Reads parameters from a JSON file; missing keys take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}
