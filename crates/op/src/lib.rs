//! # U-Orienteering OP
//!
//! The Orienteering Problem engine: given a depot, per-vertex prizes,
//! travel times and a global budget, find a simple closed depot tour
//! that maximizes the collected prize.
//!
//! ## Core Components
//!
//! - **Graph**: [`Graph`]: immutable, with an R-tree geometric index
//!   and a k-nearest proximity map
//! - **Tour**: [`Tour`]: pricing, 2-opt, and budget-feasibility
//!   restoration (greedy and optimal label-setting variants)
//! - **Clustering**: [`Clustering`]: DBSCAN with geometric auto-tuning
//! - **Reduction**: [`ReducedGraph`]: cluster meta-graphs and tour
//!   projection
//! - **Exact solver**: `BcSolver`: branch-and-cut with subtour
//!   separation (feature `milp`)
//! - **Metaheuristic**: [`PalnsSolver`]: parallel adaptive large
//!   neighborhood search over destroy/repair operator pools
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use u_orienteering_op::{Graph, PalnsSolver, ProblemParams};
//! use u_orienteering_core::FrameworkParams;
//!
//! let graph = Graph::from_instance(&instance)?;
//! let solver = PalnsSolver::new(&graph, ProblemParams::default(),
//!                               FrameworkParams::default());
//! let report = solver.solve(None, 42)?;
//! println!("prize {:.0} in {:.0} travel time",
//!          report.tour.total_prize(), report.tour.travel_time());
//! ```
//!
//! ## Feature Flags
//!
//! - `milp`: the branch-and-cut exact solver (pulls in `good_lp`)

#[cfg(feature = "milp")]
pub mod bc;
pub mod cluster;
pub mod error;
pub mod graph;
pub mod greedy;
pub mod instance;
mod labelling;
pub mod palns;
pub mod params;
pub mod reduce;
pub mod solver;
pub mod spatial;
pub mod tour;
pub mod tsp;

// Re-exports
#[cfg(feature = "milp")]
pub use bc::BcSolver;
pub use cluster::{auto_tuned_dbscan, dbscan, Clustering};
pub use error::{Error, Result};
pub use graph::{Edge, Graph, ProximityEntry, Vertex, PROXIMITY_NEIGHBOURS};
pub use greedy::GreedyHeuristic;
pub use instance::InstanceData;
pub use palns::destroy::{RandomClusterRemove, RandomRemove, RandomSeqRemove};
pub use palns::repair::{GreedyRepair, RandomClusterRepair, SeqOrder, SeqVertexRepair};
pub use palns::solution::PalnsSolution;
pub use palns::visitor::OpVisitor;
pub use params::{ProblemParams, VertexOrder};
pub use reduce::ReducedGraph;
pub use solver::{PalnsSolver, SolveReport};
pub use spatial::{within_radii, within_radius};
pub use tour::{InsertionPrice, RemovalPrice, Tour};
pub use tsp::{ExternalTspSolver, NearestNeighbourTspSolver, TspSolver};
