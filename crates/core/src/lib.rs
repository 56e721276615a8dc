//! # U-Orienteering Core
//!
//! The adaptive large neighborhood search framework behind the
//! U-Orienteering solver.
//!
//! This crate is domain-independent: it knows nothing about graphs or
//! tours, only about solutions with a cost, destroy/repair operators,
//! acceptance criteria and adaptive operator weights.
//!
//! ## Core Components
//!
//! - **Operator traits**: [`Solution`], [`DestroyOperator`],
//!   [`RepairOperator`]: implemented by the problem crate
//! - **Adaptive weights**: [`OperatorWeights`]: roulette-wheel selection
//!   with segment-based geometric decay
//! - **Acceptance**: [`AcceptanceCriterion`]: Record-to-Record Travel,
//!   Simulated Annealing (with reheating) or Threshold Acceptance
//! - **Runner**: [`PalnsRunner`]: parallel multi-start shell with
//!   per-worker RNGs, operator clones and [`AlgorithmVisitor`] hooks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use u_orienteering_core::{FrameworkParams, PalnsRunner, NoopVisitor};
//!
//! let runner = PalnsRunner::new(FrameworkParams::default());
//! let result = runner.run(initial, &destroy_ops, &repair_ops, &NoopVisitor, 42)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: serialization support for the parameter types

pub mod acceptance;
pub mod error;
pub mod operators;
pub mod params;
pub mod runner;

// Re-exports
pub use acceptance::{AcceptanceCriterion, AcceptanceState, CoolingSchedule};
pub use error::{Error, Result};
pub use operators::{DestroyOperator, OperatorWeights, RepairOperator, Solution};
pub use params::FrameworkParams;
pub use runner::{
    AlgorithmStatus, AlgorithmVisitor, NoopVisitor, PalnsResult, PalnsRunner, WorkerOutcome,
};
