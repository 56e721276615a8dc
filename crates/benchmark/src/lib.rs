//! Benchmark Suite for U-Orienteering
//!
//! This crate provides:
//! - OPLIB instance parser (EUC_2D and EXPLICIT weight matrices)
//! - Solution reporting as JSON and CSV
//! - The `op-runner` CLI binary wrapping the PALNS solver

pub mod instance;
pub mod report;

pub use instance::{parse_instance, parse_instance_str, ParseError};
pub use report::{
    append_solution_csv, read_solution_json, write_solution_json, SolutionRecord,
};
