//! Solution reporting: JSON and CSV writers, and reading a stored
//! solution back onto a graph.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use u_orienteering_op::{Graph, Tour};

/// The JSON shape of a stored solution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolutionRecord {
    /// Instance name.
    pub instance: String,
    /// Collected prize.
    pub prize: f64,
    /// Total travel time.
    pub travel_time: f64,
    /// Visited vertex ids, starting at the depot.
    pub tour: Vec<usize>,
}

impl SolutionRecord {
    /// Captures a tour.
    pub fn from_tour(tour: &Tour<'_>) -> Self {
        Self {
            instance: tour.graph().instance_name().to_owned(),
            prize: tour.total_prize(),
            travel_time: tour.travel_time(),
            tour: tour.vertices().to_vec(),
        }
    }
}

/// Writes a solution as JSON.
pub fn write_solution_json(path: impl AsRef<Path>, tour: &Tour<'_>) -> std::io::Result<()> {
    let record = SolutionRecord::from_tour(tour);
    let contents = serde_json::to_string_pretty(&record)?;
    std::fs::write(path, contents)
}

/// Appends one `instance,prize,travel_time` line, writing the header
/// when the file is new.
pub fn append_solution_csv(path: impl AsRef<Path>, tour: &Tour<'_>) -> std::io::Result<()> {
    let path = path.as_ref();
    let new_file = !path.exists();

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    if new_file {
        writeln!(file, "instance,prize,traveltime")?;
    }
    writeln!(
        file,
        "{},{},{}",
        tour.graph().instance_name(),
        tour.total_prize(),
        tour.travel_time()
    )
}

/// Reads a stored JSON solution back as a tour on the graph.
pub fn read_solution_json<'a>(
    path: impl AsRef<Path>,
    graph: &'a Graph,
) -> Result<Tour<'a>, std::io::Error> {
    let contents = std::fs::read_to_string(path)?;
    let record: SolutionRecord = serde_json::from_str(&contents)?;
    let tour = Tour::new(graph, record.tour);

    if (tour.travel_time() - record.travel_time).abs() >= 0.5 {
        log::warn!(
            "stored travel time {:.2} disagrees with recomputation {:.2}",
            record.travel_time,
            tour.travel_time()
        );
    }
    Ok(tour)
}
