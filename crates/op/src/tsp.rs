//! The TSP capability used for cluster tours.
//!
//! Reduced-graph construction needs a Hamiltonian tour over each
//! cluster's members, and the visitor can re-optimize an incumbent tour
//! the same way. Both go through [`TspSolver`]: a built-in
//! nearest-neighbour + 2-opt solver is the default, and an external
//! Lin–Kernighan-style executable can be wired in instead. External
//! invocations exchange TSPLIB artifact files in the temp directory;
//! the caller passes a unique tag so concurrent workers cannot clobber
//! each other's artifacts.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;
use std::process::Command;

use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::tour::Tour;

/// Solves a TSP over a subset of the graph's vertices.
pub trait TspSolver: Send + Sync {
    /// Returns a closed tour visiting exactly `vertices`.
    ///
    /// The tour may start at any of the vertices. `artifact_tag` must be
    /// unique among concurrent invocations; solvers that materialize
    /// work files use it to name them.
    fn solve_tsp<'g>(
        &self,
        graph: &'g Graph,
        vertices: &[usize],
        artifact_tag: &str,
    ) -> Result<Tour<'g>>;
}

/// Handles the trivial subset sizes every solver shares.
fn trivial_tour<'g>(graph: &'g Graph, vertices: &[usize]) -> Option<Result<Tour<'g>>> {
    match vertices.len() {
        0 | 1 => Some(Err(Error::Tsp(format!(
            "cannot build a tour over {} vertices",
            vertices.len()
        )))),
        2 | 3 => Some(Ok(Tour::new(graph, vertices.to_vec()))),
        _ => None,
    }
}

/// Built-in solver: nearest-neighbour construction followed by 2-opt.
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestNeighbourTspSolver;

impl TspSolver for NearestNeighbourTspSolver {
    fn solve_tsp<'g>(
        &self,
        graph: &'g Graph,
        vertices: &[usize],
        _artifact_tag: &str,
    ) -> Result<Tour<'g>> {
        if let Some(result) = trivial_tour(graph, vertices) {
            return result;
        }

        // Nearest-neighbour construction from the first vertex.
        let mut remaining: Vec<usize> = vertices[1..].to_vec();
        let mut order = vec![vertices[0]];
        while !remaining.is_empty() {
            let last = *order.last().expect("order is non-empty");
            let (idx, _) = remaining
                .iter()
                .enumerate()
                .map(|(i, &v)| (i, graph.travel_time(last, v)))
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .expect("remaining is non-empty");
            order.push(remaining.swap_remove(idx));
        }

        two_opt(graph, &mut order);
        Ok(Tour::new(graph, order))
    }
}

/// First-improvement 2-opt on a closed vertex sequence.
///
/// `delta = d(r[i], r[j]) + d(r[i+1], r[j+1]) − d(r[i], r[i+1]) −
/// d(r[j], r[j+1])`; a negative delta reverses the segment. Repeats
/// until a full pass finds no improvement.
fn two_opt(graph: &Graph, order: &mut [usize]) {
    let n = order.len();
    let mut improved = true;
    while improved {
        improved = false;
        for i in 0..(n - 2) {
            for j in (i + 2)..n {
                let next_j = (j + 1) % n;
                if next_j == i {
                    continue;
                }
                let delta = graph.travel_time(order[i], order[j])
                    + graph.travel_time(order[i + 1], order[next_j])
                    - graph.travel_time(order[i], order[i + 1])
                    - graph.travel_time(order[j], order[next_j]);
                if delta < -1e-9 {
                    order[i + 1..=j].reverse();
                    improved = true;
                }
            }
        }
    }
}

/// External solver: shells out to a Lin–Kernighan-style executable.
///
/// Writes a TSPLIB problem file and a parameter file into the temp
/// directory, runs the executable on the parameter file, and reads the
/// tour artifact back. All three files carry the caller's artifact tag.
#[derive(Debug, Clone)]
pub struct ExternalTspSolver {
    executable: PathBuf,
}

impl ExternalTspSolver {
    /// Creates a solver around the given executable.
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn write_artifacts(
        &self,
        graph: &Graph,
        vertices: &[usize],
        tag: &str,
    ) -> Result<(PathBuf, PathBuf, PathBuf)> {
        let dir = std::env::temp_dir();
        let stem = format!("{}-{tag}", graph.instance_name());
        let problem_path = dir.join(format!("{stem}.tmp.tsp"));
        let params_path = dir.join(format!("{stem}.tmp.par"));
        let tour_path = dir.join(format!("{stem}.tmp.sol"));

        let mut problem = String::new();
        problem.push_str(&format!("NAME: {}\n", graph.instance_name()));
        problem.push_str("TYPE: TSP\n");
        problem.push_str(&format!("DIMENSION: {}\n", vertices.len()));

        if graph.is_euclidean() {
            problem.push_str("EDGE_WEIGHT_TYPE: EUC_2D\n");
            problem.push_str("NODE_COORD_SECTION\n");
            for (i, &v) in vertices.iter().enumerate() {
                let vertex = graph.vertex(v);
                problem.push_str(&format!("{} {} {}\n", i + 1, vertex.x, vertex.y));
            }
        } else {
            problem.push_str("EDGE_WEIGHT_TYPE: EXPLICIT\n");
            problem.push_str("EDGE_WEIGHT_FORMAT: UPPER_ROW\n");
            problem.push_str("EDGE_WEIGHT_SECTION\n");
            for i in 0..vertices.len() {
                for j in (i + 1)..vertices.len() {
                    problem.push_str(&format!(
                        "{} ",
                        graph.travel_time(vertices[i], vertices[j])
                    ));
                }
                problem.push('\n');
            }
        }
        problem.push_str("EOF\n");

        let mut pf = fs::File::create(&problem_path)?;
        pf.write_all(problem.as_bytes())?;

        let mut params = String::new();
        params.push_str(&format!("PROBLEM_FILE = {}\n", problem_path.display()));
        params.push_str(&format!("TOUR_FILE = {}\n", tour_path.display()));
        params.push_str("RUNS = 1\n");

        let mut paf = fs::File::create(&params_path)?;
        paf.write_all(params.as_bytes())?;

        Ok((problem_path, params_path, tour_path))
    }

    fn parse_tour_artifact(
        contents: &str,
        vertices: &[usize],
    ) -> Result<Vec<usize>> {
        // TSPLIB tour format: a header, then 1-based vertex ids one per
        // line, terminated by -1.
        let mut order = Vec::with_capacity(vertices.len());
        for token in contents
            .lines()
            .skip_while(|line| line.trim() != "TOUR_SECTION")
            .skip(1)
            .map(str::trim)
        {
            if token == "-1" || token == "EOF" {
                break;
            }
            let id: usize = token
                .parse()
                .map_err(|_| Error::Tsp(format!("unparseable tour entry '{token}'")))?;
            if id == 0 || id > vertices.len() {
                return Err(Error::Tsp(format!("tour entry {id} out of range")));
            }
            order.push(vertices[id - 1]);
        }

        if order.len() != vertices.len() {
            return Err(Error::Tsp(format!(
                "tour artifact visits {} of {} vertices",
                order.len(),
                vertices.len()
            )));
        }
        Ok(order)
    }
}

impl TspSolver for ExternalTspSolver {
    fn solve_tsp<'g>(
        &self,
        graph: &'g Graph,
        vertices: &[usize],
        artifact_tag: &str,
    ) -> Result<Tour<'g>> {
        if let Some(result) = trivial_tour(graph, vertices) {
            return result;
        }

        let (problem_path, params_path, tour_path) =
            self.write_artifacts(graph, vertices, artifact_tag)?;

        let output = Command::new(&self.executable)
            .arg(&params_path)
            .output()
            .map_err(|e| Error::Tsp(format!("cannot run {}: {e}", self.executable.display())))?;

        if !output.status.success() {
            return Err(Error::Tsp(format!(
                "{} exited with {}",
                self.executable.display(),
                output.status
            )));
        }

        if !tour_path.exists() {
            return Err(Error::Tsp(format!(
                "expected tour artifact not produced: {}",
                tour_path.display()
            )));
        }

        let contents = fs::read_to_string(&tour_path)?;
        let order = Self::parse_tour_artifact(&contents, vertices)?;

        for path in [&problem_path, &params_path, &tour_path] {
            if let Err(e) = fs::remove_file(path) {
                log::warn!("could not remove artifact {}: {e}", path.display());
            }
        }

        Ok(Tour::new(graph, order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_graphs::grid_graph;

    fn ring_graph() -> Graph {
        // Eight points on a circle, plus the depot at the centre.
        let mut points = vec![(0.0, 0.0, 0.0)];
        for i in 0..8 {
            let angle = i as f64 * std::f64::consts::TAU / 8.0;
            points.push((10.0 * angle.cos(), 10.0 * angle.sin(), 1.0));
        }
        grid_graph(&points, 200.0)
    }

    #[test]
    fn test_trivial_sizes() {
        let graph = ring_graph();
        let solver = NearestNeighbourTspSolver;

        assert!(solver.solve_tsp(&graph, &[], "t").is_err());
        assert!(solver.solve_tsp(&graph, &[1], "t").is_err());

        let pair = solver.solve_tsp(&graph, &[1, 2], "t").unwrap();
        assert_eq!(pair.len(), 2);

        let triangle = solver.solve_tsp(&graph, &[1, 3, 5], "t").unwrap();
        assert_eq!(triangle.len(), 3);
    }

    #[test]
    fn test_ring_is_solved_to_the_perimeter() {
        let graph = ring_graph();
        let solver = NearestNeighbourTspSolver;

        // Visit the circle vertices in a scrambled order.
        let tour = solver
            .solve_tsp(&graph, &[1, 5, 2, 7, 3, 8, 4, 6], "t")
            .unwrap();

        // The optimum walks the circle; each of the 8 hops spans 45°.
        let hop = 2.0 * 10.0 * (std::f64::consts::PI / 8.0).sin();
        assert!((tour.travel_time() - 8.0 * hop).abs() < 1e-6);
        assert_eq!(tour.len(), 8);
        assert!(tour.is_simple());
    }

    #[test]
    fn test_tour_visits_exactly_the_subset() {
        let graph = ring_graph();
        let solver = NearestNeighbourTspSolver;
        let subset = [2, 4, 6, 8];

        let tour = solver.solve_tsp(&graph, &subset, "t").unwrap();

        let mut visited: Vec<usize> = tour.vertices().to_vec();
        visited.sort_unstable();
        assert_eq!(visited, vec![2, 4, 6, 8]);
    }

    #[test]
    fn test_parse_tour_artifact() {
        let contents = "NAME: x\nTYPE: TOUR\nDIMENSION: 4\nTOUR_SECTION\n1\n3\n2\n4\n-1\nEOF\n";
        let order = ExternalTspSolver::parse_tour_artifact(contents, &[10, 20, 30, 40]).unwrap();
        assert_eq!(order, vec![10, 30, 20, 40]);
    }

    #[test]
    fn test_parse_tour_artifact_rejects_partial_tours() {
        let contents = "TOUR_SECTION\n1\n2\n-1\n";
        assert!(ExternalTspSolver::parse_tour_artifact(contents, &[10, 20, 30]).is_err());
    }

    #[test]
    fn test_missing_executable_is_a_tsp_error() {
        let graph = ring_graph();
        let solver = ExternalTspSolver::new("/nonexistent/lkh-binary");
        let err = solver
            .solve_tsp(&graph, &[1, 2, 3, 4], "missing-exe-test")
            .unwrap_err();
        assert!(matches!(err, Error::Tsp(_)));
    }
}
