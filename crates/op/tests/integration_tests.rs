//! End-to-end scenarios for the orienteering engine.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use u_orienteering_core::FrameworkParams;
use u_orienteering_op::{
    auto_tuned_dbscan, Clustering, Graph, GreedyHeuristic, NearestNeighbourTspSolver,
    PalnsSolution, PalnsSolver, ProblemParams, ReducedGraph, Tour, Vertex,
};

fn graph_from_points(points: &[(f64, f64, f64)], max_travel_time: f64) -> Graph {
    let vertices: Vec<Vertex> = points
        .iter()
        .enumerate()
        .map(|(i, &(x, y, prize))| {
            let depot_dist = ((x - points[0].0).powi(2) + (y - points[0].1).powi(2)).sqrt();
            Vertex {
                id: i,
                depot: i == 0,
                reachable: depot_dist <= max_travel_time / 2.0,
                x,
                y,
                prize,
            }
        })
        .collect();
    Graph::from_vertices(vertices, max_travel_time)
}

/// S1: three vertices on a line, depot in the middle, budget 4. The
/// whole loop fits exactly and collects both prizes.
#[test]
fn trivial_line_instance() {
    let graph = graph_from_points(
        &[(0.0, 0.0, 0.0), (1.0, 0.0, 1.0), (-1.0, 0.0, 1.0)],
        4.0,
    );

    let solver = PalnsSolver::new(
        &graph,
        ProblemParams::default(),
        FrameworkParams::default()
            .with_max_iterations(200)
            .with_workers(1),
    );
    let report = solver.solve(None, 1).unwrap();

    assert!((report.tour.total_prize() - 2.0).abs() < 1e-6);
    assert!((report.tour.travel_time() - 4.0).abs() < 1e-6);
    assert_eq!(report.tour.len(), 3);
}

/// S2: a square whose perimeter fits the budget; all three prizes are
/// collected.
#[test]
fn budget_tight_square() {
    let graph = graph_from_points(
        &[
            (0.0, 0.0, 0.0),
            (0.7, 0.0, 1.0),
            (0.7, 0.7, 1.0),
            (0.0, 0.7, 1.0),
        ],
        3.0,
    );

    let solver = PalnsSolver::new(
        &graph,
        ProblemParams::default(),
        FrameworkParams::default()
            .with_max_iterations(300)
            .with_workers(1),
    );
    let report = solver.solve(None, 2).unwrap();

    assert!((report.tour.total_prize() - 3.0).abs() < 1e-6);
    assert!(report.tour.travel_time() <= 3.0 + 1e-6);
    assert_eq!(report.tour.len(), 4);
}

/// S3: the same square with a budget that only fits three vertices;
/// the optimal restoration removes exactly one.
#[test]
fn infeasible_insertion_square() {
    let graph = graph_from_points(
        &[
            (0.0, 0.0, 0.0),
            (0.7, 0.0, 1.0),
            (0.7, 0.7, 1.0),
            (0.0, 0.7, 1.0),
        ],
        2.5,
    );

    let mut tour = Tour::new(&graph, vec![0, 1, 2, 3]);
    assert!(tour.travel_time() > 2.5);

    let removed = tour.make_travel_time_feasible_optimal();
    assert_eq!(removed.len(), 1);
    assert!((tour.total_prize() - 2.0).abs() < 1e-6);
    assert!(tour.is_feasible());

    // The full solver reaches the same optimum.
    let solver = PalnsSolver::new(
        &graph,
        ProblemParams::default(),
        FrameworkParams::default()
            .with_max_iterations(300)
            .with_workers(1),
    );
    let report = solver.solve(None, 3).unwrap();
    assert!((report.tour.total_prize() - 2.0).abs() < 1e-6);
    assert!(report.tour.travel_time() <= 2.5 + 1e-6);
}

/// S4: two far-apart groups of five; auto-tuned DBSCAN finds exactly
/// the two groups.
#[test]
fn dbscan_separates_far_groups() {
    let mut points = vec![(50.0, -40.0, 0.0)];
    for i in 0..5 {
        points.push((i as f64 * 0.5, 0.0, 1.0));
    }
    for i in 0..5 {
        points.push((100.0 + i as f64 * 0.5, 0.0, 1.0));
    }
    let graph = graph_from_points(&points, 500.0);

    let clusters = auto_tuned_dbscan(&graph);
    assert_eq!(clusters.len(), 2);
    assert!(clusters.iter().all(|c| c.len() == 5));
}

/// S5: reduction of two clusters to two meta-vertices, and a clean
/// projection back to all ten originals.
#[test]
fn reduction_roundtrip() {
    let mut points = vec![(50.0, -40.0, 0.0)];
    for i in 0..5 {
        points.push((i as f64 * 0.5, 0.0, 1.0));
    }
    for i in 0..5 {
        points.push((100.0 + i as f64 * 0.5, 0.0, 1.0));
    }
    let graph = graph_from_points(&points, 500.0);

    let clustering = Clustering::new(&graph);
    let reduction = ReducedGraph::new(&graph, &clustering, &NearestNeighbourTspSolver).unwrap();
    assert_eq!(reduction.reduced().n_vertices(), 3);

    let reduced_tour = Tour::new(reduction.reduced(), vec![0, 1, 2]);
    let projected = reduction.project_back_tour(&reduced_tour);

    assert_eq!(projected.len(), 11);
    assert!(projected.is_simple());
    let mut visited: Vec<usize> = projected.vertices().to_vec();
    visited.sort_unstable();
    assert_eq!(visited, (0..11).collect::<Vec<_>>());
}

/// S6: on a 50-vertex random instance, 1000 PALNS iterations with the
/// full operator pool never lose prize against the greedy start and
/// never violate the budget.
#[test]
fn palns_improves_random_instance() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut points = vec![(50.0, 50.0, 0.0)];
    for _ in 1..50 {
        points.push((
            rng.gen_range(0.0..100.0),
            rng.gen_range(0.0..100.0),
            rng.gen_range(1.0..10.0),
        ));
    }
    let graph = graph_from_points(&points, 160.0);

    let problem_params = ProblemParams::default();
    let tsp = NearestNeighbourTspSolver;
    let initial = GreedyHeuristic::new(&graph, &problem_params, &tsp)
        .solve(&mut rng)
        .unwrap();
    let initial_prize = initial.total_prize();

    let solver = PalnsSolver::new(
        &graph,
        problem_params.clone(),
        FrameworkParams::default()
            .with_max_iterations(1000)
            .with_workers(2),
    );
    let report = solver.solve(Some(initial), 42).unwrap();

    assert!(report.tour.total_prize() >= initial_prize);
    assert!(report.tour.travel_time() <= graph.max_travel_time() + 1e-6);
    assert!(report.tour.is_simple());
    assert_eq!(report.tour.vertices()[0], 0);

    // Partition invariant on the final solution.
    let solution = PalnsSolution::from_tour(
        Tour::new(&graph, report.tour.vertices().to_vec()),
        &problem_params,
    );
    let on_tour = solution.tour.len() - 1;
    assert_eq!(
        on_tour + solution.free_vertices().len(),
        graph.reachable_non_depot().count()
    );
}
