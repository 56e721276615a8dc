//! OPLIB Instance Runner CLI

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use u_orienteering_benchmark::{
    append_solution_csv, parse_instance, read_solution_json, write_solution_json,
};
use u_orienteering_core::FrameworkParams;
use u_orienteering_op::{ExternalTspSolver, Graph, PalnsSolver, ProblemParams, TspSolver};

#[derive(Parser)]
#[command(name = "op-runner")]
#[command(about = "OPLIB Instance Runner for U-Orienteering")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve an instance with the PALNS metaheuristic
    Solve {
        /// OPLIB instance file
        instance: PathBuf,

        /// Problem parameters (JSON); missing keys take defaults
        #[arg(short, long)]
        problem_params: Option<PathBuf>,

        /// Framework parameters (JSON); missing keys take defaults
        #[arg(short, long)]
        framework_params: Option<PathBuf>,

        /// Warm-start from a stored solution (JSON)
        #[arg(long)]
        initial_solution: Option<PathBuf>,

        /// External Lin-Kernighan-style TSP executable
        #[arg(long)]
        tsp_executable: Option<PathBuf>,

        /// Output file for the solution (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output file for CSV results (appended)
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Operator-score aggregation artifact (JSON, file-locked)
        #[arg(long)]
        scores: Option<PathBuf>,

        /// Random seed
        #[arg(short, long, default_value = "0")]
        seed: u64,
    },

    /// Print instance statistics
    Info {
        /// OPLIB instance file
        instance: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Solve {
            instance,
            problem_params,
            framework_params,
            initial_solution,
            tsp_executable,
            output,
            csv,
            scores,
            seed,
        } => {
            let data = parse_instance(&instance)?;
            let graph = Graph::from_instance(&data)?;

            let problem_params = match problem_params {
                Some(path) => ProblemParams::from_json_file(path)?,
                None => ProblemParams::default(),
            };
            let framework_params = match framework_params {
                Some(path) => {
                    let contents = std::fs::read_to_string(path)?;
                    serde_json::from_str::<FrameworkParams>(&contents)?
                }
                None => FrameworkParams::default(),
            };

            let mut solver = PalnsSolver::new(&graph, problem_params, framework_params);
            if let Some(executable) = tsp_executable {
                let tsp: Box<dyn TspSolver> = Box::new(ExternalTspSolver::new(executable));
                solver = solver.with_tsp_solver(tsp);
            }
            if let Some(path) = scores {
                solver = solver.with_scores_path(path);
            }

            let initial = match initial_solution {
                Some(path) => Some(read_solution_json(path, &graph)?),
                None => None,
            };

            let report = solver.solve(initial, seed)?;

            println!(
                "{}: prize {:.2}, travel time {:.2}, {} vertices, {:.1}s (best after {:.1}s)",
                graph.instance_name(),
                report.tour.total_prize(),
                report.tour.travel_time(),
                report.tour.len(),
                report.total_time_s,
                report.time_to_best_s,
            );

            if let Some(path) = output {
                write_solution_json(path, &report.tour)?;
            }
            if let Some(path) = csv {
                append_solution_csv(path, &report.tour)?;
            }

            Ok(())
        }

        Commands::Info { instance } => {
            let data = parse_instance(&instance)?;
            let graph = Graph::from_instance(&data)?;

            let reachable = graph.vertices().iter().filter(|v| v.reachable).count();
            let (min_prize, max_prize) = graph.prize_range();

            println!("instance:   {}", graph.instance_name());
            println!("vertices:   {} ({} reachable)", graph.n_vertices(), reachable);
            println!("edges:      {}", graph.edges().len());
            println!("budget:     {}", graph.max_travel_time());
            println!("prizes:     {min_prize} .. {max_prize} (total {})", graph.total_prize());
            println!("weights:    {}", graph.edge_weight_type());

            Ok(())
        }
    }
}
