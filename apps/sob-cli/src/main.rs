use clap::{Parser, Subcommand};
use rayon::prelude::*;
use sob_app::{
    AppError, AppResult, EvaluationFunction, EvaluationProgress, EvaluationResult, ProblemCatalog,
    RunnerOptions,
};
use sob_core::{Constraint, DesignVector, Topology};
use sob_results::{RunManager, load_evaluation_at};
use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sob-cli")]
#[command(about = "Structural optimization benchmark - crash and bending evaluations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered problems
    Problems,
    /// Load, validate and print runner options
    CheckConfig {
        /// Path to a YAML or JSON options file
        config: Option<PathBuf>,
    },
    /// Evaluate one design
    Evaluate {
        /// Topology id (1 StarBox, 2 ThreePointBending, 3 CrashTube)
        topology: u32,
        /// Number of design variables
        dimension: usize,
        /// Comma-separated design vector in [-5, 5]
        #[arg(long, allow_hyphen_values = true)]
        design: String,
        /// Run directory id
        #[arg(long, default_value_t = 1)]
        sim_id: u64,
        /// Metric to report; repeat for several objectives
        #[arg(short, long = "metric")]
        metrics: Vec<String>,
        /// Constraint as `metric<=limit`; repeatable
        #[arg(long = "constraint")]
        constraints: Vec<String>,
        /// Runner options file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Use the next free run id instead of `--sim-id`
        #[arg(long)]
        sequential: bool,
    },
    /// Evaluate every design of a CSV file on a worker pool
    Batch {
        topology: u32,
        dimension: usize,
        /// CSV file, one design per row
        designs: PathBuf,
        #[arg(short, long = "metric")]
        metrics: Vec<String>,
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Concurrent evaluations
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,
        /// Output CSV file (optional, defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List evaluated runs of a topology
    Runs {
        topology: u32,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Show the stored evaluation of a run directory
    ShowRun {
        /// Run directory, e.g. runs/starbox_deck253
        run_dir: PathBuf,
    },
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Problems => cmd_problems(),
        Commands::CheckConfig { config } => cmd_check_config(config.as_deref()),
        Commands::Evaluate {
            topology,
            dimension,
            design,
            sim_id,
            metrics,
            constraints,
            config,
            sequential,
        } => {
            let constraints = constraints
                .iter()
                .map(|c| parse_constraint(c))
                .collect::<AppResult<Vec<_>>>()?;
            let function = ProblemCatalog::new()
                .get_problem(topology, dimension, &metrics, load_options(config.as_deref())?, sequential)?
                .with_constraints(constraints)?;
            cmd_evaluate(&function, &parse_design(&design)?, sim_id)
        }
        Commands::Batch {
            topology,
            dimension,
            designs,
            metrics,
            config,
            jobs,
            output,
        } => {
            let function = ProblemCatalog::new().get_problem(
                topology,
                dimension,
                &metrics,
                load_options(config.as_deref())?,
                true,
            )?;
            cmd_batch(&function, &designs, jobs, output.as_deref())
        }
        Commands::Runs { topology, config } => cmd_runs(topology, config.as_deref()),
        Commands::ShowRun { run_dir } => cmd_show_run(&run_dir),
    }
}

fn load_options(config: Option<&Path>) -> AppResult<RunnerOptions> {
    match config {
        Some(path) => RunnerOptions::load(path),
        None => Ok(RunnerOptions::default()),
    }
}

fn parse_design(text: &str) -> AppResult<DesignVector> {
    text.split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| AppError::Config(format!("invalid design value '{}': {e}", v.trim())))
        })
        .collect::<AppResult<Vec<f64>>>()
        .map(DesignVector::new)
}

fn parse_constraint(text: &str) -> AppResult<Constraint> {
    let (metric, limit) = text
        .split_once("<=")
        .ok_or_else(|| AppError::Config(format!("constraint '{text}' is not metric<=limit")))?;
    let upper_limit = limit
        .trim()
        .parse::<f64>()
        .map_err(|e| AppError::Config(format!("invalid constraint limit in '{text}': {e}")))?;
    Ok(Constraint {
        metric: metric.trim().to_string(),
        upper_limit,
    })
}

/// Designs of a CSV file; a non-numeric first row is taken as a header.
fn read_designs(path: &Path) -> AppResult<Vec<DesignVector>> {
    let text = std::fs::read_to_string(path).map_err(|source| AppError::ConfigFileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut designs = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_design(line) {
            Ok(x) => designs.push(x),
            Err(_) if designs.is_empty() && index == 0 => continue,
            Err(e) => {
                return Err(AppError::Config(format!(
                    "{} line {}: {e}",
                    path.display(),
                    index + 1
                )));
            }
        }
    }
    Ok(designs)
}

fn cmd_problems() -> AppResult<()> {
    println!("Registered problems:");
    for entry in ProblemCatalog::new().entries() {
        let dims = entry.topology.dimensions();
        println!(
            "  {} {:<18} dims {}-{}  default metric: {}",
            entry.topology.id(),
            entry.topology,
            dims.start(),
            dims.end(),
            entry.default_metric
        );
        if !entry.forbidden_metrics.is_empty() {
            println!("    forbidden: {}", entry.forbidden_metrics.join(", "));
        }
    }
    Ok(())
}

fn cmd_check_config(config: Option<&Path>) -> AppResult<()> {
    let options = load_options(config)?;
    options.validate()?;
    let yaml = serde_yaml::to_string(&options)
        .map_err(|e| AppError::Config(format!("Failed to serialize options: {e}")))?;
    print!("{yaml}");
    println!("✓ Options are valid");
    Ok(())
}

fn cmd_evaluate(function: &EvaluationFunction, design: &DesignVector, sim_id: u64) -> AppResult<()> {
    let problem = function.problem();
    println!(
        "Evaluating {} (dimension {}) for {}",
        problem.topology,
        problem.dimension,
        problem.metrics.join(", ")
    );

    let mut last_emit = Instant::now();
    let mut last_stage = None;
    let result = function.evaluate_with_progress(
        design,
        sim_id,
        Some(&mut |event| {
            let emit_now = last_stage != Some(event.stage) || last_emit.elapsed().as_millis() >= 100;
            if emit_now {
                render_cli_progress(&event);
                last_stage = Some(event.stage);
                last_emit = Instant::now();
            }
        }),
    )?;
    clear_progress_line();

    print_result(&result);
    Ok(())
}

fn cmd_batch(
    function: &EvaluationFunction,
    designs: &Path,
    jobs: usize,
    output: Option<&Path>,
) -> AppResult<()> {
    let designs = read_designs(designs)?;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .map_err(|e| AppError::Config(format!("Failed to start worker pool: {e}")))?;

    let results: Vec<AppResult<EvaluationResult>> = pool.install(|| {
        designs
            .par_iter()
            .map(|design| function.evaluate(design, 0))
            .collect()
    });

    let problem = function.problem();
    let mut csv = String::from("index,run_id,status");
    for metric in &problem.metrics {
        let _ = write!(csv, ",{metric}");
    }
    for i in 0..problem.dimension {
        let _ = write!(csv, ",x{}", i + 1);
    }
    csv.push('\n');

    let mut failures = 0;
    for (index, (design, result)) in designs.iter().zip(&results).enumerate() {
        let _ = write!(csv, "{index}");
        match result {
            Ok(r) => {
                let _ = write!(csv, ",{},{}", r.run.run_id, r.solver.status());
                for i in 0..problem.metrics.len() {
                    match r.objectives.get(i) {
                        Some(v) => {
                            let _ = write!(csv, ",{v}");
                        }
                        None => csv.push(','),
                    }
                }
            }
            Err(e) => {
                failures += 1;
                warn!(index, error = %e, "evaluation failed");
                let _ = write!(csv, ",,error");
                csv.push_str(&",".repeat(problem.metrics.len()));
            }
        }
        for v in design.as_slice() {
            let _ = write!(csv, ",{v}");
        }
        csv.push('\n');
    }

    if let Some(path) = output {
        std::fs::write(path, csv)?;
        println!(
            "✓ Evaluated {} designs ({} errors), results in {}",
            designs.len(),
            failures,
            path.display()
        );
    } else {
        print!("{}", csv);
    }
    Ok(())
}

fn cmd_runs(topology: u32, config: Option<&Path>) -> AppResult<()> {
    let topology = Topology::from_id(topology)?;
    let options = load_options(config)?;
    let runs = RunManager::new(&options.output_root)?;
    let records = runs.list_evaluations(topology)?;

    if records.is_empty() {
        println!("No evaluated runs found for {}", topology);
    } else {
        println!("Evaluated runs for {}:", topology);
        for record in records {
            println!(
                "  {:>6}  {:<15} {:?}  ({})",
                record.run_id, record.solver_status, record.objectives, record.timestamp
            );
        }
    }
    Ok(())
}

fn cmd_show_run(run_dir: &Path) -> AppResult<()> {
    println!("Loading run: {}", run_dir.display());
    let (record, signals) = load_evaluation_at(run_dir)?;

    println!("\nEvaluation {}", record.evaluation_id);
    println!("  Topology:    {} (dimension {})", record.topology, record.dimension);
    println!("  Run id:      {} ({:?})", record.run_id, record.numbering);
    println!("  Timestamp:   {}", record.timestamp);
    println!("  Design:      {:?}", record.design);
    println!("  Fingerprint: {}", record.design_fingerprint);
    println!("  Solver:      {}", record.solver_status);
    if let Some(message) = &record.solver_message {
        println!("               {message}");
    }
    println!("  Elapsed:     {:.2}s", record.elapsed_s);

    println!("\nObjectives:");
    for (metric, value) in record.metrics.iter().zip(&record.objectives) {
        println!("  {metric} = {value}");
    }
    if !record.constraints.is_empty() {
        println!("\nConstraints:");
        for value in &record.constraints {
            println!("  {value}");
        }
    }

    println!("\nSignals:");
    for name in signals.names() {
        let samples = signals.get(name).map_or(0, <[_]>::len);
        println!("  {name} ({samples} samples)");
    }
    Ok(())
}

fn print_result(result: &EvaluationResult) {
    if result.succeeded() {
        println!("✓ Evaluation completed: {}", result.run.dir().display());
    } else {
        println!("✗ Solver did not complete: {}", result.solver);
        println!("  Run directory: {}", result.run.dir().display());
    }
    for (metric, value) in result.metrics.iter().zip(&result.objectives) {
        println!("  {metric} = {value}");
    }
    for (i, value) in result.constraints.iter().enumerate() {
        let state = if *value <= 0.0 { "satisfied" } else { "violated" };
        println!("  constraint {} = {value} ({state})", i + 1);
    }
    println!("  Elapsed: {:.2}s", result.elapsed_s);
}

fn clear_progress_line() {
    print!("\r{}\r", " ".repeat(100));
    let _ = io::stdout().flush();
}

fn render_cli_progress(event: &EvaluationProgress) {
    let spinner = ['|', '/', '-', '\\'];
    let spin_idx = ((event.elapsed_wall_s * 10.0) as usize) % spinner.len();
    let mut line = format!(
        "\r{} {}  elapsed={:.2}s",
        spinner[spin_idx],
        event.stage.label(),
        event.elapsed_wall_s
    );
    if let Some(run_id) = event.run_id {
        line.push_str(&format!("  run={run_id}"));
    }
    if let Some(msg) = &event.message {
        line.push_str(&format!("  {msg}"));
    }
    print!("{}", line);
    let _ = io::stdout().flush();
}
