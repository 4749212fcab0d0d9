use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatesim_model::Circuit;
use gatesim_sim::{analyze, ClockDriver, DependencyAnalysis, Evaluator, EvaluatorConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// gatesim - logic circuit evaluator
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a saved circuit
    Check {
        /// Circuit JSON file
        circuit: PathBuf,
    },

    /// Print the dependency analysis of a circuit
    Analyze {
        /// Circuit JSON file
        circuit: PathBuf,
    },

    /// Drive a circuit for a number of frames
    Run {
        /// Circuit JSON file
        circuit: PathBuf,

        /// Number of frames to evaluate
        #[arg(short, long, default_value = "60")]
        frames: u64,

        /// Logical milliseconds per frame
        #[arg(long, default_value = "16.0")]
        frame_ms: f64,

        /// Evaluator config (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Write the final snapshot here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt().with_env_filter(log_level).init();

    match cli.command {
        Commands::Check { circuit } => {
            check_circuit(&circuit)?;
        }

        Commands::Analyze { circuit } => {
            analyze_circuit(&circuit)?;
        }

        Commands::Run {
            circuit,
            frames,
            frame_ms,
            config,
            output,
        } => {
            run_circuit(&circuit, frames, frame_ms, config.as_deref(), output.as_deref())?;
        }
    }

    Ok(())
}

fn load_circuit(path: &Path) -> Result<Circuit> {
    info!("Loading circuit from {:?}", path);
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read circuit file {:?}", path))?;
    Circuit::from_json(&json).with_context(|| format!("Invalid circuit in {:?}", path))
}

fn check_circuit(path: &Path) -> Result<()> {
    let circuit = load_circuit(path)?;
    println!(
        "✅ {:?}: {} gates, {} wires",
        path,
        circuit.gates.len(),
        circuit.wires.len()
    );
    Ok(())
}

fn analyze_circuit(path: &Path) -> Result<()> {
    let circuit = load_circuit(path)?;
    let analysis = analyze(&circuit.gates, &circuit.wires);

    let report = match &analysis {
        DependencyAnalysis::Acyclic { order } => serde_json::json!({
            "strategy": "combinational",
            "order": order,
        }),
        DependencyAnalysis::Cyclic(partition) => {
            let strategy = if partition.prefix.is_empty() && partition.downstream.is_empty() {
                "event-driven"
            } else {
                "hybrid"
            };
            serde_json::json!({
                "strategy": strategy,
                "prefix": partition.prefix,
                "schedule": partition.schedule,
                "downstream": partition.downstream,
                "cycles": partition.cycles,
            })
        }
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_circuit(
    path: &Path,
    frames: u64,
    frame_ms: f64,
    config: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let circuit = load_circuit(path)?;

    let config = match config {
        Some(config_path) => EvaluatorConfig::from_path(config_path)
            .with_context(|| format!("Failed to load config {:?}", config_path))?,
        None => EvaluatorConfig::default(),
    };
    let evaluator = Evaluator::new(config)?;
    let mut driver = ClockDriver::new(circuit, evaluator, frame_ms)?;

    let mut oscillating = 0u64;
    for _ in 0..frames {
        let report = driver.tick()?;
        if report.has_oscillation {
            oscillating += 1;
        }
        info!(
            "frame {} ({} ms): {}, {} iterations{}",
            report.frame,
            report.now,
            report.strategy,
            report.iterations,
            if report.has_oscillation {
                ", oscillating"
            } else {
                ""
            }
        );
    }

    if let Some(evaluation) = driver.last_evaluation() {
        for (gate, fault) in &evaluation.faults {
            warn!("gate '{}': {}", gate, fault);
        }
    }

    println!(
        "✅ {} frames evaluated, {} oscillating, final time {} ms",
        frames,
        oscillating,
        driver.now()
    );

    if let Some(output_path) = output {
        let json = driver.circuit().to_json_pretty()?;
        fs::write(output_path, json)
            .with_context(|| format!("Failed to write snapshot to {:?}", output_path))?;
        println!("📄 Snapshot written to {:?}", output_path);
    }

    Ok(())
}
