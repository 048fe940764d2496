//! lae: evaluate a matrix expression tree read from a JSON file.
//!
//! Writes `{"result": [[...]]}` or `{"error": "..."}` to the output file. A
//! failed computation is reported in the output, not through the exit code.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use lae::io;
use lae::logging::{self, LogConfig};
use lae::{ExecutorConfig, LinearAlgebraEngine};

// ── CLI ─────────────────────────────────────────────────────────────

/// Row-parallel linear algebra engine.
#[derive(Parser, Debug)]
#[command(name = "lae", version, about)]
struct Cli {
    /// Number of worker threads.
    threads: usize,

    /// JSON file holding the expression tree.
    input: PathBuf,

    /// File the result or error message is written to.
    output: PathBuf,

    /// Seed for the workers' fatigue factors.
    #[arg(long, env = "LAE_SEED")]
    seed: Option<u64>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,

    /// Extra log filter directives, e.g. `lae::scheduling=debug`.
    #[arg(long, env = "LAE_LOG")]
    log_filter: Option<String>,

    /// Also write logs to this file.
    #[arg(long, env = "LAE_LOG_FILE")]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig {
        json_format: cli.json_logs,
        target_filters: cli.log_filter.clone(),
        ..Default::default()
    };
    match &cli.log_file {
        Some(path) => {
            if let Err(e) = logging::init_with_file(log_config, &path.to_string_lossy()) {
                eprintln!("cannot open log file {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
        None => logging::init(log_config),
    }

    let config = ExecutorConfig {
        seed: cli.seed,
        ..ExecutorConfig::with_pool_size(cli.threads)
    };

    let outcome = match LinearAlgebraEngine::new(config) {
        Ok(mut engine) => {
            let outcome = io::read_tree(&cli.input).and_then(|mut root| {
                root.associative_nesting();
                engine.run(root)
            });
            info!("worker report:\n{}", engine.report());
            engine.shutdown();
            outcome
        }
        Err(e) => io::error_outcome(e),
    };

    if let Err(e) = &outcome {
        lae::log_error!(e, stage = "compute");
    }

    match io::write_outcome(&cli.output, &outcome) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
