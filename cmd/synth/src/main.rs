//! Synth CLI - synthetic distributed-tracing workload generator.
//!
//! Commands:
//! - `synth run` - Drive a simulated workload from a config
//! - `synth check` - Validate a config and summarize the topology
//! - `synth init` - Write a starter config

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod loader;

#[derive(Parser)]
#[command(name = "synth")]
#[command(about = "Synthetic distributed-tracing workload generator")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated workload
    Run {
        /// Path or http(s) URL of the config document
        #[arg(short, long, default_value = "synth.yaml")]
        config: String,

        /// Simulated run length, e.g. "90s" or "5m" (default 60s)
        #[arg(short, long)]
        duration: Option<String>,

        /// Seed for deterministic runs
        #[arg(short, long, default_value_t = 42)]
        seed: u64,

        /// Override the configured traffic rate, e.g. "200/s"
        #[arg(short, long)]
        rate: Option<String>,

        /// Per-trace span budget
        #[arg(long, default_value_t = 1000)]
        max_spans_per_trace: u64,

        /// Worker pool size (derived from CPUs and rate when omitted)
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Validate a config and print a topology summary
    Check {
        /// Path or http(s) URL of the config document
        #[arg(short, long, default_value = "synth.yaml")]
        config: String,
    },

    /// Write a starter config
    Init {
        /// Target path
        #[arg(default_value = "synth.yaml")]
        path: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Run {
            config,
            duration,
            seed,
            rate,
            max_spans_per_trace,
            workers,
        } => {
            commands::run::run(
                &config,
                duration.as_deref(),
                seed,
                rate.as_deref(),
                max_spans_per_trace,
                workers,
            )
            .await
        }
        Commands::Check { config } => commands::check::run(&config).await,
        Commands::Init { path } => commands::init::run(&path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("{error}");
            error.exit_code()
        }
    }
}
