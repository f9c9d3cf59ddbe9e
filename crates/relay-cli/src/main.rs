//! relay CLI - run hot-swappable rhai scripts with host capabilities.

mod bench;
mod check;
mod colors;
mod run;
mod settings;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use relay_core::Value;

#[derive(Parser)]
#[command(name = "relay")]
#[command(about = "Run rhai scripts with hash and decision-tree capabilities")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile and run a script once, printing the result as JSON
    Run {
        /// Path to the script
        script: PathBuf,

        /// Call deadline in milliseconds
        #[arg(long, default_value = "1000")]
        timeout_ms: u64,

        /// Named input visible to the script as a constant (name=value)
        #[arg(short, long = "input", value_parser = settings::parse_input)]
        inputs: Vec<(String, Value)>,

        /// Engine configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Compile a script without running it
    Check {
        /// Path to the script
        script: PathBuf,
    },

    /// Run a script repeatedly and report throughput
    Bench {
        /// Path to the script
        script: PathBuf,

        /// Number of calls
        #[arg(short = 'n', long, default_value = "1000")]
        iterations: usize,

        /// Spread calls across all CPUs
        #[arg(long)]
        parallel: bool,

        /// Per-call deadline in milliseconds
        #[arg(long, default_value = "1000")]
        timeout_ms: u64,

        /// Engine configuration file (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format relay-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(relay_err) = err.downcast_ref::<relay_core::Error>() {
            anyhow::anyhow!("{}", relay_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run {
            script,
            timeout_ms,
            inputs,
            config,
        } => run::execute(&script, timeout_ms, &inputs, config.as_deref()).map_err(format_error)?,

        Commands::Check { script } => check::execute(&script).map_err(format_error)?,

        Commands::Bench {
            script,
            iterations,
            parallel,
            timeout_ms,
            config,
        } => bench::execute(&script, iterations, parallel, timeout_ms, config.as_deref())
            .map_err(format_error)?,
    }

    Ok(())
}
