//! Bench command implementation for relay CLI.
//!
//! Runs a script repeatedly, serially or across the rayon thread pool, and
//! reports throughput.

use std::path::Path;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use relay_core::{Engine, Result};

use crate::{colors, settings};

/// Benchmark a script.
pub fn execute(
    script: &Path,
    iterations: usize,
    parallel: bool,
    timeout_ms: u64,
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let config = settings::load_config(config)?;
    let (engine, program) = settings::engine_for(script, config)?;
    let mode = if parallel { "parallel" } else { "serial" };
    tracing::debug!(program = program.name(), iterations, mode, "starting benchmark");

    let start = Instant::now();
    let outcome = if parallel {
        (0..iterations)
            .into_par_iter()
            .try_for_each(|_| call(&engine, timeout_ms))
    } else {
        (0..iterations).try_for_each(|_| call(&engine, timeout_ms))
    };
    let elapsed = start.elapsed();
    let stats = engine.pool_stats();
    engine.close()?;
    outcome?;

    println!(
        "{}{}{} {} x {} in {:.3}s {}({:.0} calls/s, {} instances){}",
        colors::BOLD,
        program.name(),
        colors::RESET,
        mode,
        iterations,
        elapsed.as_secs_f64(),
        colors::DIM,
        throughput(iterations, elapsed),
        stats.created,
        colors::RESET,
    );
    Ok(())
}

fn call(engine: &Engine, timeout_ms: u64) -> Result<()> {
    engine
        .execute(&settings::call_context(timeout_ms, &[]))
        .map(drop)
}

fn throughput(iterations: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        iterations as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throughput() {
        assert_eq!(throughput(100, Duration::from_secs(2)), 50.0);
        assert_eq!(throughput(100, Duration::ZERO), 0.0);
    }
}
