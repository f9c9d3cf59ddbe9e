//! Run command implementation for relay CLI.
//!
//! Compiles a script, runs it once and prints the result as JSON.

use std::path::Path;

use relay_core::Value;

use crate::settings;

/// Run a script once.
pub fn execute(
    script: &Path,
    timeout_ms: u64,
    inputs: &[(String, Value)],
    config: Option<&Path>,
) -> anyhow::Result<()> {
    let config = settings::load_config(config)?;
    let (engine, program) = settings::engine_for(script, config)?;
    tracing::debug!(program = program.name(), timeout_ms, "running script");

    let result = engine.execute(&settings::call_context(timeout_ms, inputs));
    engine.close()?;

    println!("{}", serde_json::to_string_pretty(&result?)?);
    Ok(())
}
