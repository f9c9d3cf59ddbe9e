//! Check command implementation for relay CLI.

use std::path::Path;

use relay_core::{Engine, EngineConfig};

use crate::{colors, settings};

/// Compile a script without running it.
pub fn execute(script: &Path) -> anyhow::Result<()> {
    let engine = Engine::new(EngineConfig::default());
    let program = settings::compile(&engine, script)?;
    println!("{}ok{} {}", colors::GREEN, colors::RESET, program.name());
    Ok(())
}
