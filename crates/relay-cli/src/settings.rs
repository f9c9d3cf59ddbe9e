//! Engine construction from command-line options.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use relay_core::{CallContext, CompiledProgram, Engine, EngineConfig, Value};

/// Load the engine configuration, from a TOML file when one is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))
}

/// Build an engine and publish the script at `path` into it.
///
/// Relative model locators resolve against the script's directory.
pub fn engine_for(
    script: &Path,
    config: EngineConfig,
) -> anyhow::Result<(Engine, CompiledProgram)> {
    let base = script
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let engine = Engine::with_fetcher(
        config,
        std::sync::Arc::new(relay_core::DefaultFetcher::with_base_dir(base)),
    );

    let program = compile(&engine, script)?;
    engine.publish(program.clone());
    Ok((engine, program))
}

/// Compile `script` with `engine`'s compiler without publishing it.
pub fn compile(engine: &Engine, script: &Path) -> anyhow::Result<CompiledProgram> {
    let file = std::fs::File::open(script)
        .with_context(|| format!("failed to open {}", script.display()))?;
    let name = script
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| script.display().to_string());
    Ok(engine.compiler().compile(file, &name)?)
}

/// Call context for one invocation.
pub fn call_context(timeout_ms: u64, inputs: &[(String, Value)]) -> CallContext {
    inputs.iter().fold(
        CallContext::with_timeout(Duration::from_millis(timeout_ms)),
        |ctx, (name, value)| ctx.with_input(name.clone(), value.clone()),
    )
}

/// Parse a `name=value` input.
///
/// Values are read as integer, float or boolean when they parse as one and
/// kept as strings otherwise.
pub fn parse_input(raw: &str) -> Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("input '{raw}' has an empty name"));
    }

    let value = if let Ok(i) = value.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = value.parse::<f64>() {
        Value::Number(f)
    } else if let Ok(b) = value.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::String(value.to_string())
    };
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_input() {
        assert_eq!(
            parse_input("n=3").unwrap(),
            ("n".to_string(), Value::Integer(3))
        );
        assert_eq!(
            parse_input("x=0.5").unwrap(),
            ("x".to_string(), Value::Number(0.5))
        );
        assert_eq!(
            parse_input("on=true").unwrap(),
            ("on".to_string(), Value::Bool(true))
        );
        assert_eq!(
            parse_input("s=a=b").unwrap(),
            ("s".to_string(), Value::String("a=b".to_string()))
        );
        assert!(parse_input("novalue").is_err());
        assert!(parse_input("=1").is_err());
    }

    #[test]
    fn test_load_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "cache_capacity = 7\nfetch_timeout_ms = 1500\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.cache_capacity, 7);
        assert_eq!(config.fetch_timeout, Duration::from_millis(1500));
        assert_eq!(config.max_call_levels, 120);

        assert_eq!(load_config(None).unwrap().cache_capacity, 100);
    }
}
