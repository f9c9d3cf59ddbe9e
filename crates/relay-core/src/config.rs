//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

/// Limits and settings shared by every instance of an engine.
///
/// Call deadlines are not part of the configuration; each call supplies its
/// own through [`CallContext`](crate::execute::CallContext).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound for a single resource fetch, independent of the call deadline.
    #[serde(rename = "fetch_timeout_ms", with = "millis")]
    pub fetch_timeout: Duration,
    /// Maximum number of parsed resources kept in the cache.
    pub cache_capacity: usize,
    /// Maximum call stack depth of an instance.
    pub max_call_levels: usize,
    /// Maximum number of operations per call (0 = unlimited).
    pub max_operations: u64,
    /// Maximum size of any string value (0 = unlimited).
    pub max_string_size: usize,
    /// Maximum size of any array (0 = unlimited).
    pub max_array_size: usize,
    /// Maximum size of any map (0 = unlimited).
    pub max_map_size: usize,
    /// Deepest element nesting accepted in a model document.
    pub max_model_depth: usize,
    /// Instances created up front when the engine is constructed.
    pub warm_instances: usize,
    /// Value exposed to scripts as `capability::version`.
    pub version: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(60),
            cache_capacity: 100,
            max_call_levels: 120,
            max_operations: 0,
            max_string_size: 0,
            max_array_size: 0,
            max_map_size: 0,
            max_model_depth: 256,
            warm_instances: 0,
            version: "1.0.0".to_string(),
        }
    }
}

impl EngineConfig {
    /// Pre-warm one instance per available CPU.
    pub fn warm_per_cpu(mut self) -> Self {
        self.warm_instances = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.fetch_timeout, Duration::from_secs(60));
        assert_eq!(config.cache_capacity, 100);
        assert_eq!(config.max_call_levels, 120);
        assert_eq!(config.max_model_depth, 256);
        assert_eq!(config.version, "1.0.0");
    }

    #[test]
    fn test_partial_deserialize() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"fetch_timeout_ms": 250, "cache_capacity": 8}"#).unwrap();
        assert_eq!(config.fetch_timeout, Duration::from_millis(250));
        assert_eq!(config.cache_capacity, 8);
        assert_eq!(config.max_call_levels, 120);
        assert_eq!(config.max_model_depth, 256);
    }

    #[test]
    fn test_warm_per_cpu() {
        let config = EngineConfig::default().warm_per_cpu();
        assert!(config.warm_instances >= 1);
    }
}
