//! FILENAME: core/engine/src/config.rs
//! Configuration for the cube engine.
//!
//! `EngineConfig` gathers the execution limits and behavioral knobs that
//! would otherwise be constants spread through the resolver and the rule
//! executor.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CubeError, CubeResult};

/// How far a `stop()` raised by a rule step reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopScope {
    /// Skip the remaining steps of the innermost enumerated axis for the
    /// current outer combination; outer axes continue. With a single
    /// enumerated axis this ends the run.
    InnermostAxis,
    /// Abort every remaining combination.
    Enumeration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum nesting of cube-to-cube calls.
    pub max_recursion_depth: usize,
    pub stop_scope: StopScope,
    /// Upper bound on executed steps in one rule enumeration (guards jump loops).
    pub max_rule_steps: usize,
    /// Record each executed rule step in the output trace.
    pub trace_rules: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_recursion_depth: 64,
            stop_scope: StopScope::InnermostAxis,
            max_rule_steps: 100_000,
            trace_rules: true,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> CubeResult<Self> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| CubeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> CubeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| CubeError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> CubeResult<()> {
        if self.max_recursion_depth == 0 {
            return Err(CubeError::Config(
                "max_recursion_depth must be at least 1".to_string(),
            ));
        }
        if self.max_rule_steps == 0 {
            return Err(CubeError::Config(
                "max_rule_steps must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = EngineConfig::from_json_str(r#"{"stop_scope": "enumeration"}"#).unwrap();
        assert_eq!(config.stop_scope, StopScope::Enumeration);
        assert_eq!(config.max_recursion_depth, 64);
        assert!(config.trace_rules);
    }

    #[test]
    fn test_rejects_zero_limits() {
        let err = EngineConfig::from_json_str(r#"{"max_rule_steps": 0}"#).unwrap_err();
        assert!(matches!(err, CubeError::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_stop_scope() {
        assert!(EngineConfig::from_json_str(r#"{"stop_scope": "sometimes"}"#).is_err());
    }
}
