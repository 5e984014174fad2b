//! FILENAME: core/engine/src/context.rs
//! PURPOSE: Input coordinates and the per-call execution context.
//! CONTEXT: A `Coordinate` is immutable; nested cube calls build a new one
//! with `overlay`, so a callee can never change what its caller sees. The
//! `ExecutionContext` carries everything a cell may touch during a call:
//! the current cube, the coordinate, the shared output, the nesting depth,
//! and (when running under a manager) access to other cubes and the program
//! cache.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value as Json;

use crate::cache::ProgramCache;
use crate::config::EngineConfig;
use crate::cube::Cube;
use crate::error::{CubeError, CubeResult};
use crate::logging::log_debug;
use crate::manager::CubeManager;
use crate::output::Output;
use crate::value::CubeValue;

static DEFAULT_CONFIG: Lazy<EngineConfig> = Lazy::new(EngineConfig::default);

// ============================================================================
// COORDINATE
// ============================================================================

/// Case-insensitive axis-name to value map. Keys are stored lowercased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Coordinate {
    values: Arc<BTreeMap<String, CubeValue>>,
}

impl Coordinate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<CubeValue>) -> Self {
        Arc::make_mut(&mut self.values).insert(name.to_lowercase(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&CubeValue> {
        self.values.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&name.to_lowercase())
    }

    /// A new coordinate with `entries` replacing or adding keys.
    pub fn overlay<I>(&self, entries: I) -> Coordinate
    where
        I: IntoIterator<Item = (String, CubeValue)>,
    {
        let mut values = (*self.values).clone();
        for (name, value) in entries {
            values.insert(name.to_lowercase(), value);
        }
        Coordinate {
            values: Arc::new(values),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CubeValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The coordinate as a map value (what cells see as `input`).
    pub fn to_value(&self) -> CubeValue {
        CubeValue::Map((*self.values).clone())
    }

    pub fn from_json(json: &Json) -> CubeResult<Coordinate> {
        match json {
            Json::Object(entries) => Ok(entries
                .iter()
                .map(|(k, v)| (k.clone(), CubeValue::from_json(v)))
                .collect()),
            Json::Null => Ok(Coordinate::new()),
            other => Err(CubeError::InvalidCoordinate(format!(
                "coordinate must be a JSON object, got {}",
                other
            ))),
        }
    }
}

impl<K: AsRef<str>> FromIterator<(K, CubeValue)> for Coordinate {
    fn from_iter<T: IntoIterator<Item = (K, CubeValue)>>(iter: T) -> Self {
        let values = iter
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_lowercase(), v))
            .collect();
        Coordinate {
            values: Arc::new(values),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

// ============================================================================
// EXECUTION CONTEXT
// ============================================================================

pub struct ExecutionContext<'a> {
    cube: &'a Cube,
    coordinate: Coordinate,
    output: &'a mut Output,
    depth: usize,
    manager: Option<&'a CubeManager>,
    config: &'a EngineConfig,
}

impl<'a> ExecutionContext<'a> {
    /// A top-level context with the default configuration and no manager.
    pub fn new(cube: &'a Cube, coordinate: Coordinate, output: &'a mut Output) -> Self {
        ExecutionContext {
            cube,
            coordinate,
            output,
            depth: 0,
            manager: None,
            config: &DEFAULT_CONFIG,
        }
    }

    pub(crate) fn nested(
        cube: &'a Cube,
        coordinate: Coordinate,
        output: &'a mut Output,
        depth: usize,
        manager: Option<&'a CubeManager>,
        config: &'a EngineConfig,
    ) -> Self {
        ExecutionContext {
            cube,
            coordinate,
            output,
            depth,
            manager,
            config,
        }
    }

    pub fn default_config() -> &'static EngineConfig {
        &DEFAULT_CONFIG
    }

    pub fn cube(&self) -> &'a Cube {
        self.cube
    }

    pub fn coordinate(&self) -> &Coordinate {
        &self.coordinate
    }

    pub fn input(&self, name: &str) -> Option<&CubeValue> {
        self.coordinate.get(name)
    }

    pub fn output(&self) -> &Output {
        &*self.output
    }

    pub fn output_mut(&mut self) -> &mut Output {
        &mut *self.output
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn manager(&self) -> Option<&'a CubeManager> {
        self.manager
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }

    pub fn programs(&self) -> Option<&'a ProgramCache> {
        self.manager.map(CubeManager::programs)
    }

    /// Resolves `overlay` on top of the current coordinate against another
    /// cube (or this one when `cube_name` is `None`). Returns null when the
    /// target has no value at that coordinate.
    pub fn call_cube(
        &mut self,
        cube_name: Option<&str>,
        overlay: BTreeMap<String, CubeValue>,
    ) -> CubeResult<CubeValue> {
        let depth = self.depth + 1;
        let target_name = cube_name.unwrap_or(self.cube.name());
        if depth > self.config.max_recursion_depth {
            return Err(CubeError::RecursionLimit {
                cube: target_name.to_string(),
                limit: self.config.max_recursion_depth,
            });
        }

        let coordinate = self.coordinate.overlay(overlay);
        log_debug!("EXEC", "call cube '{}' depth {} at {}", target_name, depth, coordinate);

        let loaded;
        let target: &Cube = match cube_name {
            Some(name) if !name.eq_ignore_ascii_case(self.cube.name()) => {
                let manager = self
                    .manager
                    .ok_or_else(|| CubeError::CubeNotFound(name.to_string()))?;
                loaded = manager.get_cube(name)?;
                &loaded
            }
            _ => self.cube,
        };

        let value = target.resolve_in(
            coordinate,
            &mut *self.output,
            depth,
            self.manager,
            self.config,
        )?;
        Ok(value.unwrap_or(CubeValue::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_is_case_insensitive() {
        let coord = Coordinate::new().with("State", "OH");
        assert_eq!(coord.get("STATE"), Some(&CubeValue::from("OH")));
        assert!(coord.contains("state"));
    }

    #[test]
    fn test_overlay_leaves_original_untouched() {
        let outer = Coordinate::new().with("state", "OH").with("age", 30);
        let inner = outer.overlay(vec![("Age".to_string(), CubeValue::Long(65))]);
        assert_eq!(outer.get("age"), Some(&CubeValue::Long(30)));
        assert_eq!(inner.get("age"), Some(&CubeValue::Long(65)));
        assert_eq!(inner.get("state"), Some(&CubeValue::from("OH")));
    }

    #[test]
    fn test_coordinate_from_json() {
        let json = serde_json::json!({"State": "OH", "age": 30});
        let coord = Coordinate::from_json(&json).unwrap();
        assert_eq!(coord.get("state"), Some(&CubeValue::from("OH")));
        assert!(Coordinate::from_json(&serde_json::json!([1])).is_err());
        assert_eq!(coord.to_string(), "{age: 30, state: OH}");
    }
}
