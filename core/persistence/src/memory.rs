//! FILENAME: core/persistence/src/memory.rs
//! PURPOSE: In-memory cube store for tests and embedders without a disk.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use cube_engine::{CubeDefinition, CubeResult, CubeStore};

#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Lowercased name to definition.
    cubes: RwLock<BTreeMap<String, CubeDefinition>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cubes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, name: &str) -> Option<CubeDefinition> {
        self.cubes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name.to_lowercase())
    }
}

impl CubeStore for MemoryStore {
    fn load_cube(&self, name: &str) -> CubeResult<Option<CubeDefinition>> {
        Ok(self
            .cubes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_lowercase())
            .cloned())
    }

    fn save_cube(&self, name: &str, definition: &CubeDefinition) -> CubeResult<()> {
        self.cubes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_lowercase(), definition.clone());
        Ok(())
    }

    fn list_cubes(&self) -> CubeResult<Vec<String>> {
        Ok(self
            .cubes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|d| d.name.clone())
            .collect())
    }
}
