//! FILENAME: core/engine/src/manager.rs
//! PURPOSE: Registry of loaded cubes, shared by every caller in a process.
//! CONTEXT: Cubes are held as copy-on-write snapshots. Readers clone an
//! `Arc<Cube>` and drop the map lock before resolving, so resolution never
//! blocks behind a writer. Writers take a per-cube-name mutex, clone the
//! current snapshot, mutate the copy and swap it in. The manager also owns
//! the `ProgramCache` used by expression cells and the optional backing
//! `CubeStore`.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rustc_hash::FxHashMap;

use crate::cache::ProgramCache;
use crate::column::ColumnId;
use crate::config::EngineConfig;
use crate::context::Coordinate;
use crate::cube::Cube;
use crate::definition::CubeDefinition;
use crate::error::{CubeError, CubeResult};
use crate::logging::{log_debug, log_info};
use crate::output::Output;
use crate::store::CubeStore;
use crate::value::CubeValue;

pub struct CubeManager {
    config: EngineConfig,
    /// Lowercased cube name to the current snapshot.
    cubes: RwLock<FxHashMap<String, Arc<Cube>>>,
    /// One writer lock per lowercased cube name.
    write_locks: Mutex<FxHashMap<String, Arc<Mutex<()>>>>,
    programs: ProgramCache,
    store: Option<Box<dyn CubeStore>>,
}

impl CubeManager {
    pub fn new(config: EngineConfig) -> Self {
        CubeManager {
            config,
            cubes: RwLock::new(FxHashMap::default()),
            write_locks: Mutex::new(FxHashMap::default()),
            programs: ProgramCache::new(),
            store: None,
        }
    }

    pub fn with_store(config: EngineConfig, store: Box<dyn CubeStore>) -> Self {
        CubeManager {
            store: Some(store),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn programs(&self) -> &ProgramCache {
        &self.programs
    }

    pub fn has_store(&self) -> bool {
        self.store.is_some()
    }

    // ========================================================================
    // LOCKING HELPERS
    // ========================================================================

    fn cached(&self, name: &str) -> Option<Arc<Cube>> {
        self.cubes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name.to_lowercase())
            .cloned()
    }

    fn publish(&self, cube: Cube) -> Arc<Cube> {
        let cube = Arc::new(cube);
        self.cubes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cube.name().to_lowercase(), Arc::clone(&cube));
        cube
    }

    fn write_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.write_locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_lowercase()).or_default())
    }

    fn store(&self) -> CubeResult<&dyn CubeStore> {
        self.store
            .as_deref()
            .ok_or_else(|| CubeError::Store("no cube store configured".to_string()))
    }

    /// Cached snapshot, or a load from the store. Caller holds the name's write lock.
    fn current_locked(&self, name: &str) -> CubeResult<Arc<Cube>> {
        if let Some(cube) = self.cached(name) {
            return Ok(cube);
        }
        let store = match &self.store {
            Some(store) => store,
            None => return Err(CubeError::CubeNotFound(name.to_string())),
        };
        match store.load_cube(name)? {
            Some(def) => {
                log_debug!("MGR", "loaded cube '{}' from store", name);
                Ok(self.publish(Cube::from_definition(&def)?))
            }
            None => Err(CubeError::CubeNotFound(name.to_string())),
        }
    }

    // ========================================================================
    // REGISTRY
    // ========================================================================

    /// Registers a cube, replacing any cube with the same name.
    pub fn add_cube(&self, cube: Cube) -> Arc<Cube> {
        let lock = self.write_lock(cube.name());
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        log_info!("MGR", "registered cube '{}'", cube.name());
        self.publish(cube)
    }

    pub fn add_definition(&self, def: &CubeDefinition) -> CubeResult<Arc<Cube>> {
        Ok(self.add_cube(Cube::from_definition(def)?))
    }

    /// The current snapshot of a cube, loading it from the store on first use.
    pub fn get_cube(&self, name: &str) -> CubeResult<Arc<Cube>> {
        if let Some(cube) = self.cached(name) {
            return Ok(cube);
        }
        let lock = self.write_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.current_locked(name)
    }

    pub fn contains_cube(&self, name: &str) -> bool {
        self.cached(name).is_some()
    }

    pub fn remove_cube(&self, name: &str) -> Option<Arc<Cube>> {
        let lock = self.write_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.cubes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name.to_lowercase())
    }

    /// Names of the cubes currently loaded, sorted.
    pub fn cube_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .cubes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|c| c.name().to_string())
            .collect();
        names.sort();
        names
    }

    /// Loaded cubes plus everything the store knows about, sorted and deduplicated.
    pub fn list_cubes(&self) -> CubeResult<Vec<String>> {
        let mut names = self.cube_names();
        if let Some(store) = &self.store {
            names.extend(store.list_cubes()?);
        }
        names.sort_by_key(|n| n.to_lowercase());
        names.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
        Ok(names)
    }

    /// Drops every loaded cube and compiled program. Cubes are reloaded
    /// from the store on next use.
    pub fn clear_cache(&self) {
        let mut cubes = self.cubes.write().unwrap_or_else(PoisonError::into_inner);
        log_info!("MGR", "clearing {} cached cubes", cubes.len());
        cubes.clear();
        drop(cubes);
        self.programs.clear();
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Applies `f` to a copy of the cube and publishes the copy. Updates of
    /// the same cube are serialized; readers keep the old snapshot until the
    /// swap. Nothing is published if `f` fails.
    pub fn update_cube<R, F>(&self, name: &str, f: F) -> CubeResult<R>
    where
        F: FnOnce(&mut Cube) -> CubeResult<R>,
    {
        let lock = self.write_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current_locked(name)?;
        let mut copy = (*current).clone();
        let result = f(&mut copy)?;
        if !copy.name().eq_ignore_ascii_case(name) {
            return Err(CubeError::Definition(format!(
                "update of cube '{}' cannot rename it to '{}'",
                name,
                copy.name()
            )));
        }
        self.publish(copy);
        Ok(result)
    }

    /// Returns the column on `axis` that holds `value` exactly, creating it
    /// if it does not exist. Concurrent callers asking for the same value
    /// get the same column.
    pub fn ensure_column(&self, cube: &str, axis: &str, value: CubeValue) -> CubeResult<ColumnId> {
        if value.is_null() {
            return Err(CubeError::InvalidColumn(
                "cannot create a column for null".to_string(),
            ));
        }
        let snapshot = self.get_cube(cube)?;
        let existing = snapshot
            .axis(axis)
            .ok_or_else(|| CubeError::InvalidAxis(format!("axis '{}' not found in cube '{}'", axis, cube)))?
            .locate_column(&value);
        if let Some(id) = existing {
            return Ok(id);
        }

        self.update_cube(cube, |c| {
            let found = c
                .axis(axis)
                .ok_or_else(|| CubeError::InvalidAxis(format!("axis '{}' not found in cube '{}'", axis, cube)))?
                .locate_column(&value);
            if let Some(id) = found {
                return Ok(id);
            }
            let id = c.add_column(axis, value.clone())?;
            log_info!("MGR", "created column {} for {} on '{}.{}'", id, value, cube, axis);
            Ok(id)
        })
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Resolves a coordinate against the named cube. Expression cells may
    /// call other cubes registered here.
    pub fn resolve(&self, name: &str, coordinate: &Coordinate, output: &mut Output) -> CubeResult<Option<CubeValue>> {
        let cube = self.get_cube(name)?;
        cube.resolve_in(coordinate.clone(), output, 0, Some(self), &self.config)
    }

    // ========================================================================
    // STORE
    // ========================================================================

    pub fn save_cube(&self, name: &str) -> CubeResult<()> {
        let store = self.store()?;
        let cube = self.get_cube(name)?;
        let def = cube.to_definition()?;
        store.save_cube(cube.name(), &def)?;
        log_info!("MGR", "saved cube '{}'", cube.name());
        Ok(())
    }

    /// Reloads a cube from the store, replacing the loaded snapshot, and
    /// drops compiled programs.
    pub fn reload_cube(&self, name: &str) -> CubeResult<Arc<Cube>> {
        let store = self.store()?;
        let lock = self.write_lock(name);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let def = store
            .load_cube(name)?
            .ok_or_else(|| CubeError::CubeNotFound(name.to_string()))?;
        let cube = self.publish(Cube::from_definition(&def)?);
        self.programs.clear();
        Ok(cube)
    }
}

impl std::fmt::Debug for CubeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CubeManager")
            .field("config", &self.config)
            .field("cubes", &self.cube_names())
            .field("has_store", &self.store.is_some())
            .finish()
    }
}
