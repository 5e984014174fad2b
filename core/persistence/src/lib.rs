//! FILENAME: core/persistence/src/lib.rs
//! Cube Store Module
//!
//! Implementations of the engine's `CubeStore` boundary: a directory of JSON
//! definition files and an in-memory map, plus zip bundles for moving sets of
//! cubes between stores.

mod bundle;
mod directory;
mod error;
mod memory;


pub use bundle::{
    export_bundle, import_bundle, read_bundle, write_bundle, BundleManifest, BUNDLE_FORMAT,
    BUNDLE_VERSION, MANIFEST_ENTRY,
};
pub use directory::{DirectoryStore, CUBE_FILE_EXTENSION};
pub use error::StoreError;
pub use memory::MemoryStore;

use cube_engine::{CubeDefinition, CubeResult, CubeStore};

/// Loads every cube a store lists, skipping names that vanish in between.
pub fn load_all(store: &dyn CubeStore) -> CubeResult<Vec<CubeDefinition>> {
    let mut definitions = Vec::new();
    for name in store.list_cubes()? {
        if let Some(def) = store.load_cube(&name)? {
            definitions.push(def);
        }
    }
    Ok(definitions)
}

/// Saves each definition under its own name. Returns how many were written.
pub fn save_all(store: &dyn CubeStore, definitions: &[CubeDefinition]) -> CubeResult<usize> {
    for def in definitions {
        store.save_cube(&def.name, def)?;
    }
    Ok(definitions.len())
}
