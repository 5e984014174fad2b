//! FILENAME: core/persistence/src/directory.rs
//! PURPOSE: A cube store backed by one JSON file per cube in a directory.
//! CONTEXT: File names are the lowercased cube name plus `.json`, so lookups
//! are case-insensitive like the rest of the engine. Writes go to a
//! temporary file first and are renamed into place.

use std::fs;
use std::path::{Path, PathBuf};

use cube_engine::{log_debug, CubeDefinition, CubeResult, CubeStore};

use crate::error::StoreError;

pub const CUBE_FILE_EXTENSION: &str = "json";

#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(DirectoryStore { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        Ok(self
            .root
            .join(format!("{}.{}", file_stem(name)?, CUBE_FILE_EXTENSION)))
    }

    pub fn read(&self, name: &str) -> Result<Option<CubeDefinition>, StoreError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let def: CubeDefinition = serde_json::from_str(&text)?;
        if !def.name.eq_ignore_ascii_case(name) {
            return Err(StoreError::InvalidFormat(format!(
                "{} holds cube '{}', expected '{}'",
                path.display(),
                def.name,
                name
            )));
        }
        Ok(Some(def))
    }

    pub fn write(&self, name: &str, def: &CubeDefinition) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(def)?)?;
        fs::rename(&tmp, &path)?;
        log_debug!("STORE", "wrote cube '{}' to {}", name, path.display());
        Ok(())
    }

    /// Removes a cube's file. Returns false if there was none.
    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }

    /// Stored cube names (file stems), sorted.
    pub fn names(&self) -> Result<Vec<String>, StoreError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CUBE_FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl CubeStore for DirectoryStore {
    fn load_cube(&self, name: &str) -> CubeResult<Option<CubeDefinition>> {
        Ok(self.read(name)?)
    }

    fn save_cube(&self, name: &str, definition: &CubeDefinition) -> CubeResult<()> {
        Ok(self.write(name, definition)?)
    }

    fn list_cubes(&self) -> CubeResult<Vec<String>> {
        Ok(self.names()?)
    }
}

/// Lowercased cube name, rejecting anything that is not a plain file name.
pub(crate) fn file_stem(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    let valid = !trimmed.is_empty()
        && trimmed != "."
        && trimmed != ".."
        && !trimmed.contains(['/', '\\', ':'])
        && !trimmed.chars().any(char::is_control);
    if !valid {
        return Err(StoreError::InvalidFormat(format!("invalid cube name '{}'", name)));
    }
    Ok(trimmed.to_lowercase())
}
