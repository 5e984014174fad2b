//! FILENAME: core/persistence/src/bundle.rs
//! PURPOSE: Zip bundles of cube definitions for export and import.
//! CONTEXT: A bundle holds `manifest.json` plus one `cubes/<name>.json` entry
//! per cube, in the same JSON form the directory store writes.

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;

use cube_engine::{log_debug, log_info, CubeDefinition};
use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::directory::file_stem;
use crate::error::StoreError;

pub const MANIFEST_ENTRY: &str = "manifest.json";
pub const BUNDLE_FORMAT: &str = "cube-bundle";
pub const BUNDLE_VERSION: u32 = 1;

/// Upper bound on a single entry's uncompressed size (64 MiB).
const MAX_ENTRY_BYTES: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format: String,
    pub version: u32,
    /// Cube names in bundle order.
    pub cubes: Vec<String>,
}

fn entry_name(cube: &str) -> Result<String, StoreError> {
    Ok(format!("cubes/{}.json", file_stem(cube)?))
}

// ============================================================================
// EXPORT
// ============================================================================

/// Writes `definitions` as a bundle and hands the writer back.
pub fn write_bundle<W: Write + Seek>(
    writer: W,
    definitions: &[CubeDefinition],
) -> Result<W, StoreError> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(writer);

    let mut seen = Vec::with_capacity(definitions.len());
    for def in definitions {
        let entry = entry_name(&def.name)?;
        if seen.contains(&entry) {
            return Err(StoreError::InvalidFormat(format!(
                "cube '{}' appears more than once",
                def.name
            )));
        }
        zip.start_file(entry.as_str(), options)?;
        zip.write_all(serde_json::to_string_pretty(def)?.as_bytes())?;
        seen.push(entry);
    }

    let manifest = BundleManifest {
        format: BUNDLE_FORMAT.to_string(),
        version: BUNDLE_VERSION,
        cubes: definitions.iter().map(|d| d.name.clone()).collect(),
    };
    zip.start_file(MANIFEST_ENTRY, options)?;
    zip.write_all(serde_json::to_string_pretty(&manifest)?.as_bytes())?;

    let writer = zip.finish()?;
    log_debug!("STORE", "bundled {} cube(s)", definitions.len());
    Ok(writer)
}

pub fn export_bundle(path: &Path, definitions: &[CubeDefinition]) -> Result<(), StoreError> {
    let file = File::create(path)?;
    write_bundle(file, definitions)?;
    log_info!("STORE", "exported {} cube(s) to {}", definitions.len(), path.display());
    Ok(())
}

// ============================================================================
// IMPORT
// ============================================================================

/// Reads every cube listed in the manifest, in manifest order.
pub fn read_bundle<R: Read + Seek>(reader: R) -> Result<Vec<CubeDefinition>, StoreError> {
    let mut archive = ZipArchive::new(reader)?;
    let manifest: BundleManifest = serde_json::from_str(&read_entry(&mut archive, MANIFEST_ENTRY)?)?;

    if manifest.format != BUNDLE_FORMAT {
        return Err(StoreError::InvalidFormat(format!(
            "not a cube bundle (format '{}')",
            manifest.format
        )));
    }
    if manifest.version > BUNDLE_VERSION {
        return Err(StoreError::InvalidFormat(format!(
            "bundle version {} is newer than supported version {}",
            manifest.version, BUNDLE_VERSION
        )));
    }

    let mut definitions = Vec::with_capacity(manifest.cubes.len());
    for name in &manifest.cubes {
        let entry = entry_name(name)?;
        let def: CubeDefinition = serde_json::from_str(&read_entry(&mut archive, &entry)?)?;
        if !def.name.eq_ignore_ascii_case(name) {
            return Err(StoreError::InvalidFormat(format!(
                "{} holds cube '{}', manifest says '{}'",
                entry, def.name, name
            )));
        }
        definitions.push(def);
    }
    Ok(definitions)
}

pub fn import_bundle(path: &Path) -> Result<Vec<CubeDefinition>, StoreError> {
    let definitions = read_bundle(File::open(path)?)?;
    log_info!("STORE", "imported {} cube(s) from {}", definitions.len(), path.display());
    Ok(definitions)
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<String, StoreError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(StoreError::InvalidFormat(format!("bundle is missing {}", name)));
        }
        Err(e) => return Err(e.into()),
    };
    if entry.size() > MAX_ENTRY_BYTES {
        return Err(StoreError::InvalidFormat(format!("{} is too large", name)));
    }
    let mut text = String::with_capacity(entry.size() as usize);
    entry.take(MAX_ENTRY_BYTES).read_to_string(&mut text)?;
    Ok(text)
}
