//! FILENAME: app/src/commands.rs
// PURPOSE: Service commands over the shared cube manager.
// CONTEXT: Every command takes the shared state and returns
// `Result<T, String>`; engine errors are flattened to their display text.

use std::path::Path;

use cube_engine::{
    log_debug, log_info, AxisType, Cell, ColumnId, Coordinate, CubeDefinition, CubeValue, Output,
};

use crate::api_types::{
    AddColumnParams, BundleParams, CellParams, ColumnData, ColumnParams, CubeParams, CubeSummary,
    EnsureColumnParams, ImportBundleParams, LoadCubeParams, MapEntry, ResolveMapParams,
    ResolveParams, ResolveResult, SetCellParams,
};
use crate::AppState;

fn coordinate(json: &serde_json::Value) -> Result<Coordinate, String> {
    Coordinate::from_json(json).map_err(|e| e.to_string())
}

// ============================================================================
// RESOLUTION
// ============================================================================

pub fn resolve_cell(state: &AppState, params: ResolveParams) -> Result<ResolveResult, String> {
    log_debug!("CMD", "resolve_cell cube={} coordinate={}", params.cube, params.coordinate);
    let coord = coordinate(&params.coordinate)?;
    let mut output = Output::new();
    let value = state
        .manager
        .resolve(&params.cube, &coord, &mut output)
        .map_err(|e| e.to_string())?;
    Ok(ResolveResult::new(value, &output))
}

/// Resolves once per value of `axis`, with the rest of the coordinate fixed.
pub fn resolve_map(state: &AppState, params: ResolveMapParams) -> Result<Vec<MapEntry>, String> {
    log_debug!("CMD", "resolve_map cube={} axis={}", params.cube, params.axis);
    let base = coordinate(&params.coordinate)?;
    let cube = state.manager.get_cube(&params.cube).map_err(|e| e.to_string())?;
    if cube.axis(&params.axis).is_none() {
        return Err(format!("Axis '{}' not found in cube '{}'", params.axis, params.cube));
    }

    params
        .values
        .iter()
        .map(|key| -> Result<MapEntry, String> {
            let coord = base.overlay([(params.axis.clone(), CubeValue::from_json(key))]);
            let mut output = Output::new();
            let value = state
                .manager
                .resolve(&params.cube, &coord, &mut output)
                .map_err(|e| e.to_string())?;
            Ok(MapEntry {
                key: key.clone(),
                value: value.map_or(serde_json::Value::Null, |v| v.to_json()),
            })
        })
        .collect()
}

// ============================================================================
// CUBES
// ============================================================================

pub fn list_cubes(state: &AppState) -> Result<Vec<String>, String> {
    state.manager.list_cubes().map_err(|e| e.to_string())
}

pub fn describe_cube(state: &AppState, params: CubeParams) -> Result<CubeSummary, String> {
    let cube = state.manager.get_cube(&params.cube).map_err(|e| e.to_string())?;
    Ok(CubeSummary::from(cube.as_ref()))
}

/// Loads a definition into the manager, replacing any cube of that name.
pub fn load_cube_json(state: &AppState, params: LoadCubeParams) -> Result<CubeSummary, String> {
    let def = CubeDefinition::from_json_str(&params.json).map_err(|e| e.to_string())?;
    let cube = state.manager.add_definition(&def).map_err(|e| e.to_string())?;
    log_info!("CMD", "loaded cube '{}' ({} cells)", cube.name(), cube.cell_count());
    Ok(CubeSummary::from(cube.as_ref()))
}

pub fn export_cube_json(state: &AppState, params: CubeParams) -> Result<String, String> {
    let cube = state.manager.get_cube(&params.cube).map_err(|e| e.to_string())?;
    cube.to_definition()
        .and_then(|def| def.to_json_string())
        .map_err(|e| e.to_string())
}

pub fn save_cube(state: &AppState, params: CubeParams) -> Result<(), String> {
    state.manager.save_cube(&params.cube).map_err(|e| e.to_string())?;
    log_info!("CMD", "saved cube '{}'", params.cube);
    Ok(())
}

pub fn reload_cube(state: &AppState, params: CubeParams) -> Result<CubeSummary, String> {
    let cube = state.manager.reload_cube(&params.cube).map_err(|e| e.to_string())?;
    Ok(CubeSummary::from(cube.as_ref()))
}

/// Drops a cube from memory. The store is untouched.
pub fn unload_cube(state: &AppState, params: CubeParams) -> Result<bool, String> {
    Ok(state.manager.remove_cube(&params.cube).is_some())
}

// ============================================================================
// COLUMNS
// ============================================================================

pub fn add_column(state: &AppState, params: AddColumnParams) -> Result<ColumnData, String> {
    log_debug!("CMD", "add_column {}.{} value={}", params.cube, params.axis, params.value);
    state
        .manager
        .update_cube(&params.cube, |cube| {
            let axis_type = cube
                .axis(&params.axis)
                .map(|a| a.axis_type())
                .ok_or_else(|| cube_engine::CubeError::InvalidAxis(params.axis.clone()))?;

            let id = match (axis_type, &params.name, &params.value) {
                (AxisType::Rule, Some(name), serde_json::Value::String(source)) => {
                    cube.add_rule_column(&params.axis, name, Cell::expression(source.as_str()))?
                }
                (AxisType::Rule, Some(name), other) => cube.add_rule_column(
                    &params.axis,
                    name,
                    Cell::Value(CubeValue::from_json(other)),
                )?,
                _ => cube.add_column(&params.axis, CubeValue::from_json(&params.value))?,
            };
            for (key, value) in &params.meta {
                cube.set_column_meta(&params.axis, id, key, CubeValue::from_json(value))?;
            }

            let column = cube
                .axis(&params.axis)
                .and_then(|a| a.column(id))
                .map(ColumnData::from)
                .ok_or_else(|| cube_engine::CubeError::NotFound(format!("column {}", id)))?;
            Ok(column)
        })
        .map_err(|e| e.to_string())
}

/// Returns the id of the column matching `value` exactly, adding it if absent.
pub fn ensure_column(state: &AppState, params: EnsureColumnParams) -> Result<ColumnId, String> {
    state
        .manager
        .ensure_column(&params.cube, &params.axis, CubeValue::from_json(&params.value))
        .map_err(|e| e.to_string())
}

/// Deletes a column and every cell stored on it.
pub fn delete_column(state: &AppState, params: ColumnParams) -> Result<(), String> {
    state
        .manager
        .update_cube(&params.cube, |cube| cube.delete_column(&params.axis, params.id))
        .map_err(|e| e.to_string())
}

// ============================================================================
// CELLS
// ============================================================================

/// Stores a cell. Returns the column ids it was stored under.
pub fn set_cell(state: &AppState, params: SetCellParams) -> Result<Vec<ColumnId>, String> {
    state
        .manager
        .update_cube(&params.cube, |cube| cube.set_cell_entry(&params.entry))
        .map_err(|e| e.to_string())
}

/// Removes the cell a coordinate maps to. Returns whether one was stored.
pub fn remove_cell(state: &AppState, params: CellParams) -> Result<bool, String> {
    let coord = coordinate(&params.coordinate)?;
    state
        .manager
        .update_cube(&params.cube, |cube| {
            let key = cube.key_for_coordinate(&coord)?;
            Ok(cube.remove_cell(key.ids()).is_some())
        })
        .map_err(|e| e.to_string())
}

// ============================================================================
// BUNDLES
// ============================================================================

/// Writes cubes to a zip bundle. Returns how many were written.
pub fn export_bundle(state: &AppState, params: BundleParams) -> Result<usize, String> {
    let names = match params.cubes {
        Some(names) => names,
        None => state.manager.list_cubes().map_err(|e| e.to_string())?,
    };

    let definitions = names
        .iter()
        .map(|name| {
            state
                .manager
                .get_cube(name)
                .and_then(|cube| cube.to_definition())
                .map_err(|e| e.to_string())
        })
        .collect::<Result<Vec<_>, String>>()?;

    cube_store::export_bundle(Path::new(&params.path), &definitions).map_err(|e| e.to_string())?;
    Ok(definitions.len())
}

/// Loads every cube in a bundle. Returns the imported names.
pub fn import_bundle(state: &AppState, params: ImportBundleParams) -> Result<Vec<String>, String> {
    let definitions =
        cube_store::import_bundle(Path::new(&params.path)).map_err(|e| e.to_string())?;
    let mut names = Vec::with_capacity(definitions.len());
    for def in &definitions {
        state.manager.add_definition(def).map_err(|e| e.to_string())?;
        if params.save {
            state.manager.save_cube(&def.name).map_err(|e| e.to_string())?;
        }
        names.push(def.name.clone());
    }
    log_info!("CMD", "imported {} cube(s) from {}", names.len(), params.path);
    Ok(names)
}
