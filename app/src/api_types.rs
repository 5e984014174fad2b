//! FILENAME: app/src/api_types.rs
// PURPOSE: Request and response types for the command layer.
// CONTEXT: All structs use camelCase serialization, matching the wire format
// clients of the service already speak.

use std::collections::BTreeMap;

use cube_engine::{Axis, AxisType, CellEntry, Column, ColumnId, Cube, CubeValue, Output, ValueType};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

// ============================================================================
// CUBE DESCRIPTIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnData {
    pub id: ColumnId,
    /// Display form of the column value (rule columns show their name).
    pub display: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub is_default: bool,
}

impl From<&Column> for ColumnData {
    fn from(column: &Column) -> Self {
        ColumnData {
            id: column.id(),
            display: column.display(),
            name: column.name().map(str::to_string),
            is_default: column.is_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxisData {
    pub name: String,
    pub axis_type: AxisType,
    pub value_type: ValueType,
    pub has_default: bool,
    pub multi_match: bool,
    pub fire_all: bool,
    pub columns: Vec<ColumnData>,
}

impl From<&Axis> for AxisData {
    fn from(axis: &Axis) -> Self {
        AxisData {
            name: axis.name().to_string(),
            axis_type: axis.axis_type(),
            value_type: axis.value_type(),
            has_default: axis.has_default(),
            multi_match: axis.multi_match(),
            fire_all: axis.fire_all(),
            columns: axis.columns().into_iter().map(ColumnData::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CubeSummary {
    pub name: String,
    pub axes: Vec<AxisData>,
    pub cell_count: usize,
    pub has_default_value: bool,
    /// Axes a coordinate must name (non-rule axes without a default).
    pub required_scope: Vec<String>,
}

impl From<&Cube> for CubeSummary {
    fn from(cube: &Cube) -> Self {
        CubeSummary {
            name: cube.name().to_string(),
            axes: cube.axes().iter().map(AxisData::from).collect(),
            cell_count: cube.cell_count(),
            has_default_value: cube.default_cell_value().is_some(),
            required_scope: cube.required_scope(),
        }
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResult {
    /// Null when nothing resolved.
    pub value: Json,
    pub found: bool,
    pub rules_executed: usize,
    /// Step labels in execution order, e.g. `tier1/region2`.
    pub steps: Vec<String>,
    /// Full output map: values, return, rule trace and failures.
    pub output: Json,
}

impl ResolveResult {
    pub fn new(value: Option<CubeValue>, output: &Output) -> Self {
        ResolveResult {
            found: value.is_some(),
            value: value.map_or(Json::Null, |v| v.to_json()),
            rules_executed: output.rule_info.rules_executed,
            steps: output.rule_info.labels("/"),
            output: output.to_json(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapEntry {
    pub key: Json,
    pub value: Json,
}

// ============================================================================
// COMMAND PARAMETERS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveParams {
    pub cube: String,
    #[serde(default)]
    pub coordinate: Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveMapParams {
    pub cube: String,
    #[serde(default)]
    pub coordinate: Json,
    pub axis: String,
    pub values: Vec<Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddColumnParams {
    pub cube: String,
    pub axis: String,
    /// Column value; for rule axes, the condition source.
    pub value: Json,
    /// Rule name (rule axes only).
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub meta: BTreeMap<String, Json>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnParams {
    pub cube: String,
    pub axis: String,
    pub id: ColumnId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnsureColumnParams {
    pub cube: String,
    pub axis: String,
    pub value: Json,
}

/// A cell addressed by `ids` or by a `key` map of axis name to column value,
/// with the same content form as cube definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetCellParams {
    pub cube: String,
    #[serde(flatten)]
    pub entry: CellEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellParams {
    pub cube: String,
    #[serde(default)]
    pub coordinate: Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CubeParams {
    pub cube: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadCubeParams {
    /// Cube definition JSON text.
    pub json: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleParams {
    pub path: String,
    /// Cubes to export; all stored and loaded cubes when absent.
    #[serde(default)]
    pub cubes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBundleParams {
    pub path: String,
    /// Also write imported cubes to the store.
    #[serde(default)]
    pub save: bool,
}
