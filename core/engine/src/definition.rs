//! FILENAME: core/engine/src/definition.rs
//! PURPOSE: Serializable form of a cube and conversion to and from `Cube`.
//! CONTEXT: This is what stores read and write. Column ids are kept so that
//! cell keys stay valid across a save/load cycle. Hand-written definitions
//! may omit ids and address cells by a `key` map of axis name to column
//! value (or rule name) instead.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::axis::{Axis, AxisType};
use crate::cell::Cell;
use crate::column::{Column, ColumnId, ColumnValue, META_NAME};
use crate::cube::Cube;
use crate::error::{CubeError, CubeResult};
use crate::key::CellKey;
use crate::logging::log_debug;
use crate::value::{CubeValue, ValueType};

// ============================================================================
// DEFINITION TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeDefinition {
    pub name: String,
    /// Value used when no cell and no column default applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<CellContent>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Json>,
    #[serde(default)]
    pub axes: Vec<AxisDefinition>,
    #[serde(default)]
    pub cells: Vec<CellEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub axis_type: AxisType,
    pub value_type: ValueType,
    #[serde(default)]
    pub has_default: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_column_id: Option<ColumnId>,
    #[serde(default)]
    pub multi_match: bool,
    /// RULE axes only; absent means the axis default (true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fire_all: Option<bool>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Json>,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ColumnId>,
    /// Scalar, `[low, high]`, set list, range text, or rule condition source.
    pub value: Json,
    /// Rule name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Json>,
}

/// A cell addressed by column ids or by a map of axis name to column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<ColumnId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<BTreeMap<String, Json>>,
    #[serde(flatten)]
    pub content: CellContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CellContent {
    Value {
        value: Json,
        /// Needed for values JSON cannot carry natively (dates, points).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value_type: Option<ValueType>,
    },
    Expression {
        source: String,
    },
}

impl CellContent {
    pub fn to_cell(&self) -> CubeResult<Cell> {
        match self {
            CellContent::Value { value, value_type: Some(value_type) } => {
                Ok(Cell::Value(value_type.from_json(value)?))
            }
            CellContent::Value { value, value_type: None } => Ok(Cell::Value(CubeValue::from_json(value))),
            CellContent::Expression { source } => Ok(Cell::expression(source.as_str())),
        }
    }

    pub fn from_cell(cell: &Cell) -> CubeResult<CellContent> {
        match cell {
            Cell::Value(value) => Ok(CellContent::Value {
                value: value.to_json(),
                value_type: match value {
                    CubeValue::Date(_) => Some(ValueType::Date),
                    CubeValue::Point(_) => Some(ValueType::Comparable),
                    _ => None,
                },
            }),
            Cell::Executable(exec) => match exec.source() {
                Some(source) => Ok(CellContent::Expression {
                    source: source.to_string(),
                }),
                None => Err(CubeError::Definition(format!(
                    "cell '{}' has no source text and cannot be saved",
                    exec.signature()
                ))),
            },
        }
    }
}

impl CubeDefinition {
    pub fn from_json_str(json: &str) -> CubeResult<Self> {
        serde_json::from_str(json).map_err(|e| CubeError::Definition(e.to_string()))
    }

    pub fn to_json_string(&self) -> CubeResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CubeError::Definition(e.to_string()))
    }
}

// ============================================================================
// CONVERSION
// ============================================================================

fn meta_from_json(meta: &BTreeMap<String, Json>) -> BTreeMap<String, CubeValue> {
    meta.iter()
        .map(|(k, v)| (k.clone(), CubeValue::from_json(v)))
        .collect()
}

fn meta_to_json<'m>(meta: impl Iterator<Item = (&'m String, &'m CubeValue)>) -> BTreeMap<String, Json> {
    meta.map(|(k, v)| (k.clone(), v.to_json())).collect()
}

impl Cube {
    /// Builds a cube from its definition: axes first, then cells.
    pub fn from_definition(def: &CubeDefinition) -> CubeResult<Cube> {
        let mut cube = Cube::new(def.name.as_str());

        // Ids given in the definition are kept; new ones start above them.
        let max_id = def
            .axes
            .iter()
            .flat_map(|a| a.columns.iter().filter_map(|c| c.id).chain(a.default_column_id))
            .max();
        if let Some(max_id) = max_id {
            cube.ids().advance_past(max_id);
        }

        for axis_def in &def.axes {
            let axis = build_axis(&cube, axis_def)?;
            cube.attach_axis(axis)?;
        }

        for entry in &def.cells {
            cube.set_cell_entry(entry)?;
        }

        if let Some(default) = &def.default_value {
            cube.set_default_cell_value(Some(default.to_cell()?));
        }
        for (k, v) in &def.meta {
            cube.set_meta(k.as_str(), CubeValue::from_json(v));
        }

        log_debug!(
            "CUBE",
            "loaded '{}': {} axes, {} cells",
            def.name,
            def.axes.len(),
            cube.cell_count()
        );
        Ok(cube)
    }

    /// Stores one definition cell entry. Returns the ids it was stored under.
    pub fn set_cell_entry(&mut self, entry: &CellEntry) -> CubeResult<Vec<ColumnId>> {
        let ids = match (&entry.ids, &entry.key) {
            (Some(ids), _) => ids.clone(),
            (None, Some(key)) => resolve_key(self, key)?,
            (None, None) => {
                return Err(CubeError::Definition(format!(
                    "cell entry for cube '{}' has neither ids nor key",
                    self.name()
                )))
            }
        };
        self.set_cell(&ids, entry.content.to_cell()?)?;
        Ok(ids)
    }

    /// Snapshot of the cube as a definition. Cells are written in key order.
    /// Fails if a cell has no source text (native cells).
    pub fn to_definition(&self) -> CubeResult<CubeDefinition> {
        let axes = self
            .axes()
            .iter()
            .map(axis_definition)
            .collect::<CubeResult<Vec<_>>>()?;

        let mut cells: Vec<(&CellKey, &Cell)> = self.cells().collect();
        cells.sort_by(|a, b| a.0.cmp(b.0));
        let cells = cells
            .into_iter()
            .map(|(key, cell)| {
                Ok(CellEntry {
                    ids: Some(key.ids().to_vec()),
                    key: None,
                    content: CellContent::from_cell(cell)?,
                })
            })
            .collect::<CubeResult<Vec<_>>>()?;

        Ok(CubeDefinition {
            name: self.name().to_string(),
            default_value: self
                .default_cell_value()
                .map(CellContent::from_cell)
                .transpose()?,
            meta: meta_to_json(self.meta().iter()),
            axes,
            cells,
        })
    }
}

fn build_axis(cube: &Cube, def: &AxisDefinition) -> CubeResult<Axis> {
    let mut axis = Axis::with_ids(
        def.name.as_str(),
        def.axis_type,
        def.value_type,
        false,
        cube.ids().clone(),
    )?;
    if def.has_default {
        match def.default_column_id {
            Some(id) => axis.install_default(id)?,
            None => {
                axis.set_has_default(true)?;
            }
        }
    }
    if def.multi_match {
        axis.set_multi_match(true)?;
    }
    if let Some(fire_all) = def.fire_all {
        axis.set_fire_all(fire_all)?;
    }
    for (k, v) in &def.meta {
        axis.set_meta(k.as_str(), CubeValue::from_json(v));
    }

    for column in &def.columns {
        let value = ColumnValue::from_json(def.axis_type, def.value_type, &column.value)?;
        let mut meta = meta_from_json(&column.meta);
        if let Some(name) = &column.name {
            meta.insert(META_NAME.to_string(), CubeValue::from(name.as_str()));
        }
        axis.insert_column(value, column.id, meta)?;
    }
    Ok(axis)
}

fn axis_definition(axis: &Axis) -> CubeResult<AxisDefinition> {
    let columns = axis
        .columns_without_default()
        .iter()
        .map(column_definition)
        .collect::<CubeResult<Vec<_>>>()?;
    Ok(AxisDefinition {
        name: axis.name().to_string(),
        axis_type: axis.axis_type(),
        value_type: axis.value_type(),
        has_default: axis.has_default(),
        default_column_id: axis.default_column_id(),
        multi_match: axis.multi_match(),
        fire_all: (axis.axis_type() == AxisType::Rule).then(|| axis.fire_all()),
        meta: meta_to_json(axis.meta().iter()),
        columns,
    })
}

fn column_definition(column: &Column) -> CubeResult<ColumnDefinition> {
    Ok(ColumnDefinition {
        id: Some(column.id()),
        value: column.value().to_json()?,
        name: column.name().map(str::to_string),
        meta: meta_to_json(column.meta().iter().filter(|(k, _)| k.as_str() != META_NAME)),
    })
}

/// Column ids for a `key` map. Axes missing from the map use their default.
fn resolve_key(cube: &Cube, key: &BTreeMap<String, Json>) -> CubeResult<Vec<ColumnId>> {
    for name in key.keys() {
        if cube.axis(name).is_none() {
            return Err(CubeError::Definition(format!(
                "cell key names unknown axis '{}' in cube '{}'",
                name,
                cube.name()
            )));
        }
    }

    cube.axes()
        .iter()
        .map(|axis| {
            let value = key
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(axis.name()))
                .map(|(_, v)| CubeValue::from_json(v));
            let id = match &value {
                None => axis.default_column_id(),
                Some(v) => axis.locate_column(v).or_else(|| match v {
                    CubeValue::Text(text) => axis.find_column_by_name(text).map(Column::id),
                    _ => None,
                }),
            };
            id.ok_or_else(|| {
                CubeError::Definition(format!(
                    "cell key {} has no column on axis '{}' of cube '{}'",
                    value.map_or_else(|| "(missing)".to_string(), |v| v.to_string()),
                    axis.name(),
                    cube.name()
                ))
            })
        })
        .collect()
}
