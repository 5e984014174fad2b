//! FILENAME: core/engine/src/cube.rs
//! PURPOSE: A named set of axes and the cells addressed by them.
//! CONTEXT: Cells are keyed by the unordered set of column ids they sit
//! at, one id per axis. Resolving a coordinate binds every axis, then
//! either looks up a single cell or hands the bindings to the
//! `RuleExecutor` when a rule axis or a multi-match axis is involved.
//! Resolution never mutates the cube.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::axis::{Axis, AxisType};
use crate::binding::Binding;
use crate::cell::Cell;
use crate::column::{Column, ColumnId, IdSource};
use crate::config::EngineConfig;
use crate::context::{Coordinate, ExecutionContext};
use crate::error::{CubeError, CubeResult};
use crate::executable::{run_cell, ExecutionSignal};
use crate::key::CellKey;
use crate::logging::{log_debug, log_enter, log_exit, log_warn};
use crate::manager::CubeManager;
use crate::output::Output;
use crate::rule::RuleExecutor;
use crate::value::CubeValue;

#[derive(Debug, Clone)]
pub struct Cube {
    name: String,
    axes: Vec<Axis>,
    /// Lowercased axis name to position in `axes`.
    axis_index: FxHashMap<String, usize>,
    /// Column id (default columns included) to position in `axes`.
    column_index: FxHashMap<ColumnId, usize>,
    cells: FxHashMap<CellKey, Cell>,
    default_cell_value: Option<Cell>,
    meta: BTreeMap<String, CubeValue>,
    ids: IdSource,
}

impl Cube {
    pub fn new(name: impl Into<String>) -> Self {
        Cube {
            name: name.into(),
            axes: Vec::new(),
            axis_index: FxHashMap::default(),
            column_index: FxHashMap::default(),
            cells: FxHashMap::default(),
            default_cell_value: None,
            meta: BTreeMap::new(),
            ids: IdSource::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn meta(&self) -> &BTreeMap<String, CubeValue> {
        &self.meta
    }

    pub fn set_meta(&mut self, key: impl Into<String>, value: CubeValue) {
        let key = key.into();
        if value.is_null() {
            self.meta.remove(&key);
        } else {
            self.meta.insert(key, value);
        }
    }

    pub fn default_cell_value(&self) -> Option<&Cell> {
        self.default_cell_value.as_ref()
    }

    pub fn set_default_cell_value(&mut self, cell: Option<Cell>) {
        self.default_cell_value = cell;
    }

    pub(crate) fn ids(&self) -> &IdSource {
        &self.ids
    }

    // ========================================================================
    // AXES
    // ========================================================================

    /// Axes in declared order.
    pub fn axes(&self) -> &[Axis] {
        &self.axes
    }

    pub fn axis_names(&self) -> Vec<&str> {
        self.axes.iter().map(Axis::name).collect()
    }

    pub fn axis(&self, name: &str) -> Option<&Axis> {
        self.axis_position(name).map(|i| &self.axes[i])
    }

    fn axis_position(&self, name: &str) -> Option<usize> {
        self.axis_index.get(&name.to_lowercase()).copied()
    }

    fn require_axis(&self, name: &str) -> CubeResult<usize> {
        self.axis_position(name).ok_or_else(|| {
            CubeError::InvalidAxis(format!("axis '{}' not found in cube '{}'", name, self.name))
        })
    }

    fn rebuild_index(&mut self) {
        self.axis_index = self
            .axes
            .iter()
            .enumerate()
            .map(|(i, axis)| (axis.name().to_lowercase(), i))
            .collect();
        self.column_index = self
            .axes
            .iter()
            .enumerate()
            .flat_map(|(i, axis)| axis.columns().into_iter().map(move |c| (c.id(), i)))
            .collect();
    }

    /// Position of the axis owning column `id`.
    fn column_axis(&self, id: ColumnId) -> Option<usize> {
        self.column_index.get(&id).copied()
    }

    /// Adds an axis, giving its columns fresh ids from this cube. Existing
    /// cells move to the new axis's default column; without a default they
    /// are dropped.
    pub fn add_axis(&mut self, mut axis: Axis) -> CubeResult<()> {
        if self.axis_position(axis.name()).is_some() {
            return Err(CubeError::InvalidAxis(format!(
                "axis '{}' already exists in cube '{}'",
                axis.name(),
                self.name
            )));
        }
        axis.reassign_ids(self.ids.clone());

        if !self.cells.is_empty() {
            match axis.default_column_id() {
                Some(default_id) => {
                    let cells = std::mem::take(&mut self.cells);
                    self.cells = cells
                        .into_iter()
                        .map(|(key, cell)| (key.with(default_id), cell))
                        .collect();
                }
                None => {
                    log_warn!(
                        "CUBE",
                        "adding axis '{}' without default to '{}' drops {} cells",
                        axis.name(),
                        self.name,
                        self.cells.len()
                    );
                    self.cells.clear();
                }
            }
        }

        log_debug!("CUBE", "added axis '{}' to '{}'", axis.name(), self.name);
        self.axes.push(axis);
        self.rebuild_index();
        Ok(())
    }

    /// Adds an axis whose column ids were drawn from this cube's counter.
    /// Column ids must be unique across the whole cube.
    pub(crate) fn attach_axis(&mut self, axis: Axis) -> CubeResult<()> {
        if self.axis_position(axis.name()).is_some() {
            return Err(CubeError::InvalidAxis(format!(
                "axis '{}' already exists in cube '{}'",
                axis.name(),
                self.name
            )));
        }
        for column in axis.columns() {
            if let Some(pos) = self.column_axis(column.id()) {
                return Err(CubeError::Definition(format!(
                    "column id {} on axis '{}' is already used by axis '{}' in cube '{}'",
                    column.id(),
                    axis.name(),
                    self.axes[pos].name(),
                    self.name
                )));
            }
        }
        self.axes.push(axis);
        self.rebuild_index();
        Ok(())
    }

    /// Removes an axis and every cell (all cells are keyed by one of its columns).
    pub fn delete_axis(&mut self, name: &str) -> CubeResult<Axis> {
        let pos = self.require_axis(name)?;
        let axis = self.axes.remove(pos);
        self.rebuild_index();
        if !self.cells.is_empty() {
            log_debug!("CUBE", "deleting axis '{}' clears {} cells", axis.name(), self.cells.len());
            self.cells.clear();
        }
        Ok(axis)
    }

    pub fn rename_axis(&mut self, old_name: &str, new_name: &str) -> CubeResult<()> {
        let pos = self.require_axis(old_name)?;
        if let Some(existing) = self.axis_position(new_name) {
            if existing != pos {
                return Err(CubeError::InvalidAxis(format!(
                    "axis '{}' already exists in cube '{}'",
                    new_name, self.name
                )));
            }
        }
        self.axes[pos].set_name(new_name);
        self.rebuild_index();
        Ok(())
    }

    pub(crate) fn axis_mut(&mut self, name: &str) -> CubeResult<&mut Axis> {
        let pos = self.require_axis(name)?;
        Ok(&mut self.axes[pos])
    }

    // ------------------------------------------------------------------
    // Column mutation through the cube (keeps cells consistent)
    // ------------------------------------------------------------------

    pub fn add_column(&mut self, axis: &str, value: impl Into<CubeValue>) -> CubeResult<ColumnId> {
        let pos = self.require_axis(axis)?;
        let id = self.axes[pos].add_column(value).map(Column::id)?;
        self.column_index.insert(id, pos);
        Ok(id)
    }

    pub fn add_column_text(&mut self, axis: &str, text: &str) -> CubeResult<ColumnId> {
        let pos = self.require_axis(axis)?;
        let id = self.axes[pos].add_column_text(text).map(Column::id)?;
        self.column_index.insert(id, pos);
        Ok(id)
    }

    pub fn add_rule_column(&mut self, axis: &str, name: &str, condition: Cell) -> CubeResult<ColumnId> {
        let pos = self.require_axis(axis)?;
        let id = self.axes[pos]
            .add_rule_column(name, condition)
            .map(Column::id)?;
        self.column_index.insert(id, pos);
        Ok(id)
    }

    pub fn update_column(&mut self, axis: &str, id: ColumnId, value: impl Into<CubeValue>) -> CubeResult<()> {
        self.axis_mut(axis)?.update_column(id, value)
    }

    pub fn set_column_meta(&mut self, axis: &str, id: ColumnId, key: &str, value: CubeValue) -> CubeResult<()> {
        self.axis_mut(axis)?.set_column_meta(id, key, value)
    }

    pub fn set_column_order(&mut self, axis: &str, id: ColumnId, order: i64) -> CubeResult<()> {
        self.axis_mut(axis)?.set_column_order(id, order)
    }

    pub fn set_axis_multi_match(&mut self, axis: &str, multi_match: bool) -> CubeResult<()> {
        self.axis_mut(axis)?.set_multi_match(multi_match)
    }

    pub fn set_axis_fire_all(&mut self, axis: &str, fire_all: bool) -> CubeResult<()> {
        self.axis_mut(axis)?.set_fire_all(fire_all)
    }

    /// Deletes a column and every cell keyed by it.
    pub fn delete_column(&mut self, axis: &str, id: ColumnId) -> CubeResult<()> {
        self.axis_mut(axis)?.delete_column(id)?;
        self.column_index.remove(&id);
        self.purge_column(id);
        Ok(())
    }

    /// Adds or removes an axis's default column; removal purges its cells.
    pub fn set_axis_default(&mut self, axis: &str, has_default: bool) -> CubeResult<Option<ColumnId>> {
        let pos = self.require_axis(axis)?;
        let changed = self.axes[pos].set_has_default(has_default)?;
        if let Some(id) = changed {
            if has_default {
                self.column_index.insert(id, pos);
            } else {
                self.column_index.remove(&id);
                self.purge_column(id);
            }
        }
        Ok(changed)
    }

    fn purge_column(&mut self, id: ColumnId) {
        let before = self.cells.len();
        self.cells.retain(|key, _| !key.contains(id));
        let removed = before - self.cells.len();
        if removed > 0 {
            log_debug!("CUBE", "removed {} cells keyed by column {} in '{}'", removed, id, self.name);
        }
    }

    /// Axes a caller must supply: non-rule axes without a default column.
    pub fn required_scope(&self) -> Vec<String> {
        self.axes
            .iter()
            .filter(|a| a.axis_type() != AxisType::Rule && !a.has_default())
            .map(|a| a.name().to_string())
            .collect()
    }

    pub fn optional_scope(&self) -> Vec<String> {
        self.axes
            .iter()
            .filter(|a| a.axis_type() == AxisType::Rule || a.has_default())
            .map(|a| a.name().to_string())
            .collect()
    }

    // ========================================================================
    // CELLS
    // ========================================================================

    /// Checks that `ids` names exactly one column on every axis.
    fn validate_key(&self, ids: &[ColumnId]) -> CubeResult<CellKey> {
        let key = CellKey::new(ids.iter().copied());
        if key.len() != ids.len() {
            return Err(CubeError::InvalidCoordinate(format!(
                "duplicate column ids in {:?}",
                ids
            )));
        }
        let mut seen = vec![false; self.axes.len()];
        for &id in key.ids() {
            let pos = self.column_axis(id).ok_or_else(|| {
                CubeError::InvalidCoordinate(format!(
                    "column {} does not exist in cube '{}'",
                    id, self.name
                ))
            })?;
            if seen[pos] {
                return Err(CubeError::InvalidCoordinate(format!(
                    "more than one column given for axis '{}'",
                    self.axes[pos].name()
                )));
            }
            seen[pos] = true;
        }
        if let Some(pos) = seen.iter().position(|s| !s) {
            return Err(CubeError::InvalidCoordinate(format!(
                "no column given for axis '{}'",
                self.axes[pos].name()
            )));
        }
        Ok(key)
    }

    pub fn set_cell(&mut self, ids: &[ColumnId], cell: impl Into<Cell>) -> CubeResult<()> {
        let key = self.validate_key(ids)?;
        self.cells.insert(key, cell.into());
        Ok(())
    }

    /// Stores a cell at the columns a coordinate names. Rule axes take a rule
    /// name (or nothing, for the default column).
    pub fn set_cell_by_coordinate(&mut self, coordinate: &Coordinate, cell: impl Into<Cell>) -> CubeResult<CellKey> {
        let key = self.key_for_coordinate(coordinate)?;
        self.cells.insert(key.clone(), cell.into());
        Ok(key)
    }

    /// The cell key a coordinate names, without evaluating rule conditions.
    pub fn key_for_coordinate(&self, coordinate: &Coordinate) -> CubeResult<CellKey> {
        let mut ids = Vec::with_capacity(self.axes.len());
        for axis in &self.axes {
            let value = coordinate.get(axis.name());
            let id = match axis.axis_type() {
                AxisType::Rule => match value {
                    None | Some(CubeValue::Null) => axis.default_column_id(),
                    Some(v) => axis.locate_column(v),
                },
                _ => {
                    let found = axis.find_columns(value)?;
                    if found.len() > 1 {
                        return Err(CubeError::InvalidCoordinate(format!(
                            "value matches {} columns on axis '{}'",
                            found.len(),
                            axis.name()
                        )));
                    }
                    found.first().copied()
                }
            };
            let id = id.ok_or_else(|| self.not_found(axis, value))?;
            ids.push(id);
        }
        Ok(CellKey::new(ids))
    }

    fn not_found(&self, axis: &Axis, value: Option<&CubeValue>) -> CubeError {
        CubeError::CoordinateNotFound {
            cube: self.name.clone(),
            axis: axis.name().to_string(),
            value: value.map_or_else(|| "null".to_string(), |v| v.to_string()),
        }
    }

    pub fn remove_cell(&mut self, ids: &[ColumnId]) -> Option<Cell> {
        self.cells.remove(&CellKey::new(ids.iter().copied()))
    }

    pub fn contains_cell(&self, ids: &[ColumnId]) -> bool {
        self.cells.contains_key(&CellKey::new(ids.iter().copied()))
    }

    pub fn cell_by_ids(&self, ids: &[ColumnId]) -> Option<&Cell> {
        self.cells.get(&CellKey::new(ids.iter().copied()))
    }

    /// The stored cell at a coordinate, without executing anything.
    pub fn get_cell_no_execute(&self, coordinate: &Coordinate) -> CubeResult<Option<&Cell>> {
        let key = self.key_for_coordinate(coordinate)?;
        Ok(self.cells.get(&key))
    }

    pub fn populated_keys(&self) -> impl Iterator<Item = &CellKey> {
        self.cells.keys()
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &Cell)> {
        self.cells.iter()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn clear_cells(&mut self) {
        self.cells.clear();
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Resolves a coordinate with the default configuration. `Ok(None)`
    /// means no cell, no column default and no cube default applied.
    pub fn resolve_cell(&self, coordinate: &Coordinate) -> CubeResult<Option<CubeValue>> {
        let mut output = Output::new();
        self.resolve_cell_with(coordinate, &mut output)
    }

    /// Like `resolve_cell`, collecting user values and the rule trace in `output`.
    pub fn resolve_cell_with(&self, coordinate: &Coordinate, output: &mut Output) -> CubeResult<Option<CubeValue>> {
        self.resolve_in(
            coordinate.clone(),
            output,
            0,
            None,
            ExecutionContext::default_config(),
        )
    }

    pub fn resolve_with_config(
        &self,
        coordinate: &Coordinate,
        output: &mut Output,
        config: &EngineConfig,
    ) -> CubeResult<Option<CubeValue>> {
        self.resolve_in(coordinate.clone(), output, 0, None, config)
    }

    pub(crate) fn resolve_in(
        &self,
        coordinate: Coordinate,
        output: &mut Output,
        depth: usize,
        manager: Option<&CubeManager>,
        config: &EngineConfig,
    ) -> CubeResult<Option<CubeValue>> {
        log_enter!("CUBE", "resolve_cell", "{} at {}", self.name, coordinate);
        let mut ctx = ExecutionContext::nested(self, coordinate, output, depth, manager, config);

        let bindings = match self.bind(&mut ctx)? {
            Some(bindings) => bindings,
            None => {
                log_exit!("CUBE", "resolve_cell", "{} no rule fired", self.name);
                return Ok(None);
            }
        };

        if bindings.iter().any(Binding::is_enumerated) {
            return RuleExecutor::new(self, bindings).run(&mut ctx);
        }

        let ids: Vec<ColumnId> = bindings.iter().map(|b| b.column_ids[0]).collect();
        let result = match self.execute_at(&mut ctx, &ids)? {
            None => None,
            Some(ExecutionSignal::Continue(value)) => {
                ctx.output_mut().return_value = value.clone();
                Some(value)
            }
            Some(ExecutionSignal::Stop) => None,
            Some(ExecutionSignal::Jump(_)) => {
                return Err(CubeError::InvalidJump {
                    cube: self.name.clone(),
                    message: "jump raised outside of rule execution".to_string(),
                    partial: Box::new(ctx.output().rule_info.clone()),
                })
            }
        };
        log_exit!("CUBE", "resolve_cell", "{} -> {:?}", self.name, result);
        Ok(result)
    }

    /// Binds every axis in declared order. Returns `None` when a rule axis
    /// has nothing to run.
    pub(crate) fn bind(&self, ctx: &mut ExecutionContext<'_>) -> CubeResult<Option<Vec<Binding>>> {
        let mut bindings = Vec::with_capacity(self.axes.len());
        for axis in &self.axes {
            let column_ids = match axis.axis_type() {
                AxisType::Rule => {
                    let start = match ctx.input(axis.name()) {
                        None | Some(CubeValue::Null) => None,
                        Some(v) => Some(
                            axis.locate_column(v)
                                .ok_or_else(|| self.not_found(axis, Some(v)))?,
                        ),
                    };
                    let ids = axis
                        .find_rule_columns(ctx, start, false)
                        .map_err(|e| self.execution_error(ctx, e))?;
                    if ids.is_empty() {
                        log_debug!("RULE", "no rule fired on axis '{}' of '{}'", axis.name(), self.name);
                        return Ok(None);
                    }
                    ids
                }
                _ => {
                    let value = ctx.input(axis.name());
                    let ids = axis.find_columns(value)?;
                    if ids.is_empty() {
                        return Err(self.not_found(axis, value));
                    }
                    ids
                }
            };
            bindings.push(Binding::new(axis.name(), axis.axis_type(), column_ids));
        }
        Ok(Some(bindings))
    }

    /// Looks up and runs the cell at `ids`, falling back to the first bound
    /// column's `default_value` (declared axis order) and then the cube
    /// default. `Ok(None)` when nothing applies.
    pub(crate) fn execute_at(
        &self,
        ctx: &mut ExecutionContext<'_>,
        ids: &[ColumnId],
    ) -> CubeResult<Option<ExecutionSignal>> {
        let key = CellKey::new(ids.iter().copied());
        let cell = match self.cells.get(&key) {
            Some(cell) => cell,
            None => {
                if let Some(value) = self.column_default_value(ids) {
                    return Ok(Some(ExecutionSignal::Continue(value.clone())));
                }
                match &self.default_cell_value {
                    Some(cell) => cell,
                    None => return Ok(None),
                }
            }
        };
        match cell {
            Cell::Value(value) => Ok(Some(ExecutionSignal::Continue(value.clone()))),
            Cell::Executable(exec) => run_cell(exec.as_ref(), ctx)
                .map(Some)
                .map_err(|e| self.execution_error(ctx, e)),
        }
    }

    /// First column default (in axis order) among the columns of `ids`.
    fn column_default_value(&self, ids: &[ColumnId]) -> Option<&CubeValue> {
        ids.iter()
            .filter_map(|&id| {
                let pos = self.column_axis(id)?;
                self.axes[pos].column(id)?.default_value().map(|v| (pos, v))
            })
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, v)| v)
    }

    pub(crate) fn execution_error(&self, ctx: &ExecutionContext<'_>, source: CubeError) -> CubeError {
        CubeError::Execution {
            cube: self.name.clone(),
            coordinate: ctx.coordinate().to_string(),
            partial: Box::new(ctx.output().rule_info.clone()),
            source: Box::new(source),
        }
    }

    /// Resolves the same coordinate once per value of `axis`.
    pub fn get_map(
        &self,
        coordinate: &Coordinate,
        axis: &str,
        values: &[CubeValue],
    ) -> CubeResult<Vec<(CubeValue, Option<CubeValue>)>> {
        self.require_axis(axis)?;
        let mut results = Vec::with_capacity(values.len());
        for value in values {
            let coord = coordinate.overlay([(axis.to_string(), value.clone())]);
            results.push((value.clone(), self.resolve_cell(&coord)?));
        }
        Ok(results)
    }

    /// A copy under a new name with its own id counter.
    pub fn duplicate(&self, new_name: impl Into<String>) -> Cube {
        let mut copy = self.clone();
        copy.name = new_name.into();
        copy.ids = self.ids.fork();
        for axis in &mut copy.axes {
            axis.adopt_ids(copy.ids.clone());
        }
        copy
    }
}
