//! FILENAME: core/engine/src/axis.rs
//! PURPOSE: One dimension of a cube and its matching algorithm.
//! CONTEXT: DISCRETE, RANGE, SET and NEAREST axes keep their columns sorted
//! by value so that matching can binary search. RULE axes keep insertion
//! order, which is execution order, and match by evaluating each column's
//! condition against the execution context.
//!
//! The default column is held apart from the sorted list and is always
//! reported last.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use smallvec::smallvec;

use crate::binding::ColumnIds;
use crate::cell::Cell;
use crate::column::{Column, ColumnId, ColumnValue, IdSource, META_NAME};
use crate::context::ExecutionContext;
use crate::distance::Distance;
use crate::error::{CubeError, CubeResult};
use crate::executable::{run_cell, ExecutionSignal};
use crate::logging::{log_debug, log_warn};
use crate::range::{Range, RangeSet, SetItem};
use crate::value::{CubeValue, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AxisType {
    Discrete,
    Range,
    Set,
    Nearest,
    Rule,
}

#[derive(Debug, Clone)]
pub struct Axis {
    name: String,
    axis_type: AxisType,
    value_type: ValueType,
    columns: Vec<Column>,
    default_column: Option<Column>,
    multi_match: bool,
    fire_all: bool,
    meta: BTreeMap<String, CubeValue>,
    ids: IdSource,
}

impl Axis {
    pub fn new(
        name: impl Into<String>,
        axis_type: AxisType,
        value_type: ValueType,
        has_default: bool,
    ) -> CubeResult<Axis> {
        Self::with_ids(name, axis_type, value_type, has_default, IdSource::new())
    }

    pub(crate) fn with_ids(
        name: impl Into<String>,
        axis_type: AxisType,
        value_type: ValueType,
        has_default: bool,
        ids: IdSource,
    ) -> CubeResult<Axis> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CubeError::InvalidAxis("axis name cannot be empty".to_string()));
        }
        match (axis_type, value_type) {
            (AxisType::Rule, ValueType::Expression) => {}
            (AxisType::Rule, other) => {
                return Err(CubeError::InvalidAxis(format!(
                    "rule axis '{}' must have value type EXPRESSION, not {:?}",
                    name, other
                )))
            }
            (other, ValueType::Expression) => {
                return Err(CubeError::InvalidAxis(format!(
                    "EXPRESSION values are only allowed on rule axes ('{}' is {:?})",
                    name, other
                )))
            }
            _ => {}
        }

        let mut axis = Axis {
            name,
            axis_type,
            value_type,
            columns: Vec::new(),
            default_column: None,
            multi_match: false,
            fire_all: axis_type == AxisType::Rule,
            meta: BTreeMap::new(),
            ids,
        };
        if has_default {
            axis.set_has_default(true)?;
        }
        Ok(axis)
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn axis_type(&self) -> AxisType {
        self.axis_type
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn multi_match(&self) -> bool {
        self.multi_match
    }

    pub fn set_multi_match(&mut self, multi_match: bool) -> CubeResult<()> {
        if self.axis_type != AxisType::Set && multi_match {
            return Err(CubeError::InvalidAxis(format!(
                "multi-match applies to SET axes; '{}' is {:?}",
                self.name, self.axis_type
            )));
        }
        self.multi_match = multi_match;
        Ok(())
    }

    pub fn fire_all(&self) -> bool {
        self.fire_all
    }

    pub fn set_fire_all(&mut self, fire_all: bool) -> CubeResult<()> {
        if self.axis_type != AxisType::Rule {
            return Err(CubeError::InvalidAxis(format!(
                "fire-all applies to RULE axes; '{}' is {:?}",
                self.name, self.axis_type
            )));
        }
        self.fire_all = fire_all;
        Ok(())
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

    pub fn has_default(&self) -> bool {
        self.default_column.is_some()
    }

    /// Adds or removes the default column. Returns the id of the column
    /// created or removed.
    pub fn set_has_default(&mut self, has_default: bool) -> CubeResult<Option<ColumnId>> {
        if has_default {
            if let Some(existing) = &self.default_column {
                return Ok(Some(existing.id()));
            }
            let id = self.ids.next_id();
            self.install_default(id)?;
            Ok(Some(id))
        } else {
            Ok(self.default_column.take().map(|c| c.id()))
        }
    }

    pub(crate) fn install_default(&mut self, id: ColumnId) -> CubeResult<()> {
        if self.axis_type == AxisType::Nearest {
            return Err(CubeError::InvalidAxis(format!(
                "NEAREST axis '{}' cannot have a default column",
                self.name
            )));
        }
        if self.default_column.is_some() {
            return Err(CubeError::InvalidColumn(format!(
                "axis '{}' already has a default column",
                self.name
            )));
        }
        self.ids.advance_past(id);
        self.default_column = Some(Column::new(id, ColumnValue::Default, i64::MAX));
        Ok(())
    }

    // ------------------------------------------------------------------
    // Column access
    // ------------------------------------------------------------------

    /// All columns in order, default last.
    pub fn columns(&self) -> Vec<&Column> {
        self.columns.iter().chain(self.default_column.iter()).collect()
    }

    pub fn columns_without_default(&self) -> &[Column] {
        &self.columns
    }

    /// Column count including the default column.
    pub fn column_count(&self) -> usize {
        self.columns.len() + usize::from(self.default_column.is_some())
    }

    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns
            .iter()
            .chain(self.default_column.iter())
            .find(|c| c.id() == id)
    }

    pub fn contains_column(&self, id: ColumnId) -> bool {
        self.column(id).is_some()
    }

    pub fn default_column(&self) -> Option<&Column> {
        self.default_column.as_ref()
    }

    pub fn default_column_id(&self) -> Option<ColumnId> {
        self.default_column.as_ref().map(Column::id)
    }

    /// Finds a column by rule name, or failing that by value text.
    pub fn find_column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name().map_or(false, |n| n.eq_ignore_ascii_case(name)))
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|c| c.value().to_string().eq_ignore_ascii_case(name))
            })
    }

    fn position(&self, id: ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| c.id() == id)
    }

    // ------------------------------------------------------------------
    // Column mutation
    // ------------------------------------------------------------------

    /// Adds a column from a loosely typed value (see [`ColumnValue::coerce`]).
    pub fn add_column(&mut self, value: impl Into<CubeValue>) -> CubeResult<&Column> {
        let value = ColumnValue::coerce(self.axis_type, self.value_type, value.into())?;
        self.insert_column(value, None, BTreeMap::new())
    }

    /// Adds a column from its text form, e.g. `"[1, 5]"` on a RANGE axis.
    pub fn add_column_text(&mut self, text: &str) -> CubeResult<&Column> {
        let value = ColumnValue::parse(self.axis_type, self.value_type, text)?;
        self.insert_column(value, None, BTreeMap::new())
    }

    pub fn add_column_value(&mut self, value: ColumnValue) -> CubeResult<&Column> {
        self.insert_column(value, None, BTreeMap::new())
    }

    pub fn add_range_column(&mut self, range: Range) -> CubeResult<&Column> {
        self.insert_column(ColumnValue::Range(range), None, BTreeMap::new())
    }

    pub fn add_set_column(&mut self, set: RangeSet) -> CubeResult<&Column> {
        self.insert_column(ColumnValue::Set(set), None, BTreeMap::new())
    }

    /// Appends a named rule. `condition` is a literal or an executable cell.
    pub fn add_rule_column(&mut self, name: &str, condition: Cell) -> CubeResult<&Column> {
        let mut meta = BTreeMap::new();
        meta.insert(META_NAME.to_string(), CubeValue::from(name));
        self.insert_column(ColumnValue::Rule(condition), None, meta)
    }

    pub(crate) fn insert_column(
        &mut self,
        value: ColumnValue,
        id: Option<ColumnId>,
        meta: BTreeMap<String, CubeValue>,
    ) -> CubeResult<&Column> {
        let value = self.normalize(value)?;
        self.check_conflicts(&value, None)?;
        if self.axis_type == AxisType::Rule {
            if let Some(name) = meta.get(META_NAME).and_then(CubeValue::as_str) {
                if self
                    .columns
                    .iter()
                    .any(|c| c.name().map_or(false, |n| n.eq_ignore_ascii_case(name)))
                {
                    return Err(CubeError::InvalidColumn(format!(
                        "rule '{}' already exists on axis '{}'",
                        name, self.name
                    )));
                }
            }
        }

        let id = match id {
            Some(id) => {
                if self.contains_column(id) {
                    return Err(CubeError::InvalidColumn(format!(
                        "column id {} already used on axis '{}'",
                        id, self.name
                    )));
                }
                self.ids.advance_past(id);
                id
            }
            None => self.ids.next_id(),
        };

        let mut column = Column::new(id, value, 0);
        column.replace_meta(meta);
        let pos = self.place(column);
        log_debug!("AXIS", "added column {} '{}' to '{}'", id, self.columns[pos], self.name);
        Ok(&self.columns[pos])
    }

    /// Inserts at the sorted position (after equal keys) or appends for RULE.
    fn place(&mut self, mut column: Column) -> usize {
        if self.axis_type == AxisType::Rule {
            let order = self.columns.iter().map(Column::order).max().map_or(0, |o| o + 1);
            column.set_order(order);
            self.columns.push(column);
            self.columns.len() - 1
        } else {
            let pos = self
                .columns
                .partition_point(|c| c.compare(&column) != Ordering::Greater);
            self.columns.insert(pos, column);
            self.renumber();
            pos
        }
    }

    fn renumber(&mut self) {
        for (i, column) in self.columns.iter_mut().enumerate() {
            column.set_order(i as i64);
        }
    }

    /// Replaces a column's value, keeping its id.
    pub fn update_column(&mut self, id: ColumnId, value: impl Into<CubeValue>) -> CubeResult<()> {
        let pos = self.position(id).ok_or_else(|| self.missing_column(id))?;
        let value = ColumnValue::coerce(self.axis_type, self.value_type, value.into())?;
        let value = self.normalize(value)?;
        self.check_conflicts(&value, Some(id))?;
        let mut column = self.columns.remove(pos);
        column.set_value(value);
        if self.axis_type == AxisType::Rule {
            self.columns.insert(pos, column);
        } else {
            self.place(column);
        }
        Ok(())
    }

    pub fn set_column_meta(&mut self, id: ColumnId, key: &str, value: CubeValue) -> CubeResult<()> {
        let missing = self.missing_column(id);
        let column = self
            .columns
            .iter_mut()
            .chain(self.default_column.iter_mut())
            .find(|c| c.id() == id)
            .ok_or(missing)?;
        column.set_meta(key, value);
        Ok(())
    }

    /// Sets a column's display order. On RULE axes this is execution order.
    pub fn set_column_order(&mut self, id: ColumnId, order: i64) -> CubeResult<()> {
        let pos = self.position(id).ok_or_else(|| self.missing_column(id))?;
        self.columns[pos].set_order(order);
        if self.axis_type == AxisType::Rule {
            self.columns.sort_by_key(Column::order);
        }
        Ok(())
    }

    /// Removes a non-default column. The owning cube must purge cells keyed
    /// by the returned column's id.
    pub fn delete_column(&mut self, id: ColumnId) -> CubeResult<Column> {
        if self.default_column_id() == Some(id) {
            return Err(CubeError::NotFound(format!(
                "default column {} of axis '{}' cannot be deleted; remove the default instead",
                id, self.name
            )));
        }
        let pos = self.position(id).ok_or_else(|| self.missing_column(id))?;
        let removed = self.columns.remove(pos);
        if self.axis_type != AxisType::Rule {
            self.renumber();
        }
        log_debug!("AXIS", "deleted column {} from '{}'", id, self.name);
        Ok(removed)
    }

    /// Gives every column a fresh id from `ids`. Returns (old, new) pairs.
    pub(crate) fn reassign_ids(&mut self, ids: IdSource) -> Vec<(ColumnId, ColumnId)> {
        let mut mapping = Vec::with_capacity(self.column_count());
        for column in self.columns.iter_mut().chain(self.default_column.iter_mut()) {
            let new_id = ids.next_id();
            mapping.push((column.id(), new_id));
            column.set_id(new_id);
        }
        self.ids = ids;
        mapping
    }

    pub(crate) fn adopt_ids(&mut self, ids: IdSource) {
        self.ids = ids;
    }

    pub(crate) fn max_column_id(&self) -> ColumnId {
        self.columns()
            .iter()
            .map(|c| c.id())
            .max()
            .unwrap_or(0)
    }

    fn missing_column(&self, id: ColumnId) -> CubeError {
        CubeError::NotFound(format!("column {} not found on axis '{}'", id, self.name))
    }

    /// Checks the payload kind against the axis type and promotes it to the
    /// axis value type.
    fn normalize(&self, value: ColumnValue) -> CubeResult<ColumnValue> {
        match (self.axis_type, value) {
            (_, ColumnValue::Default) => Err(CubeError::InvalidColumn(format!(
                "default column of '{}' is managed with set_has_default",
                self.name
            ))),
            (AxisType::Discrete | AxisType::Nearest, ColumnValue::Value(v)) => {
                if v.is_null() {
                    return Err(CubeError::InvalidColumn(format!(
                        "null column value on axis '{}'",
                        self.name
                    )));
                }
                Ok(ColumnValue::Value(self.promote_column_value(&v)?))
            }
            (AxisType::Range, ColumnValue::Range(r)) => {
                let range = Range {
                    low: self.promote_column_value(&r.low)?,
                    high: self.promote_column_value(&r.high)?,
                };
                if !range.is_well_formed() {
                    return Err(CubeError::InvalidColumn(format!(
                        "range {} on axis '{}' must have low < high",
                        range, self.name
                    )));
                }
                Ok(ColumnValue::Range(range))
            }
            (AxisType::Set, ColumnValue::Set(set)) => {
                let mut items = Vec::with_capacity(set.len());
                for item in set.items() {
                    items.push(match item {
                        SetItem::Value(v) => SetItem::Value(self.promote_column_value(v)?),
                        SetItem::Range(r) => SetItem::Range(Range {
                            low: self.promote_column_value(&r.low)?,
                            high: self.promote_column_value(&r.high)?,
                        }),
                    });
                }
                Ok(ColumnValue::Set(
                    RangeSet::from_items(items).map_err(CubeError::InvalidColumn)?,
                ))
            }
            (AxisType::Rule, value @ ColumnValue::Rule(_)) => Ok(value),
            (axis_type, value) => Err(CubeError::InvalidColumn(format!(
                "{:?} axis '{}' cannot hold column value {}",
                axis_type, self.name, value
            ))),
        }
    }

    /// Column values are promoted strictly: a LONG axis only stores integral
    /// values. Coordinates go through the lenient `promote_value`.
    fn promote_column_value(&self, value: &CubeValue) -> CubeResult<CubeValue> {
        let promoted = self.value_type.promote(value).map_err(|e| match e {
            CubeError::InvalidCoordinate(message) => {
                CubeError::InvalidColumn(format!("{} (axis '{}')", message, self.name))
            }
            other => other,
        })?;
        if self.value_type == ValueType::Long && !matches!(promoted, CubeValue::Long(_)) {
            return Err(CubeError::InvalidColumn(format!(
                "'{}' is not an integral value for LONG axis '{}'",
                value, self.name
            )));
        }
        Ok(promoted)
    }

    fn check_conflicts(&self, value: &ColumnValue, skip: Option<ColumnId>) -> CubeResult<()> {
        let others = self.columns.iter().filter(|c| Some(c.id()) != skip);
        match value {
            ColumnValue::Value(v) => {
                for other in others {
                    if let ColumnValue::Value(existing) = other.value() {
                        if v.compare(existing) == Some(Ordering::Equal) {
                            return Err(CubeError::InvalidColumn(format!(
                                "duplicate value {} on axis '{}'",
                                v, self.name
                            )));
                        }
                    }
                }
            }
            ColumnValue::Range(r) => {
                for other in others {
                    if let ColumnValue::Range(existing) = other.value() {
                        if r.overlaps(existing) {
                            return Err(CubeError::InvalidColumn(format!(
                                "range {} overlaps {} on axis '{}'",
                                r, existing, self.name
                            )));
                        }
                    }
                }
            }
            ColumnValue::Set(_) | ColumnValue::Rule(_) | ColumnValue::Default => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    /// Converts an input value to the axis value type.
    pub fn promote_value(&self, value: &CubeValue) -> CubeResult<CubeValue> {
        self.value_type.promote(value).map_err(|e| match e {
            CubeError::InvalidCoordinate(message) => {
                CubeError::InvalidCoordinate(format!("{} (axis '{}')", message, self.name))
            }
            other => other,
        })
    }

    fn default_ids(&self) -> ColumnIds {
        self.default_column_id().into_iter().collect()
    }

    /// Matches an input value on a non-RULE axis. A missing or null value
    /// selects the default column. An empty result means no column and no
    /// default.
    pub fn find_columns(&self, value: Option<&CubeValue>) -> CubeResult<ColumnIds> {
        let value = match value {
            None | Some(CubeValue::Null) => return Ok(self.default_ids()),
            Some(v) => v,
        };
        if self.axis_type == AxisType::Rule {
            return Err(CubeError::InvalidAxis(format!(
                "rule axis '{}' is matched by evaluating its conditions",
                self.name
            )));
        }
        let value = self.promote_value(value)?;

        let mut found = ColumnIds::new();
        match self.axis_type {
            AxisType::Discrete => {
                let hit = self.columns.binary_search_by(|c| {
                    c.value()
                        .sort_key()
                        .and_then(|key| key.compare(&value))
                        .unwrap_or(Ordering::Less)
                });
                if let Ok(pos) = hit {
                    found.push(self.columns[pos].id());
                }
            }
            AxisType::Range => {
                let hit = self.columns.binary_search_by(|c| match c.value() {
                    ColumnValue::Range(r) => match r.locate(&value) {
                        Some(Ordering::Less) => Ordering::Greater,
                        Some(Ordering::Greater) => Ordering::Less,
                        Some(Ordering::Equal) => Ordering::Equal,
                        None => Ordering::Less,
                    },
                    _ => Ordering::Less,
                });
                if let Ok(pos) = hit {
                    found.push(self.columns[pos].id());
                }
            }
            AxisType::Set => {
                for column in &self.columns {
                    if let ColumnValue::Set(set) = column.value() {
                        if set.contains(&value) {
                            found.push(column.id());
                            if !self.multi_match {
                                break;
                            }
                        }
                    }
                }
            }
            AxisType::Nearest => {
                let mut best: Option<(f64, ColumnId)> = None;
                for column in &self.columns {
                    if let ColumnValue::Value(v) = column.value() {
                        if let Some(d) = v.distance(&value) {
                            if best.map_or(true, |(best_d, _)| d < best_d) {
                                best = Some((d, column.id()));
                            }
                        }
                    }
                }
                if let Some((_, id)) = best {
                    found.push(id);
                }
            }
            AxisType::Rule => {}
        }

        if found.is_empty() {
            found = self.default_ids();
        }
        Ok(found)
    }

    /// First matching column, if any.
    pub fn find_column(&self, value: Option<&CubeValue>) -> CubeResult<Option<ColumnId>> {
        Ok(self.find_columns(value)?.first().copied())
    }

    /// Evaluates rule conditions in order starting at `start` (or the first
    /// rule). With `force_start` the start column fires without evaluating
    /// its condition. Every truthy rule is returned when `fire_all` is set,
    /// otherwise only the first; none falls back to the default column.
    pub fn find_rule_columns(
        &self,
        ctx: &mut ExecutionContext<'_>,
        start: Option<ColumnId>,
        force_start: bool,
    ) -> CubeResult<ColumnIds> {
        let start_pos = match start {
            None => 0,
            Some(id) => match self.position(id) {
                Some(pos) => pos,
                None if self.default_column_id() == Some(id) => return Ok(smallvec![id]),
                None => return Err(self.missing_column(id)),
            },
        };

        let mut found = ColumnIds::new();
        for (offset, column) in self.columns[start_pos..].iter().enumerate() {
            let fires = if force_start && offset == 0 {
                true
            } else {
                self.evaluate_condition(column, ctx)?
            };
            if fires {
                found.push(column.id());
                if !self.fire_all {
                    break;
                }
            }
        }

        if found.is_empty() {
            found = self.default_ids();
        }
        Ok(found)
    }

    fn evaluate_condition(&self, column: &Column, ctx: &mut ExecutionContext<'_>) -> CubeResult<bool> {
        let fires = match column.value() {
            ColumnValue::Rule(Cell::Value(v)) => v.is_truthy(),
            ColumnValue::Rule(Cell::Executable(exec)) => match run_cell(exec.as_ref(), ctx)? {
                ExecutionSignal::Continue(v) => v.is_truthy(),
                ExecutionSignal::Stop | ExecutionSignal::Jump(_) => {
                    log_warn!("AXIS", "rule '{}' condition raised a control signal", column.display());
                    return Err(CubeError::InvalidAxis(format!(
                        "condition of rule '{}' on axis '{}' cannot stop or jump",
                        column.display(),
                        self.name
                    )));
                }
            },
            _ => false,
        };
        log_debug!("AXIS", "rule '{}' on '{}' -> {}", column.display(), self.name, fires);
        Ok(fires)
    }

    /// The column a value names exactly, without default fallback: rule
    /// name or id on RULE axes, the containing column otherwise. Null
    /// names the default column.
    pub fn locate_column(&self, value: &CubeValue) -> Option<ColumnId> {
        if value.is_null() {
            return self.default_column_id();
        }
        if self.axis_type == AxisType::Rule {
            return match value {
                CubeValue::Text(name) => self.find_column_by_name(name).map(Column::id),
                CubeValue::Long(id) => self
                    .columns
                    .iter()
                    .find(|c| c.id() == *id as ColumnId)
                    .map(Column::id),
                _ => None,
            };
        }
        let value = self.promote_value(value).ok()?;
        self.columns
            .iter()
            .find(|c| match c.value() {
                ColumnValue::Value(v) => v.compare(&value) == Some(Ordering::Equal),
                ColumnValue::Range(r) => r.contains(&value),
                ColumnValue::Set(s) => s.contains(&value),
                _ => false,
            })
            .map(Column::id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Coordinate;
    use crate::cube::Cube;
    use crate::output::Output;

    fn ids(found: ColumnIds) -> Vec<ColumnId> {
        found.into_vec()
    }

    fn discrete_states(has_default: bool) -> Axis {
        let mut axis = Axis::new("State", AxisType::Discrete, ValueType::String, has_default).unwrap();
        for state in ["OH", "KY", "IN", "MI"] {
            axis.add_column(state).unwrap();
        }
        axis
    }

    #[test]
    fn test_axis_validation() {
        assert!(Axis::new("r", AxisType::Rule, ValueType::String, false).is_err());
        assert!(Axis::new("d", AxisType::Discrete, ValueType::Expression, false).is_err());
        assert!(Axis::new("n", AxisType::Nearest, ValueType::Long, true).is_err());
        assert!(Axis::new(" ", AxisType::Discrete, ValueType::Long, false).is_err());
        let rule = Axis::new("r", AxisType::Rule, ValueType::Expression, false).unwrap();
        assert!(rule.fire_all());
    }

    #[test]
    fn test_discrete_columns_sorted_and_case_insensitive() {
        let axis = discrete_states(false);
        let values: Vec<String> = axis.columns().iter().map(|c| c.display()).collect();
        assert_eq!(values, vec!["IN", "KY", "MI", "OH"]);
        let oh = axis.find_column(Some(&"oh".into())).unwrap().unwrap();
        assert_eq!(axis.column(oh).unwrap().display(), "OH");
        assert!(axis.find_columns(Some(&"TX".into())).unwrap().is_empty());
    }

    #[test]
    fn test_discrete_default_fallback() {
        let axis = discrete_states(true);
        let default_id = axis.default_column_id().unwrap();
        assert_eq!(ids(axis.find_columns(Some(&"TX".into())).unwrap()), vec![default_id]);
        assert_eq!(ids(axis.find_columns(None).unwrap()), vec![default_id]);
        assert!(axis.columns().last().unwrap().is_default());
    }

    #[test]
    fn test_discrete_rejects_duplicates_and_mismatched_type() {
        let mut axis = discrete_states(false);
        assert!(matches!(axis.add_column("oh"), Err(CubeError::InvalidColumn(_))));

        let mut ages = Axis::new("age", AxisType::Discrete, ValueType::Long, false).unwrap();
        ages.add_column(5).unwrap();
        assert!(matches!(ages.add_column("five"), Err(CubeError::InvalidColumn(_))));
        // Text input is promoted to the axis type when matching.
        assert_eq!(ages.find_columns(Some(&"5".into())).unwrap().len(), 1);
        assert_eq!(ages.find_columns(Some(&CubeValue::Double(5.0))).unwrap().len(), 1);
        assert!(matches!(
            ages.find_columns(Some(&"five".into())),
            Err(CubeError::InvalidCoordinate(_))
        ));

        // Fractional column values never land on a LONG axis
        assert!(matches!(ages.add_column(CubeValue::Double(7.5)), Err(CubeError::InvalidColumn(_))));
        assert!(matches!(ages.add_column("7.5"), Err(CubeError::InvalidColumn(_))));
        assert_eq!(ages.columns_without_default().len(), 1);
        let six = ages.add_column(CubeValue::Double(6.0)).unwrap().id();
        assert!(matches!(ages.column(six).unwrap().value(), ColumnValue::Value(CubeValue::Long(6))));
        // Coordinates stay lenient
        assert!(ages.find_columns(Some(&CubeValue::Double(7.5))).unwrap().is_empty());
    }

    #[test]
    fn test_range_high_boundary_matches_next_range() {
        let mut axis = Axis::new("age", AxisType::Range, ValueType::Long, false).unwrap();
        let young = axis.add_range_column(Range::new(0, 18)).unwrap().id();
        let adult = axis.add_range_column(Range::new(18, 65)).unwrap().id();
        axis.add_range_column(Range::new(65, 120)).unwrap();

        assert_eq!(ids(axis.find_columns(Some(&CubeValue::Long(17))).unwrap()), vec![young]);
        assert_eq!(ids(axis.find_columns(Some(&CubeValue::Long(18))).unwrap()), vec![adult]);
        assert!(axis.find_columns(Some(&CubeValue::Long(120))).unwrap().is_empty());
    }

    #[test]
    fn test_range_rejects_overlap_and_inverted() {
        let mut axis = Axis::new("age", AxisType::Range, ValueType::Long, false).unwrap();
        axis.add_column_text("[0, 18]").unwrap();
        assert!(matches!(axis.add_column_text("[10, 20]"), Err(CubeError::InvalidColumn(_))));
        assert!(matches!(axis.add_column_text("[30, 20]"), Err(CubeError::InvalidColumn(_))));
        assert!(axis.add_column_text("[18, 30]").is_ok());
    }

    #[test]
    fn test_set_single_match_first_by_order() {
        let mut axis = Axis::new("code", AxisType::Set, ValueType::Long, false).unwrap();
        let first = axis.add_column_text("1, 5, [10, 20]").unwrap().id();
        let second = axis.add_column_text("[15, 30]").unwrap().id();

        let hit = axis.find_columns(Some(&CubeValue::Long(16))).unwrap();
        assert_eq!(ids(hit), vec![first]);

        axis.set_multi_match(true).unwrap();
        let hit = axis.find_columns(Some(&CubeValue::Long(16))).unwrap();
        assert_eq!(ids(hit), vec![first, second]);
        assert_eq!(ids(axis.find_columns(Some(&CubeValue::Long(25))).unwrap()), vec![second]);
    }

    #[test]
    fn test_multi_match_only_on_set_axes() {
        let mut axis = discrete_states(false);
        assert!(axis.set_multi_match(true).is_err());
    }

    #[test]
    fn test_nearest_ties_go_to_first_column() {
        let mut axis = Axis::new("size", AxisType::Nearest, ValueType::Long, false).unwrap();
        let ten = axis.add_column(10).unwrap().id();
        let twenty = axis.add_column(20).unwrap().id();
        assert_eq!(ids(axis.find_columns(Some(&CubeValue::Long(15))).unwrap()), vec![ten]);
        assert_eq!(ids(axis.find_columns(Some(&CubeValue::Long(16))).unwrap()), vec![twenty]);
        assert_eq!(ids(axis.find_columns(Some(&CubeValue::Long(-50))).unwrap()), vec![ten]);
    }

    #[test]
    fn test_nearest_points() {
        let mut axis = Axis::new("loc", AxisType::Nearest, ValueType::Comparable, false).unwrap();
        let origin = axis.add_column_text("0, 0").unwrap().id();
        let far = axis.add_column_text("10, 10").unwrap().id();
        let near_far = CubeValue::from(vec![8.0, 9.0]);
        assert_eq!(ids(axis.find_columns(Some(&near_far)).unwrap()), vec![far]);
        assert_eq!(
            ids(axis.find_columns(Some(&CubeValue::from(vec![1, 1]))).unwrap()),
            vec![origin]
        );
    }

    fn rule_axis(conditions: &[bool], fire_all: bool, has_default: bool) -> Axis {
        let mut axis = Axis::new("rules", AxisType::Rule, ValueType::Expression, has_default).unwrap();
        axis.set_fire_all(fire_all).unwrap();
        for (i, cond) in conditions.iter().enumerate() {
            axis.add_rule_column(&format!("r{}", i + 1), Cell::Value(CubeValue::Bool(*cond)))
                .unwrap();
        }
        axis
    }

    #[test]
    fn test_rule_fire_all_returns_every_true_rule_in_order() {
        let cube = Cube::new("t");
        let mut output = Output::default();
        let mut ctx = ExecutionContext::new(&cube, Coordinate::new(), &mut output);

        let axis = rule_axis(&[true, false, true], true, false);
        let cols = axis.columns_without_default();
        let found = axis.find_rule_columns(&mut ctx, None, false).unwrap();
        assert_eq!(ids(found), vec![cols[0].id(), cols[2].id()]);

        let first_only = rule_axis(&[false, true, true], false, false);
        let cols = first_only.columns_without_default();
        let found = first_only.find_rule_columns(&mut ctx, None, false).unwrap();
        assert_eq!(ids(found), vec![cols[1].id()]);
    }

    #[test]
    fn test_rule_no_true_condition_uses_default_or_nothing() {
        let cube = Cube::new("t");
        let mut output = Output::default();
        let mut ctx = ExecutionContext::new(&cube, Coordinate::new(), &mut output);

        let without = rule_axis(&[false, false], true, false);
        assert!(without.find_rule_columns(&mut ctx, None, false).unwrap().is_empty());

        let with = rule_axis(&[false, false], true, true);
        let found = with.find_rule_columns(&mut ctx, None, false).unwrap();
        assert_eq!(ids(found), vec![with.default_column_id().unwrap()]);
    }

    #[test]
    fn test_rule_conditions_see_input() {
        let cube = Cube::new("t");
        let mut output = Output::default();
        let coord = Coordinate::new().with("age", 70);
        let mut ctx = ExecutionContext::new(&cube, coord, &mut output);

        let mut axis = Axis::new("rules", AxisType::Rule, ValueType::Expression, false).unwrap();
        axis.add_rule_column("minor", Cell::expression("input.age < 18")).unwrap();
        let senior = axis
            .add_rule_column("senior", Cell::expression("input.age >= 65"))
            .unwrap()
            .id();
        let found = axis.find_rule_columns(&mut ctx, None, false).unwrap();
        assert_eq!(ids(found), vec![senior]);
    }

    #[test]
    fn test_rule_forced_start() {
        let cube = Cube::new("t");
        let mut output = Output::default();
        let mut ctx = ExecutionContext::new(&cube, Coordinate::new(), &mut output);

        let axis = rule_axis(&[true, false, true], true, false);
        let cols = axis.columns_without_default();
        let found = axis.find_rule_columns(&mut ctx, Some(cols[1].id()), true).unwrap();
        assert_eq!(ids(found), vec![cols[1].id(), cols[2].id()]);
        let found = axis.find_rule_columns(&mut ctx, Some(cols[1].id()), false).unwrap();
        assert_eq!(ids(found), vec![cols[2].id()]);
    }

    #[test]
    fn test_rule_names_unique_and_order_changes_execution() {
        let mut axis = rule_axis(&[true, true], true, false);
        assert!(axis.add_rule_column("R1", Cell::Value(CubeValue::Bool(true))).is_err());
        let second = axis.find_column_by_name("r2").unwrap().id();
        axis.set_column_order(second, -1).unwrap();
        assert_eq!(axis.columns_without_default()[0].id(), second);
    }

    #[test]
    fn test_delete_column_rules() {
        let mut axis = discrete_states(true);
        let default_id = axis.default_column_id().unwrap();
        assert!(matches!(axis.delete_column(default_id), Err(CubeError::NotFound(_))));
        assert!(matches!(axis.delete_column(9999), Err(CubeError::NotFound(_))));

        let oh = axis.locate_column(&"OH".into()).unwrap();
        axis.delete_column(oh).unwrap();
        assert!(axis.locate_column(&"OH".into()).is_none());
        assert_eq!(axis.column_count(), 4);

        assert_eq!(axis.set_has_default(false).unwrap(), Some(default_id));
        assert!(!axis.has_default());
    }

    #[test]
    fn test_update_column_keeps_id_and_sort() {
        let mut axis = discrete_states(false);
        let oh = axis.locate_column(&"OH".into()).unwrap();
        axis.update_column(oh, "AL").unwrap();
        assert_eq!(axis.columns_without_default()[0].id(), oh);
        assert!(matches!(axis.update_column(oh, "KY"), Err(CubeError::InvalidColumn(_))));
    }

    #[test]
    fn test_locate_column_is_exact() {
        let axis = discrete_states(true);
        assert!(axis.locate_column(&"TX".into()).is_none());
        assert_eq!(axis.locate_column(&CubeValue::Null), axis.default_column_id());
    }
}
