//! FILENAME: core/engine/src/column.rs
//! PURPOSE: A single position on an axis.
//! CONTEXT: A column's id and value never change once the owning axis has
//! accepted it; only metadata (order, meta-properties) is mutable, and only
//! through the axis. Column ids come from a counter shared by every axis of
//! a cube so that a set of ids identifies a cell unambiguously.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use serde_json::Value as Json;

use crate::axis::AxisType;
use crate::cell::Cell;
use crate::error::{CubeError, CubeResult};
use crate::range::{Range, RangeSet, SetItem};
use crate::value::{CubeValue, ValueType};

pub type ColumnId = u64;

/// Meta-property holding a column's display or rule name.
pub const META_NAME: &str = "name";
/// Meta-property holding the value returned when a bound cell is empty.
pub const META_DEFAULT_VALUE: &str = "default_value";

// ============================================================================
// ID SOURCE
// ============================================================================

/// Monotonic column id counter. Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct IdSource(Arc<AtomicU64>);

impl IdSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> ColumnId {
        self.0.fetch_add(1, AtomicOrdering::Relaxed) + 1
    }

    pub fn current(&self) -> ColumnId {
        self.0.load(AtomicOrdering::Relaxed)
    }

    /// Ensures future ids are greater than `id`.
    pub fn advance_past(&self, id: ColumnId) {
        self.0.fetch_max(id, AtomicOrdering::Relaxed);
    }

    /// An independent counter starting where this one is.
    pub fn fork(&self) -> IdSource {
        IdSource(Arc::new(AtomicU64::new(self.current())))
    }
}

// ============================================================================
// COLUMN VALUE
// ============================================================================

#[derive(Debug, Clone)]
pub enum ColumnValue {
    /// DISCRETE and NEAREST columns.
    Value(CubeValue),
    Range(Range),
    Set(RangeSet),
    /// RULE columns: the condition, a literal or an executable cell.
    Rule(Cell),
    Default,
}

impl ColumnValue {
    /// Value used to keep ordered axes sorted.
    pub fn sort_key(&self) -> Option<&CubeValue> {
        match self {
            ColumnValue::Value(v) => Some(v),
            ColumnValue::Range(r) => Some(&r.low),
            ColumnValue::Set(s) => s.min_value(),
            ColumnValue::Rule(_) | ColumnValue::Default => None,
        }
    }

    /// Builds a column value for an axis from a loosely typed value. Lists
    /// become ranges (`[low, high]`) or sets, text is parsed with
    /// [`ColumnValue::parse`], text on a RULE axis is an expression.
    pub fn coerce(axis_type: AxisType, value_type: ValueType, value: CubeValue) -> CubeResult<Self> {
        match (axis_type, value) {
            (_, CubeValue::Null) => Err(CubeError::InvalidColumn(
                "column value cannot be null; use a default column instead".to_string(),
            )),
            (AxisType::Rule, CubeValue::Text(source)) => Ok(ColumnValue::Rule(Cell::expression(source))),
            (AxisType::Rule, other) => Ok(ColumnValue::Rule(Cell::Value(other))),
            (AxisType::Range, CubeValue::List(items)) => match items.as_slice() {
                [low, high] => Ok(ColumnValue::Range(Range {
                    low: low.clone(),
                    high: high.clone(),
                })),
                _ => Err(CubeError::InvalidColumn(format!(
                    "range column needs [low, high], got {} items",
                    items.len()
                ))),
            },
            (AxisType::Set, CubeValue::List(items)) => {
                let items = items.into_iter().map(set_item_from_value).collect();
                Ok(ColumnValue::Set(
                    RangeSet::from_items(items).map_err(CubeError::InvalidColumn)?,
                ))
            }
            (AxisType::Range | AxisType::Set, CubeValue::Text(text)) => {
                Self::parse(axis_type, value_type, &text)
            }
            (AxisType::Set, scalar) => Ok(ColumnValue::Set(
                RangeSet::from_items(vec![SetItem::Value(scalar)]).map_err(CubeError::InvalidColumn)?,
            )),
            (AxisType::Nearest, CubeValue::Text(text))
                if value_type == ValueType::Comparable && text.contains(',') =>
            {
                Self::parse(axis_type, value_type, &text)
            }
            (AxisType::Range, other) => Err(CubeError::InvalidColumn(format!(
                "range column needs [low, high], got {}",
                other
            ))),
            (AxisType::Discrete | AxisType::Nearest, other) => Ok(ColumnValue::Value(other)),
        }
    }

    /// Parses column text: `"[1, 5]"` for RANGE, `"a, b, [1, 5]"` for SET,
    /// `"1, 2"` for a COMPARABLE point, anything else as a single value.
    pub fn parse(axis_type: AxisType, value_type: ValueType, text: &str) -> CubeResult<Self> {
        let text = text.trim();
        match axis_type {
            AxisType::Rule => Ok(ColumnValue::Rule(Cell::expression(text))),
            AxisType::Range => {
                let inner = strip_brackets(text).ok_or_else(|| {
                    CubeError::InvalidColumn(format!("range must look like [low, high]: {}", text))
                })?;
                match split_top_level(inner).as_slice() {
                    [low, high] => Ok(ColumnValue::Range(Range {
                        low: parse_scalar(low),
                        high: parse_scalar(high),
                    })),
                    _ => Err(CubeError::InvalidColumn(format!(
                        "range must look like [low, high]: {}",
                        text
                    ))),
                }
            }
            AxisType::Set => {
                let mut items = Vec::new();
                for part in split_top_level(text) {
                    match strip_brackets(part) {
                        Some(inner) => match split_top_level(inner).as_slice() {
                            [low, high] => items.push(SetItem::Range(Range {
                                low: parse_scalar(low),
                                high: parse_scalar(high),
                            })),
                            _ => {
                                return Err(CubeError::InvalidColumn(format!(
                                    "set range must look like [low, high]: {}",
                                    part
                                )))
                            }
                        },
                        None => items.push(SetItem::Value(parse_scalar(part))),
                    }
                }
                Ok(ColumnValue::Set(
                    RangeSet::from_items(items).map_err(CubeError::InvalidColumn)?,
                ))
            }
            AxisType::Nearest if value_type == ValueType::Comparable && text.contains(',') => {
                let parts: Vec<CubeValue> = split_top_level(strip_brackets(text).unwrap_or(text))
                    .into_iter()
                    .map(parse_scalar)
                    .collect();
                Ok(ColumnValue::Value(CubeValue::List(parts)))
            }
            AxisType::Discrete | AxisType::Nearest => Ok(ColumnValue::Value(parse_scalar(text))),
        }
    }

    /// Reads a column value as stored in a cube definition.
    pub fn from_json(axis_type: AxisType, value_type: ValueType, json: &Json) -> CubeResult<Self> {
        Self::coerce(axis_type, value_type, CubeValue::from_json(json))
    }

    pub fn to_json(&self) -> CubeResult<Json> {
        Ok(match self {
            ColumnValue::Value(v) => v.to_json(),
            ColumnValue::Range(r) => Json::Array(vec![r.low.to_json(), r.high.to_json()]),
            ColumnValue::Set(s) => Json::Array(
                s.items()
                    .iter()
                    .map(|item| match item {
                        SetItem::Value(v) => v.to_json(),
                        SetItem::Range(r) => Json::Array(vec![r.low.to_json(), r.high.to_json()]),
                    })
                    .collect(),
            ),
            ColumnValue::Rule(Cell::Value(v)) => v.to_json(),
            ColumnValue::Rule(Cell::Executable(exec)) => match exec.source() {
                Some(source) => Json::String(source.to_string()),
                None => {
                    return Err(CubeError::Definition(format!(
                        "rule condition '{}' has no source text",
                        exec.signature()
                    )))
                }
            },
            ColumnValue::Default => Json::Null,
        })
    }
}

impl fmt::Display for ColumnValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnValue::Value(v) => write!(f, "{}", v),
            ColumnValue::Range(r) => write!(f, "{}", r),
            ColumnValue::Set(s) => write!(f, "{}", s),
            ColumnValue::Rule(cell) => write!(f, "{}", cell),
            ColumnValue::Default => write!(f, "Default"),
        }
    }
}

fn set_item_from_value(value: CubeValue) -> SetItem {
    match value {
        CubeValue::List(pair) if pair.len() == 2 => {
            let mut it = pair.into_iter();
            match (it.next(), it.next()) {
                (Some(low), Some(high)) => SetItem::Range(Range { low, high }),
                _ => SetItem::Value(CubeValue::Null),
            }
        }
        other => SetItem::Value(other),
    }
}

fn strip_brackets(text: &str) -> Option<&str> {
    let text = text.trim();
    text.strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .map(str::trim)
}

/// Splits on commas that are not inside brackets or quotes.
fn split_top_level(text: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(c),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    let last = text[start..].trim();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    parts
}

/// Numbers become Long/Double, quoted text is unquoted, the rest stays text.
/// The axis promotes the result to its value type afterwards.
fn parse_scalar(text: &str) -> CubeValue {
    let text = text.trim();
    for q in ['"', '\''] {
        if let Some(inner) = text.strip_prefix(q).and_then(|t| t.strip_suffix(q)) {
            return CubeValue::Text(inner.to_string());
        }
    }
    if let Ok(n) = text.parse::<i64>() {
        return CubeValue::Long(n);
    }
    if let Ok(n) = text.parse::<f64>() {
        return CubeValue::Double(n);
    }
    CubeValue::Text(text.to_string())
}

// ============================================================================
// COLUMN
// ============================================================================

#[derive(Debug, Clone)]
pub struct Column {
    id: ColumnId,
    value: ColumnValue,
    order: i64,
    meta: BTreeMap<String, CubeValue>,
}

impl Column {
    pub(crate) fn new(id: ColumnId, value: ColumnValue, order: i64) -> Self {
        Column {
            id,
            value,
            order,
            meta: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: ColumnId) {
        self.id = id;
    }

    pub fn value(&self) -> &ColumnValue {
        &self.value
    }

    pub(crate) fn set_value(&mut self, value: ColumnValue) {
        self.value = value;
    }

    pub fn order(&self) -> i64 {
        self.order
    }

    pub(crate) fn set_order(&mut self, order: i64) {
        self.order = order;
    }

    pub fn is_default(&self) -> bool {
        matches!(self.value, ColumnValue::Default)
    }

    /// Rule name or display name.
    pub fn name(&self) -> Option<&str> {
        self.meta.get(META_NAME).and_then(CubeValue::as_str)
    }

    /// Value returned for an empty cell bound through this column.
    pub fn default_value(&self) -> Option<&CubeValue> {
        self.meta.get(META_DEFAULT_VALUE)
    }

    pub fn meta(&self) -> &BTreeMap<String, CubeValue> {
        &self.meta
    }

    pub fn meta_value(&self, key: &str) -> Option<&CubeValue> {
        self.meta.get(key)
    }

    pub(crate) fn set_meta(&mut self, key: impl Into<String>, value: CubeValue) {
        let key = key.into();
        if value.is_null() {
            self.meta.remove(&key);
        } else {
            self.meta.insert(key, value);
        }
    }

    pub(crate) fn replace_meta(&mut self, meta: BTreeMap<String, CubeValue>) {
        self.meta = meta;
    }

    /// The name if one is set, otherwise the value's text.
    pub fn display(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => self.value.to_string(),
        }
    }

    /// Compares by wrapped value; rule and default columns compare by order.
    pub fn compare(&self, other: &Column) -> Ordering {
        match (self.value.sort_key(), other.value.sort_key()) {
            (Some(a), Some(b)) => a.compare(b).unwrap_or(Ordering::Equal),
            _ => self.order.cmp(&other.order).then(self.id.cmp(&other.id)),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_source_is_monotonic_and_forks() {
        let ids = IdSource::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        ids.advance_past(10);
        assert_eq!(ids.next_id(), 11);
        let fork = ids.fork();
        assert_eq!(fork.next_id(), 12);
        assert_eq!(ids.next_id(), 12);
    }

    #[test]
    fn test_parse_range_and_set_text() {
        match ColumnValue::parse(AxisType::Range, ValueType::Long, "[1, 5]").unwrap() {
            ColumnValue::Range(r) => assert_eq!(r, Range::new(1, 5)),
            other => panic!("expected range, got {:?}", other),
        }
        match ColumnValue::parse(AxisType::Set, ValueType::Long, "7, [10, 20], 3").unwrap() {
            ColumnValue::Set(s) => {
                assert_eq!(s.len(), 3);
                assert_eq!(s.min_value(), Some(&CubeValue::Long(3)));
                assert!(s.contains(&CubeValue::Long(15)));
            }
            other => panic!("expected set, got {:?}", other),
        }
        assert!(ColumnValue::parse(AxisType::Range, ValueType::Long, "1, 5").is_err());
    }

    #[test]
    fn test_split_respects_quotes_and_brackets() {
        assert_eq!(
            split_top_level("'a, b', [1, 2], c"),
            vec!["'a, b'", "[1, 2]", "c"]
        );
        assert!(split_top_level("").is_empty());
    }

    #[test]
    fn test_coerce_point_text() {
        match ColumnValue::coerce(AxisType::Nearest, ValueType::Comparable, "1, 2".into()).unwrap() {
            ColumnValue::Value(CubeValue::List(items)) => assert_eq!(items.len(), 2),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_name_and_display() {
        let mut col = Column::new(1, ColumnValue::Value("OH".into()), 0);
        assert_eq!(col.display(), "OH");
        col.set_meta(META_NAME, "Ohio".into());
        assert_eq!(col.name(), Some("Ohio"));
        assert_eq!(col.to_string(), "Ohio");
        col.set_meta(META_NAME, CubeValue::Null);
        assert_eq!(col.name(), None);
    }
}
