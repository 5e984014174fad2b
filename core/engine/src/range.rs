//! FILENAME: core/engine/src/range.rs
//! PURPOSE: Half-open ranges and the range sets used by RANGE and SET axes.

use std::cmp::Ordering;
use std::fmt;

use crate::value::CubeValue;

/// A half-open interval `[low, high)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Range {
    pub low: CubeValue,
    pub high: CubeValue,
}

impl Range {
    pub fn new(low: impl Into<CubeValue>, high: impl Into<CubeValue>) -> Self {
        Range {
            low: low.into(),
            high: high.into(),
        }
    }

    /// True when `low < high` and both ends are mutually comparable.
    pub fn is_well_formed(&self) -> bool {
        matches!(self.low.compare(&self.high), Some(Ordering::Less))
    }

    /// Where `value` falls relative to this range: `Less` if below `low`,
    /// `Greater` if at or above `high`, `Equal` if inside.
    pub fn locate(&self, value: &CubeValue) -> Option<Ordering> {
        if value.compare(&self.low)? == Ordering::Less {
            return Some(Ordering::Less);
        }
        if value.compare(&self.high)? != Ordering::Less {
            return Some(Ordering::Greater);
        }
        Some(Ordering::Equal)
    }

    pub fn contains(&self, value: &CubeValue) -> bool {
        self.locate(value) == Some(Ordering::Equal)
    }

    pub fn overlaps(&self, other: &Range) -> bool {
        let starts_before_other_ends = matches!(self.low.compare(&other.high), Some(Ordering::Less));
        let other_starts_before_end = matches!(other.low.compare(&self.high), Some(Ordering::Less));
        starts_before_other_ends && other_starts_before_end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

/// One member of a SET column: a discrete value or a range.
#[derive(Debug, Clone, PartialEq)]
pub enum SetItem {
    Value(CubeValue),
    Range(Range),
}

impl SetItem {
    /// The lowest value covered, used to sort items and SET columns.
    pub fn min_value(&self) -> &CubeValue {
        match self {
            SetItem::Value(v) => v,
            SetItem::Range(r) => &r.low,
        }
    }

    fn locate(&self, value: &CubeValue) -> Option<Ordering> {
        match self {
            SetItem::Value(v) => value.compare(v),
            SetItem::Range(r) => r.locate(value),
        }
    }

    fn overlaps(&self, other: &SetItem) -> bool {
        match (self, other) {
            (SetItem::Value(a), SetItem::Value(b)) => a.compare(b) == Some(Ordering::Equal),
            (SetItem::Value(v), SetItem::Range(r)) | (SetItem::Range(r), SetItem::Value(v)) => {
                r.contains(v)
            }
            (SetItem::Range(a), SetItem::Range(b)) => a.overlaps(b),
        }
    }
}

impl fmt::Display for SetItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetItem::Value(v) => write!(f, "{}", v),
            SetItem::Range(r) => write!(f, "{}", r),
        }
    }
}

/// The payload of a SET column: disjoint values and ranges kept sorted by
/// their lowest value so membership is a binary search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RangeSet {
    items: Vec<SetItem>,
}

impl RangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from items, sorting them. Returns the offending pair's
    /// description if two items overlap.
    pub fn from_items(items: Vec<SetItem>) -> Result<Self, String> {
        let mut set = RangeSet::new();
        for item in items {
            set.insert(item)?;
        }
        Ok(set)
    }

    pub fn insert(&mut self, item: SetItem) -> Result<(), String> {
        if let SetItem::Range(r) = &item {
            if !r.is_well_formed() {
                return Err(format!("range {} must have low < high", r));
            }
        }
        if let Some(existing) = self.items.iter().find(|i| i.overlaps(&item)) {
            return Err(format!("{} overlaps {}", item, existing));
        }
        let pos = self
            .items
            .partition_point(|i| i.min_value().compare(item.min_value()) == Some(Ordering::Less));
        self.items.insert(pos, item);
        Ok(())
    }

    pub fn items(&self) -> &[SetItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn min_value(&self) -> Option<&CubeValue> {
        self.items.first().map(SetItem::min_value)
    }

    pub fn contains(&self, value: &CubeValue) -> bool {
        let mut lo = 0;
        let mut hi = self.items.len();
        while lo < hi {
            let mid = (lo + hi) / 2;
            match self.items[mid].locate(value) {
                Some(Ordering::Equal) => return true,
                Some(Ordering::Less) => hi = mid,
                Some(Ordering::Greater) => lo = mid + 1,
                None => return false,
            }
        }
        false
    }

    pub fn overlaps(&self, other: &RangeSet) -> bool {
        self.items
            .iter()
            .any(|a| other.items.iter().any(|b| a.overlaps(b)))
    }
}

impl fmt::Display for RangeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        Ok(())
    }
}
