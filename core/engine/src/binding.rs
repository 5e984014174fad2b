//! FILENAME: core/engine/src/binding.rs
//! PURPOSE: The columns one axis selected for one resolution.

use smallvec::SmallVec;

use crate::axis::AxisType;
use crate::column::ColumnId;

pub type ColumnIds = SmallVec<[ColumnId; 4]>;

#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub axis: String,
    pub axis_type: AxisType,
    /// Non-empty; exactly one id unless the axis is RULE or multi-match SET.
    pub column_ids: ColumnIds,
}

impl Binding {
    pub fn new(axis: impl Into<String>, axis_type: AxisType, column_ids: ColumnIds) -> Self {
        Binding {
            axis: axis.into(),
            axis_type,
            column_ids,
        }
    }

    pub fn is_single(&self) -> bool {
        self.column_ids.len() == 1
    }

    /// True for axes the rule executor steps through.
    pub fn is_enumerated(&self) -> bool {
        self.axis_type == AxisType::Rule || self.column_ids.len() > 1
    }

    pub fn len(&self) -> usize {
        self.column_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.column_ids.is_empty()
    }
}
