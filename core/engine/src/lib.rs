//! FILENAME: core/engine/src/lib.rs
//! PURPOSE: Main library entry point for the cube engine.
//! CONTEXT: A cube is a set of named axes; each axis maps an input value to
//! one or more columns, and cells are stored under the set of column ids
//! they sit at. Resolving a coordinate binds every axis and either reads a
//! single cell or enumerates rule combinations.
//!
//! PIPELINE: Coordinate --> Axis bindings --> CellKey lookup --> Cell
//!           (literal, or executable through the expression evaluator)

pub mod axis;
pub mod binding;
pub mod cache;
pub mod cell;
pub mod column;
pub mod config;
pub mod context;
pub mod cube;
pub mod definition;
pub mod distance;
pub mod error;
pub mod evaluator;
pub mod executable;
pub mod key;
pub mod logging;
pub mod manager;
pub mod output;
pub mod range;
pub mod rule;
pub mod store;
pub mod value;


// Re-export commonly used types at the crate root
pub use axis::{Axis, AxisType};
pub use binding::{Binding, ColumnIds};
pub use cache::ProgramCache;
pub use cell::Cell;
pub use column::{Column, ColumnId, ColumnValue, IdSource, META_DEFAULT_VALUE, META_NAME};
pub use config::{EngineConfig, StopScope};
pub use context::{Coordinate, ExecutionContext};
pub use cube::Cube;
pub use definition::{AxisDefinition, CellContent, CellEntry, ColumnDefinition, CubeDefinition};
pub use distance::{levenshtein, Distance};
pub use error::{CubeError, CubeResult};
pub use evaluator::execute_program;
pub use executable::{
    run_cell, ExecutableCell, ExecutionSignal, ExpressionCell, JumpTarget, JumpTargets, NativeCell,
};
pub use key::CellKey;
pub use manager::CubeManager;
pub use output::{Failure, Output, RuleInfo, RuleStep, StepBinding};
pub use range::{Range, RangeSet, SetItem};
pub use rule::RuleState;
pub use store::CubeStore;
pub use value::{CubeValue, Point, ValueType};
