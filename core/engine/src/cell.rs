//! FILENAME: core/engine/src/cell.rs
//! PURPOSE: Contents of a cube cell.
//! CONTEXT: A cell is either a literal value or a handle to an executable
//! cell. Executable cells are shared (`Arc`) so cloning a cube for a
//! copy-on-write update keeps compiled programs.

use std::fmt;
use std::sync::Arc;

use crate::context::ExecutionContext;
use crate::error::CubeResult;
use crate::executable::{ExecutableCell, ExecutionSignal, ExpressionCell, NativeCell};
use crate::value::CubeValue;

#[derive(Debug, Clone)]
pub enum Cell {
    Value(CubeValue),
    Executable(Arc<dyn ExecutableCell>),
}

impl Cell {
    /// A cell holding expression-language source, compiled on first use.
    pub fn expression(source: impl Into<String>) -> Cell {
        Cell::Executable(Arc::new(ExpressionCell::new(source)))
    }

    /// A cell backed by a Rust closure.
    pub fn native<F>(signature: impl Into<String>, func: F) -> Cell
    where
        F: Fn(&mut ExecutionContext<'_>) -> CubeResult<ExecutionSignal> + Send + Sync + 'static,
    {
        Cell::Executable(Arc::new(NativeCell::new(signature, func)))
    }

    pub fn is_executable(&self) -> bool {
        matches!(self, Cell::Executable(_))
    }

    pub fn literal(&self) -> Option<&CubeValue> {
        match self {
            Cell::Value(v) => Some(v),
            Cell::Executable(_) => None,
        }
    }
}

impl From<CubeValue> for Cell {
    fn from(value: CubeValue) -> Self {
        Cell::Value(value)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Value(v) => write!(f, "{}", v),
            Cell::Executable(exec) => write!(f, "{}", exec.source().unwrap_or(exec.signature())),
        }
    }
}
