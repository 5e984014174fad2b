//! FILENAME: core/engine/src/executable.rs
//! PURPOSE: The contract between the cube and cells that run code.
//! CONTEXT: The cube never knows how a cell computes its value. It calls
//! `fetch`, `prepare` and `execute` through `run_cell`, which enforces the
//! sticky-failure rule: a cell that failed to prepare once is never
//! prepared again and fails immediately on every later call.
//!
//! Control flow out of a cell (stop, jump) is a returned `ExecutionSignal`,
//! not an error.

use std::fmt;
use std::sync::Arc;

use cube_expr::Program;
use once_cell::sync::OnceCell;

use crate::cache::compile_program;
use crate::column::ColumnId;
use crate::context::ExecutionContext;
use crate::error::{CubeError, CubeResult};
use crate::evaluator;
use crate::logging::log_debug;
use crate::value::CubeValue;

// ============================================================================
// SIGNALS
// ============================================================================

/// Where a jump sends a rule axis.
#[derive(Debug, Clone, PartialEq)]
pub enum JumpTarget {
    /// Column name (rule name) or display value.
    Name(String),
    Id(ColumnId),
}

impl JumpTarget {
    pub fn from_value(value: &CubeValue) -> Option<JumpTarget> {
        match value {
            CubeValue::Text(s) => Some(JumpTarget::Name(s.clone())),
            CubeValue::Long(id) if *id > 0 => Some(JumpTarget::Id(*id as ColumnId)),
            _ => None,
        }
    }
}

impl fmt::Display for JumpTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JumpTarget::Name(name) => write!(f, "'{}'", name),
            JumpTarget::Id(id) => write!(f, "#{}", id),
        }
    }
}

/// Axis name to target, in the order given.
pub type JumpTargets = Vec<(String, JumpTarget)>;

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionSignal {
    Continue(CubeValue),
    /// Stop the current rule enumeration.
    Stop,
    /// Restart the named rule axes at the given columns.
    Jump(JumpTargets),
}

// ============================================================================
// CONTRACT
// ============================================================================

pub trait ExecutableCell: Send + Sync + fmt::Debug {
    /// Identity of the code, used as the program cache key.
    fn signature(&self) -> &str;

    /// Source text, if the cell has any. Cells without source cannot be saved.
    fn source(&self) -> Option<&str> {
        None
    }

    fn has_errors(&self) -> bool;

    fn error_message(&self) -> Option<String>;

    /// Retrieves lazily loaded content. Most cells have nothing to fetch.
    fn fetch(&self, _ctx: &mut ExecutionContext<'_>) -> CubeResult<()> {
        Ok(())
    }

    /// Compiles the cell. Must be idempotent.
    fn prepare(&self, ctx: &mut ExecutionContext<'_>) -> CubeResult<()>;

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> CubeResult<ExecutionSignal>;
}

/// Runs an executable cell through fetch/prepare/execute.
pub fn run_cell(cell: &dyn ExecutableCell, ctx: &mut ExecutionContext<'_>) -> CubeResult<ExecutionSignal> {
    if cell.has_errors() {
        return Err(CubeError::CellCompile {
            message: format!(
                "previously failed to compile: {}",
                cell.error_message().unwrap_or_default()
            ),
        });
    }
    cell.fetch(ctx)?;
    cell.prepare(ctx)?;
    cell.execute(ctx)
}

// ============================================================================
// EXPRESSION CELL
// ============================================================================

/// A cell written in the cube expression language.
#[derive(Debug)]
pub struct ExpressionCell {
    source: String,
    program: OnceCell<Result<Arc<Program>, String>>,
}

impl ExpressionCell {
    pub fn new(source: impl Into<String>) -> Self {
        ExpressionCell {
            source: source.into(),
            program: OnceCell::new(),
        }
    }

    fn program(&self, ctx: &ExecutionContext<'_>) -> &Result<Arc<Program>, String> {
        self.program.get_or_init(|| match ctx.programs() {
            Some(cache) => cache.get_or_compile(&self.source),
            None => compile_program(&self.source),
        })
    }
}

impl ExecutableCell for ExpressionCell {
    fn signature(&self) -> &str {
        &self.source
    }

    fn source(&self) -> Option<&str> {
        Some(&self.source)
    }

    fn has_errors(&self) -> bool {
        matches!(self.program.get(), Some(Err(_)))
    }

    fn error_message(&self) -> Option<String> {
        match self.program.get() {
            Some(Err(message)) => Some(message.clone()),
            _ => None,
        }
    }

    fn prepare(&self, ctx: &mut ExecutionContext<'_>) -> CubeResult<()> {
        match self.program(ctx) {
            Ok(_) => Ok(()),
            Err(message) => {
                log_debug!("EXEC", "compile failed for '{}': {}", self.source, message);
                Err(CubeError::CellCompile {
                    message: message.clone(),
                })
            }
        }
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> CubeResult<ExecutionSignal> {
        let program = match self.program(ctx) {
            Ok(program) => Arc::clone(program),
            Err(message) => {
                return Err(CubeError::CellCompile {
                    message: message.clone(),
                })
            }
        };
        evaluator::execute_program(&program, ctx)
    }
}

// ============================================================================
// NATIVE CELL
// ============================================================================

type NativeFn = dyn Fn(&mut ExecutionContext<'_>) -> CubeResult<ExecutionSignal> + Send + Sync;

/// A cell backed by a Rust closure. Used by embedders and tests; it has no
/// source text and cannot be written to a definition.
pub struct NativeCell {
    signature: String,
    func: Box<NativeFn>,
}

impl NativeCell {
    pub fn new<F>(signature: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut ExecutionContext<'_>) -> CubeResult<ExecutionSignal> + Send + Sync + 'static,
    {
        NativeCell {
            signature: signature.into(),
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for NativeCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCell")
            .field("signature", &self.signature)
            .finish()
    }
}

impl ExecutableCell for NativeCell {
    fn signature(&self) -> &str {
        &self.signature
    }

    fn has_errors(&self) -> bool {
        false
    }

    fn error_message(&self) -> Option<String> {
        None
    }

    fn prepare(&self, _ctx: &mut ExecutionContext<'_>) -> CubeResult<()> {
        Ok(())
    }

    fn execute(&self, ctx: &mut ExecutionContext<'_>) -> CubeResult<ExecutionSignal> {
        (self.func)(ctx)
    }
}
