//! FILENAME: core/engine/src/error.rs

use thiserror::Error;

use crate::output::RuleInfo;

pub type CubeResult<T> = Result<T, CubeError>;

#[derive(Error, Debug)]
pub enum CubeError {
    /// An axis had no matching column and no default column.
    #[error("Coordinate not found in cube '{cube}': axis '{axis}' has no column for {value}")]
    CoordinateNotFound {
        cube: String,
        axis: String,
        value: String,
    },

    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    #[error("Invalid axis: {0}")]
    InvalidAxis(String),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A jump named an axis or column that does not exist.
    #[error("Invalid jump in cube '{cube}': {message}")]
    InvalidJump {
        cube: String,
        message: String,
        partial: Box<RuleInfo>,
    },

    #[error("Failed to compile cell: {message}")]
    CellCompile { message: String },

    /// A cell failed while executing. Carries the rule trace gathered so far.
    #[error("Error executing cube '{cube}' at {coordinate}: {source}")]
    Execution {
        cube: String,
        coordinate: String,
        partial: Box<RuleInfo>,
        source: Box<CubeError>,
    },

    #[error("Recursion limit of {limit} exceeded calling cube '{cube}'")]
    RecursionLimit { cube: String, limit: usize },

    /// Rule execution ran past the step limit, usually a jump loop.
    #[error("Rule step limit of {limit} exceeded in cube '{cube}' at {coordinate}")]
    RuleLimit {
        cube: String,
        coordinate: String,
        limit: usize,
        partial: Box<RuleInfo>,
    },

    #[error("Cube not found: {0}")]
    CubeNotFound(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Invalid cube definition: {0}")]
    Definition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Runtime failure inside an expression (type mismatch, division by zero, ...).
    #[error("Expression error: {0}")]
    Expression(String),
}

impl CubeError {
    /// Follows `Execution` wrappers down to the error that started the failure.
    pub fn root_cause(&self) -> &CubeError {
        match self {
            CubeError::Execution { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The rule trace attached to an aborted execution, if any.
    pub fn partial_output(&self) -> Option<&RuleInfo> {
        match self {
            CubeError::Execution { partial, .. }
            | CubeError::InvalidJump { partial, .. }
            | CubeError::RuleLimit { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
