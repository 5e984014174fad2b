//! FILENAME: core/persistence/src/error.rs

use cube_engine::CubeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Bundle error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Cube not found: {0}")]
    CubeNotFound(String),
}

impl From<StoreError> for CubeError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::CubeNotFound(name) => CubeError::CubeNotFound(name),
            other => CubeError::Store(other.to_string()),
        }
    }
}
