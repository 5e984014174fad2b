//! FILENAME: app/src/config.rs
// PURPOSE: Service configuration, read from a JSON file.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use cube_engine::EngineConfig;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Directory holding one `<name>.json` definition per cube.
    pub store_dir: PathBuf,
    /// Unified log file; no file logging when unset.
    pub log_file: Option<PathBuf>,
    /// `off`, `error`, `warn`, `info`, `debug` or `trace`.
    pub log_level: String,
    pub echo_console: bool,
    /// Load every stored cube at startup instead of on first use.
    pub preload: bool,
    pub engine: EngineConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            store_dir: PathBuf::from("cubes"),
            log_file: None,
            log_level: "info".to_string(),
            echo_console: false,
            preload: false,
            engine: EngineConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_json_str(json: &str) -> Result<Self, String> {
        let config: ServiceConfig =
            serde_json::from_str(json).map_err(|e| format!("Invalid service config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {:?}: {}", path, e))?;
        Self::from_json_str(&text)
    }

    pub fn level_filter(&self) -> Result<LevelFilter, String> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| format!("Unknown log level '{}'", self.log_level))
    }

    pub fn validate(&self) -> Result<(), String> {
        self.level_filter()?;
        self.engine.validate().map_err(|e| e.to_string())
    }
}
