//! FILENAME: app/src/lib.rs
// PURPOSE: Main library entry point for the cube service.
// CONTEXT: One `AppState` owns the cube manager; commands borrow it.
// Cubes are loaded from a directory store on first use.

use cube_engine::{log_info, CubeManager, CubeStore, EngineConfig};
use log::Log;
use cube_store::{DirectoryStore, MemoryStore};

pub mod api_types;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod logging;

pub use api_types::{
    AddColumnParams, AxisData, BundleParams, CellParams, ColumnData, ColumnParams, CubeParams,
    CubeSummary, EnsureColumnParams, ImportBundleParams, LoadCubeParams, MapEntry,
    ResolveMapParams, ResolveParams, ResolveResult, SetCellParams,
};
pub use config::ServiceConfig;
pub use dispatch::{dispatch, handle_line, serve, Request, Response};
pub use logging::{init_logging, next_seq, sort_log_file, write_log, ServiceLogger};

#[cfg(test)]
mod tests;

// ============================================================================
// APPLICATION STATE
// ============================================================================

pub struct AppState {
    pub manager: CubeManager,
    pub config: ServiceConfig,
}

/// State over a directory store at `config.store_dir`.
pub fn create_app_state(config: ServiceConfig) -> Result<AppState, String> {
    log_info!("SYS", "Creating AppState (store {:?})", config.store_dir);
    let store = DirectoryStore::open(&config.store_dir).map_err(|e| e.to_string())?;
    Ok(create_state_with_store(config, Box::new(store)))
}

/// State over an in-memory store.
pub fn create_memory_state(engine: EngineConfig) -> AppState {
    let config = ServiceConfig {
        engine,
        ..ServiceConfig::default()
    };
    create_state_with_store(config, Box::new(MemoryStore::new()))
}

fn create_state_with_store(config: ServiceConfig, store: Box<dyn CubeStore>) -> AppState {
    AppState {
        manager: CubeManager::with_store(config.engine.clone(), store),
        config,
    }
}

/// Loads every stored cube. Returns how many were loaded.
pub fn preload_cubes(state: &AppState) -> Result<usize, String> {
    let names = state.manager.list_cubes().map_err(|e| e.to_string())?;
    for name in &names {
        state.manager.get_cube(name).map_err(|e| e.to_string())?;
    }
    log_info!("SYS", "Preloaded {} cube(s)", names.len());
    Ok(names.len())
}

/// Sets up logging and state from `config` and serves stdin to stdout.
pub fn run(config: ServiceConfig) -> Result<(), String> {
    config.validate()?;
    init_logging(config.log_file.as_deref(), config.level_filter()?, config.echo_console)?;
    let state = create_app_state(config)?;
    if state.config.preload {
        preload_cubes(&state)?;
    }

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let handled = serve(&state, stdin.lock(), stdout.lock())?;
    log_info!("SYS", "Input closed after {} request(s)", handled);
    log::logger().flush();
    Ok(())
}
