//! FILENAME: app/src/main.rs
// PURPOSE: Service entry point. Reads JSON requests on stdin.
// USAGE: cube-service [config.json]

use std::path::Path;
use std::process::ExitCode;

use cube_service::ServiceConfig;

fn main() -> ExitCode {
    let config = match std::env::args().nth(1) {
        Some(path) => ServiceConfig::from_json_file(Path::new(&path)),
        None => Ok(ServiceConfig::default()),
    };

    match config.and_then(cube_service::run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("cube-service: {}", e);
            ExitCode::FAILURE
        }
    }
}
