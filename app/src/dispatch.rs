//! FILENAME: app/src/dispatch.rs
// PURPOSE: Routes JSON requests to commands.
// FORMAT: one request per line in, one response per line out:
//   {"id": 1, "command": "resolve_cell", "args": {"cube": "rates", "coordinate": {...}}}
//   {"id": 1, "ok": true, "result": {...}}

use std::io::{BufRead, Write};

use cube_engine::{log_debug, log_warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::{commands, logging, AppState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Json,
    pub command: String,
    #[serde(default)]
    pub args: Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub id: Json,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Json>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn success(id: Json, result: Json) -> Self {
        Response { id, ok: true, result: Some(result), error: None }
    }

    fn failure(id: Json, error: String) -> Self {
        Response { id, ok: false, result: None, error: Some(error) }
    }
}

fn args<T: DeserializeOwned>(request: &Request) -> Result<T, String> {
    serde_json::from_value(request.args.clone())
        .map_err(|e| format!("Invalid arguments for '{}': {}", request.command, e))
}

fn reply<T: Serialize>(result: Result<T, String>) -> Result<Json, String> {
    result.and_then(|value| serde_json::to_value(value).map_err(|e| e.to_string()))
}

/// Runs one command and returns its JSON result.
pub fn dispatch(state: &AppState, request: &Request) -> Result<Json, String> {
    match request.command.as_str() {
        "resolve_cell" => reply(commands::resolve_cell(state, args(request)?)),
        "resolve_map" => reply(commands::resolve_map(state, args(request)?)),
        "list_cubes" => reply(commands::list_cubes(state)),
        "describe_cube" => reply(commands::describe_cube(state, args(request)?)),
        "load_cube_json" => reply(commands::load_cube_json(state, args(request)?)),
        "export_cube_json" => reply(commands::export_cube_json(state, args(request)?)),
        "save_cube" => reply(commands::save_cube(state, args(request)?)),
        "reload_cube" => reply(commands::reload_cube(state, args(request)?)),
        "unload_cube" => reply(commands::unload_cube(state, args(request)?)),
        "add_column" => reply(commands::add_column(state, args(request)?)),
        "ensure_column" => reply(commands::ensure_column(state, args(request)?)),
        "delete_column" => reply(commands::delete_column(state, args(request)?)),
        "set_cell" => reply(commands::set_cell(state, args(request)?)),
        "remove_cell" => reply(commands::remove_cell(state, args(request)?)),
        "export_bundle" => reply(commands::export_bundle(state, args(request)?)),
        "import_bundle" => reply(commands::import_bundle(state, args(request)?)),
        "clear_cache" => {
            state.manager.clear_cache();
            Ok(Json::Null)
        }
        "sort_log_file" => reply(logging::sort_log_file()),
        other => Err(format!("Unknown command '{}'", other)),
    }
}

/// Parses and runs one request line. Never fails: errors become responses.
pub fn handle_line(state: &AppState, line: &str) -> Response {
    let request: Request = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => return Response::failure(Json::Null, format!("Invalid request: {}", e)),
    };
    log_debug!("CMD", "ENTER {} id={}", request.command, request.id);
    match dispatch(state, &request) {
        Ok(result) => Response::success(request.id, result),
        Err(error) => {
            log_warn!("CMD", "{} failed: {}", request.command, error);
            Response::failure(request.id, error)
        }
    }
}

/// Serves requests until `input` ends. Returns how many were handled.
pub fn serve<R: BufRead, W: Write>(state: &AppState, input: R, mut output: W) -> Result<usize, String> {
    let mut handled = 0;
    for line in input.lines() {
        let line = line.map_err(|e| format!("Read error: {}", e))?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(state, &line);
        let text = serde_json::to_string(&response).map_err(|e| e.to_string())?;
        writeln!(output, "{}", text).map_err(|e| format!("Write error: {}", e))?;
        output.flush().map_err(|e| format!("Write error: {}", e))?;
        handled += 1;
    }
    Ok(handled)
}
