//! FILENAME: app/src/tests.rs
// PURPOSE: Unit tests for configuration, log formatting and request routing.

use cube_engine::{EngineConfig, StopScope};
use log::LevelFilter;
use serde_json::json;

use crate::config::ServiceConfig;
use crate::dispatch::{handle_line, serve, Request};
use crate::logging::{format_line, init_logging, sort_log_file, write_log};
use crate::{create_memory_state, dispatch};

// ============================================================================
// CONFIG
// ============================================================================

#[test]
fn test_config_defaults() {
    let config = ServiceConfig::from_json_str("{}").unwrap();
    assert_eq!(config, ServiceConfig::default());
    assert_eq!(config.level_filter().unwrap(), LevelFilter::Info);
    assert_eq!(config.engine.max_recursion_depth, 64);
}

#[test]
fn test_config_partial_engine_section() {
    let config = ServiceConfig::from_json_str(
        r#"{"store_dir": "/tmp/cubes", "log_level": "debug",
            "engine": {"stop_scope": "enumeration", "trace_rules": false}}"#,
    )
    .unwrap();
    assert_eq!(config.store_dir.to_str(), Some("/tmp/cubes"));
    assert_eq!(config.level_filter().unwrap(), LevelFilter::Debug);
    assert_eq!(config.engine.stop_scope, StopScope::Enumeration);
    assert!(!config.engine.trace_rules);
    assert_eq!(config.engine.max_rule_steps, EngineConfig::default().max_rule_steps);
}

#[test]
fn test_config_rejects_unknown_level() {
    let err = ServiceConfig::from_json_str(r#"{"log_level": "loud"}"#).unwrap_err();
    assert!(err.contains("loud"));
}

#[test]
fn test_config_rejects_bad_engine_limits() {
    let err = ServiceConfig::from_json_str(r#"{"engine": {"max_recursion_depth": 0}}"#);
    assert!(err.is_err());
}

// ============================================================================
// LOGGING
// ============================================================================

#[test]
fn test_log_line_format() {
    assert_eq!(format_line(7, "INFO", "CUBE", "loaded 'rates'"), "7|INFO|CUBE|loaded 'rates'");
}

#[test]
fn test_log_file_collects_facade_and_direct_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("service.log");
    init_logging(Some(&path), LevelFilter::Debug, false).unwrap();

    log::info!(target: "CUBE", "loaded 'rates'");
    log::debug!(target: "cube_engine::rule", "rule step");
    write_log("WARN", "SYS", "direct line");
    assert!(sort_log_file().unwrap() >= 4);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.lines().any(|l| l.contains("|INFO|SYS|Log opened")));
    assert!(text.lines().any(|l| l.ends_with("|INFO|CUBE|loaded 'rates'")));
    assert!(text.lines().any(|l| l.ends_with("|DEBUG|rule|rule step")));
    assert!(text.lines().any(|l| l.ends_with("|WARN|SYS|direct line")));

    let seqs: Vec<u64> = text
        .lines()
        .map(|l| l.split('|').next().unwrap().parse().unwrap())
        .collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

// ============================================================================
// DISPATCH
// ============================================================================

#[test]
fn test_unknown_command() {
    let state = create_memory_state(EngineConfig::default());
    let request = Request {
        id: json!(1),
        command: "explode".to_string(),
        args: json!(null),
    };
    assert_eq!(dispatch(&state, &request).unwrap_err(), "Unknown command 'explode'");
}

#[test]
fn test_bad_arguments_are_reported() {
    let state = create_memory_state(EngineConfig::default());
    let response = handle_line(&state, r#"{"id": 2, "command": "describe_cube", "args": {}}"#);
    assert!(!response.ok);
    assert_eq!(response.id, json!(2));
    assert!(response.error.unwrap().starts_with("Invalid arguments for 'describe_cube'"));
}

#[test]
fn test_unparseable_line() {
    let state = create_memory_state(EngineConfig::default());
    let response = handle_line(&state, "not json");
    assert!(!response.ok);
    assert_eq!(response.id, json!(null));
}

#[test]
fn test_serve_skips_blank_lines() {
    let state = create_memory_state(EngineConfig::default());
    let input = "\n{\"id\": 1, \"command\": \"list_cubes\"}\n   \n{\"id\": 2, \"command\": \"clear_cache\"}\n";
    let mut out = Vec::new();
    assert_eq!(serve(&state, input.as_bytes(), &mut out).unwrap(), 2);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], json!({"id": 1, "ok": true, "result": []}));
    assert_eq!(lines[1], json!({"id": 2, "ok": true, "result": null}));
}
