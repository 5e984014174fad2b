//! FILENAME: tests/common/mod.rs
//! Test harness and fixtures for cube service integration tests.

#![allow(dead_code)]

use std::path::Path;

use cube_engine::EngineConfig;
use cube_service::{
    create_app_state, create_memory_state, dispatch, AppState, Request, ServiceConfig,
};
use serde_json::{json, Value as Json};

/// Sales tax by state and age band, with a default state column.
pub const TAX_RATES: &str = r#"{
    "name": "TaxRates",
    "axes": [
        {
            "name": "state", "type": "DISCRETE", "value_type": "STRING", "has_default": true,
            "columns": [ { "value": "OH" }, { "value": "TX" }, { "value": "NJ" } ]
        },
        {
            "name": "age", "type": "RANGE", "value_type": "LONG",
            "columns": [ { "value": [0, 18] }, { "value": [18, 65] }, { "value": [65, 150] } ]
        }
    ],
    "cells": [
        { "key": { "state": "OH", "age": 30 }, "type": "value", "value": 0.0575 },
        { "key": { "state": "TX", "age": 30 }, "type": "value", "value": 0.0625 },
        { "key": { "state": "NJ", "age": 30 }, "type": "value", "value": 0.06625 },
        { "key": { "age": 30 }, "type": "value", "value": 0.05 },
        { "key": { "state": "OH", "age": 70 }, "type": "expression", "source": "at({age: 30}) - 0.01" }
    ]
}"#;

/// Discount tiers evaluated as rules, every matching tier fires.
pub const DISCOUNTS: &str = r#"{
    "name": "discounts",
    "axes": [
        {
            "name": "tier", "type": "RULE", "value_type": "EXPRESSION",
            "columns": [
                { "value": "input.total >= 100", "name": "bronze" },
                { "value": "input.total >= 500", "name": "silver" },
                { "value": "input.member == true", "name": "member" }
            ]
        }
    ],
    "cells": [
        { "key": { "tier": "bronze" }, "type": "expression", "source": "output.bronze = 5; 5" },
        { "key": { "tier": "silver" }, "type": "expression", "source": "output.silver = 10; 10" },
        { "key": { "tier": "member" }, "type": "expression", "source": "output.member = 2; stop()" }
    ]
}"#;

/// Test harness wrapping one service state.
pub struct TestHarness {
    pub state: AppState,
}

impl TestHarness {
    /// Empty state over an in-memory store.
    pub fn new() -> Self {
        TestHarness {
            state: create_memory_state(EngineConfig::default()),
        }
    }

    /// State over a directory store rooted at `dir`.
    pub fn with_directory(dir: &Path) -> Self {
        let config = ServiceConfig {
            store_dir: dir.to_path_buf(),
            ..ServiceConfig::default()
        };
        TestHarness {
            state: create_app_state(config).unwrap(),
        }
    }

    /// In-memory state with both fixture cubes loaded.
    pub fn with_fixtures() -> Self {
        let harness = Self::new();
        harness.load(TAX_RATES);
        harness.load(DISCOUNTS);
        harness
    }

    pub fn load(&self, definition: &str) {
        self.call("load_cube_json", json!({ "json": definition })).unwrap();
    }

    /// Runs a command through the dispatcher.
    pub fn call(&self, command: &str, args: Json) -> Result<Json, String> {
        let request = Request {
            id: json!(0),
            command: command.to_string(),
            args,
        };
        dispatch(&self.state, &request)
    }

    /// Resolves and returns the whole result object.
    pub fn resolve(&self, cube: &str, coordinate: Json) -> Result<Json, String> {
        self.call("resolve_cell", json!({ "cube": cube, "coordinate": coordinate }))
    }

    /// Resolves and returns only the value.
    pub fn value(&self, cube: &str, coordinate: Json) -> Json {
        self.resolve(cube, coordinate).unwrap()["value"].clone()
    }
}
