//! FILENAME: tests/test_cube_editing.rs
//! Integration tests for column and cell commands.

mod common;

use std::sync::Arc;

use common::TestHarness;
use serde_json::json;

#[test]
fn test_describe_cube() {
    let harness = TestHarness::with_fixtures();
    let summary = harness.call("describe_cube", json!({"cube": "TaxRates"})).unwrap();
    assert_eq!(summary["name"], json!("TaxRates"));
    assert_eq!(summary["cellCount"], json!(5));
    assert_eq!(summary["requiredScope"], json!(["age"]));
    assert_eq!(summary["axes"][0]["axisType"], json!("DISCRETE"));
    assert_eq!(summary["axes"][0]["hasDefault"], json!(true));
    // Three columns plus the default.
    assert_eq!(summary["axes"][0]["columns"].as_array().unwrap().len(), 4);
    assert_eq!(summary["axes"][1]["valueType"], json!("LONG"));
}

#[test]
fn test_add_column_and_set_cell_by_key() {
    let harness = TestHarness::with_fixtures();
    let column = harness
        .call("add_column", json!({"cube": "TaxRates", "axis": "state", "value": "CA"}))
        .unwrap();
    assert_eq!(column["display"], json!("CA"));

    harness
        .call(
            "set_cell",
            json!({"cube": "TaxRates", "key": {"state": "CA", "age": 30},
                   "type": "value", "value": 0.0725}),
        )
        .unwrap();
    assert_eq!(harness.value("TaxRates", json!({"state": "CA", "age": 40})), json!(0.0725));
}

#[test]
fn test_add_range_column() {
    let harness = TestHarness::with_fixtures();
    harness
        .call("add_column", json!({"cube": "TaxRates", "axis": "age", "value": [150, 200]}))
        .unwrap();
    let ids = harness
        .call(
            "set_cell",
            json!({"cube": "TaxRates", "key": {"state": "TX", "age": 170},
                   "type": "expression", "source": "'centenarian'"}),
        )
        .unwrap();
    assert_eq!(ids.as_array().unwrap().len(), 2);
    assert_eq!(harness.value("TaxRates", json!({"state": "TX", "age": 180})), json!("centenarian"));
}

#[test]
fn test_add_overlapping_range_is_rejected() {
    let harness = TestHarness::with_fixtures();
    let err = harness
        .call("add_column", json!({"cube": "TaxRates", "axis": "age", "value": [10, 20]}))
        .unwrap_err();
    assert!(!err.is_empty());
}

#[test]
fn test_add_rule_column_with_name() {
    let harness = TestHarness::with_fixtures();
    harness
        .call(
            "add_column",
            json!({"cube": "discounts", "axis": "tier", "name": "gold",
                   "value": "input.total >= 1000"}),
        )
        .unwrap();
    harness
        .call(
            "set_cell",
            json!({"cube": "discounts", "key": {"tier": "gold"}, "type": "value", "value": 20}),
        )
        .unwrap();

    let result = harness.resolve("discounts", json!({"total": 2000})).unwrap();
    assert_eq!(result["steps"], json!(["bronze", "silver", "gold"]));
    assert_eq!(result["value"], json!(20));
}

#[test]
fn test_add_column_to_unknown_axis() {
    let harness = TestHarness::with_fixtures();
    let err = harness
        .call("add_column", json!({"cube": "TaxRates", "axis": "planet", "value": 1}))
        .unwrap_err();
    assert!(err.contains("planet"));
}

#[test]
fn test_ensure_column_is_idempotent() {
    let harness = TestHarness::with_fixtures();
    let args = json!({"cube": "TaxRates", "axis": "state", "value": "WA"});
    let first = harness.call("ensure_column", args.clone()).unwrap();
    let second = harness.call("ensure_column", args).unwrap();
    assert_eq!(first, second);

    let existing = harness
        .call("ensure_column", json!({"cube": "TaxRates", "axis": "state", "value": "OH"}))
        .unwrap();
    assert_ne!(existing, first);
}

#[test]
fn test_concurrent_ensure_column_adds_one() {
    let harness = Arc::new(TestHarness::with_fixtures());
    let ids: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let harness = Arc::clone(&harness);
                scope.spawn(move || {
                    harness
                        .call("ensure_column", json!({"cube": "TaxRates", "axis": "state", "value": "AK"}))
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(ids.iter().all(|id| *id == ids[0]));

    let summary = harness.call("describe_cube", json!({"cube": "TaxRates"})).unwrap();
    assert_eq!(summary["axes"][0]["columns"].as_array().unwrap().len(), 5);
}

#[test]
fn test_remove_cell() {
    let harness = TestHarness::with_fixtures();
    let coordinate = json!({"state": "TX", "age": 30});
    let removed = harness
        .call("remove_cell", json!({"cube": "TaxRates", "coordinate": coordinate}))
        .unwrap();
    assert_eq!(removed, json!(true));
    let again = harness
        .call("remove_cell", json!({"cube": "TaxRates", "coordinate": coordinate}))
        .unwrap();
    assert_eq!(again, json!(false));
    assert_eq!(harness.value("TaxRates", coordinate), json!(null));
}

#[test]
fn test_delete_column_removes_its_cells() {
    let harness = TestHarness::with_fixtures();
    let summary = harness.call("describe_cube", json!({"cube": "TaxRates"})).unwrap();
    let nj = summary["axes"][0]["columns"]
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["display"] == json!("NJ"))
        .map(|c| c["id"].clone())
        .unwrap();

    harness
        .call("delete_column", json!({"cube": "TaxRates", "axis": "state", "id": nj}))
        .unwrap();
    // NJ now falls to the default column.
    assert_eq!(harness.value("TaxRates", json!({"state": "NJ", "age": 30})), json!(0.05));
    let summary = harness.call("describe_cube", json!({"cube": "TaxRates"})).unwrap();
    assert_eq!(summary["cellCount"], json!(4));
}

#[test]
fn test_set_cell_needs_ids_or_key() {
    let harness = TestHarness::with_fixtures();
    let err = harness
        .call("set_cell", json!({"cube": "TaxRates", "type": "value", "value": 1}))
        .unwrap_err();
    assert!(err.contains("neither ids nor key"));
}

#[test]
fn test_failed_edit_leaves_cube_unchanged() {
    let harness = TestHarness::with_fixtures();
    let before = harness.call("export_cube_json", json!({"cube": "TaxRates"})).unwrap();
    let err = harness.call(
        "set_cell",
        json!({"cube": "TaxRates", "key": {"state": "OH", "age": 999}, "type": "value", "value": 1}),
    );
    assert!(err.is_err());
    let after = harness.call("export_cube_json", json!({"cube": "TaxRates"})).unwrap();
    assert_eq!(before, after);
}
