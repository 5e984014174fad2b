//! FILENAME: tests/test_resolution.rs
//! Integration tests for resolving coordinates through the command layer.

mod common;

use common::TestHarness;
use serde_json::json;

// ============================================================================
// LOOKUP CUBES
// ============================================================================

#[test]
fn test_resolve_discrete_and_range() {
    let harness = TestHarness::with_fixtures();
    assert_eq!(harness.value("TaxRates", json!({"state": "TX", "age": 40})), json!(0.0625));
    assert_eq!(harness.value("taxrates", json!({"state": "oh", "age": 18})), json!(0.0575));
}

#[test]
fn test_unknown_state_falls_to_default_column() {
    let harness = TestHarness::with_fixtures();
    assert_eq!(harness.value("TaxRates", json!({"state": "CA", "age": 40})), json!(0.05));
}

#[test]
fn test_expression_cell_calls_same_cube() {
    let harness = TestHarness::with_fixtures();
    let value = harness.value("TaxRates", json!({"state": "OH", "age": 70}));
    assert!((value.as_f64().unwrap() - 0.0475).abs() < 1e-12);
}

#[test]
fn test_empty_cell_without_default_is_not_found() {
    let harness = TestHarness::with_fixtures();
    let result = harness.resolve("TaxRates", json!({"state": "TX", "age": 5})).unwrap();
    assert_eq!(result["found"], json!(false));
    assert_eq!(result["value"], json!(null));
}

#[test]
fn test_missing_axis_value_is_an_error() {
    let harness = TestHarness::with_fixtures();
    let err = harness.resolve("TaxRates", json!({"state": "TX"})).unwrap_err();
    assert!(err.contains("age"), "{}", err);

    let err = harness.resolve("TaxRates", json!({"state": "TX", "age": 400})).unwrap_err();
    assert!(err.contains("age"), "{}", err);
}

#[test]
fn test_unknown_cube() {
    let harness = TestHarness::with_fixtures();
    assert!(harness.resolve("nothing", json!({})).is_err());
}

#[test]
fn test_coordinate_must_be_an_object() {
    let harness = TestHarness::with_fixtures();
    let err = harness.resolve("TaxRates", json!([1, 2])).unwrap_err();
    assert!(err.contains("JSON object"), "{}", err);
}

#[test]
fn test_resolve_map_over_axis() {
    let harness = TestHarness::with_fixtures();
    let result = harness
        .call(
            "resolve_map",
            json!({"cube": "TaxRates", "coordinate": {"age": 30}, "axis": "state",
                   "values": ["OH", "TX", "WY"]}),
        )
        .unwrap();
    assert_eq!(
        result,
        json!([
            {"key": "OH", "value": 0.0575},
            {"key": "TX", "value": 0.0625},
            {"key": "WY", "value": 0.05}
        ])
    );
}

#[test]
fn test_resolve_map_unknown_axis() {
    let harness = TestHarness::with_fixtures();
    let err = harness
        .call(
            "resolve_map",
            json!({"cube": "TaxRates", "axis": "planet", "values": [1]}),
        )
        .unwrap_err();
    assert!(err.contains("planet"));
}

// ============================================================================
// RULE CUBES
// ============================================================================

#[test]
fn test_rules_fire_in_order_and_accumulate_output() {
    let harness = TestHarness::with_fixtures();
    let result = harness
        .resolve("discounts", json!({"total": 600, "member": false}))
        .unwrap();
    assert_eq!(result["value"], json!(10));
    assert_eq!(result["rulesExecuted"], json!(2));
    assert_eq!(result["steps"], json!(["bronze", "silver"]));
    assert_eq!(result["output"]["values"], json!({"bronze": 5, "silver": 10}));
    assert_eq!(result["output"]["return"], json!(10));
}

#[test]
fn test_stop_ends_rule_evaluation() {
    let harness = TestHarness::with_fixtures();
    let result = harness
        .resolve("discounts", json!({"total": 50, "member": true}))
        .unwrap();
    assert_eq!(result["steps"], json!(["member"]));
    assert_eq!(result["output"]["values"], json!({"member": 2}));
    assert_eq!(result["found"], json!(false));
}

#[test]
fn test_no_rule_matches() {
    let harness = TestHarness::with_fixtures();
    let result = harness.resolve("discounts", json!({"total": 1})).unwrap();
    assert_eq!(result["rulesExecuted"], json!(0));
    assert_eq!(result["found"], json!(false));
}

#[test]
fn test_resolution_does_not_change_the_cube() {
    let harness = TestHarness::with_fixtures();
    let before = harness.call("export_cube_json", json!({"cube": "discounts"})).unwrap();
    for total in [0, 100, 500, 1000] {
        harness.resolve("discounts", json!({"total": total, "member": true})).unwrap();
    }
    let after = harness.call("export_cube_json", json!({"cube": "discounts"})).unwrap();
    assert_eq!(before, after);
}
