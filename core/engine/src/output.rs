//! FILENAME: core/engine/src/output.rs
//! PURPOSE: The output map shared by every cell executed during one call.
//! CONTEXT: Cells write user values into `values`; the resolver records the
//! accumulated return value and the rule trace. Nested cube calls share the
//! same `Output`, so it is append-only from the resolver's side.

use std::collections::BTreeMap;

use serde_json::{json, Value as Json};

use crate::column::ColumnId;
use crate::value::CubeValue;

/// One axis's column in a rule step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepBinding {
    pub axis: String,
    pub column_id: ColumnId,
    /// Rule name or column value text.
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuleStep {
    pub cube: String,
    pub bindings: Vec<StepBinding>,
    pub value: CubeValue,
}

impl RuleStep {
    /// Column labels joined in axis order, e.g. `"A1B2"` or `"A1/B2"`.
    pub fn label(&self, separator: &str) -> String {
        self.bindings
            .iter()
            .map(|b| b.column.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RuleInfo {
    pub steps: Vec<RuleStep>,
    pub rules_executed: usize,
    /// Bindings of the most recently executed step.
    pub last_bindings: Vec<StepBinding>,
}

impl RuleInfo {
    pub fn labels(&self, separator: &str) -> Vec<String> {
        self.steps.iter().map(|s| s.label(separator)).collect()
    }

    pub fn to_json(&self) -> Json {
        json!({
            "rules_executed": self.rules_executed,
            "steps": self.steps.iter().map(|step| json!({
                "cube": step.cube,
                "bindings": step.bindings.iter().map(binding_json).collect::<Vec<_>>(),
                "value": step.value.to_json(),
            })).collect::<Vec<_>>(),
            "last_bindings": self.last_bindings.iter().map(binding_json).collect::<Vec<_>>(),
        })
    }
}

fn binding_json(binding: &StepBinding) -> Json {
    json!({
        "axis": binding.axis,
        "column_id": binding.column_id,
        "column": binding.column,
    })
}

/// A failed assertion raised by a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub cube: String,
    pub coordinate: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Output {
    pub values: BTreeMap<String, CubeValue>,
    pub return_value: CubeValue,
    pub rule_info: RuleInfo,
    pub failures: Vec<Failure>,
}

impl Output {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CubeValue> {
        self.values.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: CubeValue) {
        self.values.insert(key.into(), value);
    }

    pub fn to_json(&self) -> Json {
        let values: serde_json::Map<String, Json> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();
        json!({
            "values": values,
            "return": self.return_value.to_json(),
            "rule_info": self.rule_info.to_json(),
            "failures": self.failures.iter().map(|f| json!({
                "cube": f.cube,
                "coordinate": f.coordinate,
                "message": f.message,
            })).collect::<Vec<_>>(),
        })
    }
}
