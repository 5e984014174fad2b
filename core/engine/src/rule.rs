//! FILENAME: core/engine/src/rule.rs
//! PURPOSE: Cartesian enumeration of rule bindings with stop/jump handling.
//! CONTEXT: Built by `Cube::resolve_in` when any binding holds more than one
//! column or comes from a RULE axis. The bindings are stepped like an
//! odometer in declared axis order, last axis fastest, and the cell at each
//! combination is executed. Cells steer the loop by returning
//! `ExecutionSignal::Stop` or `ExecutionSignal::Jump`.

use crate::axis::AxisType;
use crate::binding::{Binding, ColumnIds};
use crate::column::{Column, ColumnId};
use crate::config::StopScope;
use crate::context::ExecutionContext;
use crate::cube::Cube;
use crate::error::{CubeError, CubeResult};
use crate::executable::{ExecutionSignal, JumpTarget};
use crate::logging::{log_debug, log_enter, log_exit};
use crate::output::{RuleStep, StepBinding};
use crate::value::CubeValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleState {
    Running,
    Stopped,
    Jumping,
    Done,
}

pub(crate) struct RuleExecutor<'c> {
    cube: &'c Cube,
    bindings: Vec<Binding>,
    /// Column lists as first bound. A jump re-evaluates a rule axis for the
    /// current pass only; the list is restored when that axis wraps.
    base: Vec<ColumnIds>,
    /// Index into each binding's column list.
    cursors: Vec<usize>,
    state: RuleState,
    steps: usize,
}

impl<'c> RuleExecutor<'c> {
    pub(crate) fn new(cube: &'c Cube, bindings: Vec<Binding>) -> Self {
        let cursors = vec![0; bindings.len()];
        let base = bindings.iter().map(|b| b.column_ids.clone()).collect();
        RuleExecutor {
            cube,
            bindings,
            base,
            cursors,
            state: RuleState::Running,
            steps: 0,
        }
    }

    /// Runs every combination. Returns the value of the last cell that
    /// produced one, or `None` when nothing did.
    pub(crate) fn run(mut self, ctx: &mut ExecutionContext<'_>) -> CubeResult<Option<CubeValue>> {
        log_enter!("RULE", "run", "{} with {} bindings", self.cube.name(), self.bindings.len());
        let config = ctx.config();
        let mut last = None;

        if self.bindings.iter().any(Binding::is_empty) {
            self.state = RuleState::Done;
        }

        while self.state == RuleState::Running {
            self.steps += 1;
            if self.steps > config.max_rule_steps {
                return Err(CubeError::RuleLimit {
                    cube: self.cube.name().to_string(),
                    coordinate: ctx.coordinate().to_string(),
                    limit: config.max_rule_steps,
                    partial: Box::new(ctx.output().rule_info.clone()),
                });
            }

            let ids = self.current_ids();
            let step_bindings = self.step_bindings(&ids);
            {
                let info = &mut ctx.output_mut().rule_info;
                info.rules_executed += 1;
                info.last_bindings = step_bindings.clone();
            }

            let signal = self.cube.execute_at(ctx, &ids)?;
            if config.trace_rules {
                let value = match &signal {
                    Some(ExecutionSignal::Continue(v)) => v.clone(),
                    _ => CubeValue::Null,
                };
                ctx.output_mut().rule_info.steps.push(RuleStep {
                    cube: self.cube.name().to_string(),
                    bindings: step_bindings,
                    value,
                });
            }

            match signal {
                None => {
                    log_debug!("RULE", "no cell at {:?} in '{}'", ids, self.cube.name());
                    self.advance();
                }
                Some(ExecutionSignal::Continue(value)) => {
                    ctx.output_mut().return_value = value.clone();
                    last = Some(value);
                    self.advance();
                }
                Some(ExecutionSignal::Stop) => {
                    self.state = RuleState::Stopped;
                    self.stop(config.stop_scope);
                }
                Some(ExecutionSignal::Jump(targets)) => {
                    self.state = RuleState::Jumping;
                    self.jump(ctx, &targets)?;
                }
            }
        }

        log_exit!("RULE", "run", "{} after {} steps", self.cube.name(), self.steps);
        Ok(last)
    }

    fn current_ids(&self) -> Vec<ColumnId> {
        self.bindings
            .iter()
            .zip(&self.cursors)
            .map(|(b, &c)| b.column_ids[c])
            .collect()
    }

    fn step_bindings(&self, ids: &[ColumnId]) -> Vec<StepBinding> {
        self.bindings
            .iter()
            .zip(ids)
            .map(|(b, &id)| StepBinding {
                axis: b.axis.clone(),
                column_id: id,
                column: self
                    .cube
                    .axis(&b.axis)
                    .and_then(|a| a.column(id))
                    .map(Column::display)
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// Position of the last binding that is actually enumerated.
    fn innermost(&self) -> Option<usize> {
        self.bindings.iter().rposition(Binding::is_enumerated)
    }

    /// Moves the cursor at `level` forward, carrying into outer levels.
    /// Returns false once every combination is used up.
    fn advance_from(&mut self, level: usize) -> bool {
        for i in (0..=level).rev() {
            self.cursors[i] += 1;
            if self.cursors[i] < self.bindings[i].len() {
                return true;
            }
            self.rewind(i);
        }
        false
    }

    fn rewind(&mut self, level: usize) {
        self.cursors[level] = 0;
        self.bindings[level].column_ids = self.base[level].clone();
    }

    fn advance(&mut self) {
        let more = match self.bindings.len() {
            0 => false,
            n => self.advance_from(n - 1),
        };
        self.state = if more { RuleState::Running } else { RuleState::Done };
    }

    /// Ends the current pass over the innermost enumerated axis and moves on
    /// to the next outer combination, or ends everything.
    fn stop(&mut self, scope: StopScope) {
        let next = match (scope, self.innermost()) {
            (StopScope::Enumeration, _) | (_, None) | (_, Some(0)) => false,
            (StopScope::InnermostAxis, Some(inner)) => {
                for level in inner..self.cursors.len() {
                    self.rewind(level);
                }
                self.advance_from(inner - 1)
            }
        };
        log_debug!("RULE", "stop in '{}', continuing: {}", self.cube.name(), next);
        self.state = if next { RuleState::Running } else { RuleState::Done };
    }

    /// Repositions the named axes. Rule axes are re-evaluated starting at the
    /// target, which fires unconditionally. Execution resumes at the target
    /// when the innermost enumerated axis was named; otherwise the odometer
    /// moves on from the repositioned cursors.
    fn jump(&mut self, ctx: &mut ExecutionContext<'_>, targets: &[(String, JumpTarget)]) -> CubeResult<()> {
        let cube = self.cube;
        let inner = self.innermost();
        let mut resume_here = false;

        for (axis_name, target) in targets {
            let pos = self
                .bindings
                .iter()
                .position(|b| b.axis.eq_ignore_ascii_case(axis_name))
                .ok_or_else(|| {
                    invalid_jump(
                        cube,
                        ctx,
                        format!("axis '{}' is not bound in this execution", axis_name),
                    )
                })?;
            let axis = cube.axis(&self.bindings[pos].axis).ok_or_else(|| {
                invalid_jump(cube, ctx, format!("axis '{}' no longer exists", axis_name))
            })?;
            let target_id = match target {
                JumpTarget::Id(id) => axis.column(*id).map(Column::id),
                JumpTarget::Name(name) => axis.find_column_by_name(name).map(Column::id),
            }
            .ok_or_else(|| {
                invalid_jump(
                    cube,
                    ctx,
                    format!("column {} not found on axis '{}'", target, axis.name()),
                )
            })?;

            if axis.axis_type() == AxisType::Rule {
                let ids = axis
                    .find_rule_columns(ctx, Some(target_id), true)
                    .map_err(|e| cube.execution_error(ctx, e))?;
                self.bindings[pos].column_ids = ids;
                self.cursors[pos] = 0;
            } else {
                let idx = self.bindings[pos]
                    .column_ids
                    .iter()
                    .position(|&id| id == target_id)
                    .ok_or_else(|| {
                        invalid_jump(
                            cube,
                            ctx,
                            format!("column {} is not bound on axis '{}'", target, axis.name()),
                        )
                    })?;
                self.cursors[pos] = idx;
            }
            log_debug!("RULE", "jump on '{}' to {}", axis.name(), target);

            if Some(pos) == inner {
                resume_here = true;
            }
        }

        if resume_here {
            self.state = RuleState::Running;
        } else {
            self.advance();
        }
        Ok(())
    }
}

fn invalid_jump(cube: &Cube, ctx: &ExecutionContext<'_>, message: String) -> CubeError {
    CubeError::InvalidJump {
        cube: cube.name().to_string(),
        message,
        partial: Box::new(ctx.output().rule_info.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::Axis;
    use crate::cell::Cell;
    use crate::config::EngineConfig;
    use crate::context::Coordinate;
    use crate::executable::JumpTarget;
    use crate::output::Output;
    use crate::value::ValueType;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Rule axes A (A1, A2) and B (B1, B2, B3) whose conditions are all true,
    /// with a literal at every combination.
    fn two_rule_axes() -> Cube {
        let mut cube = Cube::new("rules");
        cube.add_axis(Axis::new("A", AxisType::Rule, ValueType::Expression, false).unwrap())
            .unwrap();
        cube.add_axis(Axis::new("B", AxisType::Rule, ValueType::Expression, false).unwrap())
            .unwrap();
        for a in ["A1", "A2"] {
            cube.add_rule_column("A", a, Cell::Value(CubeValue::Bool(true))).unwrap();
        }
        for b in ["B1", "B2", "B3"] {
            cube.add_rule_column("B", b, Cell::Value(CubeValue::Bool(true))).unwrap();
        }
        for a in ["A1", "A2"] {
            for b in ["B1", "B2", "B3"] {
                set_at(&mut cube, a, b, Cell::Value(CubeValue::from(format!("{}{}", a, b))));
            }
        }
        cube
    }

    fn set_at(cube: &mut Cube, a: &str, b: &str, cell: Cell) {
        let coord = Coordinate::new().with("A", a).with("B", b);
        cube.set_cell_by_coordinate(&coord, cell).unwrap();
    }

    fn run(cube: &Cube, config: &EngineConfig) -> (CubeResult<Option<CubeValue>>, Output) {
        let mut output = Output::new();
        let result = cube.resolve_with_config(&Coordinate::new(), &mut output, config);
        (result, output)
    }

    fn labels(output: &Output) -> Vec<String> {
        output.rule_info.labels("")
    }

    #[test]
    fn test_cartesian_order_follows_axis_declaration() {
        let cube = two_rule_axes();
        let (result, output) = run(&cube, &EngineConfig::default());
        assert_eq!(
            labels(&output),
            vec!["A1B1", "A1B2", "A1B3", "A2B1", "A2B2", "A2B3"]
        );
        assert_eq!(result.unwrap(), Some(CubeValue::from("A2B3")));
        assert_eq!(output.return_value, CubeValue::from("A2B3"));
        assert_eq!(output.rule_info.rules_executed, 6);
        assert_eq!(output.rule_info.last_bindings[0].column, "A2");
        assert_eq!(output.rule_info.last_bindings[1].column, "B3");
    }

    #[test]
    fn test_stop_ends_innermost_axis_pass() {
        let mut cube = two_rule_axes();
        set_at(&mut cube, "A1", "B2", Cell::native("stop", |_| Ok(ExecutionSignal::Stop)));
        let (result, output) = run(&cube, &EngineConfig::default());
        assert_eq!(
            labels(&output),
            vec!["A1B1", "A1B2", "A2B1", "A2B2", "A2B3"]
        );
        assert_eq!(result.unwrap(), Some(CubeValue::from("A2B3")));
    }

    #[test]
    fn test_stop_in_last_outer_pass_ends_everything() {
        let mut cube = two_rule_axes();
        set_at(&mut cube, "A2", "B1", Cell::native("stop", |_| Ok(ExecutionSignal::Stop)));
        let (_, output) = run(&cube, &EngineConfig::default());
        assert_eq!(
            labels(&output),
            vec!["A1B1", "A1B2", "A1B3", "A2B1"]
        );
    }

    #[test]
    fn test_stop_with_enumeration_scope_ends_everything() {
        let mut cube = two_rule_axes();
        set_at(&mut cube, "A1", "B2", Cell::native("stop", |_| Ok(ExecutionSignal::Stop)));
        let config = EngineConfig {
            stop_scope: StopScope::Enumeration,
            ..EngineConfig::default()
        };
        let (result, output) = run(&cube, &config);
        assert_eq!(labels(&output), vec!["A1B1", "A1B2"]);
        assert_eq!(result.unwrap(), Some(CubeValue::from("A1B1")));
    }

    #[test]
    fn test_jump_on_outer_axis_keeps_inner_cursor() {
        let mut cube = two_rule_axes();
        let jumped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&jumped);
        set_at(
            &mut cube,
            "A2",
            "B2",
            Cell::native("jump-once", move |_| {
                if flag.swap(true, Ordering::SeqCst) {
                    Ok(ExecutionSignal::Continue(CubeValue::from("A2B2")))
                } else {
                    Ok(ExecutionSignal::Jump(vec![(
                        "a".to_string(),
                        JumpTarget::Name("A1".to_string()),
                    )]))
                }
            }),
        );
        let (result, output) = run(&cube, &EngineConfig::default());
        assert_eq!(
            labels(&output),
            vec![
                "A1B1", "A1B2", "A1B3", "A2B1", "A2B2", "A1B3", "A2B1", "A2B2", "A2B3"
            ]
        );
        assert!(jumped.load(Ordering::SeqCst));
        assert_eq!(result.unwrap(), Some(CubeValue::from("A2B3")));
    }

    #[test]
    fn test_jump_on_innermost_axis_resumes_at_target() {
        let mut cube = two_rule_axes();
        let jumped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&jumped);
        set_at(
            &mut cube,
            "A1",
            "B3",
            Cell::native("jump-once", move |_| {
                if flag.swap(true, Ordering::SeqCst) {
                    Ok(ExecutionSignal::Continue(CubeValue::Null))
                } else {
                    Ok(ExecutionSignal::Jump(vec![(
                        "B".to_string(),
                        JumpTarget::Name("B2".to_string()),
                    )]))
                }
            }),
        );
        let (_, output) = run(&cube, &EngineConfig::default());
        assert_eq!(
            labels(&output),
            vec!["A1B1", "A1B2", "A1B3", "A1B2", "A1B3", "A2B1", "A2B2", "A2B3"]
        );
    }

    #[test]
    fn test_jump_to_unknown_column_is_fatal_with_partial_output() {
        let mut cube = two_rule_axes();
        set_at(
            &mut cube,
            "A1",
            "B2",
            Cell::native("bad-jump", |_| {
                Ok(ExecutionSignal::Jump(vec![(
                    "A".to_string(),
                    JumpTarget::Name("A9".to_string()),
                )]))
            }),
        );
        let (result, _) = run(&cube, &EngineConfig::default());
        let err = result.unwrap_err();
        assert!(matches!(err, CubeError::InvalidJump { .. }));
        let partial = err.partial_output().unwrap();
        assert_eq!(partial.labels(""), vec!["A1B1", "A1B2"]);
    }

    #[test]
    fn test_jump_to_unbound_axis_is_fatal() {
        let mut cube = two_rule_axes();
        set_at(
            &mut cube,
            "A1",
            "B1",
            Cell::native("bad-axis", |_| {
                Ok(ExecutionSignal::Jump(vec![(
                    "C".to_string(),
                    JumpTarget::Name("C1".to_string()),
                )]))
            }),
        );
        let (result, _) = run(&cube, &EngineConfig::default());
        assert!(matches!(result, Err(CubeError::InvalidJump { .. })));
    }

    #[test]
    fn test_cell_error_aborts_whole_enumeration() {
        let mut cube = two_rule_axes();
        set_at(&mut cube, "A1", "B3", Cell::expression("missing.value + 1"));
        let (result, output) = run(&cube, &EngineConfig::default());
        let err = result.unwrap_err();
        match &err {
            CubeError::Execution { cube, partial, .. } => {
                assert_eq!(cube, "rules");
                assert_eq!(partial.labels(""), vec!["A1B1", "A1B2"]);
            }
            other => panic!("expected Execution, got {:?}", other),
        }
        assert_eq!(output.rule_info.rules_executed, 3);
    }

    #[test]
    fn test_step_limit() {
        let cube = two_rule_axes();
        let config = EngineConfig {
            max_rule_steps: 4,
            ..EngineConfig::default()
        };
        let (result, _) = run(&cube, &config);
        assert!(matches!(result, Err(CubeError::RuleLimit { limit: 4, .. })));

        // The error keeps the coordinate and the steps that did run.
        let mut output = Output::new();
        let coord = Coordinate::new().with("tier", "gold");
        let err = cube.resolve_with_config(&coord, &mut output, &config).unwrap_err();
        match &err {
            CubeError::RuleLimit { cube, coordinate, .. } => {
                assert_eq!(cube, "rules");
                assert!(coordinate.contains("gold"));
            }
            other => panic!("expected RuleLimit, got {:?}", other),
        }
        let partial = err.partial_output().unwrap();
        assert_eq!(partial.labels(""), vec!["A1B1", "A1B2", "A1B3", "A2B1"]);
        assert_eq!(partial.rules_executed, 4);
    }

    #[test]
    fn test_trace_can_be_disabled() {
        let cube = two_rule_axes();
        let config = EngineConfig {
            trace_rules: false,
            ..EngineConfig::default()
        };
        let (_, output) = run(&cube, &config);
        assert!(output.rule_info.steps.is_empty());
        assert_eq!(output.rule_info.rules_executed, 6);
    }

    #[test]
    fn test_first_rule_only_when_fire_all_is_off() {
        let mut cube = two_rule_axes();
        cube.set_axis_fire_all("B", false).unwrap();
        let (_, output) = run(&cube, &EngineConfig::default());
        assert_eq!(labels(&output), vec!["A1B1", "A2B1"]);
    }

    #[test]
    fn test_coordinate_names_starting_rule() {
        let cube = two_rule_axes();
        let mut output = Output::new();
        let coord = Coordinate::new().with("A", "A2");
        cube.resolve_cell_with(&coord, &mut output).unwrap();
        assert_eq!(labels(&output), vec!["A2B1", "A2B2", "A2B3"]);
    }

    #[test]
    fn test_conditions_read_input() {
        let mut cube = Cube::new("discounts");
        cube.add_axis(Axis::new("rules", AxisType::Rule, ValueType::Expression, false).unwrap())
            .unwrap();
        let adult = cube
            .add_rule_column("rules", "adult", Cell::expression("input.age >= 18"))
            .unwrap();
        let senior = cube
            .add_rule_column("rules", "senior", Cell::expression("input.age >= 65"))
            .unwrap();
        cube.set_cell(&[adult], CubeValue::Long(10)).unwrap();
        cube.set_cell(&[senior], CubeValue::Long(25)).unwrap();

        let mut output = Output::new();
        let coord = Coordinate::new().with("age", 70);
        let value = cube.resolve_cell_with(&coord, &mut output).unwrap();
        assert_eq!(value, Some(CubeValue::Long(25)));
        assert_eq!(labels(&output), vec!["adult", "senior"]);

        let mut output = Output::new();
        let coord = Coordinate::new().with("age", 30);
        assert_eq!(cube.resolve_cell_with(&coord, &mut output).unwrap(), Some(CubeValue::Long(10)));

        // No rule fires and there is no default column: nothing runs.
        let mut output = Output::new();
        let coord = Coordinate::new().with("age", 3);
        assert_eq!(cube.resolve_cell_with(&coord, &mut output).unwrap(), None);
        assert_eq!(output.rule_info.rules_executed, 0);
    }

    #[test]
    fn test_multi_match_set_axis_enumerates() {
        let mut cube = Cube::new("sets");
        cube.add_axis(Axis::new("code", AxisType::Set, ValueType::Long, false).unwrap())
            .unwrap();
        cube.set_axis_multi_match("code", true).unwrap();
        let low = cube.add_column_text("code", "[0, 10], 50").unwrap();
        let odd = cube.add_column_text("code", "5, 7, 9").unwrap();
        cube.set_cell(&[low], CubeValue::from("low")).unwrap();
        cube.set_cell(&[odd], CubeValue::from("odd")).unwrap();

        let mut output = Output::new();
        let coord = Coordinate::new().with("code", 7);
        let value = cube.resolve_cell_with(&coord, &mut output).unwrap();
        assert_eq!(output.rule_info.rules_executed, 2);
        assert_eq!(value, Some(CubeValue::from("odd")));

        let coord = Coordinate::new().with("code", 50);
        assert_eq!(cube.resolve_cell(&coord).unwrap(), Some(CubeValue::from("low")));
    }

    #[test]
    fn test_missing_cell_is_skipped() {
        let mut cube = two_rule_axes();
        let coord = Coordinate::new().with("A", "A2").with("B", "B3");
        let key = cube.key_for_coordinate(&coord).unwrap();
        cube.remove_cell(key.ids());
        let (result, output) = run(&cube, &EngineConfig::default());
        assert_eq!(output.rule_info.rules_executed, 6);
        assert_eq!(result.unwrap(), Some(CubeValue::from("A2B2")));
    }
}
