//! FILENAME: core/engine/src/evaluator.rs
//! PURPOSE: Executes parsed expression programs for expression cells.
//! CONTEXT: Programs read the input coordinate (`input.x`), read and write
//! the shared output map (`output.x = ...`), keep local variables, and call
//! built-in functions. `stop()` and `jump(...)` end the program with a
//! control signal; they travel up as `Interrupt::Signal` so that nested
//! evaluation unwinds without treating them as errors.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::NaiveDate;
use cube_expr::{BinaryOperator, Expression, Program, Statement, UnaryOperator, Value};
use regex::Regex;
use rustc_hash::FxHashMap;

use crate::context::ExecutionContext;
use crate::error::{CubeError, CubeResult};
use crate::executable::{ExecutionSignal, JumpTarget, JumpTargets};
use crate::logging::log_warn;
use crate::output::Failure;
use crate::value::{parse_date, CubeValue};

/// Why evaluation stopped early.
enum Interrupt {
    Signal(ExecutionSignal),
    Error(CubeError),
}

impl From<CubeError> for Interrupt {
    fn from(error: CubeError) -> Self {
        Interrupt::Error(error)
    }
}

type EvalResult = Result<CubeValue, Interrupt>;

fn fail(message: impl Into<String>) -> Interrupt {
    Interrupt::Error(CubeError::Expression(message.into()))
}

/// Runs every statement; the last statement's value is the cell value.
pub fn execute_program(program: &Program, ctx: &mut ExecutionContext<'_>) -> CubeResult<ExecutionSignal> {
    let mut evaluator = Evaluator::new(ctx);
    let mut last = CubeValue::Null;
    for statement in &program.statements {
        match evaluator.exec_statement(statement) {
            Ok(value) => last = value,
            Err(Interrupt::Signal(signal)) => return Ok(signal),
            Err(Interrupt::Error(error)) => return Err(error),
        }
    }
    Ok(ExecutionSignal::Continue(last))
}

struct Evaluator<'x, 'a> {
    ctx: &'x mut ExecutionContext<'a>,
    locals: FxHashMap<String, CubeValue>,
}

impl<'x, 'a> Evaluator<'x, 'a> {
    fn new(ctx: &'x mut ExecutionContext<'a>) -> Self {
        Evaluator {
            ctx,
            locals: FxHashMap::default(),
        }
    }

    fn exec_statement(&mut self, statement: &Statement) -> EvalResult {
        match statement {
            Statement::Expression(expr) => self.evaluate(expr),
            Statement::Assign { target, value } => {
                let value = self.evaluate(value)?;
                self.assign(target, value.clone())?;
                Ok(value)
            }
        }
    }

    fn assign(&mut self, target: &Expression, value: CubeValue) -> Result<(), Interrupt> {
        match target {
            Expression::Variable(name) if name == "input" || name == "output" => {
                Err(fail(format!("cannot assign to '{}'", name)))
            }
            Expression::Variable(name) => {
                self.locals.insert(name.clone(), value);
                Ok(())
            }
            Expression::Member { object, name } => match object.as_ref() {
                Expression::Variable(root) if root == "output" => {
                    self.ctx.output_mut().set(name.clone(), value);
                    Ok(())
                }
                Expression::Variable(root) if root == "input" => {
                    Err(fail("input is read-only"))
                }
                _ => Err(fail("only output.<name> can be assigned")),
            },
            Expression::Index { object, index } => match object.as_ref() {
                Expression::Variable(root) if root == "output" => {
                    let key = self.evaluate(index)?;
                    self.ctx.output_mut().set(key.to_string(), value);
                    Ok(())
                }
                _ => Err(fail("only output[<key>] can be assigned")),
            },
            _ => Err(fail("invalid assignment target")),
        }
    }

    fn evaluate(&mut self, expr: &Expression) -> EvalResult {
        match expr {
            Expression::Literal(value) => Ok(self.eval_literal(value)),
            Expression::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.evaluate(item)?);
                }
                Ok(CubeValue::List(values))
            }
            Expression::Map(entries) => {
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.evaluate(value)?);
                }
                Ok(CubeValue::Map(map))
            }
            Expression::Variable(name) => self.eval_variable(name),
            Expression::Member { object, name } => self.eval_member(object, name),
            Expression::Index { object, index } => self.eval_index(object, index),
            Expression::BinaryOp { left, op, right } => self.eval_binary_op(left, *op, right),
            Expression::UnaryOp { op, operand } => self.eval_unary_op(*op, operand),
            Expression::FunctionCall { name, args } => self.eval_function(name, args),
        }
    }

    fn eval_literal(&self, value: &Value) -> CubeValue {
        match value {
            Value::Integer(n) => CubeValue::Long(*n),
            Value::Number(n) => CubeValue::Double(*n),
            Value::String(s) => CubeValue::Text(s.clone()),
            Value::Boolean(b) => CubeValue::Bool(*b),
            Value::Null => CubeValue::Null,
        }
    }

    fn eval_variable(&self, name: &str) -> EvalResult {
        match name {
            "input" => Ok(self.ctx.coordinate().to_value()),
            "output" => Ok(CubeValue::Map(self.ctx.output().values.clone())),
            _ => self
                .locals
                .get(name)
                .cloned()
                .ok_or_else(|| fail(format!("unknown variable '{}'", name))),
        }
    }

    /// Reads `input.x` and `output.x` without copying the whole map.
    fn root_lookup(&self, object: &Expression, key: &str) -> Option<CubeValue> {
        match object {
            Expression::Variable(root) if root == "input" => {
                Some(self.ctx.input(key).cloned().unwrap_or_default())
            }
            Expression::Variable(root) if root == "output" => {
                Some(self.ctx.output().get(key).cloned().unwrap_or_default())
            }
            _ => None,
        }
    }

    fn eval_member(&mut self, object: &Expression, name: &str) -> EvalResult {
        if let Some(value) = self.root_lookup(object, name) {
            return Ok(value);
        }
        let target = self.evaluate(object)?;
        member_of(&target, name)
    }

    fn eval_index(&mut self, object: &Expression, index: &Expression) -> EvalResult {
        let index = self.evaluate(index)?;
        if let CubeValue::Text(key) = &index {
            if let Some(value) = self.root_lookup(object, key) {
                return Ok(value);
            }
        }
        let target = self.evaluate(object)?;
        match (&target, &index) {
            (CubeValue::List(items), CubeValue::Long(i)) => {
                let len = items.len() as i64;
                let pos = if *i < 0 { len + i } else { *i };
                Ok(if (0..len).contains(&pos) {
                    items[pos as usize].clone()
                } else {
                    CubeValue::Null
                })
            }
            (CubeValue::Map(_), CubeValue::Text(key)) => member_of(&target, key),
            (CubeValue::Text(s), CubeValue::Long(i)) if *i >= 0 => Ok(s
                .chars()
                .nth(*i as usize)
                .map(|c| CubeValue::Text(c.to_string()))
                .unwrap_or_default()),
            (CubeValue::Null, _) => Ok(CubeValue::Null),
            _ => Err(fail(format!(
                "cannot index {} with {}",
                target.type_name(),
                index.type_name()
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Operators
    // ------------------------------------------------------------------

    fn eval_binary_op(&mut self, left: &Expression, op: BinaryOperator, right: &Expression) -> EvalResult {
        match op {
            BinaryOperator::And => {
                let l = self.evaluate(left)?;
                if !l.is_truthy() {
                    return Ok(CubeValue::Bool(false));
                }
                Ok(CubeValue::Bool(self.evaluate(right)?.is_truthy()))
            }
            BinaryOperator::Or => {
                let l = self.evaluate(left)?;
                if l.is_truthy() {
                    return Ok(CubeValue::Bool(true));
                }
                Ok(CubeValue::Bool(self.evaluate(right)?.is_truthy()))
            }
            _ => {
                let l = self.evaluate(left)?;
                let r = self.evaluate(right)?;
                match op {
                    BinaryOperator::Equal => Ok(CubeValue::Bool(l.loose_eq(&r))),
                    BinaryOperator::NotEqual => Ok(CubeValue::Bool(!l.loose_eq(&r))),
                    BinaryOperator::LessThan => eval_compare(&l, &r, |o| o == Ordering::Less),
                    BinaryOperator::GreaterThan => eval_compare(&l, &r, |o| o == Ordering::Greater),
                    BinaryOperator::LessEqual => eval_compare(&l, &r, |o| o != Ordering::Greater),
                    BinaryOperator::GreaterEqual => eval_compare(&l, &r, |o| o != Ordering::Less),
                    BinaryOperator::Add => eval_add(&l, &r),
                    BinaryOperator::Subtract => {
                        eval_arith(&l, &r, "subtract", i64::checked_sub, |a, b| a - b)
                    }
                    BinaryOperator::Multiply => {
                        eval_arith(&l, &r, "multiply", i64::checked_mul, |a, b| a * b)
                    }
                    BinaryOperator::Divide => eval_divide(&l, &r),
                    BinaryOperator::Modulo => eval_modulo(&l, &r),
                    BinaryOperator::And | BinaryOperator::Or => Ok(CubeValue::Null),
                }
            }
        }
    }

    fn eval_unary_op(&mut self, op: UnaryOperator, operand: &Expression) -> EvalResult {
        let value = self.evaluate(operand)?;
        match op {
            UnaryOperator::Not => Ok(CubeValue::Bool(!value.is_truthy())),
            UnaryOperator::Negate => match value {
                CubeValue::Long(n) => Ok(n
                    .checked_neg()
                    .map(CubeValue::Long)
                    .unwrap_or(CubeValue::Double(-(n as f64)))),
                CubeValue::Double(n) => Ok(CubeValue::Double(-n)),
                other => Err(fail(format!("cannot negate {}", other.type_name()))),
            },
        }
    }

    // ------------------------------------------------------------------
    // Functions
    // ------------------------------------------------------------------

    fn eval_function(&mut self, name: &str, args: &[Expression]) -> EvalResult {
        match name {
            "if" => self.fn_if(args),
            "stop" => {
                expect_args(name, args, 0, 0)?;
                Err(Interrupt::Signal(ExecutionSignal::Stop))
            }
            "jump" => self.fn_jump(args),
            "at" => self.fn_at(args),
            "assert" => self.fn_assert(args),
            _ => {
                let values = self.eval_args(args)?;
                match name {
                    "not" => {
                        expect_args(name, args, 1, 1)?;
                        Ok(CubeValue::Bool(!values[0].is_truthy()))
                    }
                    "abs" => fn_abs(&values),
                    "round" => fn_round(&values),
                    "min" => fn_extreme(&values, Ordering::Less),
                    "max" => fn_extreme(&values, Ordering::Greater),
                    "len" => fn_len(&values),
                    "upper" => fn_text(&values, "upper", |s| s.to_uppercase()),
                    "lower" => fn_text(&values, "lower", |s| s.to_lowercase()),
                    "contains" => fn_contains(&values),
                    "matches" => fn_matches(&values),
                    "date" => fn_date(&values),
                    _ => Err(fail(format!("unknown function '{}'", name))),
                }
            }
        }
    }

    fn eval_args(&mut self, args: &[Expression]) -> Result<Vec<CubeValue>, Interrupt> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.evaluate(arg)?);
        }
        Ok(values)
    }

    /// `if(cond, then[, else])`, evaluating only the chosen branch.
    fn fn_if(&mut self, args: &[Expression]) -> EvalResult {
        expect_args("if", args, 2, 3)?;
        if self.evaluate(&args[0])?.is_truthy() {
            self.evaluate(&args[1])
        } else if let Some(otherwise) = args.get(2) {
            self.evaluate(otherwise)
        } else {
            Ok(CubeValue::Null)
        }
    }

    /// `jump({axis: 'rule'})` or `jump('axis', 'rule')`.
    fn fn_jump(&mut self, args: &[Expression]) -> EvalResult {
        expect_args("jump", args, 1, 2)?;
        let values = self.eval_args(args)?;
        let mut targets: JumpTargets = Vec::new();
        match values.as_slice() {
            [CubeValue::Map(entries)] => {
                for (axis, target) in entries {
                    targets.push((axis.clone(), jump_target(target)?));
                }
            }
            [CubeValue::Text(axis), target] => targets.push((axis.clone(), jump_target(target)?)),
            _ => return Err(fail("jump expects a map of axis to rule, or (axis, rule)")),
        }
        if targets.is_empty() {
            return Err(fail("jump needs at least one axis"));
        }
        Err(Interrupt::Signal(ExecutionSignal::Jump(targets)))
    }

    /// `at({axis: value, ...}[, 'cube'])`: resolves the overlaid coordinate.
    fn fn_at(&mut self, args: &[Expression]) -> EvalResult {
        expect_args("at", args, 1, 2)?;
        let values = self.eval_args(args)?;
        let overlay = match &values[0] {
            CubeValue::Map(entries) => entries.clone(),
            other => return Err(fail(format!("at expects a map, got {}", other.type_name()))),
        };
        let cube_name = match values.get(1) {
            None | Some(CubeValue::Null) => None,
            Some(CubeValue::Text(name)) => Some(name.as_str()),
            Some(other) => {
                return Err(fail(format!("cube name must be text, got {}", other.type_name())))
            }
        };
        Ok(self.ctx.call_cube(cube_name, overlay)?)
    }

    /// `assert(cond[, message])`: records a failure instead of aborting.
    fn fn_assert(&mut self, args: &[Expression]) -> EvalResult {
        expect_args("assert", args, 1, 2)?;
        let values = self.eval_args(args)?;
        if values[0].is_truthy() {
            return Ok(CubeValue::Bool(true));
        }
        let message = values
            .get(1)
            .map(|m| m.to_string())
            .unwrap_or_else(|| "assertion failed".to_string());
        let failure = Failure {
            cube: self.ctx.cube().name().to_string(),
            coordinate: self.ctx.coordinate().to_string(),
            message,
        };
        log_warn!("EXEC", "assertion failed in '{}': {}", failure.cube, failure.message);
        self.ctx.output_mut().failures.push(failure);
        Ok(CubeValue::Bool(false))
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn expect_args(name: &str, args: &[Expression], min: usize, max: usize) -> Result<(), Interrupt> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        return Err(fail(format!(
            "{} expects {} argument(s), got {}",
            name,
            expected,
            args.len()
        )));
    }
    Ok(())
}

fn jump_target(value: &CubeValue) -> Result<JumpTarget, Interrupt> {
    JumpTarget::from_value(value)
        .ok_or_else(|| fail(format!("jump target must be a rule name or column id, got {}", value)))
}

fn member_of(target: &CubeValue, name: &str) -> EvalResult {
    match target {
        CubeValue::Map(entries) => Ok(entries
            .get(name)
            .or_else(|| {
                entries
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(name))
                    .map(|(_, v)| v)
            })
            .cloned()
            .unwrap_or_default()),
        CubeValue::Null => Ok(CubeValue::Null),
        other => Err(fail(format!("cannot read '{}' of {}", name, other.type_name()))),
    }
}

fn eval_compare(l: &CubeValue, r: &CubeValue, test: fn(Ordering) -> bool) -> EvalResult {
    if l.is_null() || r.is_null() {
        return Ok(CubeValue::Bool(false));
    }
    match l.compare_with(r, false) {
        Some(ordering) => Ok(CubeValue::Bool(test(ordering))),
        None => Err(fail(format!(
            "cannot compare {} with {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn eval_add(l: &CubeValue, r: &CubeValue) -> EvalResult {
    match (l, r) {
        (CubeValue::Text(a), b) => Ok(CubeValue::Text(format!("{}{}", a, b))),
        (a, CubeValue::Text(b)) => Ok(CubeValue::Text(format!("{}{}", a, b))),
        (CubeValue::List(a), CubeValue::List(b)) => {
            Ok(CubeValue::List(a.iter().chain(b.iter()).cloned().collect()))
        }
        _ => eval_arith(l, r, "add", i64::checked_add, |a, b| a + b),
    }
}

/// Long op Long stays Long unless it overflows; anything else is Double.
fn eval_arith(
    l: &CubeValue,
    r: &CubeValue,
    verb: &str,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> EvalResult {
    match (l, r) {
        (CubeValue::Long(a), CubeValue::Long(b)) => Ok(match int_op(*a, *b) {
            Some(n) => CubeValue::Long(n),
            None => CubeValue::Double(float_op(*a as f64, *b as f64)),
        }),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => Ok(CubeValue::Double(float_op(a, b))),
            _ => Err(fail(format!(
                "cannot {} {} and {}",
                verb,
                l.type_name(),
                r.type_name()
            ))),
        },
    }
}

fn eval_divide(l: &CubeValue, r: &CubeValue) -> EvalResult {
    match (l.as_f64(), r.as_f64()) {
        (Some(_), Some(b)) if b == 0.0 => Err(fail("division by zero")),
        (Some(a), Some(b)) => match (l, r) {
            (CubeValue::Long(x), CubeValue::Long(y)) if x.checked_rem(*y) == Some(0) => Ok(x
                .checked_div(*y)
                .map(CubeValue::Long)
                .unwrap_or(CubeValue::Double(a / b))),
            _ => Ok(CubeValue::Double(a / b)),
        },
        _ => Err(fail(format!(
            "cannot divide {} by {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn eval_modulo(l: &CubeValue, r: &CubeValue) -> EvalResult {
    match (l, r) {
        (CubeValue::Long(_), CubeValue::Long(0)) => Err(fail("division by zero")),
        (CubeValue::Long(a), CubeValue::Long(b)) => Ok(CubeValue::Long(a.wrapping_rem(*b))),
        _ => match (l.as_f64(), r.as_f64()) {
            (Some(_), Some(b)) if b == 0.0 => Err(fail("division by zero")),
            (Some(a), Some(b)) => Ok(CubeValue::Double(a % b)),
            _ => Err(fail(format!(
                "cannot take {} modulo {}",
                l.type_name(),
                r.type_name()
            ))),
        },
    }
}

fn single<'v>(values: &'v [CubeValue], name: &str) -> Result<&'v CubeValue, Interrupt> {
    match values {
        [value] => Ok(value),
        _ => Err(fail(format!("{} expects 1 argument, got {}", name, values.len()))),
    }
}

fn fn_abs(values: &[CubeValue]) -> EvalResult {
    match single(values, "abs")? {
        CubeValue::Long(n) => Ok(CubeValue::Long(n.wrapping_abs())),
        CubeValue::Double(n) => Ok(CubeValue::Double(n.abs())),
        other => Err(fail(format!("abs expects a number, got {}", other.type_name()))),
    }
}

/// `round(x)` gives a whole number, `round(x, digits)` a double.
fn fn_round(values: &[CubeValue]) -> EvalResult {
    let (value, digits) = match values {
        [value] => (value, 0),
        [value, digits] => (
            value,
            digits
                .as_i64()
                .ok_or_else(|| fail("round digits must be an integer"))?,
        ),
        _ => return Err(fail(format!("round expects 1 to 2 arguments, got {}", values.len()))),
    };
    match value {
        CubeValue::Long(_) => Ok(value.clone()),
        CubeValue::Double(n) if digits == 0 => {
            let rounded = n.round();
            if rounded.abs() < i64::MAX as f64 {
                Ok(CubeValue::Long(rounded as i64))
            } else {
                Ok(CubeValue::Double(rounded))
            }
        }
        CubeValue::Double(n) => {
            let factor = 10f64.powi(digits as i32);
            Ok(CubeValue::Double((n * factor).round() / factor))
        }
        other => Err(fail(format!("round expects a number, got {}", other.type_name()))),
    }
}

/// `min`/`max` over the arguments, or over a single list argument.
fn fn_extreme(values: &[CubeValue], want: Ordering) -> EvalResult {
    let items: &[CubeValue] = match values {
        [CubeValue::List(items)] => items,
        _ => values,
    };
    let mut best: Option<&CubeValue> = None;
    for item in items.iter().filter(|v| !v.is_null()) {
        best = match best {
            None => Some(item),
            Some(current) => match item.compare_with(current, false) {
                Some(ordering) if ordering == want => Some(item),
                Some(_) => Some(current),
                None => {
                    return Err(fail(format!(
                        "cannot compare {} with {}",
                        item.type_name(),
                        current.type_name()
                    )))
                }
            },
        };
    }
    Ok(best.cloned().unwrap_or_default())
}

fn fn_len(values: &[CubeValue]) -> EvalResult {
    let n = match single(values, "len")? {
        CubeValue::Text(s) => s.chars().count(),
        CubeValue::List(items) => items.len(),
        CubeValue::Map(entries) => entries.len(),
        CubeValue::Null => 0,
        other => return Err(fail(format!("len expects text or a collection, got {}", other.type_name()))),
    };
    Ok(CubeValue::Long(n as i64))
}

fn fn_text(values: &[CubeValue], name: &str, f: fn(&str) -> String) -> EvalResult {
    match single(values, name)? {
        CubeValue::Null => Ok(CubeValue::Null),
        CubeValue::Text(s) => Ok(CubeValue::Text(f(s))),
        other => Ok(CubeValue::Text(f(&other.to_string()))),
    }
}

fn fn_contains(values: &[CubeValue]) -> EvalResult {
    let found = match values {
        [CubeValue::Text(haystack), needle] => haystack.contains(&needle.to_string()),
        [CubeValue::List(items), needle] => items.iter().any(|item| item.loose_eq(needle)),
        [CubeValue::Map(entries), CubeValue::Text(key)] => entries.contains_key(key),
        [CubeValue::Null, _] => false,
        _ => return Err(fail("contains expects (text|list|map, value)")),
    };
    Ok(CubeValue::Bool(found))
}

fn fn_matches(values: &[CubeValue]) -> EvalResult {
    match values {
        [CubeValue::Null, _] => Ok(CubeValue::Bool(false)),
        [text, CubeValue::Text(pattern)] => {
            let regex = Regex::new(pattern).map_err(|e| fail(format!("invalid pattern: {}", e)))?;
            Ok(CubeValue::Bool(regex.is_match(&text.to_string())))
        }
        _ => Err(fail("matches expects (text, pattern)")),
    }
}

/// `date('2024-03-01')` or `date(2024, 3, 1)`.
fn fn_date(values: &[CubeValue]) -> EvalResult {
    match values {
        [CubeValue::Text(text)] => parse_date(text)
            .map(CubeValue::Date)
            .ok_or_else(|| fail(format!("cannot parse date '{}'", text))),
        [CubeValue::Date(_)] => Ok(values[0].clone()),
        [y, m, d] => {
            let parts = (y.as_i64(), m.as_i64(), d.as_i64());
            match parts {
                (Some(y), Some(m), Some(d)) => NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32)
                    .map(CubeValue::from)
                    .ok_or_else(|| fail(format!("invalid date {}-{}-{}", y, m, d))),
                _ => Err(fail("date expects integer year, month, day")),
            }
        }
        _ => Err(fail("date expects text or (year, month, day)")),
    }
}
