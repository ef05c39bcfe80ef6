use std::cmp::Ordering;

use serde_json::Value;
use tracing::warn;

use crate::error::RuntimeError;

/// Operators in the order they are searched for in an expression.
/// Two-character operators come first so `>=` is never split as `>`.
pub const OPERATORS: [&str; 6] = ["==", "!=", ">=", "<=", ">", "<"];

/// Evaluates `left <op> right`. Operands in braces are resolved through `lookup`.
pub fn evaluate(expression: &str, lookup: impl Fn(&str) -> Option<Value>) -> Result<bool, RuntimeError> {
    let (op, left, right) = split(expression)
        .ok_or_else(|| RuntimeError::UnknownOperator(expression.to_string()))?;

    let left = operand(left, &lookup);
    let right = operand(right, &lookup);

    let result = match op {
        "==" => left == right,
        "!=" => left != right,
        _ => match ordering(&left, &right) {
            Some(ord) => match op {
                ">=" => ord != Ordering::Less,
                "<=" => ord != Ordering::Greater,
                ">" => ord == Ordering::Greater,
                _ => ord == Ordering::Less,
            },
            None => {
                warn!(expression = %expression, "operands {} and {} cannot be ordered, condition is false", left, right);
                false
            }
        },
    };
    Ok(result)
}

fn split(expression: &str) -> Option<(&'static str, &str, &str)> {
    OPERATORS.iter().find_map(|&op| {
        let mut parts = expression.split(op);
        let left = parts.next()?;
        let right = parts.next()?;
        Some((op, left, right))
    })
}

/// `{name}` is a variable, otherwise an integer, a decimal or a plain string.
pub fn operand(raw: &str, lookup: impl Fn(&str) -> Option<Value>) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }

    if let Some(name) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
        return lookup(name.trim()).unwrap_or(Value::Null);
    }

    if let Ok(int) = raw.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        return Value::from(float);
    }
    Value::String(raw.to_string())
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) if a.is_f64() && b.is_f64() => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::Number(a), Value::Number(b)) if !a.is_f64() && !b.is_f64() => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => Some(a.as_u64()?.cmp(&b.as_u64()?)),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}
