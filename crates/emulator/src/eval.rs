//! Row-level expression evaluation with SQL three-valued logic.

use std::cmp::Ordering;

use driver::{DriverError, DriverResult};
use types::Value;

use crate::analyze::BoundExpr;
use crate::ast::{BinaryOp, UnaryOp};

pub fn eval(expr: &BoundExpr, row: &[Value]) -> DriverResult<Value> {
    match expr {
        BoundExpr::Literal(value) => Ok(value.clone()),
        BoundExpr::Column(idx) => row
            .get(*idx)
            .cloned()
            .ok_or_else(|| DriverError::internal(format!("column {idx} out of bounds"))),
        BoundExpr::Unary { op, expr } => eval_unary(*op, eval(expr, row)?),
        BoundExpr::Binary { left, op, right } => match op {
            BinaryOp::And | BinaryOp::Or => eval_logical(*op, eval(left, row)?, eval(right, row)?),
            _ => eval_binary(&eval(left, row)?, *op, &eval(right, row)?),
        },
        BoundExpr::IsNull { expr, negated } => {
            let is_null = eval(expr, row)?.is_null();
            Ok(Value::Bool(is_null != *negated))
        }
        BoundExpr::InList {
            expr,
            list,
            negated,
        } => {
            let needle = eval(expr, row)?;
            let found = eval_in_list(&needle, list, row)?;
            Ok(match (found, negated) {
                (Some(found), negated) => Value::Bool(found != *negated),
                (None, _) => Value::Null,
            })
        }
    }
}

/// A row passes a filter only when the predicate is TRUE; NULL rejects.
pub fn passes(filter: Option<&BoundExpr>, row: &[Value]) -> DriverResult<bool> {
    match filter {
        Some(expr) => Ok(matches!(eval(expr, row)?, Value::Bool(true))),
        None => Ok(true),
    }
}

fn eval_unary(op: UnaryOp, value: Value) -> DriverResult<Value> {
    match (op, value) {
        (_, Value::Null) => Ok(Value::Null),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Neg, Value::Int(v)) => v
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| DriverError::out_of_range(format!("int64 overflow: -({v})"))),
        (op, other) => Err(DriverError::internal(format!(
            "{op:?} cannot be applied to {other:?}"
        ))),
    }
}

fn eval_logical(op: BinaryOp, left: Value, right: Value) -> DriverResult<Value> {
    let l = truth(&left)?;
    let r = truth(&right)?;
    let result = match op {
        BinaryOp::And => match (l, r) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        _ => match (l, r) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
    };
    Ok(result.map_or(Value::Null, Value::Bool))
}

fn truth(value: &Value) -> DriverResult<Option<bool>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        other => Err(DriverError::internal(format!(
            "expected BOOL, got {other:?}"
        ))),
    }
}

fn eval_binary(l: &Value, op: BinaryOp, r: &Value) -> DriverResult<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }

    if op.is_comparison() {
        let ord = l.cmp_same_type(r).ok_or_else(|| {
            DriverError::internal(format!("incompatible types for {}: {l:?}, {r:?}", op.symbol()))
        })?;
        let result = match op {
            BinaryOp::Eq => ord == Ordering::Equal,
            BinaryOp::Ne => ord != Ordering::Equal,
            BinaryOp::Lt => ord == Ordering::Less,
            BinaryOp::Le => ord != Ordering::Greater,
            BinaryOp::Gt => ord == Ordering::Greater,
            _ => ord != Ordering::Less,
        };
        return Ok(Value::Bool(result));
    }

    let (Value::Int(a), Value::Int(b)) = (l, r) else {
        return Err(DriverError::internal(format!(
            "{} expects INT64 operands, got {l:?}, {r:?}",
            op.symbol()
        )));
    };
    let (a, b) = (*a, *b);
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        _ => {
            if b == 0 {
                return Err(DriverError::out_of_range(format!(
                    "division by zero: {a} / {b}"
                )));
            }
            a.checked_div(b)
        }
    };
    result
        .map(Value::Int)
        .ok_or_else(|| DriverError::out_of_range(format!("int64 overflow: {a} {} {b}", op.symbol())))
}

/// `Some(true)` on a match, `None` if no match but a NULL was involved.
fn eval_in_list(needle: &Value, list: &[BoundExpr], row: &[Value]) -> DriverResult<Option<bool>> {
    if needle.is_null() {
        return Ok(None);
    }
    let mut saw_null = false;
    for item in list {
        match eval(item, row)? {
            Value::Null => saw_null = true,
            value if needle.cmp_same_type(&value) == Some(Ordering::Equal) => {
                return Ok(Some(true))
            }
            _ => {}
        }
    }
    Ok(if saw_null { None } else { Some(false) })
}
