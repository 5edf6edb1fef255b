//! Tree-walking evaluator over a variable mapping.

use super::parser::{BinaryOp, Expr, UnaryOp};
use crate::value::{Value, Variables};

/// Evaluate `expr`, applying assignments to `vars`.
pub fn eval(expr: &Expr, vars: &mut Variables) -> Value {
    match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Var(name) => vars.get(name),
        Expr::Unary { op, operand } => {
            let v = eval(operand, vars);
            match op {
                UnaryOp::Not => Value::Bool(!v.is_truthy()),
                UnaryOp::Neg => Value::Num(-v.to_number()),
                UnaryOp::Plus => Value::Num(v.to_number()),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let l = eval(lhs, vars);
            let r = eval(rhs, vars);
            binary(*op, &l, &r)
        }
        Expr::And(lhs, rhs) => {
            let l = eval(lhs, vars);
            if l.is_truthy() {
                eval(rhs, vars)
            } else {
                l
            }
        }
        Expr::Or(lhs, rhs) => {
            let l = eval(lhs, vars);
            if l.is_truthy() {
                l
            } else {
                eval(rhs, vars)
            }
        }
        Expr::Assign { name, op, value } => {
            let rhs = eval(value, vars);
            let result = match op {
                Some(op) => binary(*op, &vars.get(name), &rhs),
                None => rhs,
            };
            vars.set(name.clone(), result.clone());
            result
        }
        Expr::Sequence(items) => {
            let mut last = Value::Undefined;
            for item in items {
                last = eval(item, vars);
            }
            last
        }
    }
}

pub(crate) fn binary(op: BinaryOp, l: &Value, r: &Value) -> Value {
    match op {
        BinaryOp::Add => match (l, r) {
            (Value::Str(_), _) | (_, Value::Str(_)) => Value::Str(format!("{l}{r}")),
            _ => Value::Num(l.to_number() + r.to_number()),
        },
        BinaryOp::Sub => Value::Num(l.to_number() - r.to_number()),
        BinaryOp::Mul => Value::Num(l.to_number() * r.to_number()),
        BinaryOp::Div => Value::Num(l.to_number() / r.to_number()),
        BinaryOp::Rem => Value::Num(l.to_number() % r.to_number()),
        BinaryOp::Eq => Value::Bool(l.loose_eq(r)),
        BinaryOp::NotEq => Value::Bool(!l.loose_eq(r)),
        BinaryOp::StrictEq => Value::Bool(strict_eq(l, r)),
        BinaryOp::StrictNotEq => Value::Bool(!strict_eq(l, r)),
        BinaryOp::Less => compare(l, r, |o| o == std::cmp::Ordering::Less),
        BinaryOp::LessEq => compare(l, r, |o| o != std::cmp::Ordering::Greater),
        BinaryOp::Greater => compare(l, r, |o| o == std::cmp::Ordering::Greater),
        BinaryOp::GreaterEq => compare(l, r, |o| o != std::cmp::Ordering::Less),
    }
}

fn strict_eq(l: &Value, r: &Value) -> bool {
    match (l, r) {
        (Value::Num(a), Value::Num(b)) => a == b,
        _ => l == r,
    }
}

/// Two strings compare lexically; anything else numerically. A NaN on
/// either side makes every relation false.
fn compare(l: &Value, r: &Value, test: impl Fn(std::cmp::Ordering) -> bool) -> Value {
    let ordering = match (l, r) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => l.to_number().partial_cmp(&r.to_number()),
    };
    Value::Bool(ordering.map(test).unwrap_or(false))
}
