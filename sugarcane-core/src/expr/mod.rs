//! The expression language used inside macros.
//!
//! Expressions read and assign `$variables` in one history entry's
//! variable mapping and compute plain values. They cannot reach anything
//! else: there are no function calls, property accesses or globals, and
//! an unknown bareword is an error rather than a lookup.
//!
//! ```text
//! $gold = 10; $name = "Ada"
//! $gold gte 5 and not $cursed
//! "Hello, " + $name
//! ```

mod eval;
pub mod lexer;
pub mod parser;

pub use parser::Expr;

use crate::value::{Value, Variables};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref VARIABLE: Regex = Regex::new(r"\$(\w+)").unwrap();
}

/// Errors from reading or running an expression.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExprError {
    #[error("unterminated string starting at {offset}")]
    UnterminatedString { offset: usize },

    #[error("invalid number: {text}")]
    InvalidNumber { text: String },

    #[error("unexpected character '{ch}' at {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("unexpected {found} at {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("empty expression")]
    Empty,

    #[error("{word} is not defined")]
    UnknownIdentifier { word: String, offset: usize },

    #[error("invalid assignment target at {offset}")]
    InvalidAssignmentTarget { offset: usize },
}

/// Parse an expression without running it.
pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let tokens = lexer::tokenize(src)?;
    parser::parse_tokens(&tokens)
}

/// Parse and run an expression against `vars`, returning its value.
///
/// Nothing is assigned when the expression fails to parse.
pub fn evaluate(src: &str, vars: &mut Variables) -> Result<Value, ExprError> {
    let expr = parse(src)?;
    Ok(eval::eval(&expr, vars))
}

/// The first `$name` mentioned in `src`, without the sigil.
pub fn first_variable(src: &str) -> Option<&str> {
    VARIABLE
        .captures(src)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Render a value as an expression literal that evaluates back to it.
///
/// Only strings, numbers and booleans have a literal form.
pub fn literal(value: &Value) -> Option<String> {
    match value {
        Value::Str(s) => {
            let mut out = String::with_capacity(s.len() + 2);
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' | '\\' => {
                        out.push('\\');
                        out.push(c);
                    }
                    '\n' => out.push_str("\\n"),
                    _ => out.push(c),
                }
            }
            out.push('"');
            Some(out)
        }
        Value::Num(_) | Value::Bool(_) => Some(value.to_string()),
        Value::Undefined => None,
    }
}
