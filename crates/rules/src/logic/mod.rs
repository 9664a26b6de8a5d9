//! Rule logic language.
//!
//! Rules carry their condition as a small boolean expression, for example
//! `amount > 10000 AND type IN (TRANSFER, WIRE)` or
//! `COUNT(same_beneficiary_24h) >= 3 AND amount < 2000`. Keywords are
//! case-insensitive; `AND` binds tighter than `OR`, and `NOT` tighter than
//! both. Expressions are type-checked when compiled, so a rule that compiles
//! cannot fail at evaluation time.

mod ast;
mod lexer;
mod parser;

#[cfg(test)]
mod tests;

pub use ast::{CmpOp, EvalContext, Expr, Field, Kind, Literal, Operand, Value};

/// A compile failure with the byte offset it was detected at.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("at position {position}: {message}")]
pub struct LogicError {
    pub position: usize,
    pub message: String,
}

impl LogicError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Parse and type-check rule logic.
///
/// Positions in errors refer to the normalised source, which only differs
/// from the input when a dashboard phrasing was rewritten.
pub fn compile(src: &str) -> Result<Expr, LogicError> {
    let normalized = lexer::normalize(src);
    let tokens = lexer::tokenize(&normalized)?;
    parser::Parser::new(tokens, normalized.len()).parse()
}
