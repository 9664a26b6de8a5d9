//! Recursive-descent parser producing a type-checked [`Expr`].

use super::ast::{CmpOp, Expr, Field, Kind, Literal, Operand};
use super::lexer::{Spanned, Token};
use super::LogicError;

/// Deepest allowed nesting of parentheses and `NOT`.
pub const MAX_DEPTH: usize = 64;

pub struct Parser {
    tokens: Vec<Spanned>,
    idx: usize,
    end: usize,
    depth: usize,
}

impl Parser {
    /// `end` is the source length, reported for errors at end of input.
    pub fn new(tokens: Vec<Spanned>, end: usize) -> Self {
        Self { tokens, idx: 0, end, depth: 0 }
    }

    pub fn parse(mut self) -> Result<Expr, LogicError> {
        if self.tokens.is_empty() {
            return Err(LogicError::new(0, "empty expression"));
        }
        let expr = self.or_expr()?;
        if let Some(extra) = self.tokens.get(self.idx) {
            return Err(LogicError::new(
                extra.pos,
                format!("unexpected {} after expression", extra.token.describe()),
            ));
        }
        Ok(expr)
    }

    // ── Cursor helpers ──────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.idx).map(|s| &s.token)
    }

    fn pos(&self) -> usize {
        self.tokens.get(self.idx).map(|s| s.pos).unwrap_or(self.end)
    }

    fn next(&mut self) -> Option<Spanned> {
        let tok = self.tokens.get(self.idx).cloned();
        if tok.is_some() {
            self.idx += 1;
        }
        tok
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.idx += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), LogicError> {
        let pos = self.pos();
        match self.next() {
            Some(s) if s.token == token => Ok(()),
            Some(s) => Err(LogicError::new(
                s.pos,
                format!("expected {}, found {}", token.describe(), s.token.describe()),
            )),
            None => Err(LogicError::new(
                pos,
                format!("expected {}, found end of expression", token.describe()),
            )),
        }
    }

    fn enter(&mut self, pos: usize) -> Result<(), LogicError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(LogicError::new(pos, "expression nested too deeply"));
        }
        Ok(())
    }

    // ── Grammar ─────────────────────────────────────────────────────

    fn or_expr(&mut self) -> Result<Expr, LogicError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&Token::Or) {
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, LogicError> {
        let mut lhs = self.not_expr()?;
        while self.eat(&Token::And) {
            let rhs = self.not_expr()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_expr(&mut self) -> Result<Expr, LogicError> {
        let pos = self.pos();
        if self.eat(&Token::Not) {
            self.enter(pos)?;
            let inner = self.not_expr()?;
            self.depth -= 1;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, LogicError> {
        let pos = self.pos();
        if self.eat(&Token::LParen) {
            self.enter(pos)?;
            let inner = self.or_expr()?;
            self.expect(Token::RParen)?;
            self.depth -= 1;
            return Ok(inner);
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, LogicError> {
        let lhs_pos = self.pos();
        let lhs = self.operand(true)?;

        // `x [NOT] IN (...)`
        let negated = matches!(self.peek(), Some(Token::Not))
            && matches!(self.tokens.get(self.idx + 1).map(|s| &s.token), Some(Token::In));
        if negated {
            self.idx += 1;
        }
        if self.eat(&Token::In) {
            return self.in_list(lhs, lhs_pos, negated);
        }

        let op_pos = self.pos();
        let op = match self.next() {
            Some(Spanned { token: Token::Op(op), .. }) => op,
            Some(other) => {
                return Err(LogicError::new(
                    other.pos,
                    format!("expected comparison operator, found {}", other.token.describe()),
                ))
            }
            None => {
                return Err(LogicError::new(op_pos, "expected comparison operator, found end of expression"))
            }
        };

        let rhs = self.operand(false)?;
        check_comparison(&lhs, op, &rhs, op_pos)?;
        Ok(Expr::Compare { lhs, op, rhs })
    }

    fn in_list(&mut self, operand: Operand, pos: usize, negated: bool) -> Result<Expr, LogicError> {
        self.expect(Token::LParen)?;
        let mut list = Vec::new();
        loop {
            let item_pos = self.pos();
            let lit = match self.operand(false)? {
                Operand::Literal(lit) => lit,
                Operand::Field(f) => {
                    return Err(LogicError::new(
                        item_pos,
                        format!("field '{}' is not allowed inside an IN list", f.name()),
                    ))
                }
            };
            if lit.kind() != operand.kind() {
                return Err(LogicError::new(
                    item_pos,
                    format!("IN list item is {}, expected {}", lit.kind(), operand.kind()),
                ));
            }
            list.push(lit);
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(Token::RParen)?;
        if list.is_empty() {
            return Err(LogicError::new(pos, "IN list is empty"));
        }
        Ok(Expr::In { operand, list, negated })
    }

    /// Parse one side of a comparison. On the left a bare word must name a
    /// field; on the right an unknown word is a text literal.
    fn operand(&mut self, left: bool) -> Result<Operand, LogicError> {
        let pos = self.pos();
        let Some(spanned) = self.next() else {
            return Err(LogicError::new(pos, "unexpected end of expression"));
        };
        match spanned.token {
            Token::Number(n) => Ok(Operand::Literal(Literal::Number(n))),
            Token::Str(s) => Ok(Operand::Literal(Literal::Text(s))),
            Token::True => Ok(Operand::Literal(Literal::Bool(true))),
            Token::False => Ok(Operand::Literal(Literal::Bool(false))),
            Token::Count => {
                self.expect(Token::LParen)?;
                let inner_pos = self.pos();
                let field = match self.next() {
                    Some(Spanned { token: Token::Ident(name), .. }) => Field::lookup(&name)
                        .ok_or_else(|| LogicError::new(inner_pos, format!("unknown field '{}'", name)))?,
                    _ => return Err(LogicError::new(inner_pos, "COUNT expects a field name")),
                };
                if !field.is_aggregate() {
                    return Err(LogicError::new(
                        inner_pos,
                        format!("COUNT is only defined for aggregate fields, not '{}'", field.name()),
                    ));
                }
                self.expect(Token::RParen)?;
                Ok(Operand::Field(field))
            }
            Token::Ident(name) => match Field::lookup(&name) {
                Some(field) => Ok(Operand::Field(field)),
                None if left => Err(LogicError::new(pos, format!("unknown field '{}'", name))),
                None => Ok(Operand::Literal(Literal::Text(name))),
            },
            other => Err(LogicError::new(
                pos,
                format!("expected a field or value, found {}", other.describe()),
            )),
        }
    }
}

fn check_comparison(lhs: &Operand, op: CmpOp, rhs: &Operand, pos: usize) -> Result<(), LogicError> {
    let (lk, rk) = (lhs.kind(), rhs.kind());
    if lk != rk {
        return Err(LogicError::new(pos, format!("cannot compare {} with {}", lk, rk)));
    }
    if op.is_ordering() && lk != Kind::Number {
        return Err(LogicError::new(
            pos,
            format!("operator '{}' needs numbers, found {}", op.symbol(), lk),
        ));
    }
    if op == CmpOp::Contains && lk != Kind::Text {
        return Err(LogicError::new(pos, format!("CONTAINS needs text, found {}", lk)));
    }
    Ok(())
}
