//! Tokenizer for rule logic.

use super::ast::CmpOp;
use super::LogicError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Op(CmpOp),
    And,
    Or,
    Not,
    In,
    Count,
    True,
    False,
    LParen,
    RParen,
    Comma,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("'{}'", name),
            Token::Number(n) => format!("number {}", n),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::Op(op) => format!("'{}'", op.symbol()),
            Token::And => "AND".into(),
            Token::Or => "OR".into(),
            Token::Not => "NOT".into(),
            Token::In => "IN".into(),
            Token::Count => "COUNT".into(),
            Token::True => "true".into(),
            Token::False => "false".into(),
            Token::LParen => "'('".into(),
            Token::RParen => "')'".into(),
            Token::Comma => "','".into(),
        }
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

/// Phrasings the dashboard writes that map onto plain grammar.
const ALIASES: &[(&str, &str)] = &[
    ("count(same beneficiary in 24h)", "COUNT(same_beneficiary_24h)"),
    ("pii fields unencrypted = true", "pii_encrypted = false"),
    ("pii fields unencrypted = false", "pii_encrypted = true"),
];

/// Rewrite known natural phrasings into grammar the parser accepts.
pub fn normalize(src: &str) -> String {
    let mut out = src.to_string();
    for (from, to) in ALIASES {
        // ASCII lowercasing keeps byte offsets aligned with `out`.
        while let Some(idx) = out.to_ascii_lowercase().find(from) {
            out.replace_range(idx..idx + from.len(), to);
        }
    }
    out
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, LogicError> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match c {
            '(' => {
                chars.next();
                Token::LParen
            }
            ')' => {
                chars.next();
                Token::RParen
            }
            ',' => {
                chars.next();
                Token::Comma
            }
            '>' | '<' | '=' | '!' => {
                chars.next();
                let next = chars.peek().map(|&(_, n)| n);
                let (op, consume) = match (c, next) {
                    ('>', Some('=')) => (CmpOp::Ge, true),
                    ('>', _) => (CmpOp::Gt, false),
                    ('<', Some('=')) => (CmpOp::Le, true),
                    ('<', Some('>')) => (CmpOp::Ne, true),
                    ('<', _) => (CmpOp::Lt, false),
                    ('=', Some('=')) => (CmpOp::Eq, true),
                    ('=', _) => (CmpOp::Eq, false),
                    ('!', Some('=')) => (CmpOp::Ne, true),
                    _ => return Err(LogicError::new(pos, "expected '=' after '!'")),
                };
                if consume {
                    chars.next();
                }
                Token::Op(op)
            }
            '"' | '\'' => {
                chars.next();
                let mut text = String::new();
                let mut closed = false;
                for (_, ch) in chars.by_ref() {
                    if ch == c {
                        closed = true;
                        break;
                    }
                    text.push(ch);
                }
                if !closed {
                    return Err(LogicError::new(pos, "unterminated string literal"));
                }
                Token::Str(text)
            }
            '$' | '0'..='9' | '.' => {
                let mut raw = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    match ch {
                        '$' if raw.is_empty() => {
                            chars.next();
                        }
                        '0'..='9' | '.' | '_' => {
                            if ch != '_' {
                                raw.push(ch);
                            }
                            chars.next();
                        }
                        _ => break,
                    }
                }
                let value = raw
                    .parse::<f64>()
                    .map_err(|_| LogicError::new(pos, format!("invalid number '{}'", raw)))?;
                Token::Number(value)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut word = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' || ch == '-' || ch == '.' {
                        word.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                keyword(word)
            }
            other => {
                return Err(LogicError::new(pos, format!("unexpected character '{}'", other)));
            }
        };

        tokens.push(Spanned { token, pos });
    }

    Ok(tokens)
}

fn keyword(word: String) -> Token {
    match word.to_ascii_uppercase().as_str() {
        "AND" => Token::And,
        "OR" => Token::Or,
        "NOT" => Token::Not,
        "IN" => Token::In,
        "COUNT" => Token::Count,
        "CONTAINS" => Token::Op(CmpOp::Contains),
        "TRUE" => Token::True,
        "FALSE" => Token::False,
        _ => Token::Ident(word),
    }
}
