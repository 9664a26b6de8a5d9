//! Expression tree for compiled rule logic.

use std::fmt;

use lexinel_core::Transaction;

// ── Fields ──────────────────────────────────────────────────────────

/// Value type a field or literal carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Number,
    Bool,
    Text,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Number => f.write_str("number"),
            Kind::Bool => f.write_str("boolean"),
            Kind::Text => f.write_str("text"),
        }
    }
}

/// A transaction attribute a rule can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Amount,
    Type,
    CrossBorder,
    Jurisdiction,
    Origin,
    Destination,
    PiiEncrypted,
    CorrespondentBankUnknown,
    WireTransfer,
    DormantDays,
    Memo,
    /// Transfers from the same origin account to the same beneficiary inside
    /// the velocity window, the current one included.
    SameBeneficiary,
}

impl Field {
    /// Resolve a field name as written in rule logic. Case-insensitive.
    pub fn lookup(name: &str) -> Option<Field> {
        let field = match name.to_ascii_lowercase().as_str() {
            "amount" => Field::Amount,
            "type" | "tx_type" => Field::Type,
            "cross_border" => Field::CrossBorder,
            "jurisdiction" | "country" => Field::Jurisdiction,
            "origin" | "origin_country" => Field::Origin,
            "destination" | "destination_country" => Field::Destination,
            "pii_encrypted" => Field::PiiEncrypted,
            "correspondent_bank_unknown" => Field::CorrespondentBankUnknown,
            "wire_transfer" => Field::WireTransfer,
            "dormant_days" => Field::DormantDays,
            "memo" => Field::Memo,
            "same_beneficiary_24h" | "same_beneficiary" => Field::SameBeneficiary,
            _ => return None,
        };
        Some(field)
    }

    pub fn kind(&self) -> Kind {
        match self {
            Field::Amount | Field::DormantDays | Field::SameBeneficiary => Kind::Number,
            Field::CrossBorder
            | Field::PiiEncrypted
            | Field::CorrespondentBankUnknown
            | Field::WireTransfer => Kind::Bool,
            Field::Type | Field::Jurisdiction | Field::Origin | Field::Destination | Field::Memo => {
                Kind::Text
            }
        }
    }

    /// Whether the field is computed over a window of records rather than
    /// read from a single transaction.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Field::SameBeneficiary)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Field::Amount => "amount",
            Field::Type => "type",
            Field::CrossBorder => "cross_border",
            Field::Jurisdiction => "jurisdiction",
            Field::Origin => "origin",
            Field::Destination => "destination",
            Field::PiiEncrypted => "pii_encrypted",
            Field::CorrespondentBankUnknown => "correspondent_bank_unknown",
            Field::WireTransfer => "wire_transfer",
            Field::DormantDays => "dormant_days",
            Field::Memo => "memo",
            Field::SameBeneficiary => "same_beneficiary_24h",
        }
    }
}

// ── Values ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Literal {
    pub fn kind(&self) -> Kind {
        match self {
            Literal::Number(_) => Kind::Number,
            Literal::Bool(_) => Kind::Bool,
            Literal::Text(_) => Kind::Text,
        }
    }
}

/// A value produced while evaluating an operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    Number(f64),
    Bool(bool),
    Text(&'a str),
}

impl<'a> From<&'a Literal> for Value<'a> {
    fn from(lit: &'a Literal) -> Self {
        match lit {
            Literal::Number(n) => Value::Number(*n),
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Text(s) => Value::Text(s),
        }
    }
}

/// What an expression sees of the record under evaluation.
pub struct EvalContext<'a> {
    pub tx: &'a Transaction,
    pub same_beneficiary: u32,
}

impl<'a> EvalContext<'a> {
    pub fn new(tx: &'a Transaction, same_beneficiary: u32) -> Self {
        Self { tx, same_beneficiary }
    }

    pub fn get(&self, field: Field) -> Value<'a> {
        let tx = self.tx;
        match field {
            Field::Amount => Value::Number(tx.amount),
            Field::Type => Value::Text(tx.tx_type.as_str()),
            Field::CrossBorder => Value::Bool(tx.is_cross_border()),
            Field::Jurisdiction => Value::Text(tx.jurisdiction()),
            Field::Origin => Value::Text(&tx.route.origin),
            Field::Destination => Value::Text(&tx.route.destination),
            Field::PiiEncrypted => Value::Bool(tx.pii_encrypted),
            Field::CorrespondentBankUnknown => Value::Bool(!tx.correspondent_bank_known),
            Field::WireTransfer => Value::Bool(tx.tx_type == lexinel_core::TxType::Wire),
            Field::DormantDays => Value::Number(f64::from(tx.dormant_days)),
            Field::Memo => Value::Text(tx.memo.as_deref().unwrap_or("")),
            Field::SameBeneficiary => Value::Number(f64::from(self.same_beneficiary)),
        }
    }
}

// ── Expressions ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
    Contains,
}

impl CmpOp {
    /// Whether the operator only makes sense for numbers.
    pub fn is_ordering(&self) -> bool {
        matches!(self, CmpOp::Gt | CmpOp::Ge | CmpOp::Lt | CmpOp::Le)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Contains => "CONTAINS",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(Field),
    Literal(Literal),
}

impl Operand {
    pub fn kind(&self) -> Kind {
        match self {
            Operand::Field(f) => f.kind(),
            Operand::Literal(l) => l.kind(),
        }
    }

    fn value<'a>(&'a self, ctx: &EvalContext<'a>) -> Value<'a> {
        match self {
            Operand::Field(f) => ctx.get(*f),
            Operand::Literal(l) => Value::from(l),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    In {
        operand: Operand,
        list: Vec<Literal>,
        negated: bool,
    },
}

impl Expr {
    /// Evaluate against one record.
    pub fn eval(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Expr::And(a, b) => a.eval(ctx) && b.eval(ctx),
            Expr::Or(a, b) => a.eval(ctx) || b.eval(ctx),
            Expr::Not(inner) => !inner.eval(ctx),
            Expr::Compare { lhs, op, rhs } => compare(&lhs.value(ctx), *op, &rhs.value(ctx)),
            Expr::In { operand, list, negated } => {
                let value = operand.value(ctx);
                let found = list.iter().any(|lit| compare(&value, CmpOp::Eq, &Value::from(lit)));
                found != *negated
            }
        }
    }

    /// Fields the expression reads, in first-seen order.
    pub fn fields(&self) -> Vec<Field> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields(&self, out: &mut Vec<Field>) {
        match self {
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_fields(out);
                b.collect_fields(out);
            }
            Expr::Not(inner) => inner.collect_fields(out),
            Expr::Compare { lhs, rhs, .. } => {
                push_field(lhs, out);
                push_field(rhs, out);
            }
            Expr::In { operand, .. } => push_field(operand, out),
        }
    }

    /// Numeric thresholds the expression compares `field` against.
    pub fn thresholds(&self, field: Field) -> Vec<(CmpOp, f64)> {
        let mut out = Vec::new();
        self.collect_thresholds(field, &mut out);
        out
    }

    fn collect_thresholds(&self, field: Field, out: &mut Vec<(CmpOp, f64)>) {
        match self {
            Expr::And(a, b) | Expr::Or(a, b) => {
                a.collect_thresholds(field, out);
                b.collect_thresholds(field, out);
            }
            Expr::Not(inner) => inner.collect_thresholds(field, out),
            Expr::Compare { lhs: Operand::Field(f), op, rhs: Operand::Literal(Literal::Number(n)) }
                if *f == field =>
            {
                out.push((*op, *n));
            }
            Expr::Compare { lhs: Operand::Literal(Literal::Number(n)), op, rhs: Operand::Field(f) }
                if *f == field =>
            {
                out.push((flip(*op), *n));
            }
            _ => {}
        }
    }
}

fn push_field(op: &Operand, out: &mut Vec<Field>) {
    if let Operand::Field(f) = op {
        if !out.contains(f) {
            out.push(*f);
        }
    }
}

/// Mirror an ordering operator so `10 < amount` reads as `amount > 10`.
fn flip(op: CmpOp) -> CmpOp {
    match op {
        CmpOp::Gt => CmpOp::Lt,
        CmpOp::Ge => CmpOp::Le,
        CmpOp::Lt => CmpOp::Gt,
        CmpOp::Le => CmpOp::Ge,
        other => other,
    }
}

fn compare(lhs: &Value<'_>, op: CmpOp, rhs: &Value<'_>) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => match op {
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Eq => (a - b).abs() < f64::EPSILON,
            CmpOp::Ne => (a - b).abs() >= f64::EPSILON,
            CmpOp::Contains => false,
        },
        (Value::Bool(a), Value::Bool(b)) => match op {
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
            _ => false,
        },
        (Value::Text(a), Value::Text(b)) => match op {
            CmpOp::Eq => a.eq_ignore_ascii_case(b),
            CmpOp::Ne => !a.eq_ignore_ascii_case(b),
            CmpOp::Contains => a.to_lowercase().contains(&b.to_lowercase()),
            _ => false,
        },
        _ => false,
    }
}
