//! Transaction records as they arrive from the transaction fabric.
//!
//! The wire form follows the field names the dashboard already uses
//! (`from`, `to`, `type`, `time`, `country`), with the longer names accepted
//! as aliases. A route is written `"DE→US"` for cross-border flows and as a
//! single country code for domestic ones.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LexinelError;
use crate::verdict::Severity;

/// Timestamp layouts accepted on input, tried in order.
const TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Canonical output layout for transaction timestamps.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Parse a transaction timestamp in any of the accepted layouts.
pub fn parse_time(raw: &str) -> Result<NaiveDateTime, LexinelError> {
    let trimmed = raw.trim().trim_end_matches('Z');
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .ok_or_else(|| LexinelError::InvalidField {
            field: "time",
            reason: format!("unrecognised timestamp '{}'", raw),
        })
}

// ── Transaction type ─────────────────────────────────────────────────

/// Accepted case-insensitively on input; always written upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    Transfer,
    Wire,
    CashIn,
    CashOut,
    Payment,
    Debit,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Transfer => "TRANSFER",
            TxType::Wire => "WIRE",
            TxType::CashIn => "CASH_IN",
            TxType::CashOut => "CASH_OUT",
            TxType::Payment => "PAYMENT",
            TxType::Debit => "DEBIT",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxType {
    type Err = LexinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRANSFER" => Ok(TxType::Transfer),
            "WIRE" => Ok(TxType::Wire),
            "CASH_IN" => Ok(TxType::CashIn),
            "CASH_OUT" => Ok(TxType::CashOut),
            "PAYMENT" => Ok(TxType::Payment),
            "DEBIT" => Ok(TxType::Debit),
            other => Err(LexinelError::InvalidField {
                field: "type",
                reason: format!("unknown transaction type '{}'", other),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for TxType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── Route (origin → destination jurisdiction) ───────────────────────

/// Origin and destination jurisdictions of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    pub origin: String,
    pub destination: String,
}

impl Route {
    pub fn domestic(country: &str) -> Self {
        Self {
            origin: country.to_string(),
            destination: country.to_string(),
        }
    }

    pub fn cross(origin: &str, destination: &str) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
        }
    }

    pub fn is_cross_border(&self) -> bool {
        self.origin != self.destination
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_cross_border() {
            write!(f, "{}→{}", self.origin, self.destination)
        } else {
            f.write_str(&self.origin)
        }
    }
}

impl FromStr for Route {
    type Err = LexinelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts: Vec<&str> = if s.contains('→') {
            s.split('→').collect()
        } else {
            s.split("->").collect()
        };
        let clean = |p: &str| p.trim().to_ascii_uppercase();
        match parts.as_slice() {
            [one] if !one.trim().is_empty() => Ok(Route::domestic(&clean(one))),
            [from, to] if !from.trim().is_empty() && !to.trim().is_empty() => {
                Ok(Route::cross(&clean(from), &clean(to)))
            }
            _ => Err(LexinelError::InvalidField {
                field: "country",
                reason: format!("malformed route '{}'", s),
            }),
        }
    }
}

impl Serialize for Route {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Route {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ── Transaction ──────────────────────────────────────────────────────

fn default_true() -> bool {
    true
}

fn default_route() -> Route {
    Route::domestic("US")
}

mod flexible_time {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(t: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&t.format(super::TIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time(&raw).map_err(serde::de::Error::custom)
    }
}

/// A single monetary movement between two accounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Transaction {
    pub id: String,
    #[serde(rename = "from", alias = "from_account", alias = "origin")]
    pub from_account: String,
    #[serde(rename = "to", alias = "to_account", alias = "destination")]
    pub to_account: String,
    pub amount: f64,
    #[serde(rename = "type", alias = "tx_type")]
    pub tx_type: TxType,
    #[serde(rename = "time", alias = "timestamp", with = "flexible_time")]
    #[schema(value_type = String, example = "2024-01-15 03:22")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "country", alias = "route", default = "default_route")]
    #[schema(value_type = String, example = "DE→US")]
    pub route: Route,
    #[serde(default = "default_true")]
    pub pii_encrypted: bool,
    #[serde(default = "default_true")]
    pub correspondent_bank_known: bool,
    #[serde(default)]
    pub dormant_days: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
    /// Ground-truth label carried by labelled datasets ("Laundering", "Smurfing", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, rename = "isFlagged", alias = "is_flagged", skip_serializing_if = "Option::is_none")]
    pub is_flagged: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk: Option<Severity>,
}

impl Transaction {
    pub fn is_cross_border(&self) -> bool {
        self.route.is_cross_border()
    }

    /// The jurisdiction a transaction is attributed to: its origin country.
    pub fn jurisdiction(&self) -> &str {
        &self.route.origin
    }

    pub fn time_label(&self) -> String {
        self.timestamp.format(TIME_FORMAT).to_string()
    }

    /// One-line evidence string in the `Orig: .., Dest: ..` layout consumers split on.
    pub fn evidence_summary(&self) -> String {
        format!(
            "Orig: {}, Dest: {}, Amount: {:.2}, Type: {}",
            self.from_account, self.to_account, self.amount, self.tx_type
        )
    }
}
