//! Lenient mapping of raw API records into the persisted record kinds.
//!
//! Decoding never fails. Absent or malformed fields fall back to:
//!
//! | field kind                       | default |
//! |----------------------------------|---------|
//! | integer (block, gas, timestamp)  | `0`     |
//! | native or token value            | `0.0`   |
//! | token decimals                   | `18`    |
//! | string                           | `""`    |
//! | error flag                       | `false` |

use crate::models::{InternalCall, TokenTransfer, Transfer};
use chrono::{DateTime, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Map, Value};

pub const WEI_DECIMALS: i32 = 18;
pub const DEFAULT_TOKEN_DECIMALS: i64 = 18;

/// An API record as received. Etherscan encodes every field as a string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl From<Map<String, Value>> for RawRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl RawRecord {
    pub fn text(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            _ => String::new(),
        }
    }

    pub fn integer_or(&self, key: &str, default: i64) -> i64 {
        match self.0.get(key) {
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            Some(Value::Number(n)) => n.as_i64().unwrap_or(default),
            _ => default,
        }
    }

    pub fn integer(&self, key: &str) -> i64 {
        self.integer_or(key, 0)
    }

    pub fn decimal(&self, key: &str) -> f64 {
        match self.0.get(key) {
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        self.text(key).trim() == "1"
    }
}

/// Smallest-unit integer value scaled down by `10^decimals`.
pub fn scale_value(raw: f64, decimals: i64) -> f64 {
    let decimals = decimals.clamp(0, 255) as i32;
    raw / 10f64.powi(decimals)
}

pub fn wei_to_eth(raw: f64) -> f64 {
    scale_value(raw, WEI_DECIMALS as i64)
}

/// Epoch seconds as a timezone-naive UTC instant.
pub fn epoch_to_naive(secs: i64) -> NaiveDateTime {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or_default()
}

pub fn normalize_transfer(raw: &RawRecord) -> Transfer {
    Transfer {
        tx_hash: raw.text("hash"),
        block_number: raw.integer("blockNumber"),
        timestamp: epoch_to_naive(raw.integer("timeStamp")),
        sender: raw.text("from"),
        receiver: raw.text("to"),
        value_eth: wei_to_eth(raw.decimal("value")),
        gas_limit: raw.integer("gas"),
        gas_used: raw.integer("gasUsed"),
        type_label: raw.text("type"),
        is_error: raw.flag("isError"),
        call_data: raw.text("input"),
    }
}

pub fn normalize_token_transfer(raw: &RawRecord) -> TokenTransfer {
    let decimals = raw.integer_or("tokenDecimal", DEFAULT_TOKEN_DECIMALS);

    TokenTransfer {
        tx_hash: raw.text("hash"),
        block_number: raw.integer("blockNumber"),
        timestamp: epoch_to_naive(raw.integer("timeStamp")),
        token_address: raw.text("contractAddress"),
        from_address: raw.text("from"),
        to_address: raw.text("to"),
        value_token: scale_value(raw.decimal("value"), decimals),
        token_name: raw.text("tokenName"),
        token_symbol: raw.text("tokenSymbol"),
        token_decimals: decimals,
    }
}

/// `parent_hash` fills in the hash for by-transaction lookups, whose records
/// omit it.
pub fn normalize_internal_call(raw: &RawRecord, parent_hash: Option<&str>) -> InternalCall {
    let mut tx_hash = raw.text("hash");
    if tx_hash.is_empty() {
        tx_hash = parent_hash.unwrap_or_default().to_string();
    }

    InternalCall {
        tx_hash,
        block_number: raw.integer("blockNumber"),
        timestamp: epoch_to_naive(raw.integer("timeStamp")),
        from_address: raw.text("from"),
        to_address: raw.text("to"),
        value_eth: wei_to_eth(raw.decimal("value")),
        trace_id: raw.text("traceId"),
        is_error: raw.flag("isError"),
        call_type: raw.text("type"),
    }
}
