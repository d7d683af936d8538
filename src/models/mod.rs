// Normalized record kinds persisted by the sink, plus the small value types
// shared by the fetcher, checkpoint and orchestrator.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account-module actions the harvester pages through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "txlist")]
    TxList,
    #[serde(rename = "tokentx")]
    TokenTx,
    #[serde(rename = "txlistinternal")]
    TxListInternal,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::TxList, Action::TokenTx, Action::TxListInternal];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::TxList => "txlist",
            Action::TokenTx => "tokentx",
            Action::TxListInternal => "txlistinternal",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "txlist" => Ok(Action::TxList),
            "tokentx" => Ok(Action::TokenTx),
            "txlistinternal" => Ok(Action::TxListInternal),
            other => Err(other.to_string()),
        }
    }
}

/// Inclusive block interval. `start > end` denotes an empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub start: u64,
    pub end: u64,
}

impl BlockRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.start && block <= self.end
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Block range resolved from a calendar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start_block: u64,
    pub end_block: u64,
}

impl FetchWindow {
    pub fn range(&self) -> BlockRange {
        BlockRange::new(self.start_block, self.end_block)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub tx_hash: String,
    pub block_number: i64,
    pub timestamp: NaiveDateTime,
    pub sender: String,
    pub receiver: String,
    pub value_eth: f64,
    pub gas_limit: i64,
    pub gas_used: i64,
    pub type_label: String,
    pub is_error: bool,
    // Not persisted; used for classification and wallet discovery.
    pub call_data: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenTransfer {
    pub tx_hash: String,
    pub block_number: i64,
    pub timestamp: NaiveDateTime,
    pub token_address: String,
    pub from_address: String,
    pub to_address: String,
    pub value_token: f64,
    pub token_name: String,
    pub token_symbol: String,
    pub token_decimals: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InternalCall {
    pub tx_hash: String,
    pub block_number: i64,
    pub timestamp: NaiveDateTime,
    pub from_address: String,
    pub to_address: String,
    pub value_eth: f64,
    pub trace_id: String,
    pub is_error: bool,
    pub call_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AddressLabel {
    pub address: String,
    pub label: String,
    pub category: String,
    pub known_entity: bool,
    pub first_seen: NaiveDateTime,
    pub last_seen: NaiveDateTime,
}

impl AddressLabel {
    /// Label observed at `seen_at`; the address is lower-cased.
    pub fn new(address: &str, label: &str, category: &str, known_entity: bool, seen_at: NaiveDateTime) -> Self {
        Self {
            address: address.to_lowercase(),
            label: label.to_string(),
            category: category.to_string(),
            known_entity,
            first_seen: seen_at,
            last_seen: seen_at,
        }
    }
}
