//! tests/mod.rs - Shared fixtures: a scripted in-process ledger API, response
//! builders and an in-memory store.

pub mod orchestrator_tests;

use crate::blockchain::client::{ApiRequest, ApiResponse, ClientError, LedgerApi};
use crate::blockchain::fetcher::FetchPolicy;
use crate::db::{connection, Sink};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

pub const SEED_ADDRESS: &str = "0x1111111111111111111111111111111111111111";
pub const WALLET_A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
pub const WALLET_B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
pub const WALLET_C: &str = "0xcccccccccccccccccccccccccccccccccccccccc";

pub const ONE_ETH_WEI: &str = "1000000000000000000";

type Reply = Result<ApiResponse, ClientError>;
type Router = Box<dyn Fn(&ApiRequest) -> Reply + Send + Sync>;

/// Answers scripted replies first, in order, then falls back to a routing
/// function. Every request is recorded.
pub struct MockApi {
    scripted: Mutex<VecDeque<Reply>>,
    fallback: Router,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::with_fallback(|_| Ok(no_records()))
    }

    pub fn with_fallback(fallback: impl Fn(&ApiRequest) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Box::new(fallback),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn script(self, reply: Reply) -> Self {
        self.scripted.lock().unwrap().push_back(reply);
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn sent(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Account-range requests only, as (action, address, start, end).
    pub fn range_requests(&self) -> Vec<(String, String, u64, u64)> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                ApiRequest::AccountRange { action, address, start_block, end_block } => {
                    Some((action.to_string(), address, start_block, end_block))
                }
                _ => None,
            })
            .collect()
    }
}

impl LedgerApi for MockApi {
    async fn get(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.scripted.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply,
            None => (self.fallback)(request),
        }
    }
}

pub fn ok_records(records: Vec<Value>) -> ApiResponse {
    ApiResponse {
        status: "1".to_string(),
        message: "OK".to_string(),
        result: Value::Array(records),
    }
}

pub fn no_records() -> ApiResponse {
    ApiResponse {
        status: "0".to_string(),
        message: "No transactions found".to_string(),
        result: json!([]),
    }
}

pub fn rate_limited() -> ApiResponse {
    ApiResponse {
        status: "0".to_string(),
        message: "NOTOK".to_string(),
        result: json!("Max rate limit reached, please use API Key for higher rate limit"),
    }
}

pub fn block_response(block: u64) -> ApiResponse {
    ApiResponse {
        status: "1".to_string(),
        message: "OK".to_string(),
        result: json!(block.to_string()),
    }
}

pub fn server_error() -> Reply {
    Err(ClientError::UnexpectedStatus(502))
}

pub fn transfer_json(hash: &str, from: &str, to: &str, value_wei: &str, block: u64) -> Value {
    json!({
        "blockNumber": block.to_string(),
        "timeStamp": "1659312000",
        "hash": hash,
        "from": from,
        "to": to,
        "value": value_wei,
        "gas": "21000",
        "gasUsed": "21000",
        "isError": "0",
        "input": "0x",
        "type": "call"
    })
}

/// No pacing, no cooldown, no backoff.
pub fn fast_policy(chunk_size: u64) -> FetchPolicy {
    FetchPolicy {
        chunk_size,
        max_attempts: 3,
        retry_base_delay: Duration::ZERO,
        rate_limit_cooldown: Duration::ZERO,
        request_delay: Duration::ZERO,
    }
}

pub async fn test_pool() -> SqlitePool {
    connection::establish_connection("sqlite::memory:", 1)
        .await
        .expect("Failed to create in-memory database")
}

pub async fn test_sink() -> Sink {
    Sink::new(test_pool().await, 100)
}
