use crate::blockchain::models::RawRecord;
use crate::config::Config;
use crate::models::Action;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroU32;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

/// A single request against the ledger API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiRequest {
    /// Closest block at or before `timestamp`.
    BlockByTimestamp { timestamp: i64 },
    /// One page of account history over an inclusive block range.
    AccountRange {
        action: Action,
        address: String,
        start_block: u64,
        end_block: u64,
    },
    /// Internal calls of a single transaction.
    InternalByHash { tx_hash: String },
}

impl ApiRequest {
    /// Query parameters, without the API key.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            ApiRequest::BlockByTimestamp { timestamp } => vec![
                ("module", "block".to_string()),
                ("action", "getblocknobytime".to_string()),
                ("timestamp", timestamp.to_string()),
                ("closest", "before".to_string()),
            ],
            ApiRequest::AccountRange { action, address, start_block, end_block } => vec![
                ("module", "account".to_string()),
                ("action", action.as_str().to_string()),
                ("address", address.clone()),
                ("startblock", start_block.to_string()),
                ("endblock", end_block.to_string()),
                ("sort", "asc".to_string()),
            ],
            ApiRequest::InternalByHash { tx_hash } => vec![
                ("module", "account".to_string()),
                ("action", Action::TxListInternal.as_str().to_string()),
                ("txhash", tx_hash.clone()),
            ],
        }
    }
}

/// Response envelope: `{ status: "1"|"0", message, result }`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub result: Value,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.status == "1"
    }

    /// Etherscan reports throttling either in `message` or as a string `result`.
    pub fn is_rate_limited(&self) -> bool {
        if self.is_ok() {
            return false;
        }
        let in_result = self
            .result
            .as_str()
            .map(|r| r.to_lowercase().contains("rate limit"))
            .unwrap_or(false);
        self.message.to_lowercase().contains("rate limit") || in_result
    }

    /// Records of a successful response. Non-object entries are dropped.
    pub fn records(&self) -> Result<Vec<RawRecord>, ClientError> {
        match &self.result {
            Value::Array(items) => Ok(items
                .iter()
                .filter_map(|item| item.as_object().cloned().map(RawRecord::from))
                .collect()),
            Value::Null => Ok(Vec::new()),
            other => Err(ClientError::MalformedPayload(format!(
                "expected a list of records, got {}",
                other
            ))),
        }
    }

    /// Block number carried by a block-by-timestamp response.
    pub fn block_number(&self) -> Option<u64> {
        match &self.result {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
    }
}

/// The remote ledger. Implemented over HTTP by [`EtherscanClient`].
#[allow(async_fn_in_trait)]
pub trait LedgerApi {
    async fn get(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError>;
}

pub struct EtherscanClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: DefaultDirectRateLimiter,
}

impl EtherscanClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let timeout = Duration::from_secs(config.http_timeout_secs);
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let limiter = RateLimiter::direct(Quota::per_second(per_second));

        if config.api_key.is_empty() {
            warn!("ETHERSCAN_API_KEY is not set; requests will use the anonymous tier");
        }

        info!(
            "Initializing Etherscan client with endpoint: {}, throttle: {} req/s",
            config.api_url, per_second
        );

        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            limiter,
        })
    }
}

impl LedgerApi for EtherscanClient {
    async fn get(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        self.limiter.until_ready().await;

        let mut query = request.query();
        query.push(("apikey", self.api_key.clone()));

        let response = self.http.get(&self.base_url).query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| ClientError::MalformedPayload(e.to_string()))
    }
}
