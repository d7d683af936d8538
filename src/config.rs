// Runtime configuration for a harvest run:
// - Etherscan endpoint, key and HTTP timeout
// - Database connection string and checkpoint location
// - Quota ceiling, pacing delays and retry budget
// - Job specification (targets, periods, strategy)

use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub api_key: String,
    pub database_url: String,
    pub checkpoint_path: String,
    pub max_api_calls_per_day: u64,
    pub quota_soft_stop_ratio: f64,
    pub requests_per_second: u32,
    pub request_delay: Duration,
    pub rate_limit_cooldown: Duration,
    pub retry_base_delay: Duration,
    pub max_attempts: usize,
    pub block_chunk_size: u64,
    pub http_timeout_secs: u64,
    pub db_batch_size: usize,
    pub discovery_limit: usize,
    pub discovery_max_depth: u32,
    pub investigate_limit: usize,
    pub risk_threshold: u32,
    pub block_cache_capacity: u64,
    pub resume_from_checkpoint: bool,
    pub clear_checkpoint: bool,
    pub clear_store: bool,
    pub harvest_targets: Option<String>,
    pub harvest_periods: Option<String>,
    pub harvest_strategy: String,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y"),
        Err(_) => default,
    }
}

fn env_list(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let api_url = env::var("ETHERSCAN_API_URL")
            .unwrap_or_else(|_| "https://api.etherscan.io/api".to_string());
        let api_key = env::var("ETHERSCAN_API_KEY").unwrap_or_default();
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:harvest.db".to_string());
        let checkpoint_path = env::var("CHECKPOINT_PATH").unwrap_or_else(|_| "eth_scan_state.json".to_string());

        Self {
            api_url,
            api_key,
            database_url,
            checkpoint_path,
            max_api_calls_per_day: env_or("MAX_API_CALLS_PER_DAY", 98_000),
            quota_soft_stop_ratio: env_or("QUOTA_SOFT_STOP_RATIO", 0.8),
            requests_per_second: env_or("REQUESTS_PER_SECOND", 4),
            request_delay: Duration::from_millis(env_or("REQUEST_DELAY_MS", 250)),
            rate_limit_cooldown: Duration::from_secs(env_or("RATE_LIMIT_COOLDOWN_SECS", 5)),
            retry_base_delay: Duration::from_millis(env_or("RETRY_BASE_DELAY_MS", 1_000)),
            max_attempts: env_or("MAX_ATTEMPTS", 3),
            block_chunk_size: env_or("BLOCK_CHUNK_SIZE", 10_000),
            http_timeout_secs: env_or("HTTP_TIMEOUT_SECS", 20),
            db_batch_size: env_or("DB_BATCH_SIZE", 100),
            discovery_limit: env_or("DISCOVERY_LIMIT", 10),
            discovery_max_depth: env_or("DISCOVERY_MAX_DEPTH", 1),
            investigate_limit: env_or("INVESTIGATE_LIMIT", 10),
            risk_threshold: env_or("RISK_THRESHOLD", 3),
            block_cache_capacity: env_or("BLOCK_CACHE_CAPACITY", 1_024),
            resume_from_checkpoint: env_flag("RESUME_FROM_CHECKPOINT", true),
            clear_checkpoint: env_flag("CLEAR_CHECKPOINT", false),
            clear_store: env_flag("CLEAR_STORE", false),
            harvest_targets: env_list("HARVEST_TARGETS"),
            harvest_periods: env_list("HARVEST_PERIODS"),
            harvest_strategy: env::var("HARVEST_STRATEGY").unwrap_or_else(|_| "focused".to_string()),
        }
    }
}
