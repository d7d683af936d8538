use moka::future::Cache;
use crate::config::Config;

/// Resolved block numbers keyed by the epoch second they were resolved for.
pub type BlockCache = Cache<i64, u64>;

pub fn init_cache(config: &Config) -> BlockCache {
    with_capacity(config.block_cache_capacity)
}

pub fn with_capacity(max_capacity: u64) -> BlockCache {
    Cache::builder()
        .max_capacity(max_capacity)
        .build()
}
