use crate::blockchain::client::{ApiRequest, LedgerApi};
use crate::blockchain::quota::QuotaExceeded;
use crate::cache::BlockCache;
use crate::jobs::Period;
use crate::models::FetchWindow;
use crate::state::{CallError, HarvestContext};
use tracing::{debug, warn};

/// Maps wall-clock instants to block numbers. Each lookup is a single
/// attempt: a failure means the timestamp cannot be mapped, not that the
/// request should be repeated.
pub struct TimeWindowResolver {
    cache: BlockCache,
}

impl TimeWindowResolver {
    pub fn new(cache: BlockCache) -> Self {
        Self { cache }
    }

    /// Closest block at or before `timestamp`, or `None` when unresolved.
    pub async fn resolve<A: LedgerApi>(
        &self,
        ctx: &HarvestContext<A>,
        timestamp: i64,
    ) -> Result<Option<u64>, QuotaExceeded> {
        if let Some(block) = self.cache.get(&timestamp).await {
            debug!("Block cache hit for timestamp {}: {}", timestamp, block);
            return Ok(Some(block));
        }

        let request = ApiRequest::BlockByTimestamp { timestamp };
        match ctx.call(&request).await {
            Ok(response) if response.is_ok() => match response.block_number() {
                Some(block) => {
                    self.cache.insert(timestamp, block).await;
                    Ok(Some(block))
                }
                None => {
                    warn!("Unparsable block number for timestamp {}: {}", timestamp, response.result);
                    Ok(None)
                }
            },
            Ok(response) => {
                warn!("Error converting timestamp {} to block: {}", timestamp, response.message);
                Ok(None)
            }
            Err(CallError::Quota(exceeded)) => Err(exceeded),
            Err(CallError::Client(e)) => {
                warn!("Error converting timestamp {} to block: {}", timestamp, e);
                Ok(None)
            }
        }
    }

    /// Block window for a calendar period. The end block is left unresolved
    /// (and not requested) when the start fails.
    pub async fn resolve_window<A: LedgerApi>(
        &self,
        ctx: &HarvestContext<A>,
        period: &Period,
    ) -> Result<Option<FetchWindow>, QuotaExceeded> {
        let Some(start_block) = self.resolve(ctx, period.start_timestamp()).await? else {
            return Ok(None);
        };
        let Some(end_block) = self.resolve(ctx, period.end_timestamp()).await? else {
            return Ok(None);
        };

        if start_block > end_block {
            warn!(
                "Period {} resolved to an inverted block range {}..{}",
                period.name, start_block, end_block
            );
            return Ok(None);
        }

        Ok(Some(FetchWindow { start_block, end_block }))
    }
}
