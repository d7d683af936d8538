use crate::blockchain::client::{ApiRequest, LedgerApi};
use crate::blockchain::models::RawRecord;
use crate::blockchain::quota::QuotaExceeded;
use crate::checkpoint::{Checkpoint, CheckpointStore, FailedChunk};
use crate::config::Config;
use crate::error::HarvestError;
use crate::models::{Action, BlockRange};
use crate::state::{CallError, HarvestContext};
use backon::{BackoffBuilder, Retryable};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Pacing and retry budget for remote calls.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub chunk_size: u64,
    /// Attempts per chunk for transport-level failures. Rate-limit
    /// responses are retried separately and never consume this budget.
    pub max_attempts: usize,
    pub retry_base_delay: Duration,
    pub rate_limit_cooldown: Duration,
    pub request_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            rate_limit_cooldown: Duration::from_secs(5),
            request_delay: Duration::from_millis(250),
        }
    }
}

impl FetchPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.block_chunk_size.max(1),
            max_attempts: config.max_attempts.max(1),
            retry_base_delay: config.retry_base_delay,
            rate_limit_cooldown: config.rate_limit_cooldown,
            request_delay: config.request_delay,
        }
    }
}

/// Backoff growing by `base` per attempt: base, 2*base, 3*base, ...
#[derive(Debug, Clone, Copy)]
pub struct LinearBuilder {
    base: Duration,
    max_times: usize,
}

impl LinearBuilder {
    pub fn new(base: Duration, max_times: usize) -> Self {
        Self { base, max_times }
    }
}

#[derive(Debug)]
pub struct LinearBackoff {
    base: Duration,
    max_times: usize,
    attempt: usize,
}

impl Iterator for LinearBackoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_times {
            return None;
        }
        self.attempt += 1;
        Some(self.base * self.attempt as u32)
    }
}

impl BackoffBuilder for LinearBuilder {
    type Backoff = LinearBackoff;

    fn build(self) -> Self::Backoff {
        LinearBackoff {
            base: self.base,
            max_times: self.max_times,
            attempt: 0,
        }
    }
}

/// Split `range` into consecutive chunks of at most `size` blocks.
pub fn chunk_ranges(range: BlockRange, size: u64) -> Vec<BlockRange> {
    let size = size.max(1);
    let mut chunks = Vec::new();
    if range.is_empty() {
        return chunks;
    }

    let mut current = range.start;
    loop {
        let chunk_end = current.saturating_add(size - 1).min(range.end);
        chunks.push(BlockRange::new(current, chunk_end));
        if chunk_end >= range.end {
            break;
        }
        current = chunk_end + 1;
    }

    chunks
}

/// Receives each non-empty chunk before the checkpoint covering it is saved.
#[allow(async_fn_in_trait)]
pub trait ChunkHandler {
    async fn on_chunk(&mut self, action: Action, records: &[RawRecord]);
}

impl ChunkHandler for () {
    async fn on_chunk(&mut self, _action: Action, _records: &[RawRecord]) {}
}

/// What one account/action walk covers.
#[derive(Debug, Clone)]
pub struct FetchTarget {
    pub address: String,
    pub action: Action,
    pub range: BlockRange,
    /// Items already found by an earlier run of the same walk.
    pub items_so_far: u64,
    /// Re-fetch of a recorded gap. Its saves refresh the gap list and call
    /// count but keep the resume position already on disk.
    pub gap_redrive: bool,
}

/// The checkpoint as last written, plus the chunks still owed.
#[derive(Debug, Clone, Default)]
pub struct FetchProgress {
    pub saved: Option<Checkpoint>,
    pub gaps: Vec<FailedChunk>,
}

impl FetchProgress {
    pub fn resumed(checkpoint: &Checkpoint) -> Self {
        Self {
            saved: Some(checkpoint.clone()),
            gaps: checkpoint.failed_chunks.clone(),
        }
    }

    /// Write `checkpoint` with the current call count and gap list, and
    /// remember it as the saved state.
    pub async fn save<A: LedgerApi>(
        &mut self,
        ctx: &HarvestContext<A>,
        store: &CheckpointStore,
        mut checkpoint: Checkpoint,
    ) -> Result<(), HarvestError> {
        checkpoint.calls_made_at_save = ctx.quota.calls_made();
        checkpoint.failed_chunks = self.gaps.clone();
        store.save(&checkpoint).await?;
        self.saved = Some(checkpoint);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub records: Vec<RawRecord>,
    pub chunks_visited: Vec<BlockRange>,
    pub failed_chunks: Vec<BlockRange>,
}

enum ChunkReply {
    Records(Vec<RawRecord>),
    Empty(String),
}

/// Issue one logical request, re-sending after a cooldown for as long as the
/// API answers with a rate-limit message.
async fn call_until_settled<A: LedgerApi>(
    ctx: &HarvestContext<A>,
    request: &ApiRequest,
    cooldown: Duration,
) -> Result<ChunkReply, CallError> {
    loop {
        let response = ctx.call(request).await?;

        if response.is_ok() {
            let records = response.records()?;
            if records.is_empty() {
                return Ok(ChunkReply::Empty(response.message));
            }
            return Ok(ChunkReply::Records(records));
        }

        if response.is_rate_limited() {
            warn!("Rate limit exceeded. Waiting for {:?}...", cooldown);
            sleep(cooldown).await;
            continue;
        }

        // "No transactions found" and any other API-level refusal
        return Ok(ChunkReply::Empty(response.message));
    }
}

pub struct PaginatedFetcher<'a> {
    policy: &'a FetchPolicy,
    checkpoints: &'a CheckpointStore,
}

impl<'a> PaginatedFetcher<'a> {
    pub fn new(policy: &'a FetchPolicy, checkpoints: &'a CheckpointStore) -> Self {
        Self { policy, checkpoints }
    }

    async fn call_with_retry<A: LedgerApi>(
        &self,
        ctx: &HarvestContext<A>,
        request: &ApiRequest,
    ) -> Result<ChunkReply, CallError> {
        let cooldown = self.policy.rate_limit_cooldown;
        let backoff = LinearBuilder::new(
            self.policy.retry_base_delay,
            self.policy.max_attempts.saturating_sub(1),
        );

        let attempt = move || call_until_settled(ctx, request, cooldown);
        attempt
            .retry(backoff)
            .sleep(sleep)
            .when(CallError::is_transient)
            .notify(|e: &CallError, delay: Duration| {
                warn!("API call failed ({}), retrying in {:?}", e, delay);
            })
            .await
    }

    /// Checkpoint to write after a chunk of `target`, given the walk's
    /// position so far.
    fn checkpoint_for(target: &FetchTarget, progress: &FetchProgress, position: u64, items: u64) -> Checkpoint {
        if !target.gap_redrive {
            return Checkpoint::new(&target.address, target.action, position, items);
        }
        match &progress.saved {
            Some(saved) => saved.clone(),
            // Block 0 precedes every window, so nothing resumes from it
            None => Checkpoint::new(&target.address, target.action, 0, 0),
        }
    }

    /// Walk `target.range` chunk by chunk. Chunks that exhaust their attempt
    /// budget are appended to `progress.gaps` and recorded in the checkpoint.
    pub async fn fetch<A: LedgerApi, H: ChunkHandler>(
        &self,
        ctx: &HarvestContext<A>,
        target: &FetchTarget,
        progress: &mut FetchProgress,
        handler: &mut H,
    ) -> Result<FetchOutcome, HarvestError> {
        let chunks = chunk_ranges(target.range, self.policy.chunk_size);
        info!(
            "Fetching {} for {} (blocks {}, {} chunks)",
            target.action,
            target.address,
            target.range,
            chunks.len()
        );

        let mut outcome = FetchOutcome::default();
        let mut position = target.range.start;

        for chunk in chunks {
            let request = ApiRequest::AccountRange {
                action: target.action,
                address: target.address.clone(),
                start_block: chunk.start,
                end_block: chunk.end,
            };
            debug!("Querying blocks {} to {}", chunk.start, chunk.end);

            match self.call_with_retry(ctx, &request).await {
                Ok(ChunkReply::Records(records)) => {
                    info!("Found {} {} records in blocks {}", records.len(), target.action, chunk);
                    handler.on_chunk(target.action, &records).await;
                    outcome.records.extend(records);

                    position = chunk.end + 1;
                    let items = target.items_so_far + outcome.records.len() as u64;
                    let checkpoint = Self::checkpoint_for(target, progress, position, items);
                    progress.save(ctx, self.checkpoints, checkpoint).await?;
                }
                Ok(ChunkReply::Empty(message)) => {
                    debug!("No {} records in blocks {}: {}", target.action, chunk, message);
                }
                Err(CallError::Quota(exceeded)) => return Err(exceeded.into()),
                Err(CallError::Client(e)) => {
                    error!(
                        "Failed after {} attempts for blocks {} ({} {}): {}",
                        self.policy.max_attempts, chunk, target.action, target.address, e
                    );
                    progress.gaps.push(FailedChunk::new(&target.address, target.action, chunk));
                    outcome.failed_chunks.push(chunk);
                    let items = target.items_so_far + outcome.records.len() as u64;
                    let checkpoint = Self::checkpoint_for(target, progress, position, items);
                    progress.save(ctx, self.checkpoints, checkpoint).await?;
                }
            }

            outcome.chunks_visited.push(chunk);
            sleep(self.policy.request_delay).await;
        }

        Ok(outcome)
    }

    /// Internal calls of one transaction. Not chunked and not checkpointed;
    /// a permanent failure yields no records.
    pub async fn fetch_by_hash<A: LedgerApi>(
        &self,
        ctx: &HarvestContext<A>,
        tx_hash: &str,
    ) -> Result<Vec<RawRecord>, QuotaExceeded> {
        let request = ApiRequest::InternalByHash {
            tx_hash: tx_hash.to_string(),
        };

        let reply = self.call_with_retry(ctx, &request).await;
        sleep(self.policy.request_delay).await;

        match reply {
            Ok(ChunkReply::Records(records)) => Ok(records),
            Ok(ChunkReply::Empty(message)) => {
                debug!("No internal calls for {}: {}", tx_hash, message);
                Ok(Vec::new())
            }
            Err(CallError::Quota(exceeded)) => Err(exceeded),
            Err(CallError::Client(e)) => {
                warn!("Error getting internal transactions for {}: {}", tx_hash, e);
                Ok(Vec::new())
            }
        }
    }
}
