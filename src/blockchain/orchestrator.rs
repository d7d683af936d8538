use crate::blockchain::client::LedgerApi;
use crate::blockchain::fetcher::{ChunkHandler, FetchPolicy, FetchProgress, FetchTarget, PaginatedFetcher};
use crate::blockchain::models::{
    normalize_internal_call, normalize_token_transfer, normalize_transfer, RawRecord,
};
use crate::blockchain::processor::{discover_wallets, EnrichmentCandidate, RiskLedger};
use crate::blockchain::quota::QuotaExceeded;
use crate::blockchain::resolver::TimeWindowResolver;
use crate::blockchain::suspicion::label_transfer;
use crate::checkpoint::{Checkpoint, CheckpointStore, FailedChunk};
use crate::config::Config;
use crate::db::{BatchReport, Sink};
use crate::error::HarvestError;
use crate::jobs::{Job, JobSpec, Strategy};
use crate::models::{Action, AddressLabel, BlockRange, FetchWindow, InternalCall, TokenTransfer, Transfer};
use crate::state::HarvestContext;
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use tracing::{debug, error, info, warn};

/// Lifecycle of a single job. `QuotaHalted` ends the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    WindowResolved(FetchWindow),
    Fetching,
    Normalizing,
    Persisted,
    Aborted,
    QuotaHalted,
}

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub policy: FetchPolicy,
    pub discovery_limit: usize,
    pub discovery_max_depth: u32,
    pub investigate_limit: usize,
    pub risk_threshold: u32,
    pub soft_stop_ratio: f64,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            policy: FetchPolicy::default(),
            discovery_limit: 10,
            discovery_max_depth: 1,
            investigate_limit: 10,
            risk_threshold: 3,
            soft_stop_ratio: 0.8,
        }
    }
}

impl HarvestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: FetchPolicy::from_config(config),
            discovery_limit: config.discovery_limit,
            discovery_max_depth: config.discovery_max_depth,
            investigate_limit: config.investigate_limit,
            risk_threshold: config.risk_threshold,
            soft_stop_ratio: config.quota_soft_stop_ratio,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    pub jobs_completed: usize,
    pub jobs_aborted: usize,
    pub transfers: BatchReport,
    pub token_transfers: BatchReport,
    pub internal_calls: BatchReport,
    pub labels_written: usize,
    pub discovered_wallets: Vec<String>,
    /// Chunks still unfetched when the run ended.
    pub gaps: Vec<FailedChunk>,
    /// Senders handed to the labeling stage, highest risk first.
    pub enrichment_candidates: Vec<EnrichmentCandidate>,
    pub soft_stopped: bool,
    pub calls_made: u64,
}

fn log_halt(e: &HarvestError) {
    if let HarvestError::QuotaExceeded(exceeded) = e {
        error!("{:?}: {}", JobState::QuotaHalted, exceeded);
    }
}

/// Normalizes and stores each fetched chunk as it arrives.
struct PersistingHandler<'a> {
    sink: &'a Sink,
    report: &'a mut HarvestReport,
    risk: &'a mut RiskLedger,
    transfers: Vec<Transfer>,
    flagged: Vec<String>,
}

impl<'a> PersistingHandler<'a> {
    fn new(sink: &'a Sink, report: &'a mut HarvestReport, risk: &'a mut RiskLedger) -> Self {
        Self {
            sink,
            report,
            risk,
            transfers: Vec::new(),
            flagged: Vec::new(),
        }
    }
}

impl ChunkHandler for PersistingHandler<'_> {
    async fn on_chunk(&mut self, action: Action, records: &[RawRecord]) {
        debug!("{} chunk of {} records: {:?}", action, records.len(), JobState::Normalizing);

        match action {
            Action::TxList => {
                let mut batch: Vec<Transfer> = records.iter().map(normalize_transfer).collect();
                for transfer in &mut batch {
                    if let Some(reason) = label_transfer(transfer) {
                        debug!("Flagged {}: {}", transfer.tx_hash, reason);
                        self.flagged.push(transfer.tx_hash.clone());
                    }
                    self.risk.observe(transfer);
                }
                let stored = self.sink.upsert_transfer_batch(&batch).await;
                self.report.transfers.merge(stored);
                self.transfers.extend(batch);
            }
            Action::TokenTx => {
                let batch: Vec<TokenTransfer> = records.iter().map(normalize_token_transfer).collect();
                let stored = self.sink.upsert_token_transfer_batch(&batch).await;
                self.report.token_transfers.merge(stored);
            }
            Action::TxListInternal => {
                let batch: Vec<InternalCall> = records
                    .iter()
                    .map(|raw| normalize_internal_call(raw, None))
                    .collect();
                let stored = self.sink.upsert_internal_call_batch(&batch).await;
                self.report.internal_calls.merge(stored);
            }
        }
    }
}

/// Drives a job specification to completion: window resolution, paginated
/// fetching, normalization, persistence and wallet discovery, one remote call
/// at a time.
pub struct HarvestOrchestrator<A> {
    ctx: HarvestContext<A>,
    resolver: TimeWindowResolver,
    checkpoints: CheckpointStore,
    sink: Sink,
    settings: HarvestSettings,
    resume: Option<Checkpoint>,
    progress: FetchProgress,
    risk: RiskLedger,
    report: HarvestReport,
    queued: HashSet<String>,
    active: Option<Job>,
}

impl<A: LedgerApi> HarvestOrchestrator<A> {
    pub fn new(
        ctx: HarvestContext<A>,
        resolver: TimeWindowResolver,
        checkpoints: CheckpointStore,
        sink: Sink,
        settings: HarvestSettings,
    ) -> Self {
        Self {
            ctx,
            resolver,
            checkpoints,
            sink,
            settings,
            resume: None,
            progress: FetchProgress::default(),
            risk: RiskLedger::default(),
            report: HarvestReport::default(),
            queued: HashSet::new(),
            active: None,
        }
    }

    /// Continue from a saved checkpoint: its recorded gaps are re-driven and
    /// the matching job starts where the checkpoint left off.
    pub fn with_resume(mut self, checkpoint: Option<Checkpoint>) -> Self {
        if let Some(checkpoint) = &checkpoint {
            self.progress = FetchProgress::resumed(checkpoint);
        }
        self.resume = checkpoint;
        self
    }

    pub fn context(&self) -> &HarvestContext<A> {
        &self.ctx
    }

    pub fn report(&self) -> &HarvestReport {
        &self.report
    }

    pub async fn run(&mut self, spec: &JobSpec) -> Result<HarvestReport, HarvestError> {
        info!(
            "Starting harvest: {} targets, {} periods, strategy {:?}",
            spec.targets.len(),
            spec.periods.len(),
            spec.strategy
        );

        let harvested = self.harvest(spec).await;
        if let Err(HarvestError::QuotaExceeded(_)) = &harvested {
            self.save_call_count().await?;
        }
        harvested?;

        self.finish();
        info!(
            "Harvest finished: {} jobs completed, {} aborted, {} API calls",
            self.report.jobs_completed, self.report.jobs_aborted, self.report.calls_made
        );
        Ok(self.report.clone())
    }

    async fn harvest(&mut self, spec: &JobSpec) -> Result<(), HarvestError> {
        self.label_seeds(spec).await;
        self.redrive_gaps().await?;

        let mut queue: VecDeque<Job> = spec.seed_jobs().into();
        self.queued
            .extend(spec.targets.iter().map(|t| t.address.to_lowercase()));

        while let Some(job) = queue.pop_front() {
            if self.soft_stop_reached() {
                warn!(
                    "Approaching API limit ({} of {} calls). Saving progress and stopping.",
                    self.ctx.quota.calls_made(),
                    self.ctx.quota.ceiling()
                );
                self.report.soft_stopped = true;
                break;
            }

            let follow_ups = self.run_job(&job, spec.strategy).await?;
            queue.extend(follow_ups);
        }
        Ok(())
    }

    /// Rewrite the saved checkpoint with every call billed so far, the
    /// refused one included. Its position is left as it was.
    async fn save_call_count(&mut self) -> Result<(), HarvestError> {
        let checkpoint = match (&self.progress.saved, &self.active) {
            (Some(saved), _) => saved.clone(),
            // Block 0 precedes every window, so nothing resumes from it
            (None, Some(job)) => Checkpoint::new(&job.address, job.action, 0, 0),
            (None, None) => return Ok(()),
        };
        self.progress.save(&self.ctx, &self.checkpoints, checkpoint).await?;
        info!("Saved checkpoint at {} API calls", self.ctx.quota.calls_made());
        Ok(())
    }

    fn soft_stop_reached(&self) -> bool {
        self.ctx.quota.usage_ratio() > self.settings.soft_stop_ratio
    }

    fn finish(&mut self) {
        self.report.gaps = self.progress.gaps.clone();
        self.report.enrichment_candidates = self.risk.candidates(self.settings.risk_threshold);
        self.report.calls_made = self.ctx.quota.calls_made();
    }

    async fn label_seeds(&mut self, spec: &JobSpec) {
        let now = Utc::now().naive_utc();
        for target in &spec.targets {
            let label = AddressLabel::new(
                &target.address,
                &target.label,
                &target.category,
                target.known_entity,
                now,
            );
            self.store_label(&label).await;
        }
    }

    async fn store_label(&mut self, label: &AddressLabel) {
        match self.sink.upsert_address_label(label).await {
            Ok(()) => self.report.labels_written += 1,
            Err(e) => error!("Error inserting address label {}: {}", label.address, e),
        }
    }

    /// Fetch chunks a previous run gave up on. A chunk that fails again stays
    /// recorded, and the saved resume position is kept throughout.
    async fn redrive_gaps(&mut self) -> Result<(), HarvestError> {
        if self.progress.gaps.is_empty() {
            return Ok(());
        }
        info!("Re-driving {} failed chunks from the previous run", self.progress.gaps.len());

        let pending = self.progress.gaps.clone();
        for gap in pending {
            self.progress.gaps.retain(|g| g != &gap);

            let target = FetchTarget {
                address: gap.address.clone(),
                action: gap.action,
                range: gap.range(),
                items_so_far: 0,
                gap_redrive: true,
            };

            let fetcher = PaginatedFetcher::new(&self.settings.policy, &self.checkpoints);
            let mut handler = PersistingHandler::new(&self.sink, &mut self.report, &mut self.risk);
            let fetched = fetcher
                .fetch(&self.ctx, &target, &mut self.progress, &mut handler)
                .await;
            if let Err(e) = fetched {
                log_halt(&e);
                self.progress.gaps.insert(0, gap);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Block range still to fetch for `job`, honoring a matching resume
    /// checkpoint once.
    fn fetch_range(&mut self, job: &Job, window: FetchWindow) -> (BlockRange, u64) {
        let full = window.range();
        let Some(checkpoint) = &self.resume else {
            return (full, 0);
        };
        if !checkpoint.matches(&job.address, job.action) {
            return (full, 0);
        }

        let resumable = window.start_block..=window.end_block.saturating_add(1);
        if !resumable.contains(&checkpoint.last_processed_block) {
            debug!(
                "Checkpoint block {} outside window {} for {}, starting fresh",
                checkpoint.last_processed_block, full, job
            );
            return (full, 0);
        }

        info!(
            "Resuming {} from block {} ({} items found so far)",
            job, checkpoint.last_processed_block, checkpoint.items_found_so_far
        );
        let resumed = (
            BlockRange::new(checkpoint.last_processed_block, window.end_block),
            checkpoint.items_found_so_far,
        );
        self.resume = None;
        resumed
    }

    /// Run one job to a terminal state and return the jobs it spawns.
    async fn run_job(&mut self, job: &Job, strategy: Strategy) -> Result<Vec<Job>, HarvestError> {
        info!("Processing {}", job);
        debug!("{}: {:?}", job, JobState::Pending);
        self.active = Some(job.clone());

        let window = match self.resolver.resolve_window(&self.ctx, &job.period).await {
            Ok(Some(window)) => window,
            Ok(None) => {
                warn!("Could not resolve block window for {}, skipping", job);
                debug!("{}: {:?}", job, JobState::Aborted);
                self.report.jobs_aborted += 1;
                return Ok(Vec::new());
            }
            Err(exceeded) => {
                error!("{}: {:?} ({})", job, JobState::QuotaHalted, exceeded);
                return Err(exceeded.into());
            }
        };
        debug!("{}: {:?}", job, JobState::WindowResolved(window));

        let (range, items_so_far) = self.fetch_range(job, window);
        let target = FetchTarget {
            address: job.address.clone(),
            action: job.action,
            range,
            items_so_far,
            gap_redrive: false,
        };
        debug!("{}: {:?}", job, JobState::Fetching);

        let fetcher = PaginatedFetcher::new(&self.settings.policy, &self.checkpoints);
        let mut handler = PersistingHandler::new(&self.sink, &mut self.report, &mut self.risk);
        let fetched = fetcher
            .fetch(&self.ctx, &target, &mut self.progress, &mut handler)
            .await;
        let PersistingHandler { transfers, flagged, .. } = handler;
        let outcome = fetched.inspect_err(log_halt)?;

        info!(
            "Finished {}: {} records over {} chunks ({} failed)",
            job,
            outcome.records.len(),
            outcome.chunks_visited.len(),
            outcome.failed_chunks.len()
        );
        debug!("{}: {:?}", job, JobState::Persisted);
        self.report.jobs_completed += 1;

        if job.action != Action::TxList {
            return Ok(Vec::new());
        }

        if strategy.investigates_suspicious() {
            self.investigate(&flagged).await?;
        }

        if strategy.discovers_wallets() && job.depth < self.settings.discovery_max_depth {
            return Ok(self.discover(job, &transfers).await);
        }

        Ok(Vec::new())
    }

    /// Internal calls of the first flagged transactions.
    async fn investigate(&mut self, flagged: &[String]) -> Result<(), QuotaExceeded> {
        let fetcher = PaginatedFetcher::new(&self.settings.policy, &self.checkpoints);

        for tx_hash in flagged.iter().take(self.settings.investigate_limit) {
            info!("Investigating suspicious transaction: {}", tx_hash);
            let records = fetcher.fetch_by_hash(&self.ctx, tx_hash).await?;
            if records.is_empty() {
                continue;
            }

            let calls: Vec<InternalCall> = records
                .iter()
                .map(|raw| normalize_internal_call(raw, Some(tx_hash)))
                .collect();
            let stored = self.sink.upsert_internal_call_batch(&calls).await;
            self.report.internal_calls.merge(stored);
        }
        Ok(())
    }

    /// Label the busiest counterparts of `job.address` and queue every
    /// action for each one a level deeper.
    async fn discover(&mut self, job: &Job, transfers: &[Transfer]) -> Vec<Job> {
        let wallets = discover_wallets(transfers, &job.address, self.settings.discovery_limit);
        info!("Discovered {} wallets from {}", wallets.len(), job.address);

        let now = Utc::now().naive_utc();
        let mut follow_ups = Vec::new();

        for (i, wallet) in wallets.iter().enumerate() {
            if !self.queued.insert(wallet.clone()) {
                continue;
            }
            let label = AddressLabel::new(wallet, &format!("Wallet {}", i + 1), "Individual Wallet", false, now);
            self.store_label(&label).await;
            self.report.discovered_wallets.push(wallet.clone());

            for action in Action::ALL {
                follow_ups.push(Job {
                    address: wallet.clone(),
                    period: job.period.clone(),
                    action,
                    depth: job.depth + 1,
                });
            }
        }

        follow_ups
    }
}
