//! tests/orchestrator_tests.rs - Whole runs against the scripted ledger

use super::{
    block_response, fast_policy, no_records, ok_records, test_sink, transfer_json, MockApi, ONE_ETH_WEI,
    SEED_ADDRESS, WALLET_A, WALLET_B, WALLET_C,
};
use crate::blockchain::client::{ApiRequest, ApiResponse, ClientError};
use crate::blockchain::orchestrator::{HarvestOrchestrator, HarvestSettings};
use crate::blockchain::quota::QuotaTracker;
use crate::blockchain::resolver::TimeWindowResolver;
use crate::cache;
use crate::checkpoint::{Checkpoint, CheckpointStore, FailedChunk};
use crate::db::Sink;
use crate::error::HarvestError;
use crate::jobs::{JobSpec, Period, Strategy, Target};
use crate::models::{Action, BlockRange};
use crate::state::HarvestContext;
use serde_json::json;
use tempfile::TempDir;

const PERIOD_START: i64 = 1_659_312_000;
const PERIOD_END: i64 = 1_659_484_800;

fn block_for(timestamp: i64) -> u64 {
    (timestamp as u64 - 1_600_000_000) / 12
}

fn window_start() -> u64 {
    block_for(PERIOD_START)
}

fn window_end() -> u64 {
    block_for(PERIOD_END)
}

fn spec(strategy: Strategy) -> JobSpec {
    JobSpec {
        targets: vec![Target::parse(SEED_ADDRESS).unwrap()],
        periods: vec![Period::parse("Nomad Bridge Hack").unwrap()],
        strategy,
    }
}

fn settings() -> HarvestSettings {
    HarvestSettings {
        policy: fast_policy(100_000),
        ..HarvestSettings::default()
    }
}

fn whale_json(hash: &str) -> serde_json::Value {
    transfer_json(hash, WALLET_A, SEED_ADDRESS, "120000000000000000000", 15_000_000)
}

/// Seed trades with A twice and B once; A also paid C.
fn ledger_router(request: &ApiRequest) -> Result<ApiResponse, ClientError> {
    match request {
        ApiRequest::BlockByTimestamp { timestamp } => Ok(block_response(block_for(*timestamp))),
        ApiRequest::AccountRange { action: Action::TxList, address, .. } if address == SEED_ADDRESS => {
            Ok(ok_records(vec![
                transfer_json("0xa1", WALLET_A, SEED_ADDRESS, ONE_ETH_WEI, 1),
                transfer_json("0xa2", WALLET_A, SEED_ADDRESS, ONE_ETH_WEI, 2),
                transfer_json("0xb1", SEED_ADDRESS, WALLET_B, ONE_ETH_WEI, 3),
            ]))
        }
        ApiRequest::AccountRange { action: Action::TxList, address, .. } if address == WALLET_A => {
            Ok(ok_records(vec![transfer_json("0xc1", WALLET_A, WALLET_C, ONE_ETH_WEI, 4)]))
        }
        _ => Ok(no_records()),
    }
}

fn orchestrator(
    api: MockApi,
    quota: QuotaTracker,
    sink: &Sink,
    settings: HarvestSettings,
) -> (HarvestOrchestrator<MockApi>, TempDir) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let orchestrator = HarvestOrchestrator::new(
        HarvestContext::new(api, quota),
        TimeWindowResolver::new(cache::with_capacity(16)),
        CheckpointStore::new(dir.path().join("state.json")),
        sink.clone(),
        settings,
    );
    (orchestrator, dir)
}

#[tokio::test]
async fn test_focused_run_discovers_one_level() {
    let sink = test_sink().await;
    let (mut harvester, _dir) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::new(1_000),
        &sink,
        settings(),
    );

    let report = harvester.run(&spec(Strategy::Focused)).await.unwrap();

    assert_eq!(report.jobs_completed, 9);
    assert_eq!(report.jobs_aborted, 0);
    assert_eq!(report.discovered_wallets, vec![WALLET_A, WALLET_B]);
    assert_eq!(report.transfers.inserted, 4);
    assert_eq!(report.labels_written, 3);
    assert!(!report.soft_stopped);

    let api = &harvester.context().api;
    assert_eq!(api.sent(), 11);
    assert!(api.range_requests().iter().all(|(_, address, _, _)| address != WALLET_C));
    assert!(api
        .range_requests()
        .iter()
        .all(|(_, _, start, end)| *start == window_start() && *end == window_end()));

    let wallet = sink.address_label(WALLET_A).await.unwrap().expect("wallet labelled");
    assert_eq!(wallet.label, "Wallet 1");
    assert_eq!(wallet.category, "Individual Wallet");
    assert!(!wallet.known_entity);
    assert_eq!(sink.address_label(WALLET_B).await.unwrap().unwrap().label, "Wallet 2");
    assert_eq!(sink.address_label(WALLET_C).await.unwrap(), None);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let sink = test_sink().await;

    let (mut first, _dir1) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::new(1_000),
        &sink,
        settings(),
    );
    first.run(&spec(Strategy::Focused)).await.unwrap();
    let before = sink.table_counts().await.unwrap();

    let (mut second, _dir2) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::new(1_000),
        &sink,
        settings(),
    );
    let report = second.run(&spec(Strategy::Focused)).await.unwrap();

    assert_eq!(report.transfers.inserted, 0);
    assert_eq!(report.transfers.duplicates, 4);
    assert_eq!(sink.table_counts().await.unwrap(), before);
}

#[tokio::test]
async fn test_catalog_seed_is_labelled_as_known_entity() {
    let sink = test_sink().await;
    let (mut harvester, _dir) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::new(1_000),
        &sink,
        settings(),
    );
    let job_spec = JobSpec {
        targets: vec![Target::parse("usdt").unwrap()],
        periods: vec![Period::parse("Nomad Bridge Hack").unwrap()],
        strategy: Strategy::TokenTransfers,
    };

    harvester.run(&job_spec).await.unwrap();

    let label = sink
        .address_label("0xdAC17F958D2ee523a2206206994597C13D831ec7")
        .await
        .unwrap()
        .expect("seed labelled");
    assert_eq!(label.label, "USDT");
    assert_eq!(label.category, "Token");
    assert!(label.known_entity);
}

#[tokio::test]
async fn test_quota_halt_stops_the_run() {
    let sink = test_sink().await;
    let (mut harvester, _dir) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::new(3),
        &sink,
        settings(),
    );

    let result = harvester.run(&spec(Strategy::TokenTransfers)).await;

    assert!(matches!(result, Err(HarvestError::QuotaExceeded(_))));
    assert_eq!(harvester.context().api.sent(), 2);
    assert_eq!(harvester.report().jobs_completed, 0);
}

fn saved_checkpoint(dir: &TempDir) -> Checkpoint {
    let raw = std::fs::read(dir.path().join("state.json")).expect("checkpoint written");
    serde_json::from_slice(&raw).expect("checkpoint decodes")
}

#[tokio::test]
async fn test_quota_halt_saves_every_billed_call() {
    let sink = test_sink().await;
    let (mut harvester, dir) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::new(5),
        &sink,
        settings(),
    );

    // Window (2 calls), seed txlist (saved at 3), tokentx (empty), refused internal call
    let result = harvester.run(&spec(Strategy::Focused)).await;

    assert!(matches!(result, Err(HarvestError::QuotaExceeded(_))));
    assert_eq!(harvester.context().api.sent(), 4);

    let checkpoint = saved_checkpoint(&dir);
    assert_eq!(checkpoint.calls_made_at_save, harvester.context().quota.calls_made());
    assert_eq!(checkpoint.calls_made_at_save, 5);
    assert!(checkpoint.matches(SEED_ADDRESS, Action::TxList));
    assert_eq!(checkpoint.last_processed_block, window_end() + 1);
    assert_eq!(checkpoint.items_found_so_far, 3);
}

#[tokio::test]
async fn test_quota_halt_before_any_chunk_still_saves_calls() {
    let sink = test_sink().await;
    let (mut harvester, dir) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::new(3),
        &sink,
        settings(),
    );

    let result = harvester.run(&spec(Strategy::TokenTransfers)).await;
    assert!(matches!(result, Err(HarvestError::QuotaExceeded(_))));

    let checkpoint = saved_checkpoint(&dir);
    assert_eq!(checkpoint.calls_made_at_save, 3);
    assert!(checkpoint.matches(SEED_ADDRESS, Action::TokenTx));
    assert_eq!(checkpoint.last_processed_block, 0);
}

#[tokio::test]
async fn test_gap_redrive_keeps_resume_position_through_halt() {
    let sink = test_sink().await;
    let (harvester, dir) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::new(3),
        &sink,
        settings(),
    );
    let checkpoint = Checkpoint {
        address: SEED_ADDRESS.to_string(),
        action: Action::TokenTx,
        last_processed_block: window_start() + 5_000,
        calls_made_at_save: 0,
        items_found_so_far: 7,
        failed_chunks: vec![FailedChunk::new(SEED_ADDRESS, Action::TxList, BlockRange::new(100, 199))],
    };
    let mut harvester = harvester.with_resume(Some(checkpoint));

    // Gap (1 call), window start (2), window end refused (3)
    let result = harvester.run(&spec(Strategy::TokenTransfers)).await;

    assert!(matches!(result, Err(HarvestError::QuotaExceeded(_))));
    assert_eq!(harvester.context().api.sent(), 2);

    let saved = saved_checkpoint(&dir);
    assert!(saved.matches(SEED_ADDRESS, Action::TokenTx));
    assert_eq!(saved.last_processed_block, window_start() + 5_000);
    assert_eq!(saved.items_found_so_far, 7);
    assert_eq!(saved.calls_made_at_save, 3);
    assert!(saved.failed_chunks.is_empty());
}

#[tokio::test]
async fn test_halted_gap_redrive_stays_recorded() {
    let sink = test_sink().await;
    let (harvester, dir) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::resume_from(10, 9),
        &sink,
        settings(),
    );
    let gap = FailedChunk::new(SEED_ADDRESS, Action::TxList, BlockRange::new(100, 199));
    let checkpoint = Checkpoint {
        address: SEED_ADDRESS.to_string(),
        action: Action::TokenTx,
        last_processed_block: window_start() + 5_000,
        calls_made_at_save: 9,
        items_found_so_far: 7,
        failed_chunks: vec![gap.clone()],
    };
    let mut harvester = harvester.with_resume(Some(checkpoint));

    let result = harvester.run(&spec(Strategy::TokenTransfers)).await;

    assert!(matches!(result, Err(HarvestError::QuotaExceeded(_))));
    assert_eq!(harvester.context().api.sent(), 0);

    let saved = saved_checkpoint(&dir);
    assert_eq!(saved.failed_chunks, vec![gap]);
    assert_eq!(saved.last_processed_block, window_start() + 5_000);
    assert_eq!(saved.calls_made_at_save, 10);
}

#[tokio::test]
async fn test_unresolved_window_aborts_job() {
    let sink = test_sink().await;
    let (mut harvester, _dir) = orchestrator(MockApi::new(), QuotaTracker::new(1_000), &sink, settings());

    let report = harvester.run(&spec(Strategy::TokenTransfers)).await.unwrap();

    assert_eq!(report.jobs_aborted, 1);
    assert_eq!(report.jobs_completed, 0);
    assert!(harvester.context().api.range_requests().is_empty());
}

#[tokio::test]
async fn test_soft_stop_before_next_job() {
    let sink = test_sink().await;
    let (mut harvester, _dir) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::resume_from(100, 81),
        &sink,
        settings(),
    );

    let report = harvester.run(&spec(Strategy::Focused)).await.unwrap();

    assert!(report.soft_stopped);
    assert_eq!(report.jobs_completed, 0);
    assert_eq!(report.calls_made, 81);
    assert_eq!(harvester.context().api.sent(), 0);
}

#[tokio::test]
async fn test_resume_starts_at_checkpoint_block() {
    let sink = test_sink().await;
    let (harvester, _dir) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::resume_from(1_000, 10),
        &sink,
        settings(),
    );
    let checkpoint = Checkpoint {
        address: SEED_ADDRESS.to_string(),
        action: Action::TokenTx,
        last_processed_block: window_start() + 5_000,
        calls_made_at_save: 10,
        items_found_so_far: 7,
        failed_chunks: Vec::new(),
    };
    let mut harvester = harvester.with_resume(Some(checkpoint));

    harvester.run(&spec(Strategy::TokenTransfers)).await.unwrap();

    assert_eq!(
        harvester.context().api.range_requests(),
        vec![(
            "tokentx".to_string(),
            SEED_ADDRESS.to_string(),
            window_start() + 5_000,
            window_end()
        )]
    );
}

#[tokio::test]
async fn test_checkpoint_outside_window_is_ignored() {
    let sink = test_sink().await;
    let (harvester, _dir) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::new(1_000),
        &sink,
        settings(),
    );
    let checkpoint = Checkpoint {
        address: SEED_ADDRESS.to_string(),
        action: Action::TokenTx,
        last_processed_block: window_end() + 2,
        calls_made_at_save: 0,
        items_found_so_far: 0,
        failed_chunks: Vec::new(),
    };
    let mut harvester = harvester.with_resume(Some(checkpoint));

    harvester.run(&spec(Strategy::TokenTransfers)).await.unwrap();

    let requests = harvester.context().api.range_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].2, window_start());
}

#[tokio::test]
async fn test_recorded_gaps_are_fetched_first() {
    let sink = test_sink().await;
    let (harvester, _dir) = orchestrator(
        MockApi::with_fallback(ledger_router),
        QuotaTracker::new(1_000),
        &sink,
        settings(),
    );
    let checkpoint = Checkpoint {
        address: SEED_ADDRESS.to_string(),
        action: Action::TokenTx,
        last_processed_block: 0,
        calls_made_at_save: 0,
        items_found_so_far: 0,
        failed_chunks: vec![FailedChunk::new(SEED_ADDRESS, Action::TxList, BlockRange::new(100, 199))],
    };
    let mut harvester = harvester.with_resume(Some(checkpoint));

    let report = harvester.run(&spec(Strategy::TokenTransfers)).await.unwrap();

    let requests = harvester.context().api.requests();
    assert_eq!(
        requests[0],
        ApiRequest::AccountRange {
            action: Action::TxList,
            address: SEED_ADDRESS.to_string(),
            start_block: 100,
            end_block: 199,
        }
    );
    assert!(report.gaps.is_empty());
    assert_eq!(report.transfers.inserted, 3);
}

#[tokio::test]
async fn test_comprehensive_run_investigates_flagged_transfers() {
    let sink = test_sink().await;
    let router = |request: &ApiRequest| -> Result<ApiResponse, ClientError> {
        match request {
            ApiRequest::BlockByTimestamp { timestamp } => Ok(block_response(block_for(*timestamp))),
            ApiRequest::AccountRange { action: Action::TxList, .. } => {
                Ok(ok_records(vec![whale_json("0xwhale1"), whale_json("0xwhale2")]))
            }
            ApiRequest::InternalByHash { .. } => Ok(ok_records(vec![json!({
                "blockNumber": "15000000",
                "timeStamp": "1659312000",
                "from": SEED_ADDRESS,
                "to": WALLET_B,
                "value": ONE_ETH_WEI,
                "traceId": "0",
                "isError": "0",
                "type": "call"
            })])),
            _ => Ok(no_records()),
        }
    };
    let (mut harvester, _dir) = orchestrator(
        MockApi::with_fallback(router),
        QuotaTracker::new(1_000),
        &sink,
        settings(),
    );

    let report = harvester.run(&spec(Strategy::Comprehensive)).await.unwrap();

    let investigated: Vec<ApiRequest> = harvester
        .context()
        .api
        .requests()
        .into_iter()
        .filter(|r| matches!(r, ApiRequest::InternalByHash { .. }))
        .collect();
    assert_eq!(
        investigated,
        vec![
            ApiRequest::InternalByHash { tx_hash: "0xwhale1".to_string() },
            ApiRequest::InternalByHash { tx_hash: "0xwhale2".to_string() },
        ]
    );
    assert_eq!(report.internal_calls.inserted, 2);
    assert!(report.discovered_wallets.is_empty());

    let stored_type: String = sqlx::query_scalar("SELECT tx_type FROM transfers WHERE tx_hash = '0xwhale1'")
        .fetch_one(sink.pool())
        .await
        .unwrap();
    assert_eq!(stored_type, "High value transaction");

    let parents: Vec<String> = sqlx::query_scalar("SELECT tx_hash FROM internal_calls ORDER BY tx_hash")
        .fetch_all(sink.pool())
        .await
        .unwrap();
    assert_eq!(parents, vec!["0xwhale1", "0xwhale2"]);

    assert_eq!(report.enrichment_candidates.len(), 1);
    assert_eq!(report.enrichment_candidates[0].address, WALLET_A);
    assert_eq!(report.enrichment_candidates[0].score, 6);
}
