use ledger_harvester::blockchain::{
    EtherscanClient, HarvestOrchestrator, HarvestSettings, QuotaTracker, TimeWindowResolver,
};
use ledger_harvester::{cache, config::Config, db, CheckpointStore, HarvestContext, HarvestError, JobSpec, Sink};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting ledger-harvester");

    // Load configuration and the job specification
    let config = Config::from_env();
    let spec = JobSpec::from_config(&config)?;

    // Setup database connection
    let db_pool = db::connection::establish_connection(&config.database_url, 5).await?;
    let sink = Sink::new(db_pool, config.db_batch_size);
    if config.clear_store {
        sink.clear().await?;
    }

    let checkpoints = CheckpointStore::new(&config.checkpoint_path);
    if config.clear_checkpoint {
        checkpoints.clear().await?;
    }
    let checkpoint = if config.resume_from_checkpoint {
        checkpoints.load().await?
    } else {
        None
    };

    let quota = match &checkpoint {
        Some(saved) => {
            info!(
                "Resuming from checkpoint: {} {} at block {} ({} API calls made)",
                saved.address, saved.action, saved.last_processed_block, saved.calls_made_at_save
            );
            QuotaTracker::resume_from(config.max_api_calls_per_day, saved.calls_made_at_save)
        }
        None => QuotaTracker::new(config.max_api_calls_per_day),
    };

    let client = EtherscanClient::new(&config)?;
    let resolver = TimeWindowResolver::new(cache::init_cache(&config));
    let mut orchestrator = HarvestOrchestrator::new(
        HarvestContext::new(client, quota),
        resolver,
        checkpoints,
        sink.clone(),
        HarvestSettings::from_config(&config),
    )
    .with_resume(checkpoint);

    let report = match orchestrator.run(&spec).await {
        Ok(report) => report,
        Err(HarvestError::QuotaExceeded(exceeded)) => {
            error!(
                "{}. Progress saved to {}; run again to resume.",
                exceeded, config.checkpoint_path
            );
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    if report.soft_stopped {
        warn!("Run stopped early to stay under the daily API limit");
    }
    for gap in &report.gaps {
        warn!(
            "Unfetched chunk: {} {} blocks {}..={}",
            gap.address, gap.action, gap.start_block, gap.end_block
        );
    }
    for candidate in &report.enrichment_candidates {
        info!("Enrichment candidate {} (risk score {})", candidate.address, candidate.score);
    }

    let counts = sink.table_counts().await?;
    info!(
        "Database now holds {} transfers, {} token transfers, {} internal calls, {} labels",
        counts.transfers, counts.token_transfers, counts.internal_calls, counts.address_labels
    );
    info!("Total API calls made: {}", report.calls_made);

    Ok(())
}
