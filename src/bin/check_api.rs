// Manual smoke check against the live API: resolve the block for a recent
// timestamp, then fetch one chunk of USDT transfers ending there.

use ledger_harvester::blockchain::client::ApiRequest;
use ledger_harvester::blockchain::models::normalize_transfer;
use ledger_harvester::blockchain::{EtherscanClient, QuotaTracker};
use ledger_harvester::catalog;
use ledger_harvester::config::Config;
use ledger_harvester::models::Action;
use ledger_harvester::HarvestContext;
use tracing::{error, info, Level};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let config = Config::from_env();
    let ctx = HarvestContext::new(EtherscanClient::new(&config)?, QuotaTracker::new(10));

    let timestamp = chrono::Utc::now().timestamp() - 3_600;
    info!("Resolving block for timestamp {}...", timestamp);
    let response = ctx.call(&ApiRequest::BlockByTimestamp { timestamp }).await?;
    let Some(block) = response.block_number() else {
        error!("Block lookup failed: {} ({})", response.message, response.result);
        return Ok(());
    };
    info!("Block at {}: {}", timestamp, block);

    let usdt = catalog::find_contract("usdt").ok_or("usdt missing from catalog")?;
    let request = ApiRequest::AccountRange {
        action: Action::TxList,
        address: usdt.address.to_string(),
        start_block: block.saturating_sub(config.block_chunk_size.saturating_sub(1)),
        end_block: block,
    };
    let response = ctx.call(&request).await?;
    info!("Status {} ({})", response.status, response.message);

    let records = response.records()?;
    info!("Fetched {} records", records.len());
    for transfer in records.iter().take(3).map(normalize_transfer) {
        info!(
            "{} {} -> {} {:.6} ETH at {}",
            transfer.tx_hash, transfer.sender, transfer.receiver, transfer.value_eth, transfer.timestamp
        );
    }
    info!("API calls made: {}", ctx.quota.calls_made());

    Ok(())
}
