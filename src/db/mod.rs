pub mod address;
pub mod connection;
pub mod transaction;

use crate::models::{AddressLabel, InternalCall, TokenTransfer, Transfer};
use sqlx::SqlitePool;
use tracing::info;

pub use transaction::BatchReport;

pub const INIT_SCHEMA: &str = r#"
-- Plain transfers, keyed by transaction hash
CREATE TABLE IF NOT EXISTS transfers (
    tx_hash TEXT PRIMARY KEY,
    block_number INTEGER NOT NULL,
    timestamp DATETIME NOT NULL,
    sender TEXT NOT NULL,
    receiver TEXT NOT NULL,
    value_eth REAL NOT NULL,
    gas INTEGER NOT NULL,
    gas_used INTEGER NOT NULL,
    tx_type TEXT NOT NULL,
    is_error BOOLEAN NOT NULL
);

CREATE TABLE IF NOT EXISTS token_transfers (
    tx_hash TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    timestamp DATETIME NOT NULL,
    token_address TEXT NOT NULL,
    from_address TEXT NOT NULL,
    to_address TEXT NOT NULL,
    value_token REAL NOT NULL,
    token_name TEXT NOT NULL,
    token_symbol TEXT NOT NULL,
    token_decimals INTEGER NOT NULL,
    PRIMARY KEY (tx_hash, token_address, from_address, to_address)
);

CREATE TABLE IF NOT EXISTS internal_calls (
    tx_hash TEXT NOT NULL,
    block_number INTEGER NOT NULL,
    timestamp DATETIME NOT NULL,
    from_address TEXT NOT NULL,
    to_address TEXT NOT NULL,
    value_eth REAL NOT NULL,
    trace_id TEXT NOT NULL,
    is_error BOOLEAN NOT NULL,
    call_type TEXT NOT NULL,
    PRIMARY KEY (tx_hash, trace_id)
);

CREATE TABLE IF NOT EXISTS address_labels (
    address TEXT PRIMARY KEY,
    label TEXT NOT NULL,
    category TEXT NOT NULL,
    known_entity BOOLEAN NOT NULL,
    first_seen DATETIME NOT NULL,
    last_seen DATETIME NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_transfers_block ON transfers(block_number);
CREATE INDEX IF NOT EXISTS idx_transfers_sender ON transfers(sender);
CREATE INDEX IF NOT EXISTS idx_token_transfers_block ON token_transfers(block_number);
CREATE INDEX IF NOT EXISTS idx_internal_calls_block ON internal_calls(block_number);
"#;

const TABLES: [&str; 4] = ["transfers", "token_transfers", "internal_calls", "address_labels"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub transfers: i64,
    pub token_transfers: i64,
    pub internal_calls: i64,
    pub address_labels: i64,
}

/// Durable destination for normalized records.
#[derive(Clone)]
pub struct Sink {
    pool: SqlitePool,
    batch_size: usize,
}

impl Sink {
    pub fn new(pool: SqlitePool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn upsert_transfer_batch(&self, transfers: &[Transfer]) -> BatchReport {
        transaction::upsert_batch(&self.pool, transfers, self.batch_size).await
    }

    pub async fn upsert_token_transfer_batch(&self, transfers: &[TokenTransfer]) -> BatchReport {
        transaction::upsert_batch(&self.pool, transfers, self.batch_size).await
    }

    pub async fn upsert_internal_call_batch(&self, calls: &[InternalCall]) -> BatchReport {
        transaction::upsert_batch(&self.pool, calls, self.batch_size).await
    }

    pub async fn upsert_address_label(&self, label: &AddressLabel) -> Result<(), sqlx::Error> {
        address::upsert_address_label(&self.pool, label).await
    }

    pub async fn address_label(&self, address: &str) -> Result<Option<AddressLabel>, sqlx::Error> {
        address::get_address_label(&self.pool, address).await
    }

    pub async fn table_counts(&self) -> Result<TableCounts, sqlx::Error> {
        Ok(TableCounts {
            transfers: transaction::count_rows(&self.pool, "transfers").await?,
            token_transfers: transaction::count_rows(&self.pool, "token_transfers").await?,
            internal_calls: transaction::count_rows(&self.pool, "internal_calls").await?,
            address_labels: transaction::count_rows(&self.pool, "address_labels").await?,
        })
    }

    /// Remove every harvested row and label.
    pub async fn clear(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for table in TABLES {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
            info!("Cleared table: {}", table);
        }
        tx.commit().await?;
        Ok(())
    }
}
