use crate::models::{InternalCall, TokenTransfer, Transfer};
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Sqlite, SqlitePool};
use tracing::{debug, error, info, warn};

/// Outcome of one batched upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub inserted: usize,
    /// Rows whose key already existed; left untouched.
    pub duplicates: usize,
    pub failed: usize,
}

impl BatchReport {
    pub fn merge(&mut self, other: BatchReport) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
    }

    pub fn total(&self) -> usize {
        self.inserted + self.duplicates + self.failed
    }
}

/// A record kind with insert-or-ignore semantics on its key.
pub trait Persist {
    const KIND: &'static str;

    fn key(&self) -> String;

    fn insert_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>>;
}

impl Persist for Transfer {
    const KIND: &'static str = "transfer";

    fn key(&self) -> String {
        self.tx_hash.clone()
    }

    fn insert_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        sqlx::query(
            r#"
            INSERT INTO transfers
            (tx_hash, block_number, timestamp, sender, receiver, value_eth, gas, gas_used, tx_type, is_error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tx_hash) DO NOTHING
            "#,
        )
        .bind(self.tx_hash.as_str())
        .bind(self.block_number)
        .bind(self.timestamp)
        .bind(self.sender.as_str())
        .bind(self.receiver.as_str())
        .bind(self.value_eth)
        .bind(self.gas_limit)
        .bind(self.gas_used)
        .bind(self.type_label.as_str())
        .bind(self.is_error)
    }
}

impl Persist for TokenTransfer {
    const KIND: &'static str = "token transfer";

    fn key(&self) -> String {
        format!("{}:{}:{}:{}", self.tx_hash, self.token_address, self.from_address, self.to_address)
    }

    fn insert_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        sqlx::query(
            r#"
            INSERT INTO token_transfers
            (tx_hash, block_number, timestamp, token_address, from_address, to_address,
             value_token, token_name, token_symbol, token_decimals)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tx_hash, token_address, from_address, to_address) DO NOTHING
            "#,
        )
        .bind(self.tx_hash.as_str())
        .bind(self.block_number)
        .bind(self.timestamp)
        .bind(self.token_address.as_str())
        .bind(self.from_address.as_str())
        .bind(self.to_address.as_str())
        .bind(self.value_token)
        .bind(self.token_name.as_str())
        .bind(self.token_symbol.as_str())
        .bind(self.token_decimals)
    }
}

impl Persist for InternalCall {
    const KIND: &'static str = "internal call";

    fn key(&self) -> String {
        format!("{}:{}", self.tx_hash, self.trace_id)
    }

    fn insert_query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        sqlx::query(
            r#"
            INSERT INTO internal_calls
            (tx_hash, block_number, timestamp, from_address, to_address, value_eth, trace_id, is_error, call_type)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(tx_hash, trace_id) DO NOTHING
            "#,
        )
        .bind(self.tx_hash.as_str())
        .bind(self.block_number)
        .bind(self.timestamp)
        .bind(self.from_address.as_str())
        .bind(self.to_address.as_str())
        .bind(self.value_eth)
        .bind(self.trace_id.as_str())
        .bind(self.is_error)
        .bind(self.call_type.as_str())
    }
}

/// Insert-or-ignore `records`, committing every `batch_size` rows. A record
/// that fails to insert is logged and skipped; a batch whose transaction
/// cannot be opened or committed counts all of its records as failed.
pub async fn upsert_batch<T: Persist>(pool: &SqlitePool, records: &[T], batch_size: usize) -> BatchReport {
    let mut report = BatchReport::default();
    if records.is_empty() {
        return report;
    }

    for chunk in records.chunks(batch_size.max(1)) {
        let mut tx = match pool.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                error!("Failed to open {} batch: {}", T::KIND, e);
                report.failed += chunk.len();
                continue;
            }
        };

        let mut staged = BatchReport::default();
        for record in chunk {
            match record.insert_query().execute(&mut *tx).await {
                Ok(result) if result.rows_affected() > 0 => staged.inserted += 1,
                Ok(_) => staged.duplicates += 1,
                Err(e) => {
                    warn!("Error inserting {} {}: {}", T::KIND, record.key(), e);
                    staged.failed += 1;
                }
            }
        }

        match tx.commit().await {
            Ok(()) => {
                debug!("Committed {} {} rows so far", report.total() + staged.total(), T::KIND);
                report.merge(staged);
            }
            Err(e) => {
                error!("Failed to commit {} batch: {}", T::KIND, e);
                report.failed += chunk.len();
            }
        }
    }

    info!(
        "Stored {} {} records ({} new, {} already present, {} failed)",
        report.total(),
        T::KIND,
        report.inserted,
        report.duplicates,
        report.failed
    );
    report
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
}
