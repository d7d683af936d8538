// SQLite pool setup: create the database file if needed, enable WAL and
// apply the schema.

use crate::db::INIT_SCHEMA;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::info;

pub async fn establish_connection(database_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    // Connections are kept for the life of the pool so that an in-memory
    // database survives between queries.
    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    sqlx::raw_sql(INIT_SCHEMA).execute(&pool).await?;
    info!("Database ready at {}", database_url);

    Ok(pool)
}
