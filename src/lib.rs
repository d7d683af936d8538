pub mod blockchain;
pub mod cache;
pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod state;
pub mod validation;

#[cfg(test)]
pub mod tests;

// Re-export specific items for convenience
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use db::Sink;
pub use error::HarvestError;
pub use jobs::JobSpec;
pub use state::HarvestContext;
pub use validation::validate_eth_address;
