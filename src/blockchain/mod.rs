pub mod client;
pub mod fetcher;
pub mod models;
pub mod orchestrator;
pub mod processor;
pub mod quota;
pub mod resolver;
pub mod suspicion;

// Re-exports for convenience
pub use client::{EtherscanClient, LedgerApi};
pub use fetcher::{FetchPolicy, PaginatedFetcher};
pub use orchestrator::{HarvestOrchestrator, HarvestReport, HarvestSettings};
pub use quota::{QuotaExceeded, QuotaTracker};
pub use resolver::TimeWindowResolver;
