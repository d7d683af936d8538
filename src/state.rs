use crate::blockchain::client::{ApiRequest, ApiResponse, ClientError, LedgerApi};
use crate::blockchain::quota::{QuotaExceeded, QuotaTracker};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CallError {
    #[error(transparent)]
    Quota(#[from] QuotaExceeded),

    #[error(transparent)]
    Client(#[from] ClientError),
}

impl CallError {
    /// Only client-side failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, CallError::Client(_))
    }
}

/// Per-run context threaded through every remote call site.
pub struct HarvestContext<A> {
    pub api: A,
    pub quota: QuotaTracker,
}

impl<A: LedgerApi> HarvestContext<A> {
    pub fn new(api: A, quota: QuotaTracker) -> Self {
        Self { api, quota }
    }

    /// The single gateway to the remote API: bills the quota, then sends.
    pub async fn call(&self, request: &ApiRequest) -> Result<ApiResponse, CallError> {
        self.quota.record_call()?;
        Ok(self.api.get(request).await?)
    }
}
