use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("API call ceiling reached ({calls_made}/{ceiling})")]
pub struct QuotaExceeded {
    pub calls_made: u64,
    pub ceiling: u64,
}

/// Counts remote calls against the daily ceiling for one harvest run.
#[derive(Debug)]
pub struct QuotaTracker {
    calls_made: AtomicU64,
    ceiling: u64,
    warned: AtomicBool,
}

impl QuotaTracker {
    pub fn new(ceiling: u64) -> Self {
        Self::resume_from(ceiling, 0)
    }

    /// Continue counting from a previously saved total.
    pub fn resume_from(ceiling: u64, calls_made: u64) -> Self {
        Self {
            calls_made: AtomicU64::new(calls_made),
            ceiling,
            warned: AtomicBool::new(false),
        }
    }

    /// Count one remote call. Fails once the count reaches the ceiling, in
    /// which case the call must not be sent.
    pub fn record_call(&self) -> Result<u64, QuotaExceeded> {
        let calls = self.calls_made.fetch_add(1, Ordering::SeqCst) + 1;

        if calls % 10 == 0 {
            info!("API calls made: {}/{}", calls, self.ceiling);
        }

        self.check_limit()?;
        Ok(calls)
    }

    pub fn check_limit(&self) -> Result<(), QuotaExceeded> {
        let calls = self.calls_made();

        if calls >= self.ceiling {
            return Err(QuotaExceeded {
                calls_made: calls,
                ceiling: self.ceiling,
            });
        }

        // 90% advisory, once per run
        if calls * 10 >= self.ceiling * 9 && !self.warned.swap(true, Ordering::SeqCst) {
            warn!("Approaching API call limit ({}/{})", calls, self.ceiling);
        }

        Ok(())
    }

    pub fn calls_made(&self) -> u64 {
        self.calls_made.load(Ordering::SeqCst)
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    pub fn usage_ratio(&self) -> f64 {
        if self.ceiling == 0 {
            return 1.0;
        }
        self.calls_made() as f64 / self.ceiling as f64
    }
}
