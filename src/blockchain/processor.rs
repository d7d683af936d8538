use crate::blockchain::suspicion::{HIGH_GAS_USED, HIGH_VALUE_ETH};
use crate::models::Transfer;
use std::collections::HashMap;

/// Call data no longer than a bare selector; wallets usually send these.
pub const SIMPLE_CALL_DATA_LEN: usize = 10;

fn bump(counts: &mut HashMap<String, (usize, usize)>, address: String, seed: &str) {
    if address.is_empty() || address == seed {
        return;
    }
    let first_seen = counts.len();
    counts.entry(address).or_insert((0, first_seen)).0 += 1;
}

/// Up to `limit` counterpart addresses of `seed`, most frequent first (ties
/// keep first-seen order). Senders only count when their call data is
/// simple, as contracts tend to be driven with complex payloads.
pub fn discover_wallets(transfers: &[Transfer], seed: &str, limit: usize) -> Vec<String> {
    let seed = seed.to_lowercase();
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();

    for transfer in transfers {
        if transfer.call_data.len() <= SIMPLE_CALL_DATA_LEN {
            bump(&mut counts, transfer.sender.to_lowercase(), &seed);
        }
        bump(&mut counts, transfer.receiver.to_lowercase(), &seed);
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().take(limit).map(|(address, _)| address).collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RiskTally {
    pub failed: u32,
    pub high_value: u32,
    pub high_gas: u32,
}

impl RiskTally {
    pub fn score(&self) -> u32 {
        self.failed * 2 + self.high_value * 3 + self.high_gas
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentCandidate {
    pub address: String,
    pub score: u32,
}

/// Per-sender risk counts accumulated over a run. Senders above the
/// threshold are handed to the labeling stage.
#[derive(Debug, Default)]
pub struct RiskLedger {
    tallies: HashMap<String, RiskTally>,
}

impl RiskLedger {
    pub fn observe(&mut self, transfer: &Transfer) {
        if transfer.sender.is_empty() {
            return;
        }
        let tally = self.tallies.entry(transfer.sender.to_lowercase()).or_default();
        if transfer.is_error {
            tally.failed += 1;
        }
        if transfer.value_eth > HIGH_VALUE_ETH {
            tally.high_value += 1;
        }
        if transfer.gas_used > HIGH_GAS_USED {
            tally.high_gas += 1;
        }
    }

    pub fn tally(&self, address: &str) -> Option<RiskTally> {
        self.tallies.get(&address.to_lowercase()).copied()
    }

    /// Highest score first, then by address.
    pub fn candidates(&self, threshold: u32) -> Vec<EnrichmentCandidate> {
        let mut candidates: Vec<EnrichmentCandidate> = self
            .tallies
            .iter()
            .filter(|(_, tally)| tally.score() > threshold)
            .map(|(address, tally)| EnrichmentCandidate {
                address: address.clone(),
                score: tally.score(),
            })
            .collect();
        candidates.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.address.cmp(&b.address)));
        candidates
    }
}
