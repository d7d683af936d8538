use crate::models::Transfer;
use std::fmt;

pub const HIGH_VALUE_ETH: f64 = 50.0;
pub const HIGH_GAS_USED: i64 = 1_000_000;

pub const SUSPICIOUS_KEYWORDS: [&str; 4] = ["flashloan", "flash", "swap", "arbitrage"];

/// ERC-20 method selectors watched for in call data, in match order.
pub const TOKEN_SIGNATURES: [(&str, &str); 4] = [
    ("transfer", "0xa9059cbb"),
    ("transferFrom", "0x23b872dd"),
    ("approve", "0x095ea7b3"),
    ("swap", "0x022c0d9f"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagReason {
    HighValue,
    FailedTransaction,
    HighGasConsumption,
    ContractCreation,
    SuspiciousMethodCall,
    TokenOperation(&'static str),
}

impl fmt::Display for FlagReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagReason::HighValue => f.write_str("High value transaction"),
            FlagReason::FailedTransaction => f.write_str("Failed transaction"),
            FlagReason::HighGasConsumption => f.write_str("High gas consumption"),
            FlagReason::ContractCreation => f.write_str("Contract creation"),
            FlagReason::SuspiciousMethodCall => f.write_str("Suspicious method call"),
            FlagReason::TokenOperation(method) => write!(f, "Token {} operation", method),
        }
    }
}

/// First matching rule wins; rule order is part of the contract.
pub fn classify(transfer: &Transfer) -> Option<FlagReason> {
    if transfer.value_eth > HIGH_VALUE_ETH {
        return Some(FlagReason::HighValue);
    }
    if transfer.is_error {
        return Some(FlagReason::FailedTransaction);
    }
    if transfer.gas_used > HIGH_GAS_USED {
        return Some(FlagReason::HighGasConsumption);
    }
    if transfer.receiver.is_empty() {
        return Some(FlagReason::ContractCreation);
    }

    let call_data = transfer.call_data.to_lowercase();
    if SUSPICIOUS_KEYWORDS.iter().any(|keyword| call_data.contains(keyword)) {
        return Some(FlagReason::SuspiciousMethodCall);
    }

    TOKEN_SIGNATURES
        .iter()
        .find(|(_, selector)| call_data.starts_with(*selector))
        .map(|&(method, _)| FlagReason::TokenOperation(method))
}

/// Stamp the flag reason into `type_label`; unflagged transfers keep the
/// API-reported type.
pub fn label_transfer(transfer: &mut Transfer) -> Option<FlagReason> {
    let reason = classify(transfer);
    if let Some(reason) = reason {
        transfer.type_label = reason.to_string();
    }
    reason
}
