use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid Ethereum address format: {0}")]
    InvalidAddress(String),

    #[error("Unknown target: {0}")]
    UnknownTarget(String),

    #[error("Unknown period: {0}")]
    UnknownPeriod(String),

    #[error("Invalid date range: {0}. Expected YYYY-MM-DD..YYYY-MM-DD")]
    InvalidDateRange(String),

    #[error("Invalid strategy: {0}. Must be one of focused, comprehensive, tokens, internal, wallets")]
    InvalidStrategy(String),
}

/// `0x` followed by 40 hex digits.
pub fn validate_eth_address(address: &str) -> Result<(), ValidationError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ValidationError::MissingParameter("address".to_string()));
    }

    let Some(hex) = address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) else {
        return Err(ValidationError::InvalidAddress(address.to_string()));
    };

    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidAddress(address.to_string()));
    }

    Ok(())
}

/// Parse `start..end` (inclusive calendar dates, start not after end).
pub fn parse_date_range(value: &str) -> Result<(NaiveDate, NaiveDate), ValidationError> {
    let invalid = || ValidationError::InvalidDateRange(value.to_string());

    let (start, end) = value.split_once("..").ok_or_else(invalid)?;
    let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
    let end = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d").map_err(|_| invalid())?;

    if start > end {
        return Err(invalid());
    }

    Ok((start, end))
}
