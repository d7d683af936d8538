// Job specification: the full (address x period x action) workload of a run,
// fixed before the first remote call.

use crate::catalog::{self, KnownContract};
use crate::config::Config;
use crate::models::Action;
use crate::validation::{parse_date_range, validate_eth_address, ValidationError};
use chrono::{NaiveDate, NaiveTime};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub address: String,
    pub label: String,
    pub category: String,
    pub known_entity: bool,
}

impl From<&KnownContract> for Target {
    fn from(contract: &KnownContract) -> Self {
        Self {
            address: contract.address.to_string(),
            label: contract.label.to_string(),
            category: contract.category.to_string(),
            known_entity: true,
        }
    }
}

impl Target {
    /// Catalog name, catalog address, or any well-formed address.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if let Some(contract) = catalog::find_contract(value) {
            return Ok(contract.into());
        }

        let value = value.trim();
        if !value.starts_with("0x") && !value.starts_with("0X") {
            return Err(ValidationError::UnknownTarget(value.to_string()));
        }
        validate_eth_address(value)?;

        Ok(Self {
            address: value.to_string(),
            label: "Custom target".to_string(),
            category: "Unknown".to_string(),
            known_entity: false,
        })
    }
}

/// Calendar window; both bounds are taken at 00:00 UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Period {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    pub fn new(name: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            name: name.to_string(),
            start,
            end,
        }
    }

    /// Catalog period name or an explicit `YYYY-MM-DD..YYYY-MM-DD` range.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        let value = value.trim();

        if let Some(known) = catalog::find_period(value) {
            let range = format!("{}..{}", known.start_date, known.end_date);
            let (start, end) = parse_date_range(&range)?;
            return Ok(Self::new(known.name, start, end));
        }

        if !value.contains("..") {
            return Err(ValidationError::UnknownPeriod(value.to_string()));
        }
        let (start, end) = parse_date_range(value)?;
        Ok(Self::new(value, start, end))
    }

    pub fn start_timestamp(&self) -> i64 {
        self.start.and_time(NaiveTime::default()).and_utc().timestamp()
    }

    pub fn end_timestamp(&self) -> i64 {
        self.end.and_time(NaiveTime::default()).and_utc().timestamp()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Every action for each target, then wallet discovery.
    Focused,
    /// Every action, plus internal calls of flagged transactions.
    Comprehensive,
    TokenTransfers,
    InternalCalls,
    /// Plain transfers of the seeds, used to discover and trace wallets.
    WalletTracing,
}

impl Strategy {
    pub fn seed_actions(&self) -> &'static [Action] {
        match self {
            Strategy::Focused | Strategy::Comprehensive => &Action::ALL,
            Strategy::TokenTransfers => &[Action::TokenTx],
            Strategy::InternalCalls => &[Action::TxListInternal],
            Strategy::WalletTracing => &[Action::TxList],
        }
    }

    pub fn discovers_wallets(&self) -> bool {
        matches!(self, Strategy::Focused | Strategy::WalletTracing)
    }

    pub fn investigates_suspicious(&self) -> bool {
        matches!(self, Strategy::Comprehensive)
    }
}

impl FromStr for Strategy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "focused" => Ok(Strategy::Focused),
            "comprehensive" => Ok(Strategy::Comprehensive),
            "tokens" => Ok(Strategy::TokenTransfers),
            "internal" => Ok(Strategy::InternalCalls),
            "wallets" => Ok(Strategy::WalletTracing),
            other => Err(ValidationError::InvalidStrategy(other.to_string())),
        }
    }
}

/// One (address, period, action) unit of work. `depth` counts discovery
/// hops from a seed target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub address: String,
    pub period: Period,
    pub action: Action,
    pub depth: u32,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} [{}] depth {}", self.action, self.address, self.period.name, self.depth)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub targets: Vec<Target>,
    pub periods: Vec<Period>,
    pub strategy: Strategy,
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

impl JobSpec {
    /// Unset targets or periods default to the whole catalog.
    pub fn from_config(config: &Config) -> Result<Self, ValidationError> {
        let targets = match &config.harvest_targets {
            Some(list) => split_list(list).map(Target::parse).collect::<Result<Vec<_>, _>>()?,
            None => catalog::CONTRACTS.iter().map(Target::from).collect(),
        };

        let periods = match &config.harvest_periods {
            Some(list) => split_list(list).map(Period::parse).collect::<Result<Vec<_>, _>>()?,
            None => catalog::PERIODS
                .iter()
                .map(|p| Period::parse(p.name))
                .collect::<Result<Vec<_>, _>>()?,
        };

        if targets.is_empty() {
            return Err(ValidationError::MissingParameter("HARVEST_TARGETS".to_string()));
        }
        if periods.is_empty() {
            return Err(ValidationError::MissingParameter("HARVEST_PERIODS".to_string()));
        }

        Ok(Self {
            targets,
            periods,
            strategy: config.harvest_strategy.parse()?,
        })
    }

    /// Depth-0 jobs, target by target, period by period.
    pub fn seed_jobs(&self) -> Vec<Job> {
        let mut jobs = Vec::new();
        for target in &self.targets {
            for period in &self.periods {
                for action in self.strategy.seed_actions() {
                    jobs.push(Job {
                        address: target.address.clone(),
                        period: period.clone(),
                        action: *action,
                        depth: 0,
                    });
                }
            }
        }
        jobs
    }
}
