//! Seed contracts and time periods with notable activity.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownContract {
    pub name: &'static str,
    pub address: &'static str,
    pub label: &'static str,
    pub category: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownPeriod {
    pub name: &'static str,
    pub start_date: &'static str,
    pub end_date: &'static str,
}

pub const CONTRACTS: &[KnownContract] = &[
    KnownContract {
        name: "uniswap_v2_router",
        address: "0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D",
        label: "Uniswap V2",
        category: "DeFi",
    },
    KnownContract {
        name: "uniswap_v3_router",
        address: "0xE592427A0AEce92De3Edee1F18E0157C05861564",
        label: "Uniswap V3",
        category: "DeFi",
    },
    KnownContract {
        name: "sushiswap_router",
        address: "0xd9e1cE17f2641f24aE83637ab66a2cca9C378B9F",
        label: "Sushiswap",
        category: "DeFi",
    },
    // Flash loan provider
    KnownContract {
        name: "aave_lending_pool",
        address: "0x7d2768dE32b0b80b7a3454c06BdAc94A69DDc7A9",
        label: "Aave",
        category: "DeFi",
    },
    KnownContract {
        name: "nomad_bridge_hack",
        address: "0x56D8B635A5C25B4d3C982fF6a7D7b9570F0f9F4D",
        label: "Nomad Bridge Exploit",
        category: "Exploit",
    },
    KnownContract {
        name: "uniswap_v2_factory",
        address: "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f",
        label: "Uniswap V2 Factory",
        category: "DeFi",
    },
    KnownContract {
        name: "uniswap_v3_factory",
        address: "0x1F98431c8aD98523631AE4a59f267346ea31F984",
        label: "Uniswap V3 Factory",
        category: "DeFi",
    },
    KnownContract {
        name: "usdt",
        address: "0xdAC17F958D2ee523a2206206994597C13D831ec7",
        label: "USDT",
        category: "Token",
    },
    KnownContract {
        name: "usdc",
        address: "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        label: "USDC",
        category: "Token",
    },
    KnownContract {
        name: "weth",
        address: "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2",
        label: "WETH",
        category: "Token",
    },
];

pub const PERIODS: &[KnownPeriod] = &[
    KnownPeriod { name: "Nomad Bridge Hack", start_date: "2022-08-01", end_date: "2022-08-03" },
    KnownPeriod { name: "Wormhole Exploit", start_date: "2022-02-02", end_date: "2022-02-03" },
    KnownPeriod { name: "Q1 2023 Sample", start_date: "2023-01-01", end_date: "2023-01-03" },
    KnownPeriod { name: "Q2 2023 Sample", start_date: "2023-04-01", end_date: "2023-04-03" },
    KnownPeriod { name: "Q3 2023 Sample", start_date: "2023-07-01", end_date: "2023-07-03" },
    KnownPeriod { name: "Q4 2023 Sample", start_date: "2023-10-01", end_date: "2023-10-03" },
    KnownPeriod { name: "Recent Activity", start_date: "2024-01-01", end_date: "2024-01-15" },
];

/// Look up a contract by catalog name or address, ignoring case.
pub fn find_contract(key: &str) -> Option<&'static KnownContract> {
    let key = key.trim();
    CONTRACTS
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(key) || c.address.eq_ignore_ascii_case(key))
}

pub fn find_period(name: &str) -> Option<&'static KnownPeriod> {
    let name = name.trim();
    PERIODS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}
