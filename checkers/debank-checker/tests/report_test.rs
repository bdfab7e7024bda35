mod common;

use common::token;
use debank_checker::models::{ProjectAssets, RawAccountData, TokenChainInfo};
use debank_checker::{DataAggregator, TextFormatter};
use std::collections::HashMap;

const ADDR: &str = "0x00000000000000000000000000000000000000aa";
const SEP: &str = "--------------------------------------------------------------------------------";
const SECTION: &str = "################################################################################";

fn chain_token(symbol: &str, chain: &str, contract: &str, amount: f64, price: f64) -> TokenChainInfo {
    TokenChainInfo::from(&token(symbol, chain, contract, amount, price))
}

fn raw_account() -> RawAccountData {
    RawAccountData {
        total_balance: 3105.0,
        chains: HashMap::from([
            (
                "eth".to_string(),
                vec![
                    chain_token("ETH", "eth", "eth", 1.5, 2000.0),
                    chain_token("USDT", "eth", "0xdac1", 100.0, 1.0),
                    chain_token("DUST", "eth", "0xdust", 1.0, 0.5),
                ],
            ),
            (
                "arb".to_string(),
                vec![chain_token("ARB", "arb", "0xarb", 5.0, 1.0)],
            ),
            (
                "bsc".to_string(),
                vec![chain_token("SPAM", "bsc", "0xspam", 3.0, 0.1)],
            ),
        ]),
        projects: vec![
            ProjectAssets {
                name: "Uniswap".to_string(),
                site_url: "https://app.uniswap.org".to_string(),
                chain: "eth".to_string(),
                assets: vec![token("USDT", "eth", "0xdac1", 1000.0, 1.0)],
            },
            ProjectAssets {
                name: "Aave".to_string(),
                site_url: "https://aave.com".to_string(),
                chain: "arb".to_string(),
                assets: vec![
                    token("ETH", "arb", "arb", 0.5, 2000.0),
                    token("AAVE", "arb", "0xaave", 0.01, 90.0),
                ],
            },
        ],
    }
}

#[test]
fn test_aggregate_filters_small_tokens_and_empty_groups() {
    let aggregator = DataAggregator::new(2.0);
    let data = aggregator.aggregate(ADDR, &raw_account()).unwrap();

    assert_eq!(data.address, ADDR);
    assert_eq!(data.chains.len(), 2);
    assert!(!data.chains.contains_key("bsc"));
    assert_eq!(data.chains["eth"].len(), 2);

    let aave = data.projects.iter().find(|p| p.name == "Aave").unwrap();
    assert_eq!(aave.tokens.len(), 1);
    // Project tokens take the project's chain and carry no contract
    assert_eq!(aave.tokens[0].chain, "arb");
    assert_eq!(aave.tokens[0].contract, "");
}

#[test]
fn test_aggregate_below_minimum_is_not_counted() {
    let aggregator = DataAggregator::new(5000.0);
    assert!(aggregator.aggregate(ADDR, &raw_account()).is_none());
    assert_eq!(aggregator.stats().total_accounts(), 0);
    assert!(aggregator.stats().snapshot().tokens.is_empty());
}

#[test]
fn test_global_stats_sum_by_symbol() {
    let aggregator = DataAggregator::new(2.0);
    aggregator.aggregate(ADDR, &raw_account()).unwrap();
    aggregator
        .aggregate("0x00000000000000000000000000000000000000bb", &raw_account())
        .unwrap();

    let stats = aggregator.stats().snapshot();
    assert_eq!(stats.total_accounts, 2);

    // ETH: 1.5 on eth + 0.5 in Aave, per account
    assert_eq!(stats.tokens["ETH"].amount, 4.0);
    assert_eq!(stats.tokens["ETH"].usd_value, 8000.0);
    // USDT: 100 on eth + 1000 in Uniswap, per account
    assert_eq!(stats.tokens["USDT"].usd_value, 2200.0);
    assert!(!stats.tokens.contains_key("DUST"));
    assert_eq!(stats.total_usd_value, 8000.0 + 2200.0 + 10.0);
}

#[test]
fn test_account_block_layout() {
    let aggregator = DataAggregator::new(2.0);
    let data = aggregator.aggregate(ADDR, &raw_account()).unwrap();
    let lines = TextFormatter::new(2.0).format_account(&data);

    let expected = vec![
        SEP.to_string(),
        format!("ADDRESS: {}\nTOTAL BALANCE: 3105.00", ADDR),
        SECTION.to_string(),
        "BALANCE BY CHAINS:".to_string(),
        "arb:\n  ARB: 5.00000000 ($5.00) [0xarb]".to_string(),
        "eth:\n  ETH: 1.50000000 ($3000.00)\n  USDT: 100.00000000 ($100.00) [0xdac1]".to_string(),
        SECTION.to_string(),
        "BALANCE BY PROJECTS:".to_string(),
        "Aave:\n  ETH: 0.50000000 ($1000.00) [https://aave.com][arb]".to_string(),
        "Uniswap:\n  USDT: 1000.00000000 ($1000.00) [https://app.uniswap.org][eth]".to_string(),
        SEP.to_string(),
    ];
    assert_eq!(lines, expected);
}

#[test]
fn test_formatter_hides_tokens_under_its_own_minimum() {
    let aggregator = DataAggregator::new(0.0);
    let data = aggregator.aggregate(ADDR, &raw_account()).unwrap();
    let lines = TextFormatter::new(10.0).format_account(&data).join("\n");

    assert!(!lines.contains("ARB"));
    assert!(!lines.contains("arb:\n"));
    assert!(!lines.contains("DUST"));
    assert!(lines.contains("USDT: 100.00000000"));
}

#[test]
fn test_global_stats_layout() {
    let aggregator = DataAggregator::new(2.0);
    aggregator.aggregate(ADDR, &raw_account()).unwrap();

    let lines = TextFormatter::new(0.0).format_global_stats(&aggregator.stats().snapshot());
    assert_eq!(
        lines,
        vec![
            SEP.to_string(),
            "Global Statistics:".to_string(),
            "  ETH: 2.00000000 ($4000.00)".to_string(),
            "  USDT: 1100.00000000 ($1100.00)".to_string(),
            "  ARB: 5.00000000 ($5.00)".to_string(),
            "\nTotal accounts processed: 1".to_string(),
            "Total USD value: $5105.00".to_string(),
            SEP.to_string(),
        ]
    );
}
