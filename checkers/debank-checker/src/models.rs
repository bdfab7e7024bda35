//! API response shapes and the per-account data that flows through the pipeline.

use serde::Deserialize;
use std::collections::HashMap;

// --- Wire types ---

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserResponse {
    #[serde(default)]
    pub data: UserData,
    #[serde(default)]
    pub error_code: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserData {
    #[serde(default)]
    pub user: User,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct User {
    #[serde(default)]
    pub desc: UserDesc,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserDesc {
    #[serde(default)]
    pub usd_value: f64,
    #[serde(default)]
    pub used_chains: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsedChainsResponse {
    #[serde(default)]
    pub data: UsedChainsData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsedChainsData {
    #[serde(default)]
    pub chains: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenBalanceListResponse {
    #[serde(default)]
    pub data: Vec<TokenInfo>,
    #[serde(default)]
    pub error_code: i64,
}

/// A token as reported by the API. `id` is the contract address, or the
/// chain name for native coins.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TokenInfo {
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub symbol: String,
}

impl TokenInfo {
    pub fn usd_value(&self) -> f64 {
        self.amount * self.price
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectListResponse {
    #[serde(default)]
    pub data: Vec<ProjectEntry>,
    #[serde(default)]
    pub error_code: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectEntry {
    #[serde(default)]
    pub chain: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub site_url: String,
    #[serde(default)]
    pub portfolio_item_list: Vec<PortfolioItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PortfolioItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub asset_token_list: Vec<TokenInfo>,
}

/// A project flattened to its asset tokens.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectAssets {
    pub name: String,
    pub site_url: String,
    pub chain: String,
    pub assets: Vec<TokenInfo>,
}

// --- Pipeline types ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenChainInfo {
    pub symbol: String,
    pub amount: f64,
    pub price: f64,
    pub usd_value: f64,
    pub contract: String,
    pub chain: String,
}

impl From<&TokenInfo> for TokenChainInfo {
    fn from(t: &TokenInfo) -> Self {
        Self {
            symbol: t.symbol.clone(),
            amount: t.amount,
            price: t.price,
            usd_value: t.usd_value(),
            contract: t.id.clone(),
            chain: t.chain.clone(),
        }
    }
}

/// Everything collected for one address before filtering.
#[derive(Debug, Clone, Default)]
pub struct RawAccountData {
    pub total_balance: f64,
    pub chains: HashMap<String, Vec<TokenChainInfo>>,
    pub projects: Vec<ProjectAssets>,
}

impl RawAccountData {
    pub fn has_data(&self) -> bool {
        !self.chains.is_empty() || !self.projects.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectInfo {
    pub name: String,
    pub site_url: String,
    pub chain: String,
    pub tokens: Vec<TokenChainInfo>,
}

/// Filtered, report-ready view of one address.
#[derive(Debug, Clone, Default)]
pub struct AggregatedData {
    pub address: String,
    pub total_balance: f64,
    pub chains: HashMap<String, Vec<TokenChainInfo>>,
    pub projects: Vec<ProjectInfo>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TokenTotals {
    pub amount: f64,
    pub usd_value: f64,
}
