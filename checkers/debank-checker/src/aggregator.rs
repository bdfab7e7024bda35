use crate::models::{AggregatedData, ProjectInfo, RawAccountData, TokenChainInfo, TokenTotals};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide per-symbol totals across every aggregated account.
#[derive(Debug, Default)]
pub struct GlobalStats {
    total_accounts: AtomicUsize,
    tokens: RwLock<HashMap<String, TokenTotals>>,
}

/// Point-in-time copy of [`GlobalStats`].
#[derive(Debug, Clone, Default)]
pub struct GlobalStatsSnapshot {
    pub total_accounts: usize,
    pub tokens: HashMap<String, TokenTotals>,
    pub total_usd_value: f64,
}

impl GlobalStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn record_account(&self) {
        self.total_accounts.fetch_add(1, Ordering::SeqCst);
    }

    fn record_token(&self, token: &TokenChainInfo) {
        let mut tokens = self.tokens.write();
        let entry = tokens.entry(token.symbol.clone()).or_default();
        entry.amount += token.amount;
        entry.usd_value += token.usd_value;
    }

    pub fn total_accounts(&self) -> usize {
        self.total_accounts.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> GlobalStatsSnapshot {
        let tokens = self.tokens.read().clone();
        let total_usd_value = tokens.values().map(|t| t.usd_value).sum();
        GlobalStatsSnapshot {
            total_accounts: self.total_accounts(),
            tokens,
            total_usd_value,
        }
    }
}

/// Filters raw account data down to what is worth reporting and feeds the
/// kept tokens into [`GlobalStats`].
pub struct DataAggregator {
    min_usd_amount: f64,
    stats: GlobalStats,
}

impl DataAggregator {
    pub fn new(min_usd_amount: f64) -> Self {
        Self {
            min_usd_amount,
            stats: GlobalStats::new(),
        }
    }

    pub fn stats(&self) -> &GlobalStats {
        &self.stats
    }

    /// `None` when the account total is below the minimum.
    pub fn aggregate(&self, address: &str, raw: &RawAccountData) -> Option<AggregatedData> {
        if raw.total_balance < self.min_usd_amount {
            return None;
        }
        self.stats.record_account();

        let mut chains = HashMap::with_capacity(raw.chains.len());
        for (chain, tokens) in &raw.chains {
            let kept: Vec<TokenChainInfo> = tokens
                .iter()
                .filter(|t| t.usd_value >= self.min_usd_amount)
                .cloned()
                .collect();

            if kept.is_empty() {
                continue;
            }
            kept.iter().for_each(|t| self.stats.record_token(t));
            chains.insert(chain.clone(), kept);
        }

        let mut projects = Vec::with_capacity(raw.projects.len());
        for project in &raw.projects {
            let kept: Vec<TokenChainInfo> = project
                .assets
                .iter()
                .map(|t| TokenChainInfo {
                    symbol: t.symbol.clone(),
                    amount: t.amount,
                    price: t.price,
                    usd_value: t.usd_value(),
                    contract: String::new(),
                    chain: project.chain.clone(),
                })
                .filter(|t| t.usd_value >= self.min_usd_amount)
                .collect();

            if kept.is_empty() {
                continue;
            }
            kept.iter().for_each(|t| self.stats.record_token(t));
            projects.push(ProjectInfo {
                name: project.name.clone(),
                site_url: project.site_url.clone(),
                chain: project.chain.clone(),
                tokens: kept,
            });
        }

        Some(AggregatedData {
            address: address.to_string(),
            total_balance: raw.total_balance,
            chains,
            projects,
        })
    }
}
