#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use core_logic::{HttpError, LineWriter};
use debank_checker::models::{ProjectAssets, TokenInfo};
use debank_checker::{BalanceChecker, CheckerError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn token(symbol: &str, chain: &str, id: &str, amount: f64, price: f64) -> TokenInfo {
    TokenInfo {
        amount,
        chain: chain.to_string(),
        id: id.to_string(),
        price,
        symbol: symbol.to_string(),
    }
}

fn flaky(attempt: usize, failures: usize) -> Result<(), CheckerError> {
    if attempt < failures {
        Err(CheckerError::Http(HttpError::Transport(format!(
            "simulated failure #{}",
            attempt + 1
        ))))
    } else {
        Ok(())
    }
}

/// In-memory [`BalanceChecker`] with per-operation failure injection.
#[derive(Default)]
pub struct MockChecker {
    pub balances: HashMap<String, f64>,
    pub chains: Vec<String>,
    pub tokens: HashMap<String, Vec<TokenInfo>>,
    pub projects: Vec<ProjectAssets>,
    /// Leading failures before `get_total_balance` succeeds
    pub balance_failures: usize,
    /// Chains whose token list always fails
    pub broken_chains: HashSet<String>,
    pub chains_fail: bool,
    pub projects_fail: bool,

    pub balance_calls: AtomicUsize,
    pub chain_calls: AtomicUsize,
    pub token_calls: AtomicUsize,
    pub project_calls: AtomicUsize,
}

impl MockChecker {
    pub fn with_balance(address: &str, balance: f64) -> Self {
        Self {
            balances: HashMap::from([(address.to_string(), balance)]),
            ..Self::default()
        }
    }
}

#[async_trait]
impl BalanceChecker for MockChecker {
    async fn get_total_balance(&self, address: &str) -> Result<f64, CheckerError> {
        let n = self.balance_calls.fetch_add(1, Ordering::SeqCst);
        flaky(n, self.balance_failures)?;
        Ok(self.balances.get(address).copied().unwrap_or_default())
    }

    async fn get_used_chains(&self, _address: &str) -> Result<Vec<String>, CheckerError> {
        self.chain_calls.fetch_add(1, Ordering::SeqCst);
        if self.chains_fail {
            return Err(CheckerError::Http(HttpError::Exhausted { attempts: 5 }));
        }
        Ok(self.chains.clone())
    }

    async fn get_token_balance_list(
        &self,
        _address: &str,
        chain: &str,
    ) -> Result<Vec<TokenInfo>, CheckerError> {
        self.token_calls.fetch_add(1, Ordering::SeqCst);
        if self.broken_chains.contains(chain) {
            return Err(CheckerError::Http(HttpError::Status {
                status: 500,
                body: "boom".into(),
            }));
        }
        Ok(self.tokens.get(chain).cloned().unwrap_or_default())
    }

    async fn get_project_assets(&self, _address: &str) -> Result<Vec<ProjectAssets>, CheckerError> {
        self.project_calls.fetch_add(1, Ordering::SeqCst);
        if self.projects_fail {
            return Err(CheckerError::Http(HttpError::NoProxy));
        }
        Ok(self.projects.clone())
    }
}

/// Line sink that keeps everything in memory.
#[derive(Default)]
pub struct MemoryWriter {
    pub lines: Mutex<Vec<String>>,
    pub closed: AtomicUsize,
    pub fail: bool,
}

impl MemoryWriter {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn text(&self) -> String {
        self.lines.lock().join("\n")
    }
}

#[async_trait]
impl LineWriter for MemoryWriter {
    async fn write(&self, lines: &[String]) -> Result<()> {
        if self.fail {
            return Err(anyhow!("disk full"));
        }
        self.lines.lock().extend_from_slice(lines);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
