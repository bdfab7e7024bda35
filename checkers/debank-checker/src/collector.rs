//! Per-address data collection.
//!
//! 1. Total balance, gated on `min_usd_amount` (at or below is skipped).
//! 2. Chains and projects fetched concurrently.
//! 3. One token-list call per chain, at most [`CHAIN_CONCURRENCY`] in flight.
//!
//! Every external call goes through a capped retry whose attempts are
//! recorded in the address's error log.

use crate::api::BalanceChecker;
use crate::error::CheckerError;
use crate::models::{ProjectAssets, RawAccountData, TokenChainInfo};
use crate::storage::ErrorCollector;
use anyhow::{anyhow, Context, Result};
use core_logic::{with_retry, RetryConfig, RetryEvent};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub const CHAIN_CONCURRENCY: usize = 20;

type ChainMap = HashMap<String, Vec<TokenChainInfo>>;

#[derive(Clone)]
pub struct DataCollector {
    checker: Arc<dyn BalanceChecker>,
    errors: Arc<ErrorCollector>,
    min_usd_amount: f64,
    retry: RetryConfig,
    cancel: CancellationToken,
}

impl DataCollector {
    pub fn new(
        checker: Arc<dyn BalanceChecker>,
        errors: Arc<ErrorCollector>,
        min_usd_amount: f64,
    ) -> Self {
        Self {
            checker,
            errors,
            min_usd_amount,
            retry: RetryConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Cancelling this token aborts pending retry waits.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Collects everything known about `address`.
    ///
    /// Returns [`CheckerError::BelowThreshold`] when the total balance does
    /// not exceed the configured minimum.
    pub async fn collect_data(&self, address: &str) -> Result<RawAccountData> {
        info!("Collecting data for address: {}", address);

        let checker = &self.checker;
        let total_balance = self
            .retry("GetTotalBalance", address, move || async move {
                checker
                    .get_total_balance(address)
                    .await
                    .map_err(anyhow::Error::from)
            })
            .await
            .context("failed to get total balance")?;

        if total_balance <= self.min_usd_amount {
            return Err(CheckerError::BelowThreshold {
                balance: total_balance,
                min: self.min_usd_amount,
            }
            .into());
        }

        let (chains, projects) = self.collect_chains_and_projects(address).await?;
        Ok(RawAccountData {
            total_balance,
            chains,
            projects,
        })
    }

    /// Runs both branches concurrently. Succeeds when either produced data;
    /// otherwise returns the first branch error.
    pub async fn collect_chains_and_projects(
        &self,
        address: &str,
    ) -> Result<(ChainMap, Vec<ProjectAssets>)> {
        let (chains, projects) = tokio::join!(
            self.get_chain_info(address),
            self.get_projects_info(address)
        );

        let mut first_err = None;
        let chains = chains.unwrap_or_else(|e| {
            self.errors
                .save_error(address, format!("chain collection failed: {:#}", e));
            first_err.get_or_insert(e);
            HashMap::new()
        });
        let projects = projects.unwrap_or_else(|e| {
            self.errors
                .save_error(address, format!("project collection failed: {:#}", e));
            first_err.get_or_insert(e);
            Vec::new()
        });

        if !chains.is_empty() || !projects.is_empty() {
            return Ok((chains, projects));
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok((chains, projects)),
        }
    }

    async fn get_chain_info(&self, address: &str) -> Result<ChainMap> {
        let checker = &self.checker;
        let chains = self
            .retry("GetUsedChains", address, move || async move {
                checker
                    .get_used_chains(address)
                    .await
                    .map_err(anyhow::Error::from)
            })
            .await
            .context("failed to get used chains")?;

        if chains.is_empty() {
            return Err(CheckerError::NoChains.into());
        }

        let semaphore = Arc::new(Semaphore::new(CHAIN_CONCURRENCY));
        let mut set = JoinSet::new();

        for chain in chains {
            let this = self.clone();
            let semaphore = Arc::clone(&semaphore);
            let address = address.to_string();

            set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => this.process_single_chain(&address, &chain).await,
                    Err(e) => Err(anyhow!("chain semaphore closed: {}", e)),
                };
                (chain, result)
            });
        }

        let mut result = HashMap::new();
        let mut chain_errors = Vec::new();

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((chain, Ok(tokens))) => {
                    result.insert(chain, tokens);
                }
                Ok((chain, Err(e))) => {
                    chain_errors.push(format!("failed to process chain {}: {:#}", chain, e));
                }
                Err(e) => chain_errors.push(format!("chain task aborted: {}", e)),
            }
        }

        if !chain_errors.is_empty() {
            self.errors.save_error(
                address,
                format!(
                    "{} chains failed to process: [{}]",
                    chain_errors.len(),
                    chain_errors.join(", ")
                ),
            );
        }

        self.errors.save_error(
            address,
            format!("Successfully processed {} chains", result.len()),
        );
        Ok(result)
    }

    async fn process_single_chain(&self, address: &str, chain: &str) -> Result<Vec<TokenChainInfo>> {
        let checker = &self.checker;
        let op = format!("processSingleChain:{}", chain);

        let tokens = self
            .retry(&op, address, move || async move {
                checker
                    .get_token_balance_list(address, chain)
                    .await
                    .map_err(anyhow::Error::from)
            })
            .await
            .context("failed to get token balance list")?;

        Ok(tokens.iter().map(TokenChainInfo::from).collect())
    }

    async fn get_projects_info(&self, address: &str) -> Result<Vec<ProjectAssets>> {
        let checker = &self.checker;
        let projects = self
            .retry("GetProjectAssets", address, move || async move {
                checker
                    .get_project_assets(address)
                    .await
                    .map_err(anyhow::Error::from)
            })
            .await
            .context("failed to get projects")?;

        self.errors
            .save_error(address, format!("found {} projects", projects.len()));
        Ok(projects)
    }

    async fn retry<T, F, Fut>(&self, op: &str, address: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max = self.retry.max_attempts;
        let errors = &self.errors;

        let result = with_retry(self.retry, op, &self.cancel, operation, |event| match event {
            RetryEvent::Retrying { attempt } => {
                errors.save_error(address, format!("Retry attempt {}/{} for {}", attempt, max, op))
            }
            RetryEvent::Failed { attempt, error } => errors.save_error(
                address,
                format!("{} failed (attempt {}/{}): {:#}", op, attempt, max, error),
            ),
            RetryEvent::Cancelled => errors.save_error(address, format!("{} cancelled", op)),
        })
        .await;

        if let Err(e) = &result {
            error!("[{}] {} FAILED after {} attempts: {:#}", address, op, max, e);
        }
        result
    }
}
