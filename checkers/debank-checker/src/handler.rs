//! Wires collector, aggregator, formatter and writers into one run.

use crate::account::Account;
use crate::aggregator::DataAggregator;
use crate::api::{BalanceChecker, DebankApi};
use crate::collector::DataCollector;
use crate::config::AppConfig;
use crate::error::CheckerError;
use crate::formatter::TextFormatter;
use crate::signer::{self, ParamGenerator};
use crate::storage::{ErrorCollector, FileWriter};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Local;
use core_logic::{HttpClient, LineWriter, ProxyPool, TaskProcessor, TaskScheduler};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Result groups gathered before one write.
pub const BATCH_SIZE: usize = 5;

/// Collect, aggregate and format one account.
pub struct AccountProcessor {
    collector: DataCollector,
    aggregator: Arc<DataAggregator>,
    formatter: TextFormatter,
    errors: Arc<ErrorCollector>,
}

impl AccountProcessor {
    pub fn new(
        checker: Arc<dyn BalanceChecker>,
        errors: Arc<ErrorCollector>,
        min_usd_amount: f64,
    ) -> Self {
        Self {
            collector: DataCollector::new(checker, Arc::clone(&errors), min_usd_amount),
            aggregator: Arc::new(DataAggregator::new(min_usd_amount)),
            formatter: TextFormatter::new(min_usd_amount),
            errors,
        }
    }

    pub fn with_collector(mut self, collector: DataCollector) -> Self {
        self.collector = collector;
        self
    }

    pub fn aggregator(&self) -> &Arc<DataAggregator> {
        &self.aggregator
    }

    pub fn errors(&self) -> &Arc<ErrorCollector> {
        &self.errors
    }
}

#[async_trait]
impl TaskProcessor<Account> for AccountProcessor {
    async fn process(&self, account: Account) -> Result<Vec<String>> {
        let address = account.address();

        let raw = match self.collector.collect_data(address).await {
            Ok(raw) => raw,
            Err(e) => {
                let skipped = e
                    .downcast_ref::<CheckerError>()
                    .filter(|c| c.is_below_threshold());
                if let Some(reason) = skipped {
                    info!(target: "task_result", "[{}] SKIPPED: {}", address, reason);
                    return Ok(Vec::new());
                }
                self.errors
                    .save_error(address, format!("failed to collect data: {:#}", e));
                return Err(e.context("failed to collect data"));
            }
        };

        let Some(aggregated) = self.aggregator.aggregate(address, &raw) else {
            return Ok(Vec::new());
        };

        info!(
            target: "task_result",
            "[{}] SUCCESS: ${:.2} across {} chains, {} projects",
            address,
            aggregated.total_balance,
            aggregated.chains.len(),
            aggregated.projects.len()
        );
        Ok(self.formatter.format_account(&aggregated))
    }
}

/// What a finished run looked like.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub submitted: usize,
    pub failed: usize,
    pub reported: usize,
    pub total_usd_value: f64,
}

pub struct CheckerHandler {
    processor: Arc<AccountProcessor>,
    min_workers: usize,
    result_writer: Arc<dyn LineWriter>,
    error_writer: Arc<dyn LineWriter>,
}

impl CheckerHandler {
    pub fn new(
        processor: Arc<AccountProcessor>,
        min_workers: usize,
        result_writer: Arc<dyn LineWriter>,
        error_writer: Arc<dyn LineWriter>,
    ) -> Self {
        Self {
            processor,
            min_workers,
            result_writer,
            error_writer,
        }
    }

    /// Builds the full pipeline from configuration. Output files are
    /// created under `config.output_dir`, named with `stamp`.
    pub async fn from_config(
        config: &AppConfig,
        pool: Option<ProxyPool>,
        stamp: &str,
    ) -> Result<Self> {
        let client = Arc::new(HttpClient::new(pool, config.http_config()));
        let generator = ParamGenerator::new(signer::from_config(&config.signer));
        let api: Arc<dyn BalanceChecker> =
            Arc::new(DebankApi::new(&config.debank, client, generator));

        let errors = Arc::new(ErrorCollector::new());
        let processor = Arc::new(AccountProcessor::new(api, errors, config.min_usd_amount));

        let (results_path, logs_path) = output_paths(&config.output_dir, stamp);
        let result_writer = Arc::new(FileWriter::create(&results_path).await?);
        let error_writer = Arc::new(FileWriter::create(&logs_path).await?);
        info!("Writing results to {}", results_path.display());

        Ok(Self::new(
            processor,
            config.concurrency,
            result_writer,
            error_writer,
        ))
    }

    pub fn processor(&self) -> &Arc<AccountProcessor> {
        &self.processor
    }

    /// Processes every account, then writes global stats and the error log.
    ///
    /// Individual account failures are recorded, never returned. Only a
    /// failing writer fails the run.
    pub async fn run(&self, accounts: Vec<Account>) -> Result<RunSummary> {
        let submitted = accounts.len();
        let mut scheduler = TaskScheduler::new(self.min_workers, Arc::clone(&self.processor));

        let rx = scheduler.schedule(accounts);
        let consumer = tokio::spawn(consume_results(rx, Arc::clone(&self.result_writer)));

        scheduler.wait().await;
        let (reported, write_err) = consumer.await.context("result consumer panicked")?;

        if let Some(e) = write_err {
            let _ = self.result_writer.close().await;
            let _ = self.error_writer.close().await;
            return Err(e.context("failed to write results"));
        }

        let stats = self.processor.aggregator().stats().snapshot();
        let global = TextFormatter::new(0.0).format_global_stats(&stats);
        self.result_writer
            .write(&global)
            .await
            .context("failed to write global stats")?;

        self.processor
            .errors()
            .write_errors(self.error_writer.as_ref())
            .await
            .context("failed to write error log")?;

        self.error_writer.close().await?;
        self.result_writer.close().await?;

        info!(
            "Global stats: {} accounts, ${:.2} total",
            stats.total_accounts, stats.total_usd_value
        );

        Ok(RunSummary {
            submitted,
            failed: scheduler.failed_tasks(),
            reported,
            total_usd_value: stats.total_usd_value,
        })
    }
}

/// Drains the result channel in batches of [`BATCH_SIZE`] groups. The
/// channel is always drained so workers never block on a dead writer; the
/// first write error is kept.
async fn consume_results(
    mut rx: mpsc::Receiver<Vec<String>>,
    writer: Arc<dyn LineWriter>,
) -> (usize, Option<anyhow::Error>) {
    let mut batch: Vec<String> = Vec::new();
    let mut groups = 0;
    let mut reported = 0;
    let mut first_err = None;

    while let Some(lines) = rx.recv().await {
        batch.extend(lines);
        groups += 1;
        reported += 1;

        if groups >= BATCH_SIZE {
            write_batch(writer.as_ref(), &mut batch, &mut first_err).await;
            groups = 0;
        }
    }

    if !batch.is_empty() {
        write_batch(writer.as_ref(), &mut batch, &mut first_err).await;
    }
    (reported, first_err)
}

async fn write_batch(
    writer: &dyn LineWriter,
    batch: &mut Vec<String>,
    first_err: &mut Option<anyhow::Error>,
) {
    let lines = std::mem::take(batch);
    debug!("Writing batch of {} lines", lines.len());
    if let Err(e) = writer.write(&lines).await {
        first_err.get_or_insert(e);
    }
}

/// Timestamp shared by every file a run produces.
pub fn run_stamp() -> String {
    Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// `<dir>/balance_checker_<stamp>.txt` and `<dir>/logs_<stamp>.txt`.
pub fn output_paths(dir: impl AsRef<Path>, stamp: &str) -> (PathBuf, PathBuf) {
    let dir = dir.as_ref();
    let ts = stamp;
    (
        dir.join(format!("balance_checker_{}.txt", ts)),
        dir.join(format!("logs_{}.txt", ts)),
    )
}
