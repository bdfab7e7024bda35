//! DeBank Checker - concurrent wallet balance checker
//!
//! Reads a list of EVM addresses, queries the DeBank web API for each one
//! through signed requests and a rotating proxy pool, and writes a text
//! report with per-chain and per-project balances plus global totals.
//!
//! # Pipeline
//!
//! - **[`CheckerHandler`]**: schedules accounts on the adaptive worker pool
//!   and batches results into the output file
//! - **[`AccountProcessor`]**: collect, aggregate and format one account
//! - **[`DataCollector`]**: balance gate, chain/project fan-out, retries
//! - **[`DebankApi`]**: signed requests with cached browser headers
//! - **[`signer`]**: nonce and signature generation
//!
//! # Configuration
//!
//! Loaded from `config/config.toml`; see [`config::AppConfig`].
//!
//! ```bash
//! cargo run -p debank-checker --bin debank-checker -- check
//! cargo run -p debank-checker --bin debank-checker -- proxies
//! ```

pub mod account;
pub mod aggregator;
pub mod api;
pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod formatter;
pub mod handler;
pub mod headers;
pub mod models;
pub mod signer;
pub mod storage;

pub use account::{accounts_from_lines, read_lines, Account};
pub use aggregator::{DataAggregator, GlobalStats, GlobalStatsSnapshot};
pub use api::{BalanceChecker, DebankApi};
pub use collector::DataCollector;
pub use config::AppConfig;
pub use error::CheckerError;
pub use formatter::TextFormatter;
pub use handler::{AccountProcessor, CheckerHandler, RunSummary};
pub use storage::{ErrorCollector, FileWriter};
