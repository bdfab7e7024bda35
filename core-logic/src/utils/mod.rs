//! # Utilities Module
//!
//! Internal utility modules for the core-logic crate.
//! These modules are marked as `pub(crate)` to enforce API boundaries.

pub(crate) mod logger;
pub(crate) mod proxy_manager;
pub(crate) mod proxy_pool;
pub(crate) mod retry;
pub(crate) mod runner;

pub use logger::{parse_level, setup_logger};
pub use proxy_manager::ProxyManager;
pub use proxy_pool::ProxyPool;
pub use runner::{AdaptiveWorkerPool, TaskScheduler};
