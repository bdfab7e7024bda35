//! # Core Logic - Shared Plumbing for Balance Checkers
//!
//! Everything a checker needs that is not specific to one upstream API:
//! proxy handling, fingerprinted HTTP transports, retries, logging and the
//! adaptive worker pool.
//!
//! ## Modules
//!
//! - [`config`] - Proxy and HTTP client settings
//! - [`error`] - Typed error handling with thiserror
//! - [`net`] - TLS transports, call contexts and the resilient HTTP client
//! - [`traits`] - Task processing and output sink traits
//! - [`utils`] - Proxy pool/parser, retry, logger and worker pool

pub mod config;
pub mod error;
pub mod net;
pub mod traits;
pub(crate) mod utils;

pub use config::{HttpConfig, ProxyConfig, ProxyScheme};
pub use error::{ConfigError, CoreError, HttpError, ProxyError};
pub use net::{
    is_blocking_error, CallContext, FingerprintProfile, HandshakePlan, HttpClient, ProxyPolicy,
    Transport, TransportFactory,
};
pub use traits::{LineWriter, TaskProcessor};

// Utils are pub(crate) - only export specific public utilities
pub use utils::{
    parse_level, setup_logger, AdaptiveWorkerPool, ProxyManager, ProxyPool, TaskScheduler,
};

pub use utils::retry::{with_retry, RetryConfig, RetryEvent};
