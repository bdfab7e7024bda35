//! # Core Error Types
//!
//! Centralized error definitions for the core-logic crate.
//! All errors implement `std::error::Error` and `std::fmt::Display`.

use thiserror::Error;

/// Unified error type for core-logic operations.
///
/// Wraps the specific error enums so the application layer can hold a
/// single type when it does not care which subsystem failed.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Config(ConfigError),

    #[error(transparent)]
    Proxy(ProxyError),

    #[error(transparent)]
    Http(HttpError),

    #[error("Unknown error: {message}")]
    Unknown { message: String },
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        CoreError::Config(e)
    }
}

impl From<ProxyError> for CoreError {
    fn from(e: ProxyError) -> Self {
        CoreError::Proxy(e)
    }
}

impl From<HttpError> for CoreError {
    fn from(e: HttpError) -> Self {
        CoreError::Http(e)
    }
}

/// Configuration-related errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing required configuration field: '{field}'")]
    MissingField { field: String },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("I/O error reading {path}: {msg}")]
    IoError { path: String, msg: String },
}

/// Proxy list parsing and pool errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProxyError {
    #[error("Invalid proxy format: '{line}'")]
    InvalidFormat { line: String },

    #[error("Unsupported proxy scheme '{scheme}' (expected http, https or socks5)")]
    UnsupportedScheme { scheme: String },

    #[error("Invalid proxy host: '{host}'")]
    InvalidHost { host: String },

    #[error("Invalid proxy port: '{port}'")]
    InvalidPort { port: String },

    #[error("Proxy pool is empty")]
    EmptyPool,
}

/// Outcome errors of the resilient HTTP client.
///
/// Only fatal and exhausted conditions leave the client; retryable
/// conditions are resolved inside the retry loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HttpError {
    #[error("request cancelled")]
    Cancelled,

    #[error("no available proxies")]
    NoProxy,

    #[error("request failed after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("unexpected status code {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request error: {0}")]
    Transport(String),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("failed to build request: {0}")]
    Build(String),
}

impl HttpError {
    /// `true` for the resource-exhaustion class (no proxy, retries spent).
    pub fn is_exhaustion(&self) -> bool {
        matches!(self, HttpError::NoProxy | HttpError::Exhausted { .. })
    }
}
