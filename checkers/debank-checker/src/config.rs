//! Configuration loader for debank-checker

use crate::signer::SignType;
use anyhow::{Context, Result};
use core_logic::{ConfigError, HttpConfig, ProxyConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const ENDPOINT_USER_INFO: &str = "user_info";
pub const ENDPOINT_USED_CHAINS: &str = "used_chains";
pub const ENDPOINT_TOKEN_BALANCE_LIST: &str = "token_balance_list";
pub const ENDPOINT_PROJECT_LIST: &str = "project_list";

const REQUIRED_ENDPOINTS: [&str; 4] = [
    ENDPOINT_USER_INFO,
    ENDPOINT_USED_CHAINS,
    ENDPOINT_TOKEN_BALANCE_LIST,
    ENDPOINT_PROJECT_LIST,
];

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Minimum number of workers
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_logger_level")]
    pub logger_level: String,
    /// Accounts at or below this USD total are skipped; smaller tokens are hidden
    #[serde(default)]
    pub min_usd_amount: f64,
    #[serde(default = "default_addresses_path")]
    pub addresses_path: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub debank: DebankConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub signer: SignerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebankConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Operation key to path template; `{}` placeholders are filled in order
    #[serde(default = "default_endpoints")]
    pub endpoints: HashMap<String, String>,
    #[serde(default)]
    pub use_proxy_pool: bool,
    #[serde(default)]
    pub rotate_proxy: bool,
    #[serde(default)]
    pub proxy_file_path: String,
    /// Per-call deadline in seconds
    #[serde(default = "default_deadline_request")]
    pub deadline_request: u64,
}

impl Default for DebankConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            endpoints: default_endpoints(),
            use_proxy_pool: false,
            rotate_proxy: false,
            proxy_file_path: String::new(),
            deadline_request: default_deadline_request(),
        }
    }
}

impl DebankConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_request)
    }

    /// Proxy URLs that go into the pool. A rotating provider is reached
    /// through its single endpoint, the first entry of the file.
    pub fn pool_urls(&self, proxies: &[ProxyConfig]) -> Vec<String> {
        let take = if self.rotate_proxy { 1 } else { proxies.len() };
        proxies.iter().take(take).map(ProxyConfig::url).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignerKind {
    #[default]
    Native,
    Pooled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignerConfig {
    #[serde(default)]
    pub kind: SignerKind,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    #[serde(default)]
    pub sign_type: SignType,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            kind: SignerKind::default(),
            pool_size: default_pool_size(),
            sign_type: SignType::default(),
        }
    }
}

fn default_concurrency() -> usize {
    10
}

fn default_logger_level() -> String {
    "info".to_string()
}

fn default_addresses_path() -> String {
    "data/addresses.txt".to_string()
}

fn default_output_dir() -> String {
    "results".to_string()
}

fn default_base_url() -> String {
    "https://api.debank.com".to_string()
}

fn default_deadline_request() -> u64 {
    30
}

fn default_pool_size() -> usize {
    4
}

fn default_endpoints() -> HashMap<String, String> {
    [
        (ENDPOINT_USER_INFO, "/user?id={}"),
        (ENDPOINT_USED_CHAINS, "/user/used_chains?id={}"),
        (
            ENDPOINT_TOKEN_BALANCE_LIST,
            "/token/balance_list?user_addr={}&chain={}",
        ),
        (ENDPOINT_PROJECT_LIST, "/portfolio/project_list?user_addr={}"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            logger_level: default_logger_level(),
            min_usd_amount: 0.0,
            addresses_path: default_addresses_path(),
            output_dir: default_output_dir(),
            debank: DebankConfig::default(),
            http: HttpConfig::default(),
            signer: SignerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```ignore
    /// let config = AppConfig::from_path("config/config.toml")?;
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = fs::read_to_string(path)
            .context(format!("Failed to read config from {}", path.display()))?;
        let config: Self = toml::from_str(&content).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.min_usd_amount < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "min_usd_amount".into(),
                reason: "must not be negative".into(),
            });
        }
        if self.debank.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "debank.base_url".into(),
            });
        }
        if self.debank.deadline_request == 0 {
            return Err(ConfigError::InvalidValue {
                field: "debank.deadline_request".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if self.debank.use_proxy_pool && self.debank.proxy_file_path.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "debank.proxy_file_path".into(),
            });
        }
        for key in REQUIRED_ENDPOINTS {
            if !self.debank.endpoints.contains_key(key) {
                return Err(ConfigError::MissingField {
                    field: format!("debank.endpoints.{}", key),
                });
            }
        }
        if self.http.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.max_retries".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.signer.pool_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "signer.pool_size".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// The `[http]` section with the proxy switches from `[debank]` applied.
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            use_proxy_pool: self.debank.use_proxy_pool,
            is_rotating_proxy: self.debank.rotate_proxy,
            ..self.http.clone()
        }
    }
}
