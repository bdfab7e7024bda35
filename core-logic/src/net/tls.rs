//! TLS Transport Factory - one fresh outbound transport per attempt
//!
//! Two paths:
//!
//! 1. **Randomised**: the full ring cipher-suite list is shuffled and cut to
//!    3-8 entries, the key-exchange groups are shuffled, so no two attempts
//!    present the same ClientHello.
//! 2. **Fingerprinted**: a browser profile (fixed cipher, group and ALPN
//!    order) is used instead, either the configured one or a random one per
//!    attempt.
//!
//! Both paths disable connection reuse and draw their timeouts, HTTP/2
//! window sizes and pre-dial delays from fixed ranges.

use crate::error::HttpError;
use rand::seq::SliceRandom;
use rand::Rng;
use rustls::crypto::ring::{cipher_suite as cs, default_provider, kx_group};
use rustls::crypto::{CryptoProvider, SupportedKxGroup};
use rustls::{ClientConfig, RootCertStore, SupportedCipherSuite};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Browser handshake templates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FingerprintProfile {
    /// A different browser profile on every attempt
    #[serde(rename = "random")]
    Random,
    #[serde(rename = "chrome_120")]
    Chrome120,
    #[serde(rename = "firefox_120")]
    Firefox120,
    #[serde(rename = "safari_16")]
    Safari16,
    #[serde(rename = "chrome_100")]
    Chrome100,
}

impl FingerprintProfile {
    pub const BROWSERS: [FingerprintProfile; 4] = [
        FingerprintProfile::Chrome120,
        FingerprintProfile::Firefox120,
        FingerprintProfile::Safari16,
        FingerprintProfile::Chrome100,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            FingerprintProfile::Random => "random",
            FingerprintProfile::Chrome120 => "chrome_120",
            FingerprintProfile::Firefox120 => "firefox_120",
            FingerprintProfile::Safari16 => "safari_16",
            FingerprintProfile::Chrome100 => "chrome_100",
        }
    }

    /// Resolves `Random` to a concrete browser.
    pub fn resolve(self) -> FingerprintProfile {
        match self {
            FingerprintProfile::Random => {
                let idx = rand::thread_rng().gen_range(0..Self::BROWSERS.len());
                Self::BROWSERS[idx]
            }
            other => other,
        }
    }

    /// Ordered cipher suites offered by the browser.
    pub fn cipher_suites(&self) -> Vec<SupportedCipherSuite> {
        match self.resolve() {
            FingerprintProfile::Firefox120 => vec![
                cs::TLS13_AES_128_GCM_SHA256,
                cs::TLS13_CHACHA20_POLY1305_SHA256,
                cs::TLS13_AES_256_GCM_SHA384,
                cs::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
                cs::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
                cs::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
                cs::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
                cs::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
                cs::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            ],
            FingerprintProfile::Safari16 => vec![
                cs::TLS13_AES_128_GCM_SHA256,
                cs::TLS13_AES_256_GCM_SHA384,
                cs::TLS13_CHACHA20_POLY1305_SHA256,
                cs::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
                cs::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
                cs::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
                cs::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
                cs::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
                cs::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            ],
            FingerprintProfile::Chrome100 => vec![
                cs::TLS13_AES_128_GCM_SHA256,
                cs::TLS13_AES_256_GCM_SHA384,
                cs::TLS13_CHACHA20_POLY1305_SHA256,
                cs::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
                cs::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
                cs::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
                cs::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            ],
            _ => vec![
                cs::TLS13_AES_128_GCM_SHA256,
                cs::TLS13_AES_256_GCM_SHA384,
                cs::TLS13_CHACHA20_POLY1305_SHA256,
                cs::TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256,
                cs::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
                cs::TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384,
                cs::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
                cs::TLS_ECDHE_ECDSA_WITH_CHACHA20_POLY1305_SHA256,
                cs::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
            ],
        }
    }

    /// Ordered key-exchange groups offered by the browser.
    pub fn kx_groups(&self) -> Vec<&'static dyn SupportedKxGroup> {
        match self.resolve() {
            FingerprintProfile::Safari16 => {
                vec![kx_group::X25519, kx_group::SECP256R1, kx_group::SECP384R1]
            }
            FingerprintProfile::Chrome100 => vec![kx_group::X25519, kx_group::SECP256R1],
            _ => vec![kx_group::X25519, kx_group::SECP256R1, kx_group::SECP384R1],
        }
    }

    pub fn alpn(&self) -> Vec<Vec<u8>> {
        vec![b"h2".to_vec(), b"http/1.1".to_vec()]
    }
}

impl fmt::Display for FingerprintProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FingerprintProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Ok(FingerprintProfile::Random),
            "chrome_120" | "chrome120" => Ok(FingerprintProfile::Chrome120),
            "firefox_120" | "firefox120" => Ok(FingerprintProfile::Firefox120),
            "safari_16" | "safari16" => Ok(FingerprintProfile::Safari16),
            "chrome_100" | "chrome100" => Ok(FingerprintProfile::Chrome100),
            other => Err(format!("unknown fingerprint profile: {}", other)),
        }
    }
}

/// Handshake parameters chosen for one attempt.
#[derive(Debug, Clone)]
pub struct HandshakePlan {
    pub label: String,
    pub cipher_suites: Vec<SupportedCipherSuite>,
    pub kx_groups: Vec<&'static dyn SupportedKxGroup>,
    pub alpn: Vec<Vec<u8>>,
}

impl HandshakePlan {
    /// Shuffled and truncated (3-8) cipher list, shuffled groups (2-3).
    /// At least one TLS 1.3 suite is always kept.
    pub fn randomized() -> Self {
        let mut rng = rand::thread_rng();
        let provider = default_provider();

        let mut suites = provider.cipher_suites.clone();
        suites.shuffle(&mut rng);
        let keep = rng.gen_range(3..=8).min(suites.len());
        suites.truncate(keep);

        let has_tls13 = suites
            .iter()
            .any(|s| matches!(s, SupportedCipherSuite::Tls13(_)));
        if !has_tls13 {
            let tls13: Vec<SupportedCipherSuite> = provider
                .cipher_suites
                .iter()
                .copied()
                .filter(|s| matches!(s, SupportedCipherSuite::Tls13(_)))
                .collect();
            if let (Some(pick), Some(last)) = (tls13.choose(&mut rng), suites.last_mut()) {
                *last = *pick;
            }
        }

        let mut groups = provider.kx_groups.clone();
        groups.shuffle(&mut rng);
        let keep = rng.gen_range(2..=3).min(groups.len());
        groups.truncate(keep);

        Self {
            label: "randomized".to_string(),
            cipher_suites: suites,
            kx_groups: groups,
            alpn: vec![b"h2".to_vec(), b"http/1.1".to_vec()],
        }
    }

    pub fn browser(profile: FingerprintProfile) -> Self {
        let profile = profile.resolve();
        Self {
            label: profile.name().to_string(),
            cipher_suites: profile.cipher_suites(),
            kx_groups: profile.kx_groups(),
            alpn: profile.alpn(),
        }
    }

    /// Materialises the plan as a rustls client config (TLS 1.2-1.3).
    pub fn client_config(&self) -> Result<ClientConfig, HttpError> {
        let provider = CryptoProvider {
            cipher_suites: self.cipher_suites.clone(),
            kx_groups: self.kx_groups.clone(),
            ..default_provider()
        };

        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };

        let mut config = ClientConfig::builder_with_provider(Arc::new(provider))
            .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
            .map_err(|e| HttpError::Build(format!("tls config: {}", e)))?
            .with_root_certificates(roots)
            .with_no_client_auth();
        config.alpn_protocols = self.alpn.clone();

        Ok(config)
    }
}

/// Builds a fresh [`Transport`] for every attempt.
#[derive(Debug, Clone)]
pub struct TransportFactory {
    server_name: String,
    use_fingerprint: bool,
    profile: FingerprintProfile,
    request_timeout: Duration,
    dial_jitter: bool,
}

impl TransportFactory {
    pub fn new(
        server_name: impl Into<String>,
        use_fingerprint: bool,
        profile: FingerprintProfile,
        request_timeout: Duration,
    ) -> Self {
        Self {
            server_name: server_name.into(),
            use_fingerprint,
            profile,
            request_timeout,
            dial_jitter: true,
        }
    }

    /// Turns the random pre-dial delays on or off.
    pub fn with_dial_jitter(mut self, enabled: bool) -> Self {
        self.dial_jitter = enabled;
        self
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn create_transport(&self) -> Result<Transport, HttpError> {
        let plan = if self.use_fingerprint {
            HandshakePlan::browser(self.profile)
        } else {
            HandshakePlan::randomized()
        };
        let tls = plan.client_config()?;

        let mut rng = rand::thread_rng();
        let connect_timeout = Duration::from_secs(rng.gen_range(7..=12));
        let idle_timeout = Duration::from_secs(rng.gen_range(5..=14));
        let window = rng.gen_range(8u32..=23) * 1024;

        let dial_delay = if self.dial_jitter {
            let mut ms = rng.gen_range(100..=300) + rng.gen_range(10..=100);
            if self.use_fingerprint {
                ms += rng.gen_range(50..=150);
            }
            Duration::from_millis(ms)
        } else {
            Duration::ZERO
        };

        let builder = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .timeout(self.request_timeout)
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(idle_timeout)
            .pool_max_idle_per_host(0)
            .tcp_keepalive(None::<Duration>)
            .http2_initial_stream_window_size(window)
            .http2_initial_connection_window_size(window * 2)
            .no_proxy();

        debug!(
            server = %self.server_name,
            tls = %plan.label,
            suites = plan.cipher_suites.len(),
            ?dial_delay,
            "Created transport"
        );

        Ok(Transport {
            builder,
            dial_delay,
            label: plan.label,
        })
    }
}

/// Single-use transport: bind a proxy, dial once, drop.
pub struct Transport {
    builder: reqwest::ClientBuilder,
    dial_delay: Duration,
    label: String,
}

impl Transport {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn dial_delay(&self) -> Duration {
        self.dial_delay
    }

    pub fn with_proxy(mut self, proxy_url: &str) -> Result<Self, HttpError> {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|e| HttpError::Build(format!("invalid proxy {}: {}", proxy_url, e)))?;
        self.builder = self.builder.proxy(proxy);
        Ok(self)
    }

    /// Finalises the client. The caller waits `dial_delay` before the first
    /// request goes out.
    pub fn build(self) -> Result<reqwest::Client, HttpError> {
        self.builder
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))
    }
}
