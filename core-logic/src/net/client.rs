//! Resilient HTTP Client
//!
//! Composes three independent policies:
//!
//! - [`TransportFactory`]: fresh TLS transport per attempt
//! - [`ProxyPolicy`]: which proxy to use and when to exile it
//! - retry: fixed delay, `max_retries` attempts
//!
//! Each attempt is classified as success, retryable or fatal:
//!
//! | outcome                                              | action              |
//! |------------------------------------------------------|---------------------|
//! | transport error: proxy auth / auth failed / deadline | block proxy, retry  |
//! | any other transport error                            | fatal               |
//! | HTTP 429, 407                                        | block proxy, retry  |
//! | other non-200                                        | fatal (status+body) |
//! | 200                                                  | decode JSON         |

use crate::config::HttpConfig;
use crate::error::HttpError;
use crate::net::context::CallContext;
use crate::net::tls::TransportFactory;
use crate::utils::proxy_pool::ProxyPool;
use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, warn};

/// Transport error fragments that point at a bad proxy or a stalled route.
const BLOCKING_PATTERNS: [&str; 4] = [
    "proxy authentication required",
    "authentication failed",
    "deadline exceeded",
    "timed out",
];

/// Proxy selection and exile rules.
#[derive(Debug, Clone)]
pub struct ProxyPolicy {
    pool: Option<ProxyPool>,
    enabled: bool,
    rotating: bool,
    block_time: Duration,
}

impl ProxyPolicy {
    pub fn new(pool: Option<ProxyPool>, config: &HttpConfig) -> Self {
        Self {
            pool,
            enabled: config.use_proxy_pool,
            rotating: config.is_rotating_proxy,
            block_time: config.block_time(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            pool: None,
            enabled: false,
            rotating: false,
            block_time: Duration::ZERO,
        }
    }

    pub fn pool(&self) -> Option<&ProxyPool> {
        self.pool.as_ref()
    }

    /// `Ok(None)` when proxies are off; `NoProxy` when on but none is free.
    pub fn acquire(&self) -> Result<Option<String>, HttpError> {
        if !self.enabled {
            return Ok(None);
        }
        match self.pool.as_ref().and_then(|pool| pool.checkout()) {
            Some(proxy) => Ok(Some(proxy)),
            None => Err(HttpError::NoProxy),
        }
    }

    /// Exiles the proxy for `block_time`. Rotating endpoints are never
    /// blocked.
    pub fn penalize(&self, proxy: Option<&str>) {
        if self.rotating {
            return;
        }
        if let (Some(pool), Some(proxy)) = (&self.pool, proxy) {
            pool.block(proxy, self.block_time);
        }
    }

    /// Returns one use of `proxy` to the pool.
    pub fn release(&self, proxy: Option<&str>) {
        if let (Some(pool), Some(proxy)) = (&self.pool, proxy) {
            pool.unblock(proxy);
        }
    }
}

enum Outcome<T> {
    Success(T),
    /// Retryable; the error is what a caller sees if no retry follows
    Retry(HttpError),
    Fatal(HttpError),
}

struct Attempt<T> {
    outcome: Outcome<T>,
    proxy: Option<String>,
    penalized: bool,
}

struct RequestSpec<'a> {
    url: &'a str,
    method: Method,
    body: Option<Vec<u8>>,
    headers: HeaderMap,
}

pub struct HttpClient {
    config: HttpConfig,
    proxies: ProxyPolicy,
    transports: TransportFactory,
}

impl HttpClient {
    pub fn new(pool: Option<ProxyPool>, config: HttpConfig) -> Self {
        let proxies = ProxyPolicy::new(pool, &config);
        let transports = TransportFactory::new(
            config.server_name.clone(),
            config.use_tls_fingerprint,
            config.fingerprint_profile,
            config.request_timeout(),
        );
        Self::from_parts(config, proxies, transports)
    }

    pub fn from_parts(config: HttpConfig, proxies: ProxyPolicy, transports: TransportFactory) -> Self {
        Self {
            config,
            proxies,
            transports,
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn proxy_policy(&self) -> &ProxyPolicy {
        &self.proxies
    }

    /// Runs the retry loop until success, a fatal error, cancellation or
    /// `max_retries` spent attempts.
    pub async fn request_with_retry<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        method: &str,
        body: Option<&serde_json::Value>,
        headers: &HashMap<String, String>,
    ) -> Result<T, HttpError> {
        let spec = build_spec(url, method, body, headers)?;
        let max = self.config.max_retries;

        for attempt in 0..max {
            if ctx.is_done() {
                return Err(HttpError::Cancelled);
            }

            let result = self.attempt::<T>(ctx, &spec).await;
            match result.outcome {
                Outcome::Success(value) => return Ok(value),
                Outcome::Fatal(err) => return Err(err),
                Outcome::Retry(err) => {
                    debug!(
                        url = %url,
                        proxy = result.proxy.as_deref().unwrap_or("-"),
                        attempt = attempt + 1,
                        "Retryable failure: {}",
                        err
                    );
                }
            }

            if attempt + 1 < max && !ctx.sleep(self.config.retry_delay()).await {
                return Err(HttpError::Cancelled);
            }
        }

        Err(HttpError::Exhausted { attempts: max })
    }

    /// One attempt, no retry. Retryable failures surface as errors; the
    /// proxy's use is released unless it was blocked.
    pub async fn simple_request<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        url: &str,
        method: &str,
        body: Option<&serde_json::Value>,
        headers: &HashMap<String, String>,
    ) -> Result<T, HttpError> {
        if ctx.is_done() {
            return Err(HttpError::Cancelled);
        }
        let spec = build_spec(url, method, body, headers)?;

        let result = self.attempt::<T>(ctx, &spec).await;
        if !result.penalized {
            self.proxies.release(result.proxy.as_deref());
        }

        match result.outcome {
            Outcome::Success(value) => Ok(value),
            Outcome::Retry(err) | Outcome::Fatal(err) => Err(err),
        }
    }

    async fn attempt<T: DeserializeOwned>(&self, ctx: &CallContext, spec: &RequestSpec<'_>) -> Attempt<T> {
        let fatal = |err: HttpError, proxy: Option<String>| Attempt {
            outcome: Outcome::Fatal(err),
            proxy,
            penalized: false,
        };

        let transport = match self.transports.create_transport() {
            Ok(t) => t,
            Err(e) => return fatal(e, None),
        };

        let proxy = match self.proxies.acquire() {
            Ok(p) => p,
            Err(e) => return fatal(e, None),
        };

        let transport = match &proxy {
            Some(p) => match transport.with_proxy(p) {
                Ok(t) => t,
                Err(e) => return fatal(e, proxy),
            },
            None => transport,
        };

        let dial_delay = transport.dial_delay();
        let client = match transport.build() {
            Ok(c) => c,
            Err(e) => return fatal(e, proxy),
        };

        if !dial_delay.is_zero() && !ctx.sleep(dial_delay).await {
            return fatal(HttpError::Cancelled, proxy);
        }

        let mut request = client
            .request(spec.method.clone(), spec.url)
            .headers(spec.headers.clone());
        if let Some(body) = &spec.body {
            request = request.body(body.clone());
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let gzip = response
                .headers()
                .get(CONTENT_ENCODING)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.eq_ignore_ascii_case("gzip"))
                .unwrap_or(false);
            let bytes = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, gzip, bytes))
        };

        let (status, gzip, bytes) = match tokio::time::timeout(ctx.remaining(), exchange).await {
            Err(_) => {
                self.proxies.penalize(proxy.as_deref());
                return Attempt {
                    outcome: Outcome::Retry(HttpError::Transport("context deadline exceeded".into())),
                    proxy,
                    penalized: true,
                };
            }
            Ok(Err(e)) => {
                let message = error_chain(&e);
                if e.is_timeout() || is_blocking_error(&message) {
                    self.proxies.penalize(proxy.as_deref());
                    return Attempt {
                        outcome: Outcome::Retry(HttpError::Transport(message)),
                        proxy,
                        penalized: true,
                    };
                }
                return fatal(HttpError::Transport(message), proxy);
            }
            Ok(Ok(parts)) => parts,
        };

        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::PROXY_AUTHENTICATION_REQUIRED {
            warn!(
                status = status.as_u16(),
                proxy = proxy.as_deref().unwrap_or("-"),
                "Rate limited or proxy rejected"
            );
            self.proxies.penalize(proxy.as_deref());
            let body = decode_body(&bytes, gzip).unwrap_or_default();
            return Attempt {
                outcome: Outcome::Retry(HttpError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                }),
                proxy,
                penalized: true,
            };
        }

        if status != StatusCode::OK {
            let body = decode_body(&bytes, gzip).unwrap_or_else(|_| bytes.to_vec());
            let body = String::from_utf8_lossy(&body).into_owned();
            debug!(status = status.as_u16(), body = %body, "Unexpected status code");
            return fatal(
                HttpError::Status {
                    status: status.as_u16(),
                    body,
                },
                proxy,
            );
        }

        if bytes.is_empty() {
            return fatal(HttpError::Decode("received empty response".into()), proxy);
        }

        let outcome = decode_body(&bytes, gzip).and_then(|body| {
            serde_json::from_slice::<T>(&body)
                .map_err(|e| HttpError::Decode(format!("error parsing JSON response: {}", e)))
        });

        match outcome {
            Ok(value) => Attempt {
                outcome: Outcome::Success(value),
                proxy,
                penalized: false,
            },
            Err(e) => fatal(e, proxy),
        }
    }
}

fn build_spec<'a>(
    url: &'a str,
    method: &str,
    body: Option<&serde_json::Value>,
    headers: &HashMap<String, String>,
) -> Result<RequestSpec<'a>, HttpError> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .map_err(|e| HttpError::Build(format!("invalid method {}: {}", method, e)))?;
    reqwest::Url::parse(url).map_err(|e| HttpError::Build(format!("invalid url {}: {}", url, e)))?;

    let mut map = HeaderMap::with_capacity(headers.len() + 2);
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| HttpError::Build(format!("invalid header name {}: {}", key, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpError::Build(format!("invalid header value for {}: {}", key, e)))?;
        map.insert(name, value);
    }
    if !map.contains_key(ACCEPT_ENCODING) {
        map.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
    }

    let body = match body {
        Some(value) => {
            let bytes = serde_json::to_vec(value)
                .map_err(|e| HttpError::Build(format!("error marshaling request body: {}", e)))?;
            map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Some(bytes)
        }
        None => None,
    };

    Ok(RequestSpec {
        url,
        method,
        body,
        headers: map,
    })
}

fn decode_body(bytes: &[u8], gzip: bool) -> Result<Vec<u8>, HttpError> {
    if !gzip {
        return Ok(bytes.to_vec());
    }
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| HttpError::Decode(format!("gzip: {}", e)))?;
    Ok(out)
}

/// Flattens an error and its sources into one line.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Transport errors that warrant blocking the proxy and retrying.
pub fn is_blocking_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    BLOCKING_PATTERNS.iter().any(|p| lower.contains(p))
}
