use crate::config::{ProxyConfig, ProxyScheme};
use crate::error::ProxyError;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::net::IpAddr;
use std::path::Path;
use tracing::{info, warn};

pub struct ProxyManager;

impl ProxyManager {
    /// Loads and normalises proxies from a line-delimited file.
    ///
    /// Accepted line formats (scheme optional, defaults to `http`):
    /// `user:pass@host:port`, `host:port@user:pass`,
    /// `user:pass:host:port`, `host:port:user:pass`.
    /// Blank lines and `#` comments are skipped, duplicates dropped.
    pub fn load_proxies(path: impl AsRef<Path>) -> Result<Vec<ProxyConfig>> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("{} not found. Running without proxies.", path.display());
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut seen = HashSet::new();
        let mut proxies = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let proxy = Self::parse(line)
                .with_context(|| format!("{}:{}", path.display(), idx + 1))?;
            if seen.insert(proxy.url()) {
                proxies.push(proxy);
            }
        }

        info!("Loaded {} proxies from {}", proxies.len(), path.display());
        Ok(proxies)
    }

    /// Parses a single proxy line into a validated [`ProxyConfig`].
    pub fn parse(line: &str) -> Result<ProxyConfig, ProxyError> {
        let line = line.trim();
        let invalid = || ProxyError::InvalidFormat {
            line: line.to_string(),
        };
        if line.is_empty() {
            return Err(invalid());
        }

        let (scheme, rest) = match line.split_once("://") {
            Some((scheme, rest)) => (parse_scheme(scheme)?, rest),
            None => (ProxyScheme::Http, line),
        };

        let (host, port, user, pass) = match rest.split_once('@') {
            Some((left, right)) => {
                let (l1, l2) = split_pair(left).ok_or_else(invalid)?;
                let (r1, r2) = split_pair(right).ok_or_else(invalid)?;
                if is_numeric(r2) {
                    // user:pass@host:port
                    (r1, r2, l1, l2)
                } else if is_numeric(l2) {
                    // host:port@user:pass
                    (l1, l2, r1, r2)
                } else {
                    return Err(invalid());
                }
            }
            None => {
                let parts: Vec<&str> = rest.split(':').collect();
                if parts.len() != 4 || parts.iter().any(|p| p.is_empty()) {
                    return Err(invalid());
                }
                // Both orders can look valid when the password is numeric;
                // a dotted host in the tail wins.
                let tail_is_host = is_numeric(parts[3]) && parts[2].contains('.');
                let host_first =
                    is_numeric(parts[1]) && is_valid_host(parts[0]) && !tail_is_host;
                if host_first {
                    // host:port:user:pass
                    (parts[0], parts[1], parts[2], parts[3])
                } else if is_numeric(parts[3]) {
                    // user:pass:host:port
                    (parts[2], parts[3], parts[0], parts[1])
                } else {
                    return Err(invalid());
                }
            }
        };

        if !is_valid_host(host) {
            return Err(ProxyError::InvalidHost {
                host: host.to_string(),
            });
        }

        let port = match port.parse::<u32>() {
            Ok(p) if (1..=65535).contains(&p) => p as u16,
            _ => {
                return Err(ProxyError::InvalidPort {
                    port: port.to_string(),
                })
            }
        };

        Ok(ProxyConfig {
            scheme,
            host: host.to_string(),
            port,
            username: Some(user.to_string()),
            password: Some(pass.to_string()),
        })
    }
}

fn parse_scheme(scheme: &str) -> Result<ProxyScheme, ProxyError> {
    match scheme.to_ascii_lowercase().as_str() {
        "http" => Ok(ProxyScheme::Http),
        "https" => Ok(ProxyScheme::Https),
        "socks5" => Ok(ProxyScheme::Socks5),
        _ => Err(ProxyError::UnsupportedScheme {
            scheme: scheme.to_string(),
        }),
    }
}

/// Splits `a:b` where neither side is empty nor contains `:`.
fn split_pair(s: &str) -> Option<(&str, &str)> {
    let (a, b) = s.split_once(':')?;
    if a.is_empty() || b.is_empty() || b.contains(':') {
        return None;
    }
    Some((a, b))
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

pub(crate) fn is_valid_host(host: &str) -> bool {
    if host.parse::<IpAddr>().is_ok() {
        return true;
    }
    if host.is_empty() || host.len() > 253 {
        return false;
    }
    host.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_rules() {
        assert!(is_valid_host("127.0.0.1"));
        assert!(is_valid_host("proxy-1.example.com"));
        assert!(!is_valid_host("invalid..host"));
        assert!(!is_valid_host("-bad.example.com"));
        assert!(!is_valid_host(&"a".repeat(256)));
    }

    #[test]
    fn test_split_pair_rejects_extra_colons() {
        assert_eq!(split_pair("a:b"), Some(("a", "b")));
        assert_eq!(split_pair("a:b:c"), None);
        assert_eq!(split_pair(":b"), None);
    }
}
