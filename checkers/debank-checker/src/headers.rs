//! Browser-like request headers.

use crate::signer::{random_id, unix_nanos};
use rand::seq::SliceRandom;
use serde::Serialize;
use std::collections::HashMap;

pub const ORIGIN: &str = "https://debank.com";

const SEC_CH_UA: &str = r#""Not)A;Brand";v="99", "Google Chrome";v="120", "Chromium";v="120""#;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:115.0) Gecko/20100101 Firefox/115.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 OPR/106.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 12_6_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_1_0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_1_0) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.4 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 12.6; rv:115.0) Gecko/20100101 Firefox/115.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:115.0) Gecko/20100101 Firefox/115.0",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_5 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.5 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8 Pro) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36",
];

/// `(primary, secondary, quality)` pairs for `accept-language`.
const LANGUAGES: &[(&str, &str, f64)] = &[
    ("en", "ru", 0.9),
    ("ru", "en", 0.9),
    ("en", "es", 0.8),
    ("en", "fr", 0.8),
    ("en", "de", 0.8),
    ("ru", "uk", 0.8),
    ("en", "ja", 0.7),
    ("en", "ko", 0.7),
    ("en", "zh", 0.7),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Macintosh,
    Windows,
    Linux,
    Unknown,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Platform::Macintosh,
            "windows" => Platform::Windows,
            "linux" => Platform::Linux,
            _ => Platform::Unknown,
        }
    }

    /// Substring that identifies this platform inside a user agent.
    fn marker(&self) -> Option<&'static str> {
        match self {
            Platform::Macintosh => Some("macintosh"),
            Platform::Windows => Some("windows"),
            Platform::Linux => Some("linux"),
            Platform::Unknown => None,
        }
    }

    /// Value of `sec-ch-ua-platform`.
    pub fn client_hint(&self) -> &'static str {
        match self {
            Platform::Macintosh => r#""macOS""#,
            Platform::Windows => r#""Windows""#,
            Platform::Linux => r#""Linux""#,
            Platform::Unknown => r#""Unknown""#,
        }
    }
}

/// Random user agent matching `platform`, or any agent when none match.
pub fn user_agent_for(platform: Platform) -> &'static str {
    let mut rng = rand::thread_rng();

    let matching: Vec<&'static str> = match platform.marker() {
        Some(marker) => USER_AGENTS
            .iter()
            .copied()
            .filter(|ua| ua.to_ascii_lowercase().contains(marker))
            .collect(),
        None => Vec::new(),
    };

    matching
        .choose(&mut rng)
        .or_else(|| USER_AGENTS.choose(&mut rng))
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

pub fn sec_ch_ua() -> &'static str {
    SEC_CH_UA
}

/// `0.90` renders as `0.9`, `0.75` stays `0.75`.
pub fn format_quality(q: f64) -> String {
    let truncated = (q * 100.0).trunc() / 100.0;
    let s = format!("{:.2}", truncated);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub fn language_string(primary: &str, secondary: &str, quality: f64) -> String {
    format!("{},{};q={}", primary, secondary, format_quality(quality))
}

pub fn random_language() -> String {
    let (p, s, q) = LANGUAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(LANGUAGES[0]);
    language_string(p, s, q)
}

/// Identity blob carried in the `account` header.
#[derive(Debug, Serialize)]
struct AccountBlob<'a> {
    random_at: String,
    random_id: String,
    user_addr: &'a str,
}

pub fn account_header(address: &str) -> String {
    let blob = AccountBlob {
        random_at: unix_nanos().to_string(),
        random_id: random_id(32),
        user_addr: address,
    };
    serde_json::to_string(&blob).unwrap_or_default()
}

/// Static header set for one address, without signature fields.
pub fn base_headers(address: &str) -> HashMap<String, String> {
    let platform = Platform::current();

    [
        ("accept", "*/*".to_string()),
        ("accept-language", random_language()),
        ("account", account_header(address)),
        ("origin", ORIGIN.to_string()),
        ("referer", format!("{}/", ORIGIN)),
        ("source", "web".to_string()),
        ("x-api-ver", "v2".to_string()),
        ("user-agent", user_agent_for(platform).to_string()),
        ("sec-ch-ua", sec_ch_ua().to_string()),
        ("sec-ch-ua-mobile", "?0".to_string()),
        ("sec-ch-ua-platform", platform.client_hint().to_string()),
        ("sec-fetch-dest", "empty".to_string()),
        ("sec-fetch-mode", "cors".to_string()),
        ("sec-fetch-site", "same-site".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_formatting() {
        assert_eq!(format_quality(0.9), "0.9");
        assert_eq!(format_quality(0.75), "0.75");
        assert_eq!(format_quality(1.0), "1");
        assert_eq!(language_string("en", "ru", 0.9), "en,ru;q=0.9");
    }

    #[test]
    fn test_user_agent_matches_platform() {
        assert!(user_agent_for(Platform::Windows).contains("Windows"));
        assert!(user_agent_for(Platform::Macintosh).contains("Macintosh"));
        assert!(user_agent_for(Platform::Linux).contains("Linux"));
        assert!(!user_agent_for(Platform::Unknown).is_empty());
    }

    #[test]
    fn test_account_blob_fields() {
        let raw = account_header("0xabc");
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["user_addr"], "0xabc");
        assert_eq!(v["random_id"].as_str().unwrap().len(), 32);
        assert!(v["random_at"].as_str().unwrap().parse::<u128>().is_ok());
    }

    #[test]
    fn test_base_headers_have_browser_shape() {
        let h = base_headers("0xabc");
        assert_eq!(h["accept"], "*/*");
        assert_eq!(h["origin"], ORIGIN);
        assert_eq!(h["x-api-ver"], "v2");
        assert!(h["accept-language"].contains(";q=0."));
        assert!(!h.contains_key("x-api-sign"));
    }
}
