use crate::error::CheckerError;
use anyhow::{Context, Result};
use std::fmt;
use std::path::Path;
use tracing::warn;

/// An EVM address queued for checking. Stored lower-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Account {
    address: String,
}

impl Account {
    /// Accepts `0x` followed by 40 hex characters, any case.
    pub fn parse(input: &str) -> Result<Self, CheckerError> {
        let trimmed = input.trim();
        let hex_part = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| CheckerError::InvalidAddress(trimmed.to_string()))?;

        if hex_part.len() != 40 || !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CheckerError::InvalidAddress(trimmed.to_string()));
        }

        Ok(Self {
            address: format!("0x{}", hex_part.to_ascii_lowercase()),
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Non-empty trimmed lines of a text file.
pub fn read_lines(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}

/// Parses every line, skipping (and logging) the ones that are not addresses.
pub fn accounts_from_lines(lines: &[String]) -> Vec<Account> {
    lines
        .iter()
        .filter_map(|line| match Account::parse(line) {
            Ok(account) => Some(account),
            Err(e) => {
                warn!("Skipping line: {}", e);
                None
            }
        })
        .collect()
}
