use crate::aggregator::GlobalStatsSnapshot;
use crate::models::{AggregatedData, TokenChainInfo};
use std::cmp::Ordering;

const SEPARATOR: &str =
    "--------------------------------------------------------------------------------";
const SECTION: &str =
    "################################################################################";

/// Plain-text report blocks. Tokens worth less than `min_usd_amount` are
/// hidden, and a group left with nothing to show is omitted.
#[derive(Debug, Clone, Copy)]
pub struct TextFormatter {
    min_usd_amount: f64,
}

impl TextFormatter {
    pub fn new(min_usd_amount: f64) -> Self {
        Self { min_usd_amount }
    }

    pub fn format_account(&self, data: &AggregatedData) -> Vec<String> {
        let mut out = vec![
            SEPARATOR.to_string(),
            format!(
                "ADDRESS: {}\nTOTAL BALANCE: {:.2}",
                data.address, data.total_balance
            ),
            SECTION.to_string(),
            "BALANCE BY CHAINS:".to_string(),
        ];

        let mut chains: Vec<&String> = data.chains.keys().collect();
        chains.sort();

        for chain in chains {
            let block = self.token_block(chain, &data.chains[chain], |t| {
                let contract = if !t.contract.is_empty() && t.contract != *chain {
                    format!(" [{}]", t.contract)
                } else {
                    String::new()
                };
                format!(
                    "{}: {:.8} (${:.2}){}",
                    t.symbol, t.amount, t.usd_value, contract
                )
            });
            out.extend(block);
        }

        out.push(SECTION.to_string());
        out.push("BALANCE BY PROJECTS:".to_string());

        let mut projects: Vec<_> = data.projects.iter().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));

        for project in projects {
            let block = self.token_block(&project.name, &project.tokens, |t| {
                format!(
                    "{}: {:.8} (${:.2}) [{}][{}]",
                    t.symbol, t.amount, t.usd_value, project.site_url, project.chain
                )
            });
            out.extend(block);
        }

        out.push(SEPARATOR.to_string());
        out
    }

    pub fn format_global_stats(&self, stats: &GlobalStatsSnapshot) -> Vec<String> {
        let mut out = vec![SEPARATOR.to_string(), "Global Statistics:".to_string()];

        let mut tokens: Vec<_> = stats
            .tokens
            .iter()
            .filter(|(_, t)| t.usd_value >= self.min_usd_amount)
            .collect();
        tokens.sort_by(|a, b| by_usd_desc(a.1.usd_value, b.1.usd_value));

        for (symbol, totals) in tokens {
            out.push(format!(
                "  {}: {:.8} (${:.2})",
                symbol, totals.amount, totals.usd_value
            ));
        }

        out.push(format!(
            "\nTotal accounts processed: {}",
            stats.total_accounts
        ));
        out.push(format!("Total USD value: ${:.2}", stats.total_usd_value));
        out.push(SEPARATOR.to_string());
        out
    }

    /// `title:` followed by one indented line per visible token, USD desc.
    fn token_block(
        &self,
        title: &str,
        tokens: &[TokenChainInfo],
        line: impl Fn(&TokenChainInfo) -> String,
    ) -> Option<String> {
        let mut visible: Vec<&TokenChainInfo> = tokens
            .iter()
            .filter(|t| t.usd_value >= self.min_usd_amount)
            .collect();
        if visible.is_empty() {
            return None;
        }
        visible.sort_by(|a, b| by_usd_desc(a.usd_value, b.usd_value));

        let mut block = format!("{}:", title);
        for token in visible {
            block.push_str("\n  ");
            block.push_str(&line(token));
        }
        Some(block)
    }
}

fn by_usd_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
