//! Named API operations on top of the signed HTTP client.

use crate::cache::{TtlCache, CHAIN_TTL, HEADER_TTL};
use crate::config::{
    DebankConfig, ENDPOINT_PROJECT_LIST, ENDPOINT_TOKEN_BALANCE_LIST, ENDPOINT_USED_CHAINS,
    ENDPOINT_USER_INFO,
};
use crate::error::CheckerError;
use crate::headers::base_headers;
use crate::models::{
    ProjectAssets, ProjectListResponse, TokenBalanceListResponse, TokenInfo, UsedChainsResponse,
    UserResponse,
};
use crate::signer::ParamGenerator;
use async_trait::async_trait;
use core_logic::{CallContext, HttpClient};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// The four reads the collector needs for one address.
#[async_trait]
pub trait BalanceChecker: Send + Sync {
    async fn get_total_balance(&self, address: &str) -> Result<f64, CheckerError>;
    async fn get_used_chains(&self, address: &str) -> Result<Vec<String>, CheckerError>;
    async fn get_token_balance_list(
        &self,
        address: &str,
        chain: &str,
    ) -> Result<Vec<TokenInfo>, CheckerError>;
    async fn get_project_assets(&self, address: &str) -> Result<Vec<ProjectAssets>, CheckerError>;
}

pub struct DebankApi {
    base_url: String,
    endpoints: HashMap<String, String>,
    deadline: Duration,
    client: Arc<HttpClient>,
    generator: ParamGenerator,
    headers: TtlCache<HashMap<String, String>>,
    chains: TtlCache<Vec<String>>,
}

impl DebankApi {
    pub fn new(config: &DebankConfig, client: Arc<HttpClient>, generator: ParamGenerator) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            endpoints: config.endpoints.clone(),
            deadline: config.deadline(),
            client,
            generator,
            headers: TtlCache::new(HEADER_TTL),
            chains: TtlCache::new(CHAIN_TTL),
        }
    }

    /// Signs and sends one request.
    ///
    /// `path` is what gets signed; the URL comes from the endpoint template
    /// for `endpoint_key` with `url_params` filled into its `{}` slots.
    pub async fn make_request<T: DeserializeOwned>(
        &self,
        endpoint_key: &str,
        method: &str,
        path: &str,
        payload: &Map<String, Value>,
        url_params: &[&str],
    ) -> Result<T, CheckerError> {
        let template = self.endpoint(endpoint_key)?;
        let url = fill_template(&template, url_params);
        let headers = self.request_headers(payload, method, path)?;

        let ctx = CallContext::with_timeout(self.deadline);
        self.client
            .simple_request(&ctx, &url, method, None, &headers)
            .await
            .map_err(|e| {
                debug!(url = %url, "Request failed: {}", e);
                CheckerError::Http(e)
            })
    }

    fn endpoint(&self, key: &str) -> Result<String, CheckerError> {
        let template = self
            .endpoints
            .get(key)
            .ok_or_else(|| CheckerError::EndpointNotFound { key: key.to_string() })?;

        if template.starts_with("http") {
            Ok(template.clone())
        } else {
            Ok(format!("{}{}", self.base_url, template))
        }
    }

    /// Cached base headers for the payload's address plus fresh signature fields.
    fn request_headers(
        &self,
        payload: &Map<String, Value>,
        method: &str,
        path: &str,
    ) -> Result<HashMap<String, String>, CheckerError> {
        let params = self.generator.generate(payload, method, path)?;
        let address = extract_address(payload).ok_or(CheckerError::MissingAddress)?;

        let mut headers = self
            .headers
            .get_or_insert_with(address, || base_headers(address));
        headers.insert("x-api-nonce".to_string(), params.nonce);
        headers.insert("x-api-sign".to_string(), params.signature);
        headers.insert("x-api-ts".to_string(), params.timestamp);
        Ok(headers)
    }

    pub fn cached_chains(&self, address: &str) -> Option<Vec<String>> {
        self.chains.get(address)
    }
}

#[async_trait]
impl BalanceChecker for DebankApi {
    async fn get_total_balance(&self, address: &str) -> Result<f64, CheckerError> {
        let resp: UserResponse = self
            .make_request(
                ENDPOINT_USER_INFO,
                "GET",
                "/user",
                &payload(&[("id", address)]),
                &[address],
            )
            .await?;

        let desc = resp.data.user.desc;
        if !desc.used_chains.is_empty() {
            self.chains.insert(address, desc.used_chains);
        }
        Ok(desc.usd_value)
    }

    async fn get_used_chains(&self, address: &str) -> Result<Vec<String>, CheckerError> {
        if let Some(chains) = self.chains.get(address) {
            return Ok(chains);
        }

        let resp: UsedChainsResponse = self
            .make_request(
                ENDPOINT_USED_CHAINS,
                "GET",
                "/user/used_chains",
                &payload(&[("id", address)]),
                &[address],
            )
            .await?;

        self.chains.insert(address, resp.data.chains.clone());
        Ok(resp.data.chains)
    }

    async fn get_token_balance_list(
        &self,
        address: &str,
        chain: &str,
    ) -> Result<Vec<TokenInfo>, CheckerError> {
        let resp: TokenBalanceListResponse = self
            .make_request(
                ENDPOINT_TOKEN_BALANCE_LIST,
                "GET",
                "/token/balance_list",
                &payload(&[("user_addr", address), ("chain", chain)]),
                &[address, chain],
            )
            .await?;

        debug!(address, chain, tokens = resp.data.len(), "Token balance list");
        Ok(resp.data)
    }

    async fn get_project_assets(&self, address: &str) -> Result<Vec<ProjectAssets>, CheckerError> {
        let resp: ProjectListResponse = self
            .make_request(
                ENDPOINT_PROJECT_LIST,
                "GET",
                "/portfolio/project_list",
                &payload(&[("user_addr", address)]),
                &[address],
            )
            .await?;

        Ok(flatten_projects(resp))
    }
}

/// Collapses portfolio items into one token list per project and drops
/// projects that hold no assets.
pub fn flatten_projects(resp: ProjectListResponse) -> Vec<ProjectAssets> {
    resp.data
        .into_iter()
        .filter_map(|project| {
            let assets: Vec<TokenInfo> = project
                .portfolio_item_list
                .into_iter()
                .flat_map(|item| item.asset_token_list)
                .collect();

            (!assets.is_empty()).then(|| ProjectAssets {
                name: project.name,
                site_url: project.site_url,
                chain: project.chain,
                assets,
            })
        })
        .collect()
}

/// Fills `{}` slots left to right. Slots without a value are left empty.
pub fn fill_template(template: &str, params: &[&str]) -> String {
    let mut out = String::with_capacity(template.len() + 64);
    let mut values = params.iter();
    let mut parts = template.split("{}").peekable();

    while let Some(part) = parts.next() {
        out.push_str(part);
        if parts.peek().is_some() {
            if let Some(v) = values.next() {
                out.push_str(v);
            }
        }
    }
    out
}

fn extract_address(payload: &Map<String, Value>) -> Option<&str> {
    ["id", "user_addr"]
        .iter()
        .find_map(|key| payload.get(*key).and_then(Value::as_str))
}

fn payload(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}
