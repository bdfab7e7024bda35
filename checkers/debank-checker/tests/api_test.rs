use core_logic::{FingerprintProfile, HttpClient, HttpConfig, HttpError, ProxyPolicy, TransportFactory};
use debank_checker::api::{BalanceChecker, DebankApi};
use debank_checker::config::{DebankConfig, ENDPOINT_PROJECT_LIST};
use debank_checker::signer::{NativeSigner, ParamGenerator, SignType};
use debank_checker::CheckerError;
use mockito::{Matcher, ServerGuard};
use serde_json::json;
use std::sync::Arc;

const ADDR: &str = "0x00000000000000000000000000000000000000aa";

fn api_for(server: &ServerGuard, tweak: impl FnOnce(&mut DebankConfig)) -> DebankApi {
    let http = HttpConfig {
        request_timeout_ms: 5_000,
        ..HttpConfig::default()
    };
    let transports = TransportFactory::new(
        "localhost",
        false,
        FingerprintProfile::Random,
        http.request_timeout(),
    )
    .with_dial_jitter(false);
    let proxies = ProxyPolicy::new(None, &http);
    let client = Arc::new(HttpClient::from_parts(http, proxies, transports));

    let mut config = DebankConfig {
        base_url: server.url(),
        deadline_request: 5,
        ..DebankConfig::default()
    };
    tweak(&mut config);

    let generator = ParamGenerator::new(Arc::new(NativeSigner::new(SignType::Regular)));
    DebankApi::new(&config, client, generator)
}

#[tokio::test]
async fn test_total_balance_sends_signed_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/user")
        .match_query(Matcher::UrlEncoded("id".into(), ADDR.into()))
        .match_header("x-api-nonce", Matcher::Regex("^n_[a-z0-9]{40}$".into()))
        .match_header("x-api-sign", Matcher::Regex("^[0-9a-f]{64}$".into()))
        .match_header("x-api-ts", Matcher::Regex("^[0-9]+$".into()))
        .match_header("x-api-ver", "v2")
        .match_header("source", "web")
        .match_header("account", Matcher::Regex(ADDR.into()))
        .with_status(200)
        .with_body(
            json!({"data": {"user": {"desc": {"usd_value": 1234.5, "used_chains": []}}}})
                .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let api = api_for(&server, |_| {});
    let balance = api.get_total_balance(ADDR).await.unwrap();

    assert_eq!(balance, 1234.5);
    assert!(api.cached_chains(ADDR).is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_total_balance_seeds_chain_cache() {
    let mut server = mockito::Server::new_async().await;
    let user = server
        .mock("GET", "/user")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({"data": {"user": {"desc": {"usd_value": 10.0, "used_chains": ["eth", "arb"]}}}})
                .to_string(),
        )
        .create_async()
        .await;
    let used_chains = server
        .mock("GET", "/user/used_chains")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let api = api_for(&server, |_| {});
    api.get_total_balance(ADDR).await.unwrap();
    let chains = api.get_used_chains(ADDR).await.unwrap();

    assert_eq!(chains, vec!["eth".to_string(), "arb".to_string()]);
    user.assert_async().await;
    used_chains.assert_async().await;
}

#[tokio::test]
async fn test_used_chains_fetched_when_not_cached() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/user/used_chains")
        .match_query(Matcher::UrlEncoded("id".into(), ADDR.into()))
        .with_status(200)
        .with_body(json!({"data": {"chains": ["bsc"]}}).to_string())
        .expect(1)
        .create_async()
        .await;

    let api = api_for(&server, |_| {});
    assert_eq!(api.get_used_chains(ADDR).await.unwrap(), vec!["bsc".to_string()]);
    // Second call is served from cache
    assert_eq!(api.get_used_chains(ADDR).await.unwrap(), vec!["bsc".to_string()]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_token_balance_list_query() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/token/balance_list")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("user_addr".into(), ADDR.into()),
            Matcher::UrlEncoded("chain".into(), "eth".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({"data": [
                {"amount": 2.0, "chain": "eth", "id": "eth", "price": 1500.0, "symbol": "ETH"},
                {"amount": 5.0, "chain": "eth", "id": "0xdac1", "price": 1.0, "symbol": "USDT"}
            ]})
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let api = api_for(&server, |_| {});
    let tokens = api.get_token_balance_list(ADDR, "eth").await.unwrap();

    assert_eq!(tokens.len(), 2);
    assert_eq!(tokens[0].usd_value(), 3000.0);
    assert_eq!(tokens[1].id, "0xdac1");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_project_assets_are_flattened() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/portfolio/project_list")
        .match_query(Matcher::UrlEncoded("user_addr".into(), ADDR.into()))
        .with_status(200)
        .with_body(
            json!({"data": [
                {
                    "chain": "eth",
                    "name": "Aave V3",
                    "site_url": "https://aave.com",
                    "portfolio_item_list": [
                        {"name": "Lending", "asset_token_list": [
                            {"amount": 100.0, "chain": "eth", "id": "0xusdc", "price": 1.0, "symbol": "USDC"}
                        ]},
                        {"name": "Rewards", "asset_token_list": [
                            {"amount": 1.0, "chain": "eth", "id": "0xaave", "price": 90.0, "symbol": "AAVE"}
                        ]}
                    ]
                },
                {"chain": "arb", "name": "Empty", "site_url": "", "portfolio_item_list": []}
            ]})
            .to_string(),
        )
        .create_async()
        .await;

    let api = api_for(&server, |_| {});
    let projects = api.get_project_assets(ADDR).await.unwrap();

    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].name, "Aave V3");
    assert_eq!(projects[0].chain, "eth");
    let symbols: Vec<&str> = projects[0].assets.iter().map(|t| t.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["USDC", "AAVE"]);
}

#[tokio::test]
async fn test_missing_endpoint_fails_before_sending() {
    let server = mockito::Server::new_async().await;
    let api = api_for(&server, |c| {
        c.endpoints.remove(ENDPOINT_PROJECT_LIST);
    });

    let err = api.get_project_assets(ADDR).await.unwrap_err();
    assert!(matches!(err, CheckerError::EndpointNotFound { ref key } if key == ENDPOINT_PROJECT_LIST));
}

#[tokio::test]
async fn test_absolute_endpoint_ignores_base_url() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v2/user")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({"data": {"user": {"desc": {"usd_value": 1.0}}}}).to_string())
        .expect(1)
        .create_async()
        .await;

    let absolute = format!("{}/v2/user?id={{}}", server.url());
    let api = api_for(&server, |c| {
        c.base_url = "http://unreachable.invalid".to_string();
        c.endpoints.insert("user_info".to_string(), absolute);
    });

    assert_eq!(api.get_total_balance(ADDR).await.unwrap(), 1.0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_is_reported_with_status() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/user")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("internal")
        .create_async()
        .await;

    let api = api_for(&server, |_| {});
    let err = api.get_total_balance(ADDR).await.unwrap_err();

    assert!(matches!(
        err,
        CheckerError::Http(HttpError::Status { status: 500, ref body }) if body == "internal"
    ));
}
