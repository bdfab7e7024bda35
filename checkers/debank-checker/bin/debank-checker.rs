use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use core_logic::{setup_logger, ProxyManager, ProxyPool};
use debank_checker::config::AppConfig;
use debank_checker::handler::{output_paths, run_stamp};
use debank_checker::{accounts_from_lines, read_lines, CheckerHandler};
use dotenv::dotenv;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config/config.toml")]
    config: String,

    /// Address list, one per line
    #[arg(short, long)]
    addresses: Option<String>,

    /// Override `min_usd_amount`
    #[arg(long)]
    min_usd: Option<f64>,

    /// Override `concurrency` (minimum workers)
    #[arg(short, long)]
    workers: Option<usize>,

    #[arg(long, default_value = "false")]
    no_proxy: bool,

    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check every address in the list (default)
    Check,
    /// Parse the proxy file and print the normalised list
    Proxies,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args = Args::parse();

    // Fall back to the crate-local config when run from the workspace root
    let config_path = if Path::new(&args.config).exists() {
        args.config.clone()
    } else if args.config == "config/config.toml"
        && Path::new("checkers/debank-checker/config/config.toml").exists()
    {
        "checkers/debank-checker/config/config.toml".to_string()
    } else {
        args.config.clone()
    };

    let mut config = AppConfig::from_path(&config_path).context("Failed to load config")?;
    apply_overrides(&mut config, &args);

    let level = if args.quiet {
        "error".to_string()
    } else {
        env::var("RUST_LOG").unwrap_or_else(|_| config.logger_level.clone())
    };

    let stamp = run_stamp();
    let log_file = PathBuf::from(&config.output_dir).join(format!("run_{}.log", stamp));
    let _log_guard = setup_logger(&level, Some(&log_file))?;

    match args.command.unwrap_or(Commands::Check) {
        Commands::Proxies => print_proxies(&config),
        Commands::Check => run_check(&config, &stamp).await,
    }
}

fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(path) = &args.addresses {
        config.addresses_path = path.clone();
    }
    if let Some(min) = args.min_usd {
        config.min_usd_amount = min.max(0.0);
    }
    if let Some(workers) = args.workers {
        config.concurrency = workers.max(1);
    }
    if args.no_proxy {
        config.debank.use_proxy_pool = false;
    }
}

fn load_pool(config: &AppConfig) -> Result<Option<ProxyPool>> {
    if !config.debank.use_proxy_pool {
        return Ok(None);
    }

    let proxies = ProxyManager::load_proxies(&config.debank.proxy_file_path)
        .context("Failed to load proxies")?;
    let urls = config.debank.pool_urls(&proxies);
    if config.debank.rotate_proxy && proxies.len() > 1 {
        info!(
            "Rotating proxy enabled, using the first entry and ignoring {} others",
            proxies.len() - 1
        );
    }
    let pool = ProxyPool::new(urls).context("Proxy pool is empty")?;

    info!(target: "task_result", "Loaded {} proxies", pool.len());
    Ok(Some(pool))
}

fn print_proxies(config: &AppConfig) -> Result<()> {
    let path = &config.debank.proxy_file_path;
    if path.is_empty() {
        warn!("No proxy_file_path configured");
        return Ok(());
    }

    let proxies = ProxyManager::load_proxies(path).context("Failed to load proxies")?;
    for proxy in &proxies {
        println!("{}", proxy.url());
    }
    info!(target: "task_result", "{} proxies parsed from {}", proxies.len(), path);
    Ok(())
}

async fn run_check(config: &AppConfig, stamp: &str) -> Result<()> {
    let lines = read_lines(&config.addresses_path).context("Failed to read addresses file")?;
    let accounts = accounts_from_lines(&lines);
    if accounts.is_empty() {
        error!("No valid addresses in {}", config.addresses_path);
        return Ok(());
    }

    let pool = load_pool(config)?;

    info!(target: "task_result", "Accounts: {}", accounts.len());
    info!(target: "task_result", "Min workers: {}", config.concurrency);
    info!(target: "task_result", "Min USD amount: {:.2}", config.min_usd_amount);
    info!(
        target: "task_result",
        "Proxy pool: {}",
        if pool.is_some() { "on" } else { "off" }
    );

    let handler = CheckerHandler::from_config(config, pool, stamp).await?;
    let summary = handler.run(accounts).await?;

    let (results, logs) = output_paths(&config.output_dir, stamp);
    info!(
        target: "task_result",
        "Done: {} submitted, {} reported, {} FAILED, ${:.2} total",
        summary.submitted,
        summary.reported,
        summary.failed,
        summary.total_usd_value
    );
    info!(target: "task_result", "Results: {}", results.display());
    info!(target: "task_result", "Error log: {}", logs.display());
    Ok(())
}
