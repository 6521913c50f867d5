//! Quote Watcher - Main Entry Point
//!
//! Headless watcher: periodic quote refreshes plus a background strategy
//! sweep that raises notification events.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use quote_watcher::config::Config;
use quote_watcher::fetch::{BatchDispatcher, PositionPool, QuoteClient};
use quote_watcher::strategy::{
    NotifyPeriod, StrategyEngine, StrategyStore, StrategySweeper,
};
use quote_watcher::ticker::{self, TickerBook};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Quote Watcher CLI
#[derive(Parser)]
#[command(name = "quote-watcher")]
#[command(version, about = "Batched quote polling with scripted notifications")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the watcher loop (the default when no subcommand is given)
    Run,

    /// Fetch quotes once for the watchlist (or a subset) and print them
    Fetch {
        /// Symbols to fetch; defaults to the whole watchlist
        symbols: Vec<String>,
    },

    /// Validate a strategy script against a symbol's live quote
    Check {
        /// Symbol the script is written for
        #[arg(short, long)]
        symbol: String,

        /// Path to the script file
        #[arg(short = 'f', long)]
        script: PathBuf,

        /// Persist the script for this symbol after a successful check
        #[arg(long)]
        save: bool,

        /// Notify period stored alongside the script
        #[arg(long, value_enum, default_value = "hourly")]
        period: PeriodArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PeriodArg {
    None,
    Hourly,
    Daily,
}

impl From<PeriodArg> for NotifyPeriod {
    fn from(arg: PeriodArg) -> Self {
        match arg {
            PeriodArg::None => NotifyPeriod::None,
            PeriodArg::Hourly => NotifyPeriod::Hourly,
            PeriodArg::Daily => NotifyPeriod::Daily,
        }
    }
}

/// Fetch pipeline wired from configuration.
struct Pipeline {
    book: Arc<TickerBook>,
    dispatcher: BatchDispatcher,
    chunk_size: usize,
    attribute_list: String,
}

fn build_pipeline(config: &Config) -> Result<Pipeline> {
    let tickers = ticker::load_watchlist(&config.storage.watchlist_path)?;
    anyhow::ensure!(!tickers.is_empty(), "watchlist is empty");
    info!(tickers = tickers.len(), "Watchlist loaded");

    let book = Arc::new(TickerBook::new(tickers));
    let pool = Arc::new(PositionPool::new(config.quote_api.pool_size));
    let client = QuoteClient::new(&config.quote_api, pool)?;
    let dispatcher = BatchDispatcher::new(client, Arc::clone(&book));

    Ok(Pipeline {
        book,
        dispatcher,
        chunk_size: config.quote_api.chunk_size,
        attribute_list: config.quote_api.attributes.join(","),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = Config::load()?;
    config.validate()?;

    match cli.command {
        Some(Commands::Fetch { symbols }) => fetch_once(&config, symbols).await,
        Some(Commands::Check {
            symbol,
            script,
            save,
            period,
        }) => check_script(&config, &symbol, &script, save, period.into()).await,
        Some(Commands::Run) | None => run_watcher(&config).await,
    }
}

/// Default mode: full refresh, then page-by-page refreshes and the strategy
/// sweep until shutdown.
async fn run_watcher(config: &Config) -> Result<()> {
    info!("Quote Watcher v{} starting", env!("CARGO_PKG_VERSION"));

    let pipeline = build_pipeline(config)?;
    let store = Arc::new(StrategyStore::new(&config.storage.db_path)?);

    let (event_tx, mut event_rx) = mpsc::channel(64);
    let sweeper = StrategySweeper::new(
        StrategyEngine::new(),
        Arc::clone(&store),
        Arc::clone(&pipeline.book),
        event_tx,
    );
    tokio::spawn(sweeper.run(Duration::from_secs(config.schedule.sweep_secs)));

    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            info!(
                symbol = %event.symbol,
                id = %event.id,
                price = event.price.as_deref().unwrap_or("-"),
                "Strategy triggered: take order"
            );
        }
    });

    // Initial full-universe refresh.
    let report = pipeline
        .dispatcher
        .fetch_batch(
            &pipeline.book.symbols(),
            pipeline.chunk_size,
            &pipeline.attribute_list,
        )
        .await;
    if report.failed() > 0 {
        warn!(failed = report.failed(), "Initial refresh had failing chunks");
    }

    // Cycle through pages on the reload interval, one page per tick.
    let pages = pipeline.book.pages();
    let mut page_index = 0usize;
    let mut reload = tokio::time::interval(Duration::from_secs(config.schedule.page_reload_secs));
    reload.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    reload.tick().await; // first tick fires immediately, skip it

    info!(pages = pages.len(), "Entering refresh loop");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                return Ok(());
            }
            _ = reload.tick() => {
                let page = pages[page_index % pages.len()];
                page_index += 1;

                let symbols = pipeline.book.page_symbols(page);
                if symbols.is_empty() {
                    continue;
                }

                let report = pipeline
                    .dispatcher
                    .fetch_batch(&symbols, pipeline.chunk_size, &pipeline.attribute_list)
                    .await;
                if report.failed() > 0 {
                    error!(page, failed = report.failed(), "Page refresh had failing chunks");
                }
            }
        }
    }
}

/// One-shot batch fetch, printing the refreshed snapshots.
async fn fetch_once(config: &Config, symbols: Vec<String>) -> Result<()> {
    let pipeline = build_pipeline(config)?;

    let requested = if symbols.is_empty() {
        pipeline.book.symbols()
    } else {
        symbols.into_iter().collect()
    };

    let report = pipeline
        .dispatcher
        .fetch_batch(&requested, pipeline.chunk_size, &pipeline.attribute_list)
        .await;

    info!(
        chunks = report.chunk_count(),
        failed = report.failed(),
        matched = report.matched_rows(),
        "Fetch finished"
    );

    let mut symbols: Vec<String> = requested.into_iter().collect();
    symbols.sort();
    for symbol in symbols {
        match pipeline.book.get(&symbol) {
            Some(ticker) => {
                let s = &ticker.snapshot;
                println!(
                    "{:<12} price={:<8} change={:<8} high={:<8} low={:<8}",
                    ticker.symbol,
                    s.price.as_deref().unwrap_or("-"),
                    s.change.as_deref().unwrap_or("-"),
                    s.high.as_deref().unwrap_or("-"),
                    s.low.as_deref().unwrap_or("-"),
                );
            }
            None => println!("{symbol:<12} (not in watchlist)"),
        }
    }

    Ok(())
}

/// Validate a script against a symbol's freshly fetched quote, optionally
/// persisting it.
async fn check_script(
    config: &Config,
    symbol: &str,
    script_path: &PathBuf,
    save: bool,
    period: NotifyPeriod,
) -> Result<()> {
    let script = std::fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read script {script_path:?}"))?;

    let pipeline = build_pipeline(config)?;
    anyhow::ensure!(
        pipeline.book.get(symbol).is_some(),
        "symbol {symbol} is not in the watchlist"
    );

    let requested = std::iter::once(symbol.to_string()).collect();
    pipeline
        .dispatcher
        .fetch_batch(&requested, pipeline.chunk_size, &pipeline.attribute_list)
        .await;

    let ticker = pipeline
        .book
        .get(symbol)
        .expect("symbol presence checked above");

    let engine = StrategyEngine::new();
    match engine.evaluate(&script, &ticker) {
        Ok(decision) => {
            info!(symbol, decision, "Script evaluated");
            println!("{symbol}: enableNotification -> {decision}");
        }
        Err(e) => {
            error!(symbol, "Script rejected: {e}");
            anyhow::bail!("script rejected: {e}");
        }
    }

    if save {
        let store = StrategyStore::new(&config.storage.db_path)?;
        store.upsert(symbol, &script, period)?;
        info!(symbol, "Strategy saved");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_invocation_defaults_to_watcher() {
        let cli = Cli::try_parse_from(["quote-watcher"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_run_subcommand_parses() {
        let cli = Cli::try_parse_from(["quote-watcher", "run"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Run)));
    }

    #[test]
    fn test_check_requires_symbol_and_script() {
        assert!(Cli::try_parse_from(["quote-watcher", "check"]).is_err());

        let cli = Cli::try_parse_from([
            "quote-watcher",
            "check",
            "--symbol",
            "TPE:2330",
            "-f",
            "strategy.rhai",
        ])
        .unwrap();
        let Some(Commands::Check { symbol, save, period, .. }) = cli.command else {
            panic!("expected the check subcommand");
        };
        assert_eq!(symbol, "TPE:2330");
        assert!(!save);
        assert!(matches!(period, PeriodArg::Hourly));
    }
}
