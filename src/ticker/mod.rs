//! Ticker identity, quote snapshots, and the shared ticker registry.
//!
//! Tickers are created once at load time from the watchlist file and live for
//! the whole session. Quote fields are refreshed in place by the fetch
//! pipeline; the symbol is the correlation key between fetch results, table
//! pages, and strategy evaluations.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

/// One tracked instrument: identity plus the latest quote snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Ticker {
    /// Page (tab) the ticker is displayed on
    pub page: u32,
    /// Exchange-qualified id, e.g. `2330.TW`
    pub id: String,
    /// Quote API symbol, e.g. `TPE:2330`
    pub symbol: String,
    /// Latest known quote values
    pub snapshot: QuoteSnapshot,
}

impl Ticker {
    pub fn new(page: u32, id: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            page,
            id: id.into(),
            symbol: symbol.into(),
            snapshot: QuoteSnapshot::default(),
        }
    }
}

/// Latest quote values for one ticker. Fields are kept as the remote service
/// returns them (strings); `None` means the attribute has never arrived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuoteSnapshot {
    pub price: Option<String>,
    pub change: Option<String>,
    pub change_pct: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub volume: Option<String>,
}

impl QuoteSnapshot {
    /// Build the successor snapshot by overlaying an update. Fields absent
    /// from the update keep their current value.
    fn merged(&self, update: &QuoteUpdate) -> Self {
        Self {
            price: update.price.clone().or_else(|| self.price.clone()),
            change: update.change.clone().or_else(|| self.change.clone()),
            change_pct: update.change_pct.clone().or_else(|| self.change_pct.clone()),
            high: update.high.clone().or_else(|| self.high.clone()),
            low: update.low.clone().or_else(|| self.low.clone()),
            volume: update.volume.clone().or_else(|| self.volume.clone()),
        }
    }
}

/// A partial quote refresh for one ticker. `None` fields carry no update;
/// upstream error markers are filtered out before an update is built.
#[derive(Debug, Clone, Default)]
pub struct QuoteUpdate {
    pub price: Option<String>,
    pub change: Option<String>,
    pub change_pct: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub volume: Option<String>,
}

/// Shared registry of all known tickers, keyed by symbol.
///
/// Snapshot replacement happens wholesale under the lock, so concurrent
/// batches are last-writer-wins per ticker and readers never observe a
/// half-updated record.
#[derive(Debug, Default)]
pub struct TickerBook {
    inner: RwLock<HashMap<String, Ticker>>,
}

impl TickerBook {
    pub fn new(tickers: Vec<Ticker>) -> Self {
        let inner = tickers
            .into_iter()
            .map(|t| (t.symbol.clone(), t))
            .collect();
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("ticker book lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All known symbols, deduplicated.
    pub fn symbols(&self) -> HashSet<String> {
        self.inner
            .read()
            .expect("ticker book lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Symbols belonging to one page.
    pub fn page_symbols(&self, page: u32) -> HashSet<String> {
        self.inner
            .read()
            .expect("ticker book lock poisoned")
            .values()
            .filter(|t| t.page == page)
            .map(|t| t.symbol.clone())
            .collect()
    }

    /// Distinct pages, ascending.
    pub fn pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self
            .inner
            .read()
            .expect("ticker book lock poisoned")
            .values()
            .map(|t| t.page)
            .collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    /// Current state of one ticker, if known.
    pub fn get(&self, symbol: &str) -> Option<Ticker> {
        self.inner
            .read()
            .expect("ticker book lock poisoned")
            .get(symbol)
            .cloned()
    }

    /// Apply a quote update to a ticker. Returns false for unknown symbols,
    /// which callers silently skip.
    pub fn merge_quote(&self, symbol: &str, update: &QuoteUpdate) -> bool {
        let mut book = self.inner.write().expect("ticker book lock poisoned");
        match book.get_mut(symbol) {
            Some(ticker) => {
                ticker.snapshot = ticker.snapshot.merged(update);
                true
            }
            None => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Watchlist loading
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WatchlistPage {
    key: u32,
    stocks: Vec<WatchlistEntry>,
}

#[derive(Debug, Deserialize)]
struct WatchlistEntry {
    id: String,
    region: String,
}

/// Load the watchlist file: `[{"key": 1, "stocks": [{"id": "2330.TW", "region": "TW"}]}]`.
pub fn load_watchlist<P: AsRef<Path>>(path: P) -> Result<Vec<Ticker>> {
    let raw = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read watchlist {:?}", path.as_ref()))?;
    parse_watchlist(&raw)
}

/// Parse watchlist JSON into tickers.
pub fn parse_watchlist(raw: &str) -> Result<Vec<Ticker>> {
    let pages: Vec<WatchlistPage> =
        serde_json::from_str(raw).context("Failed to parse watchlist JSON")?;

    Ok(pages
        .into_iter()
        .flat_map(|page| {
            page.stocks
                .into_iter()
                .map(move |entry| {
                    let symbol = api_symbol(&entry.id, &entry.region);
                    Ticker::new(page.key, entry.id, symbol)
                })
        })
        .collect())
}

/// Map an exchange-qualified id to the quote API symbol. Taiwanese listings
/// use the `TPE:` prefix with the exchange suffix stripped; other regions pass
/// the id through unchanged.
fn api_symbol(id: &str, region: &str) -> String {
    if region == "TW" {
        let code = id.split('.').next().unwrap_or(id);
        format!("TPE:{}", code)
    } else {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(price: Option<&str>, high: Option<&str>) -> QuoteUpdate {
        QuoteUpdate {
            price: price.map(str::to_string),
            high: high.map(str::to_string),
            ..QuoteUpdate::default()
        }
    }

    #[test]
    fn test_api_symbol_tw_region() {
        assert_eq!(api_symbol("2330.TW", "TW"), "TPE:2330");
        assert_eq!(api_symbol("0050.TW", "TW"), "TPE:0050");
    }

    #[test]
    fn test_api_symbol_other_region_passthrough() {
        assert_eq!(api_symbol("AAPL", "US"), "AAPL");
    }

    #[test]
    fn test_parse_watchlist() {
        let raw = r#"[
            {"key": 1, "stocks": [
                {"id": "2330.TW", "region": "TW"},
                {"id": "2880.TW", "region": "TW"}
            ]},
            {"key": 2, "stocks": [{"id": "AAPL", "region": "US"}]}
        ]"#;

        let tickers = parse_watchlist(raw).unwrap();
        assert_eq!(tickers.len(), 3);
        assert_eq!(tickers[0].page, 1);
        assert_eq!(tickers[0].symbol, "TPE:2330");
        assert_eq!(tickers[2].page, 2);
        assert_eq!(tickers[2].symbol, "AAPL");
    }

    #[test]
    fn test_parse_watchlist_rejects_garbage() {
        assert!(parse_watchlist("not json").is_err());
    }

    #[test]
    fn test_merge_quote_overlays_only_present_fields() {
        let book = TickerBook::new(vec![Ticker::new(1, "2330.TW", "TPE:2330")]);

        assert!(book.merge_quote("TPE:2330", &update(Some("600"), Some("610"))));
        assert!(book.merge_quote("TPE:2330", &update(Some("605"), None)));

        let ticker = book.get("TPE:2330").unwrap();
        assert_eq!(ticker.snapshot.price.as_deref(), Some("605"));
        // high was absent from the second update and keeps its prior value
        assert_eq!(ticker.snapshot.high.as_deref(), Some("610"));
    }

    #[test]
    fn test_merge_quote_unknown_symbol_is_skipped() {
        let book = TickerBook::new(vec![Ticker::new(1, "2330.TW", "TPE:2330")]);
        assert!(!book.merge_quote("TPE:9999", &update(Some("1"), None)));
    }

    #[test]
    fn test_page_symbols_and_pages() {
        let book = TickerBook::new(vec![
            Ticker::new(1, "2330.TW", "TPE:2330"),
            Ticker::new(1, "2880.TW", "TPE:2880"),
            Ticker::new(2, "AAPL", "AAPL"),
        ]);

        assert_eq!(book.pages(), vec![1, 2]);
        let page1 = book.page_symbols(1);
        assert!(page1.contains("TPE:2330"));
        assert!(page1.contains("TPE:2880"));
        assert_eq!(page1.len(), 2);
        assert!(book.page_symbols(3).is_empty());
    }
}
