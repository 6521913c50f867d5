//! SQLite persistence for per-symbol strategy settings.
//!
//! Stores exactly two things per symbol: the strategy script text and how
//! often a triggered strategy may re-notify. Script text is replaced
//! wholesale on edit and is not versioned.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// How often a triggered strategy may re-notify. `None` disables the symbol
/// entirely: it is skipped by the background sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyPeriod {
    None,
    Hourly,
    Daily,
}

impl NotifyPeriod {
    pub fn as_i64(self) -> i64 {
        match self {
            NotifyPeriod::None => 0,
            NotifyPeriod::Hourly => 1,
            NotifyPeriod::Daily => 2,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => NotifyPeriod::Hourly,
            2 => NotifyPeriod::Daily,
            _ => NotifyPeriod::None,
        }
    }

    /// Minimum gap between repeat notifications for one symbol.
    pub fn window(self) -> Option<chrono::Duration> {
        match self {
            NotifyPeriod::None => None,
            NotifyPeriod::Hourly => Some(chrono::Duration::hours(1)),
            NotifyPeriod::Daily => Some(chrono::Duration::days(1)),
        }
    }
}

/// Persisted strategy settings for one symbol.
#[derive(Debug, Clone)]
pub struct StrategyRecord {
    pub symbol: String,
    pub script: String,
    pub period: NotifyPeriod,
}

/// SQLite-backed store of strategy settings.
pub struct StrategyStore {
    conn: Mutex<Connection>,
}

impl StrategyStore {
    /// Open (or create) the store at the given path.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create data directory {:?}", parent))?;
            }
        }

        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        info!("Strategy store initialized at {:?}", db_path.as_ref());
        Ok(store)
    }

    /// In-memory store, used by tests and the one-shot CLI paths.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS notify_settings (
                ticker_symbol TEXT PRIMARY KEY,
                script TEXT NOT NULL,
                notify_period INTEGER NOT NULL DEFAULT 0
            );
            "#,
        )
        .context("Failed to initialize schema")?;
        Ok(())
    }

    /// Insert or replace the settings for one symbol.
    pub fn upsert(&self, symbol: &str, script: &str, period: NotifyPeriod) -> Result<()> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.execute(
            r#"
            INSERT INTO notify_settings (ticker_symbol, script, notify_period)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(ticker_symbol)
            DO UPDATE SET script = excluded.script, notify_period = excluded.notify_period
            "#,
            params![symbol, script, period.as_i64()],
        )
        .with_context(|| format!("Failed to upsert strategy for {symbol}"))?;
        Ok(())
    }

    /// Fetch the settings for one symbol, if any.
    pub fn get(&self, symbol: &str) -> Result<Option<StrategyRecord>> {
        let conn = self.conn.lock().expect("store lock poisoned");
        conn.query_row(
            "SELECT ticker_symbol, script, notify_period FROM notify_settings
             WHERE ticker_symbol = ?1",
            params![symbol],
            |row| {
                Ok(StrategyRecord {
                    symbol: row.get(0)?,
                    script: row.get(1)?,
                    period: NotifyPeriod::from_i64(row.get(2)?),
                })
            },
        )
        .optional()
        .with_context(|| format!("Failed to load strategy for {symbol}"))
    }

    /// All symbols with notifications enabled (period != None).
    pub fn enabled(&self) -> Result<Vec<StrategyRecord>> {
        let conn = self.conn.lock().expect("store lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT ticker_symbol, script, notify_period FROM notify_settings
             WHERE notify_period != 0",
        )?;

        let records = stmt
            .query_map([], |row| {
                Ok(StrategyRecord {
                    symbol: row.get(0)?,
                    script: row.get(1)?,
                    period: NotifyPeriod::from_i64(row.get(2)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to load enabled strategies")?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_and_get_roundtrip() {
        let store = StrategyStore::in_memory().unwrap();
        store
            .upsert("TPE:2330", "fn enableNotification(t) { true }", NotifyPeriod::Hourly)
            .unwrap();

        let record = store.get("TPE:2330").unwrap().unwrap();
        assert_eq!(record.symbol, "TPE:2330");
        assert_eq!(record.period, NotifyPeriod::Hourly);
    }

    #[test]
    fn test_upsert_replaces_script_wholesale() {
        let store = StrategyStore::in_memory().unwrap();
        store.upsert("TPE:2330", "old", NotifyPeriod::Hourly).unwrap();
        store.upsert("TPE:2330", "new", NotifyPeriod::Daily).unwrap();

        let record = store.get("TPE:2330").unwrap().unwrap();
        assert_eq!(record.script, "new");
        assert_eq!(record.period, NotifyPeriod::Daily);
    }

    #[test]
    fn test_get_unknown_symbol_is_none() {
        let store = StrategyStore::in_memory().unwrap();
        assert!(store.get("TPE:9999").unwrap().is_none());
    }

    #[test]
    fn test_enabled_excludes_period_none() {
        let store = StrategyStore::in_memory().unwrap();
        store.upsert("TPE:2330", "a", NotifyPeriod::Hourly).unwrap();
        store.upsert("TPE:2880", "b", NotifyPeriod::None).unwrap();
        store.upsert("AAPL", "c", NotifyPeriod::Daily).unwrap();

        let enabled = store.enabled().unwrap();
        let symbols: Vec<&str> = enabled.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(enabled.len(), 2);
        assert!(symbols.contains(&"TPE:2330"));
        assert!(symbols.contains(&"AAPL"));
    }

    #[test]
    fn test_notify_period_windows() {
        assert_eq!(NotifyPeriod::None.window(), None);
        assert_eq!(
            NotifyPeriod::Hourly.window(),
            Some(chrono::Duration::hours(1))
        );
        assert_eq!(NotifyPeriod::Daily.window(), Some(chrono::Duration::days(1)));
    }

    #[test]
    fn test_period_encoding_roundtrip() {
        for period in [NotifyPeriod::None, NotifyPeriod::Hourly, NotifyPeriod::Daily] {
            assert_eq!(NotifyPeriod::from_i64(period.as_i64()), period);
        }
        // unknown values degrade to disabled
        assert_eq!(NotifyPeriod::from_i64(99), NotifyPeriod::None);
    }
}
