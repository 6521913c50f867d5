//! Background strategy sweep.
//!
//! Every sweep interval, each symbol with notifications enabled is evaluated
//! against its current snapshot. A true decision emits a notification event;
//! script failures are logged per symbol and never abort the rest of the
//! sweep. Repeat notifications are throttled by the symbol's notify period.

use crate::strategy::engine::StrategyEngine;
use crate::strategy::store::{StrategyRecord, StrategyStore};
use crate::ticker::TickerBook;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// One triggered strategy. Consumers decide how to surface it (the CLI run
/// loop logs it; a desktop front end would pop a toast).
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub symbol: String,
    pub id: String,
    pub price: Option<String>,
    pub at: DateTime<Utc>,
}

/// Periodically re-evaluates all enabled strategies against live snapshots.
pub struct StrategySweeper {
    engine: StrategyEngine,
    store: Arc<StrategyStore>,
    book: Arc<TickerBook>,
    events: mpsc::Sender<NotificationEvent>,
    last_notified: HashMap<String, DateTime<Utc>>,
}

impl StrategySweeper {
    pub fn new(
        engine: StrategyEngine,
        store: Arc<StrategyStore>,
        book: Arc<TickerBook>,
        events: mpsc::Sender<NotificationEvent>,
    ) -> Self {
        Self {
            engine,
            store,
            book,
            events,
            last_notified: HashMap::new(),
        }
    }

    /// Run sweeps forever at the given interval. Exits when the event
    /// channel closes (receiver dropped on shutdown).
    pub async fn run(mut self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(interval_secs = interval.as_secs(), "Strategy sweeper started");
        loop {
            ticker.tick().await;
            if self.events.is_closed() {
                info!("Event channel closed, sweeper stopping");
                return;
            }
            self.sweep(Utc::now());
        }
    }

    /// One pass over every enabled symbol. Returns the number of events
    /// emitted.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let records = match self.store.enabled() {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to load enabled strategies: {e:#}");
                return 0;
            }
        };

        let mut emitted = 0;
        for record in records {
            // Scripts are re-read from the store each cycle, so an edit takes
            // effect on the next sweep.
            let Some(ticker) = self.book.get(&record.symbol) else {
                debug!(symbol = %record.symbol, "Strategy for unknown ticker, skipping");
                continue;
            };

            match self.engine.evaluate(&record.script, &ticker) {
                Ok(true) => {
                    if self.should_notify(&record, now) {
                        let event = NotificationEvent {
                            symbol: ticker.symbol.clone(),
                            id: ticker.id.clone(),
                            price: ticker.snapshot.price.clone(),
                            at: now,
                        };
                        if self.events.try_send(event).is_ok() {
                            self.last_notified.insert(record.symbol.clone(), now);
                            emitted += 1;
                        } else {
                            warn!(symbol = %record.symbol, "Notification channel full, dropping event");
                        }
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(symbol = %record.symbol, "Strategy evaluation failed: {e}");
                }
            }
        }

        emitted
    }

    /// Throttle repeat notifications to the symbol's notify period.
    fn should_notify(&self, record: &StrategyRecord, now: DateTime<Utc>) -> bool {
        let Some(window) = record.period.window() else {
            return false; // period None is filtered out upstream, stay quiet
        };

        match self.last_notified.get(&record.symbol) {
            Some(last) => now.signed_duration_since(*last) >= window,
            None => true,
        }
    }
}
