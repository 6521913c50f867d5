//! # Quote Watcher
//!
//! Polls a remote quote source for a watchlist of ticker symbols and
//! evaluates user-scripted strategies that decide when to raise a
//! notification.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `ticker`: Ticker identity, quote snapshots, and the shared registry
//! - `fetch`: Rate-limited batched fetching (position pool, quote client,
//!   batch dispatcher)
//! - `strategy`: Script engine, persisted per-symbol settings, and the
//!   periodic notification sweep

pub mod config;
pub mod fetch;
pub mod strategy;
pub mod ticker;

pub use config::Config;
