//! User-scripted notification strategies: evaluation engine, persisted
//! per-symbol settings, and the periodic sweep that ties them together.

pub mod engine;
pub mod store;
pub mod sweeper;

pub use engine::{StrategyEngine, StrategyError, DECISION_FN};
pub use store::{NotifyPeriod, StrategyRecord, StrategyStore};
pub use sweeper::{NotificationEvent, StrategySweeper};
