//! Scripted notification strategies.
//!
//! Users author a small script per symbol that decides whether a quote should
//! raise a notification. The contract: the script defines
//! `enableNotification(ticker)` and returns a boolean. The ticker argument is
//! an object map exposing the identity fields as strings and the quote fields
//! as numbers where they parse, so scripts can write `t.price > 500`.

use crate::ticker::Ticker;
use rhai::{Dynamic, Engine, Map, Scope};
use thiserror::Error;

/// Name of the decision function every strategy script must define.
pub const DECISION_FN: &str = "enableNotification";

/// Failure modes of one strategy evaluation. Each is local to the symbol
/// being evaluated and never aborts sibling evaluations.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// The script compiled but does not define `enableNotification(ticker)`
    /// with exactly one parameter. Detected before invocation.
    #[error("script does not define an `enableNotification(ticker)` function")]
    MissingFunction,
    /// The script text failed to compile.
    #[error("script compile error: {0}")]
    Compile(String),
    /// The decision function (or the script's top-level code) raised an error.
    #[error("script runtime error: {0}")]
    Runtime(String),
    /// The decision function returned something other than a boolean.
    /// Rejected rather than coerced, so a strategy that silently stops
    /// returning a boolean is surfaced instead of misread.
    #[error("decision function returned `{0}`, expected a boolean")]
    NonBoolean(String),
}

/// Compiles and evaluates strategy scripts against ticker snapshots.
///
/// The engine holds no per-evaluation state, so one instance is shared safely
/// across tasks; each call compiles the script and runs it in a fresh scope.
pub struct StrategyEngine {
    engine: Engine,
}

impl StrategyEngine {
    pub fn new() -> Self {
        Self {
            engine: Engine::new(),
        }
    }

    /// Evaluate a script's decision function against one ticker snapshot.
    pub fn evaluate(&self, script: &str, ticker: &Ticker) -> Result<bool, StrategyError> {
        let ast = self
            .engine
            .compile(script)
            .map_err(|e| StrategyError::Compile(e.to_string()))?;

        let defines_decision = ast
            .iter_functions()
            .any(|f| f.name == DECISION_FN && f.params.len() == 1);
        if !defines_decision {
            return Err(StrategyError::MissingFunction);
        }

        let mut scope = Scope::new();
        let result: Dynamic = self
            .engine
            .call_fn(&mut scope, &ast, DECISION_FN, (ticker_map(ticker),))
            .map_err(|e| StrategyError::Runtime(e.to_string()))?;

        result
            .as_bool()
            .map_err(|actual| StrategyError::NonBoolean(actual.to_string()))
    }
}

impl Default for StrategyEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the ticker-shaped script argument.
fn ticker_map(ticker: &Ticker) -> Map {
    let mut map = Map::new();
    map.insert("symbol".into(), ticker.symbol.clone().into());
    map.insert("id".into(), ticker.id.clone().into());
    map.insert("page".into(), Dynamic::from(ticker.page as i64));
    map.insert("price".into(), numeric(&ticker.snapshot.price));
    map.insert("change".into(), numeric(&ticker.snapshot.change));
    map.insert("changePct".into(), numeric(&ticker.snapshot.change_pct));
    map.insert("high".into(), numeric(&ticker.snapshot.high));
    map.insert("low".into(), numeric(&ticker.snapshot.low));
    map.insert("volume".into(), numeric(&ticker.snapshot.volume));
    map
}

/// Quote fields reach scripts as floats when they parse; a field that never
/// arrived (or failed upstream) becomes unit. Rhai comparisons against unit
/// are false, so a strategy stays quiet until its quote arrives.
fn numeric(field: &Option<String>) -> Dynamic {
    field
        .as_ref()
        .and_then(|value| value.parse::<f64>().ok())
        .map(Dynamic::from)
        .unwrap_or(Dynamic::UNIT)
}
