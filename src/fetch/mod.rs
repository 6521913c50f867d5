//! Rate-limited batched quote fetching.
//!
//! The pipeline is pool -> client -> dispatcher: the position pool bounds
//! requests in flight, the client performs one request per borrowed slot, and
//! the dispatcher fans a symbol set out in chunks and folds the results back
//! into the ticker book.

pub mod client;
pub mod dispatcher;
pub mod pool;

pub use client::{QuoteClient, QuoteRow, ERROR_MARKER};
pub use dispatcher::{BatchDispatcher, BatchReport, ChunkOutcome};
pub use pool::{PositionPool, PositionToken};
