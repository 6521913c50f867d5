//! Batched quote fetching over the position pool.
//!
//! An arbitrary-size symbol set is split into fixed-size chunks, each chunk
//! becomes one outbound request, and the batch resolves once every chunk has
//! settled. The pool bounds concurrency implicitly: dispatching more chunks
//! than there are slots just makes the excess chunks wait in `acquire`.

use crate::fetch::client::{QuoteClient, QuoteRow};
use crate::ticker::TickerBook;
use anyhow::Result;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Terminal state of one chunk.
#[derive(Debug)]
pub struct ChunkOutcome {
    /// Symbols requested by this chunk
    pub symbols: Vec<String>,
    /// Number of rows matched to known tickers, or the transport/parse error
    pub result: Result<usize>,
}

/// Aggregate outcome of one batch. Produced exactly once, after the last
/// chunk settles; a failed chunk never suppresses it.
#[derive(Debug)]
pub struct BatchReport {
    pub chunks: Vec<ChunkOutcome>,
}

impl BatchReport {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn succeeded(&self) -> usize {
        self.chunks.iter().filter(|c| c.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.chunks.len() - self.succeeded()
    }

    /// Rows applied to the ticker book across all chunks.
    pub fn matched_rows(&self) -> usize {
        self.chunks
            .iter()
            .filter_map(|c| c.result.as_ref().ok())
            .sum()
    }
}

/// Split a symbol set into chunks of at most `chunk_size` symbols.
///
/// Iteration order over the set is unspecified, so chunk boundaries are not
/// deterministic across runs; the partition itself is exact: every symbol
/// lands in exactly one chunk.
pub fn partition(symbols: &HashSet<String>, chunk_size: usize) -> Vec<Vec<String>> {
    let chunk_size = chunk_size.max(1);
    let all: Vec<String> = symbols.iter().cloned().collect();

    all.chunks(chunk_size).map(<[String]>::to_vec).collect()
}

/// Fans a symbol set out over the quote client and folds results back into
/// the ticker book.
pub struct BatchDispatcher {
    client: QuoteClient,
    book: Arc<TickerBook>,
}

impl BatchDispatcher {
    pub fn new(client: QuoteClient, book: Arc<TickerBook>) -> Self {
        Self { client, book }
    }

    /// Fetch quotes for every symbol in the set, `chunk_size` symbols per
    /// request, all chunks concurrently. Resolves after the last chunk
    /// reaches a terminal state, success or failure.
    #[instrument(skip(self, symbols), fields(symbols = symbols.len()))]
    pub async fn fetch_batch(
        &self,
        symbols: &HashSet<String>,
        chunk_size: usize,
        attribute_list: &str,
    ) -> BatchReport {
        let chunks = partition(symbols, chunk_size);
        debug!(chunks = chunks.len(), chunk_size, "Dispatching batch");

        let outcomes = join_all(chunks.into_iter().map(|chunk| async move {
            let ticker_list = chunk.join(",");
            let result = match self.client.fetch(&ticker_list, attribute_list).await {
                Ok(rows) => Ok(apply_rows(&self.book, &rows)),
                Err(e) => {
                    warn!(chunk = %ticker_list, "Chunk fetch failed: {e:#}");
                    Err(e)
                }
            };

            ChunkOutcome {
                symbols: chunk,
                result,
            }
        }))
        .await;

        let report = BatchReport { chunks: outcomes };
        info!(
            chunks = report.chunk_count(),
            failed = report.failed(),
            matched = report.matched_rows(),
            "Batch complete"
        );

        report
    }
}

/// Merge response rows into the book by the `ticker` correlation key.
/// Unmatched rows are skipped; that symbol simply sees no update this cycle.
pub fn apply_rows(book: &TickerBook, rows: &[QuoteRow]) -> usize {
    rows.iter()
        .filter(|row| {
            let matched = book.merge_quote(&row.ticker, &row.to_update());
            if !matched {
                debug!(ticker = %row.ticker, "Ignoring row for unknown ticker");
            }
            matched
        })
        .count()
}
