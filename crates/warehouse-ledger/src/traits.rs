use async_trait::async_trait;
use warehouse_types::{StockDelta, StockLevel, StockQuery, Transaction};

use crate::error::LedgerResult;

/// Storage boundary behind the stock ledger.
///
/// All implementations must satisfy these invariants:
/// - `apply_delta` appends the transaction, upserts the running total and
///   reads it back as one atomic unit. Either all three persist or none do.
/// - Concurrent writes to the same key serialize; every delta is counted
///   exactly once.
/// - A stock level always equals the sum of the transaction deltas for its key.
/// - Reads that match nothing return an empty `Vec`, never an error.
#[async_trait]
pub trait StockStore: Send + Sync {
    /// Apply one delta and return the new quantity for its key.
    async fn apply_delta(&self, delta: &StockDelta) -> LedgerResult<i64>;

    /// Apply every delta in one atomic unit.
    ///
    /// Returns the new quantity after each delta, in input order. When the
    /// same key appears twice, the second result includes the first delta.
    async fn apply_batch(&self, deltas: &[StockDelta]) -> LedgerResult<Vec<i64>>;

    /// Current stock levels matching `query`, ordered by warehouse.
    async fn stock_levels(&self, query: &StockQuery) -> LedgerResult<Vec<StockLevel>>;

    /// Transactions matching `query`, oldest first.
    async fn history(&self, query: &StockQuery) -> LedgerResult<Vec<Transaction>>;

    /// Short backend name for logs and the info endpoint.
    fn backend(&self) -> &'static str;
}
