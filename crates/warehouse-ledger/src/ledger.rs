use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use warehouse_types::{StockDelta, StockKey, StockQuery, Transaction};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::StockStore;

/// Upper bound on one atomic unit against the store.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Stock quantities keyed by warehouse.
pub type WarehouseQuantities = BTreeMap<String, i64>;

/// Stock quantities keyed by SKU, then warehouse.
pub type SkuQuantities = BTreeMap<String, WarehouseQuantities>;

/// One line of a batch update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchEntry {
    pub key: StockKey,
    pub delta: i64,
    /// Recorded as the description of the resulting transaction.
    pub label: String,
}

impl BatchEntry {
    pub fn new(key: StockKey, delta: i64, label: impl Into<String>) -> Self {
        Self {
            key,
            delta,
            label: label.into(),
        }
    }
}

/// The stock ledger.
///
/// Owns the injected [`StockStore`], validates input before any storage
/// access, and bounds every store call with a timeout. Cloning is cheap and
/// shares the store.
#[derive(Clone)]
pub struct StockLedger {
    store: Arc<dyn StockStore>,
    timeout: Duration,
}

impl StockLedger {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self {
            store,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound every store call, commit included, by `timeout`.
    ///
    /// A [`LedgerError::Timeout`] therefore does not prove the write was
    /// dropped: if the deadline passes after the store has sent its commit,
    /// the change may still be applied. Callers that retry on timeout should
    /// check the stock or history first.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Append a transaction for `key` and return the new quantity.
    pub async fn apply_delta(
        &self,
        key: StockKey,
        delta: i64,
        description: &str,
    ) -> LedgerResult<i64> {
        let change = StockDelta::new(key, delta, description);
        change.validate()?;

        let quantity = self.bounded(self.store.apply_delta(&change)).await?;
        tracing::info!(key = %change.key, delta, quantity, "stock updated");
        Ok(quantity)
    }

    /// Current stock for `sku`, keyed by warehouse.
    ///
    /// `None` or an empty warehouse returns every warehouse holding the SKU.
    /// No match yields an empty map.
    pub async fn query_stock(
        &self,
        sku: &str,
        warehouse: Option<&str>,
    ) -> LedgerResult<WarehouseQuantities> {
        let query = StockQuery::new(sku, warehouse);
        query.validate()?;

        let levels = self.bounded(self.store.stock_levels(&query)).await?;
        tracing::debug!(sku, warehouse = ?query.warehouse, rows = levels.len(), "stock queried");
        Ok(levels
            .into_iter()
            .map(|level| (level.warehouse, level.quantity))
            .collect())
    }

    /// Transactions for `sku`, oldest first, one per applied delta.
    pub async fn query_history(
        &self,
        sku: &str,
        warehouse: Option<&str>,
    ) -> LedgerResult<Vec<Transaction>> {
        let query = StockQuery::new(sku, warehouse);
        query.validate()?;

        let history = self.bounded(self.store.history(&query)).await?;
        tracing::debug!(sku, warehouse = ?query.warehouse, rows = history.len(), "history queried");
        Ok(history)
    }

    /// Apply every entry in one atomic unit.
    ///
    /// Either every entry commits or none does. All entries are validated
    /// before the store is touched. When a key repeats, its reported quantity
    /// is the one after its last entry.
    pub async fn batch_apply_delta(&self, entries: &[BatchEntry]) -> LedgerResult<SkuQuantities> {
        let changes: Vec<StockDelta> = entries
            .iter()
            .map(|e| StockDelta::new(e.key.clone(), e.delta, e.label.clone()))
            .collect();
        for change in &changes {
            change.validate()?;
        }
        if changes.is_empty() {
            return Ok(SkuQuantities::new());
        }

        let quantities = self.bounded(self.store.apply_batch(&changes)).await?;
        if quantities.len() != changes.len() {
            return Err(LedgerError::Storage(format!(
                "batch returned {} quantities for {} entries",
                quantities.len(),
                changes.len()
            )));
        }

        let mut result = SkuQuantities::new();
        for (change, quantity) in changes.into_iter().zip(quantities) {
            result
                .entry(change.key.sku)
                .or_default()
                .insert(change.key.warehouse, quantity);
        }
        tracing::info!(entries = entries.len(), skus = result.len(), "batch applied");
        Ok(result)
    }

    async fn bounded<T>(&self, op: impl Future<Output = LedgerResult<T>>) -> LedgerResult<T> {
        match tokio::time::timeout(self.timeout, op).await {
            Ok(result) => {
                if let Err(err) = &result {
                    tracing::warn!(error = %err, "stock store call failed");
                }
                result
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "stock store call timed out");
                Err(LedgerError::Timeout(self.timeout))
            }
        }
    }
}

impl std::fmt::Debug for StockLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StockLedger")
            .field("backend", &self.store.backend())
            .field("timeout", &self.timeout)
            .finish()
    }
}
