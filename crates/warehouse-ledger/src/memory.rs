use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use warehouse_types::{StockDelta, StockKey, StockLevel, StockQuery, Transaction};

use crate::error::{LedgerError, LedgerResult};
use crate::traits::StockStore;

/// In-memory stock store for tests, local demos, and `serve --memory`.
///
/// A single write lock covers each atomic unit, so writes are serialized
/// across all keys. Transaction timestamps are strictly increasing.
pub struct InMemoryStockStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    transactions: Vec<Transaction>,
    levels: BTreeMap<StockKey, i64>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl StoreState {
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now);
        let next = match self.last_timestamp {
            Some(last) if now <= last => last + TimeDelta::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(next);
        next
    }

    /// Stage every delta against the current totals, then commit the
    /// transactions and totals together. Nothing is written if any delta fails.
    fn apply_all(&mut self, deltas: &[StockDelta]) -> LedgerResult<Vec<i64>> {
        let mut staged: BTreeMap<StockKey, i64> = BTreeMap::new();
        let mut quantities = Vec::with_capacity(deltas.len());

        for delta in deltas {
            let current = staged
                .get(&delta.key)
                .or_else(|| self.levels.get(&delta.key))
                .copied();
            let next = match current {
                None => delta.delta,
                Some(quantity) => quantity.checked_add(delta.delta).ok_or_else(|| {
                    LedgerError::Storage(format!("quantity overflow for {}", delta.key))
                })?,
            };
            staged.insert(delta.key.clone(), next);
            quantities.push(next);
        }

        for delta in deltas {
            let inserted_at = self.next_timestamp();
            let id = self.transactions.len() as i64 + 1;
            self.transactions.push(Transaction {
                id,
                sku: delta.key.sku.clone(),
                warehouse: delta.key.warehouse.clone(),
                quantity_delta: delta.delta,
                description: delta.description.clone(),
                inserted_at,
            });
        }
        self.levels.extend(staged);

        Ok(quantities)
    }
}

impl InMemoryStockStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Total number of transactions recorded across all keys.
    pub fn transaction_count(&self) -> LedgerResult<usize> {
        Ok(self.read_state()?.transactions.len())
    }

    /// Number of distinct keys holding a stock level.
    pub fn key_count(&self) -> LedgerResult<usize> {
        Ok(self.read_state()?.levels.len())
    }

    fn read_state(&self) -> LedgerResult<std::sync::RwLockReadGuard<'_, StoreState>> {
        self.inner
            .read()
            .map_err(|_| LedgerError::Storage("stock store read lock poisoned".into()))
    }

    fn write_state(&self) -> LedgerResult<std::sync::RwLockWriteGuard<'_, StoreState>> {
        self.inner
            .write()
            .map_err(|_| LedgerError::Storage("stock store write lock poisoned".into()))
    }
}

impl Default for InMemoryStockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    async fn apply_delta(&self, delta: &StockDelta) -> LedgerResult<i64> {
        let mut state = self.write_state()?;
        let quantities = state.apply_all(std::slice::from_ref(delta))?;
        quantities
            .first()
            .copied()
            .ok_or_else(|| LedgerError::Storage(format!("no stock level read back for {}", delta.key)))
    }

    async fn apply_batch(&self, deltas: &[StockDelta]) -> LedgerResult<Vec<i64>> {
        let mut state = self.write_state()?;
        state.apply_all(deltas)
    }

    async fn stock_levels(&self, query: &StockQuery) -> LedgerResult<Vec<StockLevel>> {
        let state = self.read_state()?;
        Ok(state
            .levels
            .iter()
            .filter(|(key, _)| query.matches(key))
            .map(|(key, quantity)| StockLevel {
                sku: key.sku.clone(),
                warehouse: key.warehouse.clone(),
                quantity: *quantity,
            })
            .collect())
    }

    async fn history(&self, query: &StockQuery) -> LedgerResult<Vec<Transaction>> {
        let state = self.read_state()?;
        Ok(state
            .transactions
            .iter()
            .filter(|tx| query.matches(&tx.key()))
            .cloned()
            .collect())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for InMemoryStockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (transactions, keys) = self
            .read_state()
            .map(|s| (s.transactions.len(), s.levels.len()))
            .unwrap_or_default();
        f.debug_struct("InMemoryStockStore")
            .field("transactions", &transactions)
            .field("keys", &keys)
            .finish()
    }
}
