//! Stock ledger for the warehouse service.
//!
//! The ledger keeps an append-only log of stock transactions and a running
//! total per `(sku, warehouse)`. It provides:
//! - The [`StockStore`] trait boundary for storage backends
//! - [`InMemoryStockStore`] for tests and embedding
//! - [`PgStockStore`] backed by PostgreSQL through `sqlx`
//! - [`StockLedger`], which validates input, bounds each store call with a
//!   timeout, and shapes results for callers
//!
//! # Invariant
//!
//! A stock level always equals the sum of the transaction deltas recorded for
//! its key. Every write appends the transaction and updates the total in one
//! atomic unit.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::{LedgerError, LedgerResult};
pub use ledger::{BatchEntry, SkuQuantities, StockLedger, WarehouseQuantities, DEFAULT_TIMEOUT};
pub use memory::InMemoryStockStore;
pub use postgres::{PgStockStore, SCHEMA};
pub use traits::StockStore;
