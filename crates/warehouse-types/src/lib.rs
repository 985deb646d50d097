//! Foundation types for the warehouse stock service.
//!
//! Every other warehouse crate depends on `warehouse-types`.
//!
//! # Key Types
//!
//! - [`StockKey`]: `(sku, warehouse)` identity of a stock counter
//! - [`StockQuery`]: read filter; an empty warehouse means "all warehouses"
//! - [`StockDelta`]: a signed quantity change waiting to be applied
//! - [`Transaction`]: immutable record of an applied change
//! - [`StockLevel`]: running total for one key

pub mod error;
pub mod key;
pub mod record;

pub use error::TypeError;
pub use key::{StockKey, StockQuery};
pub use record::{StockDelta, StockLevel, Transaction};
