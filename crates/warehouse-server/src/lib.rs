//! HTTP server for the warehouse stock service.
//!
//! Exposes the stock ledger as a JSON API: stock updates, batch updates,
//! stock lookups and transaction history, plus health and info endpoints.

pub mod api;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::{DatabaseConfig, ServerConfig};
pub use error::{ServerError, ServerResult};
pub use router::{build_router, AppState};
pub use server::WarehouseServer;
