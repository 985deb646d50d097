use tokio::net::TcpListener;
use warehouse_ledger::StockLedger;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::router::{build_router, AppState};

/// Warehouse stock HTTP server.
pub struct WarehouseServer {
    config: ServerConfig,
    ledger: StockLedger,
}

impl WarehouseServer {
    pub fn new(config: ServerConfig, ledger: StockLedger) -> Self {
        Self { config, ledger }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &StockLedger {
        &self.ledger
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(AppState::new(self.ledger.clone(), &self.config.base_uri))
    }

    /// Start serving requests until Ctrl-C.
    pub async fn serve(self) -> ServerResult<()> {
        let app = self.router();
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(
            %addr,
            base_uri = %self.config.normalized_base_uri(),
            backend = self.ledger.backend(),
            "warehouse server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use warehouse_ledger::InMemoryStockStore;

    fn server() -> WarehouseServer {
        let ledger = StockLedger::new(Arc::new(InMemoryStockStore::new()));
        WarehouseServer::new(ServerConfig::default(), ledger)
    }

    #[test]
    fn server_construction() {
        let server = server();
        assert_eq!(server.config().bind_addr(), "0.0.0.0:8000".parse().unwrap());
        assert_eq!(server.ledger().backend(), "memory");
    }

    #[test]
    fn router_builds() {
        let _router = server().router();
    }
}
