use axum::routing::{get, post, MethodRouter};
use axum::Router;
use tower_http::trace::TraceLayer;
use warehouse_ledger::StockLedger;

use crate::config::normalize_base_uri;
use crate::handler;

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub ledger: StockLedger,
    /// Normalized mount point of the stock API (`""` for root).
    pub base_uri: String,
}

impl AppState {
    pub fn new(ledger: StockLedger, base_uri: &str) -> Self {
        Self {
            ledger,
            base_uri: normalize_base_uri(base_uri),
        }
    }
}

/// Build the axum router with all warehouse endpoints.
///
/// The stock API is mounted under `state.base_uri`; `/health` and `/info`
/// always live at the root.
pub fn build_router(state: AppState) -> Router {
    let api: Router<AppState> = Router::new()
        .route("/stock", json_405(post(handler::update_stock).get(handler::get_stock)))
        .route("/stock/batch", json_405(post(handler::batch_update)))
        .route("/history", json_405(get(handler::get_history)))
        .route("/_history/:sku", json_405(get(handler::history_by_path)))
        .route("/_history/:sku/:warehouse", json_405(get(handler::history_by_path)))
        .route("/:sku", json_405(get(handler::stock_by_path)))
        .route("/:sku/:warehouse", json_405(get(handler::stock_by_path)))
        .route(
            "/:sku/:warehouse/:quantity",
            json_405(post(handler::add_by_path).delete(handler::remove_by_path)),
        );

    let router: Router<AppState> = Router::new()
        .route("/health", json_405(get(handler::health_handler)))
        .route("/info", json_405(get(handler::info_handler)));

    let router = if state.base_uri.is_empty() {
        router.merge(api)
    } else {
        router.nest(&state.base_uri, api)
    };

    router
        .fallback(handler::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Answer unsupported methods with the JSON error body instead of an empty 405.
fn json_405(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.fallback(handler::method_not_allowed)
}
