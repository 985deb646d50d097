use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::{Method, Uri};
use axum::response::Json;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use warehouse_ledger::BatchEntry;
use warehouse_types::StockKey;

use crate::api::{
    history_data, BatchRequest, BatchResponse, HealthResponse, HistoryResponse, StockLookup,
    StockResponse, StockUpdateRequest, StockUpdateResponse,
};
use crate::error::{ServerError, ServerResult};
use crate::router::AppState;

/// Path parameters of the path-style read routes.
#[derive(Debug, Deserialize)]
pub struct PathLookup {
    pub sku: String,
    #[serde(default)]
    pub warehouse: Option<String>,
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> ServerResult<T> {
    serde_json::from_slice(body).map_err(|e| ServerError::BadRequest(format!("malformed JSON body: {e}")))
}

/// GET routes take their filter from a JSON body, or from the query string
/// when the body is empty.
fn lookup_from(
    query: Result<Query<StockLookup>, QueryRejection>,
    body: &Bytes,
) -> ServerResult<StockLookup> {
    if body.iter().all(u8::is_ascii_whitespace) {
        query
            .map(|Query(lookup)| lookup)
            .map_err(|e| ServerError::BadRequest(e.body_text()))
    } else {
        parse_body(body)
    }
}

fn update_message(sku: &str, warehouse: &str, delta: i64, quantity: i64) -> String {
    if delta < 0 {
        format!(
            "Stock removed ({}) from {sku} on {warehouse}! New stock = {quantity}",
            delta.unsigned_abs()
        )
    } else {
        format!("Stock added ({delta}) to {sku} on {warehouse}! New stock = {quantity}")
    }
}

async fn apply(
    state: &AppState,
    sku: String,
    warehouse: String,
    delta: i64,
    description: &str,
) -> ServerResult<Json<StockUpdateResponse>> {
    let key = StockKey::new(sku, warehouse);
    let quantity = state.ledger.apply_delta(key.clone(), delta, description).await?;
    Ok(Json(StockUpdateResponse {
        success: true,
        message: update_message(&key.sku, &key.warehouse, delta, quantity),
        sku: key.sku,
        warehouse: key.warehouse,
        quantity,
    }))
}

async fn stock(state: &AppState, lookup: StockLookup) -> ServerResult<Json<StockResponse>> {
    let data = state
        .ledger
        .query_stock(&lookup.sku, lookup.warehouse.as_deref())
        .await?;
    let message = if data.is_empty() {
        format!("No stock found for {}", lookup.sku)
    } else {
        format!("Stock for {} found in {} warehouse(s)", lookup.sku, data.len())
    };
    Ok(Json(StockResponse {
        success: true,
        message,
        sku: lookup.sku,
        data,
    }))
}

async fn history(state: &AppState, lookup: StockLookup) -> ServerResult<Json<HistoryResponse>> {
    let transactions = state
        .ledger
        .query_history(&lookup.sku, lookup.warehouse.as_deref())
        .await?;
    let message = if transactions.is_empty() {
        format!("No history found for {}", lookup.sku)
    } else {
        format!("{} transaction(s) found for {}", transactions.len(), lookup.sku)
    };
    Ok(Json(HistoryResponse {
        success: true,
        message,
        sku: lookup.sku,
        data: history_data(&transactions),
    }))
}

/// `POST /stock`
pub async fn update_stock(
    State(state): State<AppState>,
    body: Bytes,
) -> ServerResult<Json<StockUpdateResponse>> {
    let req: StockUpdateRequest = parse_body(&body)?;
    apply(&state, req.sku, req.warehouse, req.quantity, &req.description).await
}

/// `POST /stock/batch`
pub async fn batch_update(
    State(state): State<AppState>,
    body: Bytes,
) -> ServerResult<Json<BatchResponse>> {
    let req: BatchRequest = parse_body(&body)?;
    let entries: Vec<BatchEntry> = req
        .data
        .iter()
        .flat_map(|(sku, warehouses)| {
            warehouses.iter().map(|(warehouse, delta)| {
                BatchEntry::new(StockKey::new(sku.as_str(), warehouse.as_str()), *delta, req.key.as_str())
            })
        })
        .collect();

    let data = state.ledger.batch_apply_delta(&entries).await?;
    Ok(Json(BatchResponse {
        success: true,
        key: req.key,
        data,
    }))
}

/// `GET /stock`
pub async fn get_stock(
    State(state): State<AppState>,
    query: Result<Query<StockLookup>, QueryRejection>,
    body: Bytes,
) -> ServerResult<Json<StockResponse>> {
    stock(&state, lookup_from(query, &body)?).await
}

/// `GET /history`
pub async fn get_history(
    State(state): State<AppState>,
    query: Result<Query<StockLookup>, QueryRejection>,
    body: Bytes,
) -> ServerResult<Json<HistoryResponse>> {
    history(&state, lookup_from(query, &body)?).await
}

/// `GET /:sku` and `GET /:sku/:warehouse`
pub async fn stock_by_path(
    State(state): State<AppState>,
    Path(path): Path<PathLookup>,
) -> ServerResult<Json<StockResponse>> {
    let lookup = StockLookup {
        sku: path.sku,
        warehouse: path.warehouse,
    };
    stock(&state, lookup).await
}

/// `GET /_history/:sku` and `GET /_history/:sku/:warehouse`
pub async fn history_by_path(
    State(state): State<AppState>,
    Path(path): Path<PathLookup>,
) -> ServerResult<Json<HistoryResponse>> {
    let lookup = StockLookup {
        sku: path.sku,
        warehouse: path.warehouse,
    };
    history(&state, lookup).await
}

/// Unsigned amount from a path segment; the route decides the direction.
///
/// A single leading `+` is accepted, a `-` is not.
fn path_quantity(raw: &str) -> ServerResult<i64> {
    let digits = raw.strip_prefix('+').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ServerError::BadRequest(format!(
            "quantity must be a non-negative integer, got {raw:?}"
        )));
    }
    digits
        .parse()
        .map_err(|_| ServerError::BadRequest(format!("quantity out of range: {raw}")))
}

/// `POST /:sku/:warehouse/:quantity`
pub async fn add_by_path(
    State(state): State<AppState>,
    Path((sku, warehouse, quantity)): Path<(String, String, String)>,
) -> ServerResult<Json<StockUpdateResponse>> {
    let delta = path_quantity(&quantity)?;
    apply(&state, sku, warehouse, delta, "").await
}

/// `DELETE /:sku/:warehouse/:quantity`
pub async fn remove_by_path(
    State(state): State<AppState>,
    Path((sku, warehouse, quantity)): Path<(String, String, String)>,
) -> ServerResult<Json<StockUpdateResponse>> {
    let delta = -path_quantity(&quantity)?;
    apply(&state, sku, warehouse, delta, "").await
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "name": "warehouse-server",
        "version": env!("CARGO_PKG_VERSION"),
        "base_uri": state.base_uri,
        "backend": state.ledger.backend(),
    }))
}

pub async fn not_found(uri: Uri) -> ServerError {
    ServerError::NotFound(uri.path().to_string())
}

pub async fn method_not_allowed(method: Method, uri: Uri) -> ServerError {
    ServerError::MethodNotAllowed(format!("{method} {}", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_follow_sign() {
        assert_eq!(
            update_message("ABC", "W1", 5, 5),
            "Stock added (5) to ABC on W1! New stock = 5"
        );
        assert_eq!(
            update_message("ABC", "W1", -2, 3),
            "Stock removed (2) from ABC on W1! New stock = 3"
        );
    }

    #[test]
    fn path_quantity_is_unsigned() {
        assert_eq!(path_quantity("5").unwrap(), 5);
        assert_eq!(path_quantity("+5").unwrap(), 5);
        assert!(path_quantity("-3").is_err());
        assert!(path_quantity("+++5").is_err());
        assert!(path_quantity("+").is_err());
        assert!(path_quantity("five").is_err());
        assert!(path_quantity("99999999999999999999").is_err());
    }

    #[test]
    fn empty_body_falls_back_to_query() {
        let query = StockLookup {
            sku: "ABC".into(),
            warehouse: None,
        };
        let lookup = lookup_from(Ok(Query(query)), &Bytes::from_static(b"  \n")).unwrap();
        assert_eq!(lookup.sku, "ABC");

        let lookup = lookup_from(
            Ok(Query(StockLookup::default())),
            &Bytes::from_static(br#"{"sku":"XYZ","warehouse":"W2"}"#),
        )
        .unwrap();
        assert_eq!(lookup.sku, "XYZ");
        assert_eq!(lookup.warehouse.as_deref(), Some("W2"));
    }

    #[test]
    fn malformed_body_is_bad_request() {
        let err = parse_body::<StockUpdateRequest>(&Bytes::from_static(b"{not json")).unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }
}
