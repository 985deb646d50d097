//! JSON request and response bodies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use warehouse_ledger::{SkuQuantities, WarehouseQuantities};
use warehouse_types::Transaction;

/// `POST /stock`
#[derive(Clone, Debug, Deserialize)]
pub struct StockUpdateRequest {
    pub sku: String,
    pub warehouse: String,
    pub quantity: i64,
    #[serde(default)]
    pub description: String,
}

/// `GET /stock` and `GET /history`, from the body or the query string.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct StockLookup {
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub warehouse: Option<String>,
}

/// `POST /stock/batch`
#[derive(Clone, Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub key: String,
    pub data: SkuQuantities,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StockUpdateResponse {
    pub success: bool,
    pub message: String,
    pub sku: String,
    pub warehouse: String,
    pub quantity: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StockResponse {
    pub success: bool,
    pub message: String,
    pub sku: String,
    pub data: WarehouseQuantities,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub success: bool,
    pub message: String,
    pub sku: String,
    pub data: BTreeMap<String, i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub success: bool,
    pub key: String,
    pub data: SkuQuantities,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Key history by timestamp label.
///
/// Two transactions on different warehouses can share a timestamp; the later
/// one gets a `#<id>` suffix so no entry is dropped.
pub fn history_data(history: &[Transaction]) -> BTreeMap<String, i64> {
    let mut data = BTreeMap::new();
    for tx in history {
        let label = tx.timestamp_label();
        let label = if data.contains_key(&label) {
            format!("{label}#{}", tx.id)
        } else {
            label
        };
        data.insert(label, tx.quantity_delta);
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn tx(id: i64, warehouse: &str, micros: i64, delta: i64) -> Transaction {
        Transaction {
            id,
            sku: "ABC".into(),
            warehouse: warehouse.into(),
            quantity_delta: delta,
            description: String::new(),
            inserted_at: Utc.timestamp_micros(micros).unwrap(),
        }
    }

    #[test]
    fn history_keeps_colliding_timestamps() {
        let data = history_data(&[tx(1, "W1", 10, 5), tx(2, "W2", 10, -1), tx(3, "W1", 11, 2)]);
        assert_eq!(data.len(), 3);
        assert_eq!(data.values().sum::<i64>(), 6);
        assert!(data.keys().any(|k| k.ends_with("#2")));
    }

    #[test]
    fn update_request_defaults_description() {
        let req: StockUpdateRequest =
            serde_json::from_str(r#"{"sku":"ABC","warehouse":"W1","quantity":-2}"#).unwrap();
        assert_eq!(req.quantity, -2);
        assert!(req.description.is_empty());
    }

    #[test]
    fn batch_request_shape() {
        let req: BatchRequest =
            serde_json::from_str(r#"{"key":"k1","data":{"ABC":{"W1":10,"W2":5}}}"#).unwrap();
        assert_eq!(req.key, "k1");
        assert_eq!(req.data["ABC"]["W2"], 5);
    }
}
