use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::key::StockKey;

/// A signed quantity change for one key.
///
/// Positive deltas add stock, negative deltas remove it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub key: StockKey,
    pub delta: i64,
    pub description: String,
}

impl StockDelta {
    pub fn new(key: StockKey, delta: i64, description: impl Into<String>) -> Self {
        Self {
            key,
            delta,
            description: description.into(),
        }
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        self.key.validate()
    }
}

/// Immutable record of an applied [`StockDelta`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub sku: String,
    pub warehouse: String,
    pub quantity_delta: i64,
    pub description: String,
    pub inserted_at: DateTime<Utc>,
}

impl Transaction {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.sku.clone(), self.warehouse.clone())
    }

    /// Fixed-width RFC 3339 timestamp (microsecond precision, `Z` suffix).
    ///
    /// Labels sort lexically in the same order as the instants they encode.
    pub fn timestamp_label(&self) -> String {
        self.inserted_at.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

/// Running total for one key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub sku: String,
    pub warehouse: String,
    pub quantity: i64,
}

impl StockLevel {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.sku.clone(), self.warehouse.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn tx_at(micros: i64) -> Transaction {
        Transaction {
            id: 1,
            sku: "ABC".into(),
            warehouse: "W1".into(),
            quantity_delta: 5,
            description: "restock".into(),
            inserted_at: Utc.timestamp_micros(micros).unwrap(),
        }
    }

    #[test]
    fn delta_validation_follows_key() {
        let ok = StockDelta::new(StockKey::new("ABC", "W1"), -3, "pick");
        assert!(ok.validate().is_ok());
        let bad = StockDelta::new(StockKey::new("ABC", ""), 1, "");
        assert_eq!(bad.validate(), Err(TypeError::EmptyWarehouse));
    }

    #[test]
    fn timestamp_label_is_fixed_width() {
        let a = tx_at(1_600_000_000_000_000).timestamp_label();
        let b = tx_at(1_600_000_000_000_001).timestamp_label();
        assert_eq!(a, "2020-09-13T12:26:40.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }

    #[test]
    fn transaction_serializes_with_delta_as_integer() {
        let json = serde_json::to_value(tx_at(0)).unwrap();
        assert_eq!(json["quantity_delta"], 5);
        assert_eq!(json["sku"], "ABC");
    }

    #[test]
    fn records_expose_their_key() {
        let level = StockLevel {
            sku: "ABC".into(),
            warehouse: "W1".into(),
            quantity: 3,
        };
        assert_eq!(level.key(), StockKey::new("ABC", "W1"));
        assert_eq!(tx_at(0).key(), level.key());
    }
}
