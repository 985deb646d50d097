use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Composite identity of a stock counter.
///
/// Both parts are trimmed on construction and must be non-empty for writes.
/// Reads use [`StockQuery`], which allows the warehouse to be left open.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockKey {
    pub sku: String,
    pub warehouse: String,
}

impl StockKey {
    pub fn new(sku: impl Into<String>, warehouse: impl Into<String>) -> Self {
        Self {
            sku: trimmed(sku.into()),
            warehouse: trimmed(warehouse.into()),
        }
    }

    /// Check that the key can be written to.
    ///
    /// Whitespace-only values count as empty.
    pub fn validate(&self) -> Result<(), TypeError> {
        if self.sku.trim().is_empty() {
            return Err(TypeError::EmptySku);
        }
        if self.warehouse.trim().is_empty() {
            return Err(TypeError::EmptyWarehouse);
        }
        Ok(())
    }
}

/// Trim surrounding whitespace, reusing the allocation when there is none.
fn trimmed(value: String) -> String {
    if value.trim().len() == value.len() {
        value
    } else {
        value.trim().to_owned()
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.sku, self.warehouse)
    }
}

/// Read filter over stock levels and history.
///
/// `warehouse == None` selects every warehouse holding the SKU.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StockQuery {
    pub sku: String,
    pub warehouse: Option<String>,
}

impl StockQuery {
    /// Build a query, trimmed like [`StockKey::new`]; an empty or
    /// whitespace-only warehouse becomes the wildcard.
    pub fn new(sku: impl Into<String>, warehouse: Option<&str>) -> Self {
        let warehouse = warehouse
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .map(str::to_owned);
        Self {
            sku: trimmed(sku.into()),
            warehouse,
        }
    }

    pub fn all_warehouses(sku: impl Into<String>) -> Self {
        Self {
            sku: sku.into(),
            warehouse: None,
        }
    }

    pub fn validate(&self) -> Result<(), TypeError> {
        if self.sku.trim().is_empty() {
            return Err(TypeError::EmptySku);
        }
        Ok(())
    }

    /// Returns `true` if `key` falls inside this query.
    pub fn matches(&self, key: &StockKey) -> bool {
        key.sku == self.sku
            && self
                .warehouse
                .as_deref()
                .map_or(true, |w| w == key.warehouse)
    }
}

impl From<StockKey> for StockQuery {
    fn from(key: StockKey) -> Self {
        Self {
            sku: key.sku,
            warehouse: Some(key.warehouse),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation() {
        assert!(StockKey::new("ABC", "W1").validate().is_ok());
        assert_eq!(StockKey::new("", "W1").validate(), Err(TypeError::EmptySku));
        assert_eq!(StockKey::new("ABC", "  ").validate(), Err(TypeError::EmptyWarehouse));
    }

    #[test]
    fn key_parts_are_trimmed() {
        let key = StockKey::new(" ABC ", " W1");
        assert_eq!(key, StockKey::new("ABC", "W1"));
        assert!(StockQuery::new(" ABC", Some("W1 ")).matches(&key));
    }

    #[test]
    fn key_display() {
        assert_eq!(StockKey::new("ABC", "W1").to_string(), "ABC@W1");
    }

    #[test]
    fn empty_warehouse_is_wildcard() {
        assert_eq!(StockQuery::new("ABC", Some("")), StockQuery::all_warehouses("ABC"));
        assert_eq!(StockQuery::new("ABC", Some(" ")), StockQuery::all_warehouses("ABC"));
        assert_eq!(StockQuery::new("ABC", None), StockQuery::all_warehouses("ABC"));
        assert_eq!(
            StockQuery::new("ABC", Some("W1")).warehouse.as_deref(),
            Some("W1")
        );
    }

    #[test]
    fn query_matches() {
        let all = StockQuery::all_warehouses("ABC");
        assert!(all.matches(&StockKey::new("ABC", "W1")));
        assert!(all.matches(&StockKey::new("ABC", "W2")));
        assert!(!all.matches(&StockKey::new("XYZ", "W1")));

        let one: StockQuery = StockKey::new("ABC", "W1").into();
        assert!(one.matches(&StockKey::new("ABC", "W1")));
        assert!(!one.matches(&StockKey::new("ABC", "W2")));
    }

    #[test]
    fn query_requires_sku() {
        assert_eq!(StockQuery::new("", None).validate(), Err(TypeError::EmptySku));
    }

    #[test]
    fn keys_order_by_sku_then_warehouse() {
        let mut keys = vec![
            StockKey::new("B", "W1"),
            StockKey::new("A", "W2"),
            StockKey::new("A", "W1"),
        ];
        keys.sort();
        assert_eq!(keys[0], StockKey::new("A", "W1"));
        assert_eq!(keys[2], StockKey::new("B", "W1"));
    }
}
