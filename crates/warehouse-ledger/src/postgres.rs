//! PostgreSQL stock store.
//!
//! All SQL is runtime-checked (`sqlx::query`, not `sqlx::query!`) so the
//! crate builds without a database.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgConnection, PgPool};
use warehouse_types::{StockDelta, StockKey, StockLevel, StockQuery, Transaction};

use crate::error::LedgerResult;
use crate::traits::StockStore;

/// Tables read and written by [`PgStockStore`].
///
/// Idempotent; applied by [`PgStockStore::ensure_schema`].
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "transaction" (
    id          BIGSERIAL   PRIMARY KEY,
    sku         TEXT        NOT NULL,
    warehouse   TEXT        NOT NULL,
    quantity    BIGINT      NOT NULL,
    description TEXT        NOT NULL DEFAULT '',
    inserted_at TIMESTAMPTZ NOT NULL DEFAULT clock_timestamp()
);

CREATE INDEX IF NOT EXISTS transaction_sku_warehouse_idx
    ON "transaction" (sku, warehouse, inserted_at);

CREATE TABLE IF NOT EXISTS stock (
    sku       TEXT   NOT NULL,
    warehouse TEXT   NOT NULL,
    quantity  BIGINT NOT NULL,
    PRIMARY KEY (sku, warehouse)
);
"#;

type TransactionRow = (i64, String, String, i64, String, DateTime<Utc>);

/// Postgres-backed stock store wrapping a shared `PgPool`.
#[derive(Clone, Debug)]
pub struct PgStockStore {
    pool: PgPool,
}

impl PgStockStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a store whose pool opens connections on first use.
    pub fn connect_lazy(
        options: PgConnectOptions,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Self {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy_with(options);
        Self { pool }
    }

    /// Round-trip a trivial query to prove the database is reachable.
    pub async fn ping(&self) -> LedgerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create the tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> LedgerResult<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        tracing::info!("stock schema ensured");
        Ok(())
    }
}

/// Serialize writers of one key for the rest of the surrounding transaction.
async fn lock_key(conn: &mut PgConnection, key: &StockKey) -> LedgerResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1 || '/' || $2, 0))")
        .bind(&key.sku)
        .bind(&key.warehouse)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Insert the transaction, upsert the total, read the total back.
///
/// Must run inside a transaction that already holds the key lock.
async fn apply_locked(conn: &mut PgConnection, delta: &StockDelta) -> LedgerResult<i64> {
    // GREATEST ignores the NULL from an empty history.
    sqlx::query(
        r#"
        INSERT INTO "transaction" (sku, warehouse, quantity, description, inserted_at)
        VALUES (
            $1, $2, $3, $4,
            GREATEST(
                clock_timestamp(),
                (SELECT max(inserted_at) + interval '1 microsecond'
                 FROM "transaction"
                 WHERE sku = $1 AND warehouse = $2)
            )
        )
        "#,
    )
    .bind(&delta.key.sku)
    .bind(&delta.key.warehouse)
    .bind(delta.delta)
    .bind(&delta.description)
    .execute(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO stock (sku, warehouse, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (sku, warehouse)
        DO UPDATE SET quantity = stock.quantity + EXCLUDED.quantity
        "#,
    )
    .bind(&delta.key.sku)
    .bind(&delta.key.warehouse)
    .bind(delta.delta)
    .execute(&mut *conn)
    .await?;

    let quantity = sqlx::query_scalar::<_, i64>(
        "SELECT quantity FROM stock WHERE sku = $1 AND warehouse = $2",
    )
    .bind(&delta.key.sku)
    .bind(&delta.key.warehouse)
    .fetch_one(&mut *conn)
    .await?;

    Ok(quantity)
}

#[async_trait]
impl StockStore for PgStockStore {
    async fn apply_delta(&self, delta: &StockDelta) -> LedgerResult<i64> {
        let mut tx = self.pool.begin().await?;
        lock_key(&mut tx, &delta.key).await?;
        let quantity = apply_locked(&mut tx, delta).await?;
        tx.commit().await?;
        Ok(quantity)
    }

    async fn apply_batch(&self, deltas: &[StockDelta]) -> LedgerResult<Vec<i64>> {
        if deltas.is_empty() {
            return Ok(vec![]);
        }

        let mut tx = self.pool.begin().await?;

        // Take every key lock up front, in key order, so two batches touching
        // the same keys cannot deadlock.
        let keys: BTreeSet<&StockKey> = deltas.iter().map(|d| &d.key).collect();
        for key in keys {
            lock_key(&mut tx, key).await?;
        }

        let mut quantities = Vec::with_capacity(deltas.len());
        for delta in deltas {
            quantities.push(apply_locked(&mut tx, delta).await?);
        }

        tx.commit().await?;
        Ok(quantities)
    }

    async fn stock_levels(&self, query: &StockQuery) -> LedgerResult<Vec<StockLevel>> {
        let rows = match &query.warehouse {
            None => {
                sqlx::query_as::<_, (String, String, i64)>(
                    "SELECT sku, warehouse, quantity FROM stock WHERE sku = $1 ORDER BY warehouse",
                )
                .bind(&query.sku)
                .fetch_all(&self.pool)
                .await?
            }
            Some(warehouse) => {
                sqlx::query_as::<_, (String, String, i64)>(
                    "SELECT sku, warehouse, quantity FROM stock WHERE sku = $1 AND warehouse = $2",
                )
                .bind(&query.sku)
                .bind(warehouse)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(|(sku, warehouse, quantity)| StockLevel {
                sku,
                warehouse,
                quantity,
            })
            .collect())
    }

    async fn history(&self, query: &StockQuery) -> LedgerResult<Vec<Transaction>> {
        let rows = match &query.warehouse {
            None => {
                sqlx::query_as::<_, TransactionRow>(
                    r#"
                    SELECT id, sku, warehouse, quantity, description, inserted_at
                    FROM "transaction"
                    WHERE sku = $1
                    ORDER BY inserted_at, id
                    "#,
                )
                .bind(&query.sku)
                .fetch_all(&self.pool)
                .await?
            }
            Some(warehouse) => {
                sqlx::query_as::<_, TransactionRow>(
                    r#"
                    SELECT id, sku, warehouse, quantity, description, inserted_at
                    FROM "transaction"
                    WHERE sku = $1 AND warehouse = $2
                    ORDER BY inserted_at, id
                    "#,
                )
                .bind(&query.sku)
                .bind(warehouse)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows
            .into_iter()
            .map(
                |(id, sku, warehouse, quantity_delta, description, inserted_at)| Transaction {
                    id,
                    sku,
                    warehouse,
                    quantity_delta,
                    description,
                    inserted_at,
                },
            )
            .collect())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_upsert_key() {
        assert!(SCHEMA.contains("PRIMARY KEY (sku, warehouse)"));
        assert!(SCHEMA.contains("quantity    BIGINT"));
    }

    /// Store on `WAREHOUSE_TEST_DATABASE_URL`, with the schema applied.
    ///
    /// The live tests are `#[ignore]`d; run them with `cargo test -- --ignored`.
    async fn live_store() -> PgStockStore {
        let url = std::env::var("WAREHOUSE_TEST_DATABASE_URL")
            .expect("WAREHOUSE_TEST_DATABASE_URL must point at a Postgres database");
        let pool = PgPool::connect(&url).await.expect("connect to test database");
        let store = PgStockStore::new(pool);
        store.ensure_schema().await.expect("apply schema");
        store
    }

    fn unique_sku(tag: &str) -> String {
        format!("{tag}-{}", Utc::now().timestamp_nanos_opt().unwrap_or_default())
    }

    #[tokio::test]
    #[ignore = "needs WAREHOUSE_TEST_DATABASE_URL"]
    async fn live_apply_and_read_back() {
        let store = live_store().await;
        let sku = unique_sku("apply");
        let key = StockKey::new(sku.as_str(), "W1");

        assert_eq!(store.apply_delta(&StockDelta::new(key.clone(), 5, "restock")).await.unwrap(), 5);
        assert_eq!(store.apply_delta(&StockDelta::new(key.clone(), -2, "pick")).await.unwrap(), 3);
        assert_eq!(store.apply_delta(&StockDelta::new(key.clone(), 0, "audit")).await.unwrap(), 3);

        let levels = store.stock_levels(&StockQuery::all_warehouses(sku.as_str())).await.unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].quantity, 3);

        let history = store.history(&key.clone().into()).await.unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.windows(2).all(|p| p[0].inserted_at < p[1].inserted_at));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    #[ignore = "needs WAREHOUSE_TEST_DATABASE_URL"]
    async fn live_concurrent_increments() {
        let store = live_store().await;
        let sku = unique_sku("concurrent");
        let mut handles = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            let key = StockKey::new(sku.as_str(), "W1");
            handles.push(tokio::spawn(async move {
                for _ in 0..10 {
                    store.apply_delta(&StockDelta::new(key.clone(), 1, "tick")).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let levels = store.stock_levels(&StockQuery::new(sku.as_str(), Some("W1"))).await.unwrap();
        assert_eq!(levels[0].quantity, 40);
    }

    #[tokio::test]
    #[ignore = "needs WAREHOUSE_TEST_DATABASE_URL"]
    async fn live_failed_batch_rolls_back() {
        let store = live_store().await;
        let sku = unique_sku("batch");
        let full = StockKey::new(sku.as_str(), "W2");
        store.apply_delta(&StockDelta::new(full.clone(), i64::MAX, "")).await.unwrap();

        let result = store
            .apply_batch(&[
                StockDelta::new(StockKey::new(sku.as_str(), "W1"), 10, "b"),
                StockDelta::new(full, 1, "b"),
            ])
            .await;
        assert!(result.is_err());
        let levels = store.stock_levels(&StockQuery::all_warehouses(sku.as_str())).await.unwrap();
        assert_eq!(levels.len(), 1);
        let history = store.history(&StockQuery::all_warehouses(sku.as_str())).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn lazy_store_reports_backend() {
        let options = PgConnectOptions::new()
            .host("localhost")
            .port(1)
            .username("nobody")
            .database("nothing");
        let store = PgStockStore::connect_lazy(options, 1, Duration::from_millis(100));
        assert_eq!(store.backend(), "postgres");
    }
}
