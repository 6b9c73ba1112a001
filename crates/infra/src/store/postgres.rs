//! Postgres-backed inventory store.
//!
//! Records are kept as JSONB documents next to the columns the engine filters
//! on. The ledger is an append-only table ordered by a `BIGSERIAL`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Concurrency` |
//! | Database (other) | any other | `Backend` |
//! | PoolClosed / IO / other | N/A | `Backend` |
//!
//! A versioned write that affects zero rows is also reported as `Concurrency`.

use std::future::Future;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::instrument;

use stockhold_core::{AggregateRoot, CartId, ExpectedVersion, ItemId, ReservationId, TransferId};
use stockhold_inventory::{Item, LedgerEntry, Reservation, SalesStatistics, Transfer};

use super::r#trait::{Changeset, InventoryStore, StoreError, VersionedWrite};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS inventory_items (
        item_id     UUID PRIMARY KEY,
        version     BIGINT NOT NULL,
        doc         JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inventory_reservations (
        reservation_id  UUID PRIMARY KEY,
        item_id         UUID NOT NULL,
        cart_id         TEXT NOT NULL,
        status          TEXT NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL,
        expires_at      TIMESTAMPTZ NOT NULL,
        version         BIGINT NOT NULL,
        doc             JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS inventory_reservations_item_idx ON inventory_reservations (item_id)",
    "CREATE INDEX IF NOT EXISTS inventory_reservations_cart_idx ON inventory_reservations (cart_id)",
    "CREATE INDEX IF NOT EXISTS inventory_reservations_due_idx ON inventory_reservations (status, expires_at)",
    r#"
    CREATE TABLE IF NOT EXISTS inventory_transfers (
        transfer_id UUID PRIMARY KEY,
        created_at  TIMESTAMPTZ NOT NULL,
        version     BIGINT NOT NULL,
        doc         JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inventory_ledger (
        seq         BIGSERIAL PRIMARY KEY,
        entry_id    UUID NOT NULL UNIQUE,
        item_id     UUID NOT NULL,
        operation   TEXT NOT NULL,
        quantity    BIGINT NOT NULL,
        occurred_at TIMESTAMPTZ NOT NULL,
        doc         JSONB NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS inventory_ledger_item_idx ON inventory_ledger (item_id, seq)",
    r#"
    CREATE TABLE IF NOT EXISTS inventory_sales_statistics (
        item_id UUID PRIMARY KEY,
        doc     JSONB NOT NULL
    )
    "#,
];

/// Postgres-backed [`InventoryStore`].
///
/// The store trait is synchronous; each call is driven to completion on the
/// runtime captured at construction. Do not call it from inside an async
/// task: wrap engine calls in `tokio::task::spawn_blocking` or use a plain
/// thread.
#[derive(Debug, Clone)]
pub struct PostgresInventoryStore {
    pool: PgPool,
    runtime: Handle,
}

impl PostgresInventoryStore {
    pub fn new(pool: PgPool, runtime: Handle) -> Self {
        Self { pool, runtime }
    }

    /// Connect, create the schema if needed and capture the current runtime.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .context("connect to postgres")?;
        let store = Self::new(pool, Handle::current());
        store.ensure_schema().await.context("create inventory schema")?;
        Ok(store)
    }

    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for ddl in SCHEMA {
            sqlx::query(*ddl)
                .execute(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    async fn fetch_docs<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Vec<T>, StoreError> {
        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        rows.iter().map(decode_doc).collect()
    }

    async fn fetch_doc<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        query: sqlx::query::Query<'_, Postgres, sqlx::postgres::PgArguments>,
    ) -> Result<Option<T>, StoreError> {
        let row = query
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.as_ref().map(decode_doc).transpose()
    }

    #[instrument(
        skip(self, changeset),
        fields(
            items = changeset.items.len(),
            reservations = changeset.reservations.len(),
            transfers = changeset.transfers.len(),
            ledger = changeset.ledger.len()
        ),
        err
    )]
    pub async fn commit_changeset(&self, changeset: Changeset) -> Result<(), StoreError> {
        if changeset.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for w in &changeset.items {
            let doc = encode_doc(&w.record)?;
            let sql = match update_guard(w) {
                None => {
                    "INSERT INTO inventory_items (item_id, version, doc) VALUES ($1, $2, $3) \
                     ON CONFLICT (item_id) DO NOTHING"
                }
                Some(_) => {
                    "UPDATE inventory_items SET version = $2, doc = $3 \
                     WHERE item_id = $1 AND ($4::BIGINT < 0 OR version = $4)"
                }
            };
            let mut query = sqlx::query(sql)
                .bind(*w.record.id_typed().as_uuid())
                .bind(w.record.version() as i64)
                .bind(doc);
            if let Some(expected) = update_guard(w) {
                query = query.bind(expected);
            }
            let result = query
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("write_item", e))?;
            ensure_written(result.rows_affected(), w)?;
        }

        for w in &changeset.reservations {
            let r = &w.record;
            let doc = encode_doc(r)?;
            let sql = match update_guard(w) {
                None => {
                    r#"
                    INSERT INTO inventory_reservations
                        (reservation_id, item_id, cart_id, status, created_at, expires_at, version, doc)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (reservation_id) DO NOTHING
                    "#
                }
                Some(_) => {
                    r#"
                    UPDATE inventory_reservations
                    SET item_id = $2, cart_id = $3, status = $4, created_at = $5,
                        expires_at = $6, version = $7, doc = $8
                    WHERE reservation_id = $1 AND ($9::BIGINT < 0 OR version = $9)
                    "#
                }
            };
            let mut query = sqlx::query(sql)
                .bind(*r.id_typed().as_uuid())
                .bind(*r.item_id().as_uuid())
                .bind(r.cart_id().as_str().to_string())
                .bind(r.status().as_str())
                .bind(r.created_at())
                .bind(r.expires_at())
                .bind(r.version() as i64)
                .bind(doc);
            if let Some(expected) = update_guard(w) {
                query = query.bind(expected);
            }
            let result = query
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("write_reservation", e))?;
            ensure_written(result.rows_affected(), w)?;
        }

        for w in &changeset.transfers {
            let t = &w.record;
            let doc = encode_doc(t)?;
            let sql = match update_guard(w) {
                None => {
                    "INSERT INTO inventory_transfers (transfer_id, created_at, version, doc) \
                     VALUES ($1, $2, $3, $4) ON CONFLICT (transfer_id) DO NOTHING"
                }
                Some(_) => {
                    "UPDATE inventory_transfers SET created_at = $2, version = $3, doc = $4 \
                     WHERE transfer_id = $1 AND ($5::BIGINT < 0 OR version = $5)"
                }
            };
            let mut query = sqlx::query(sql)
                .bind(*t.id_typed().as_uuid())
                .bind(t.created_at())
                .bind(t.version() as i64)
                .bind(doc);
            if let Some(expected) = update_guard(w) {
                query = query.bind(expected);
            }
            let result = query
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("write_transfer", e))?;
            ensure_written(result.rows_affected(), w)?;
        }

        for entry in &changeset.ledger {
            append_entry(&mut tx, entry).await?;
        }

        for stats in &changeset.statistics {
            sqlx::query(
                "INSERT INTO inventory_sales_statistics (item_id, doc) VALUES ($1, $2) \
                 ON CONFLICT (item_id) DO UPDATE SET doc = EXCLUDED.doc",
            )
            .bind(*stats.item_id.as_uuid())
            .bind(encode_doc(stats)?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("write_statistics", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }
}

async fn append_entry(
    tx: &mut Transaction<'_, Postgres>,
    entry: &LedgerEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO inventory_ledger (entry_id, item_id, operation, quantity, occurred_at, doc)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(*entry.id.as_uuid())
    .bind(*entry.item_id.as_uuid())
    .bind(entry.operation.as_str())
    .bind(entry.quantity)
    .bind(entry.timestamp)
    .bind(encode_doc(entry)?)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("append_ledger", e))?;
    Ok(())
}

impl InventoryStore for PostgresInventoryStore {
    fn get_item(&self, item_id: ItemId) -> Result<Option<Item>, StoreError> {
        self.block_on(self.fetch_doc(
            "get_item",
            sqlx::query("SELECT doc FROM inventory_items WHERE item_id = $1").bind(*item_id.as_uuid()),
        ))
    }

    fn list_items(&self) -> Result<Vec<Item>, StoreError> {
        self.block_on(self.fetch_docs(
            "list_items",
            sqlx::query("SELECT doc FROM inventory_items ORDER BY item_id"),
        ))
    }

    fn get_reservation(&self, reservation_id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        self.block_on(self.fetch_doc(
            "get_reservation",
            sqlx::query("SELECT doc FROM inventory_reservations WHERE reservation_id = $1")
                .bind(*reservation_id.as_uuid()),
        ))
    }

    fn reservations_for_item(&self, item_id: ItemId) -> Result<Vec<Reservation>, StoreError> {
        self.block_on(self.fetch_docs(
            "reservations_for_item",
            sqlx::query(
                "SELECT doc FROM inventory_reservations WHERE item_id = $1 \
                 ORDER BY created_at, reservation_id",
            )
            .bind(*item_id.as_uuid()),
        ))
    }

    fn reservations_for_cart(&self, cart_id: &CartId) -> Result<Vec<Reservation>, StoreError> {
        self.block_on(self.fetch_docs(
            "reservations_for_cart",
            sqlx::query(
                "SELECT doc FROM inventory_reservations WHERE cart_id = $1 \
                 ORDER BY created_at, reservation_id",
            )
            .bind(cart_id.as_str().to_string()),
        ))
    }

    fn active_reservations(&self) -> Result<Vec<Reservation>, StoreError> {
        self.block_on(self.fetch_docs(
            "active_reservations",
            sqlx::query(
                "SELECT doc FROM inventory_reservations WHERE status = 'ACTIVE' \
                 ORDER BY created_at, reservation_id",
            ),
        ))
    }

    fn due_reservations(&self, now: DateTime<Utc>) -> Result<Vec<Reservation>, StoreError> {
        self.block_on(self.fetch_docs(
            "due_reservations",
            sqlx::query(
                "SELECT doc FROM inventory_reservations \
                 WHERE status = 'ACTIVE' AND expires_at <= $1 \
                 ORDER BY created_at, reservation_id",
            )
            .bind(now),
        ))
    }

    fn ledger_for_item(&self, item_id: ItemId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.block_on(self.fetch_docs(
            "ledger_for_item",
            sqlx::query("SELECT doc FROM inventory_ledger WHERE item_id = $1 ORDER BY seq")
                .bind(*item_id.as_uuid()),
        ))
    }

    fn sales_since(&self, since: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError> {
        self.block_on(self.fetch_docs(
            "sales_since",
            sqlx::query(
                "SELECT doc FROM inventory_ledger \
                 WHERE operation = 'SALE' AND occurred_at >= $1 ORDER BY seq",
            )
            .bind(since),
        ))
    }

    fn statistics(&self, item_id: ItemId) -> Result<Option<SalesStatistics>, StoreError> {
        self.block_on(self.fetch_doc(
            "statistics",
            sqlx::query("SELECT doc FROM inventory_sales_statistics WHERE item_id = $1")
                .bind(*item_id.as_uuid()),
        ))
    }

    fn get_transfer(&self, transfer_id: TransferId) -> Result<Option<Transfer>, StoreError> {
        self.block_on(self.fetch_doc(
            "get_transfer",
            sqlx::query("SELECT doc FROM inventory_transfers WHERE transfer_id = $1")
                .bind(*transfer_id.as_uuid()),
        ))
    }

    fn list_transfers(&self) -> Result<Vec<Transfer>, StoreError> {
        self.block_on(self.fetch_docs(
            "list_transfers",
            sqlx::query("SELECT doc FROM inventory_transfers ORDER BY created_at, transfer_id"),
        ))
    }

    fn commit(&self, changeset: Changeset) -> Result<(), StoreError> {
        self.block_on(self.commit_changeset(changeset))
    }
}

fn encode_doc<T: Serialize>(record: &T) -> Result<JsonValue, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_doc<T: DeserializeOwned>(row: &PgRow) -> Result<T, StoreError> {
    let doc: JsonValue = row
        .try_get("doc")
        .map_err(|e| StoreError::Serialization(format!("failed to read doc column: {e}")))?;
    serde_json::from_value(doc).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// `None` for an insert (expected version 0), otherwise the version the
/// UPDATE must match (`-1` matches any).
fn update_guard<T>(write: &VersionedWrite<T>) -> Option<i64> {
    match write.expected {
        ExpectedVersion::Exact(0) => None,
        ExpectedVersion::Exact(v) => Some(v as i64),
        ExpectedVersion::Any => Some(-1),
    }
}

fn ensure_written<T: AggregateRoot>(rows_affected: u64, write: &VersionedWrite<T>) -> Result<(), StoreError> {
    if rows_affected == 0 {
        return Err(StoreError::Concurrency(format!(
            "{:?}: expected {:?}, stored version differs",
            write.record.id(),
            write.expected
        )));
    }
    Ok(())
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => StoreError::Concurrency(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}
