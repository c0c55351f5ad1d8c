//! Postgres-backed ledger store.
//!
//! A [`PostgresTransaction`] is a database transaction that starts with
//! `SELECT ... FOR UPDATE` on the product row, so movements on the same product
//! serialize while different products proceed in parallel. Plain reads use the
//! pool and never take the row lock.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | StoreError |
//! |---|---|---|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (foreign key violation) | `23503` | `Conflict` |
//! | Database (check violation) | `23514` | `Conflict` |
//! | Database (other), PoolClosed, others | any | `Backend` |

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use stockroom_core::{MovementId, ProductId};
use stockroom_inventory::{
    AggregateRow, GroupBy, GroupKey, MoveType, MovementFilter, Reason, StockMovement, Unit,
    fold_case,
};
use stockroom_products::{Category, Product, ProductRecord};

use super::{LedgerStore, ProductQuery, StockTransaction};
use crate::error::StoreError;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

const PRODUCT_COLUMNS: &str =
    "id, name, description, category, unit_price, min_stock, pallet_size, current_qty, created_at";

const MOVEMENT_COLUMNS: &str =
    "m.id, m.product_id, m.move_type, m.reason, m.quantity, m.unit, m.note, m.created_at";

/// Shared FROM/WHERE for movement queries; binds `$1..$7` via [`bind_filter`].
const MOVEMENT_FROM: &str = r#"
    FROM stock_movements m
    JOIN products p ON p.id = m.product_id
    WHERE ($1::uuid IS NULL OR m.product_id = $1)
        AND ($2::text IS NULL OR m.move_type = $2)
        AND ($3::text IS NULL OR m.reason = $3)
        AND ($4::timestamptz IS NULL OR m.created_at >= $4)
        AND ($5::timestamptz IS NULL OR m.created_at > $5)
        AND ($6::timestamptz IS NULL OR m.created_at <= $6)
        AND ($7::text IS NULL
            OR translate(p.name, 'İIı', 'iii') ILIKE $7
            OR translate(m.reason, 'İIı', 'iii') ILIKE $7
            OR translate(m.note, 'İIı', 'iii') ILIKE $7)
"#;

#[derive(Debug, Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(format!("migration failed: {e}")))
    }
}

pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
    product: Product,
}

#[async_trait]
impl StockTransaction for PostgresTransaction {
    fn product(&self) -> &Product {
        &self.product
    }

    fn product_mut(&mut self) -> &mut Product {
        &mut self.product
    }

    #[instrument(skip(self, movement), fields(movement_id = %movement.id), err)]
    async fn insert_movement(&mut self, movement: &StockMovement) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stock_movements (id, product_id, move_type, reason, quantity, unit, note, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::from(movement.id))
        .bind(Uuid::from(movement.product_id))
        .bind(movement.move_type.as_str())
        .bind(movement.reason.label())
        .bind(to_i64("quantity", movement.quantity)?)
        .bind(movement.unit.label())
        .bind(movement.note.as_str())
        .bind(movement.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_movement", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(movement_id = %id), err)]
    async fn delete_movement(&mut self, id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        let sql = format!(
            "DELETE FROM stock_movements m WHERE m.id = $1 AND m.product_id = $2 RETURNING {MOVEMENT_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(Uuid::from(id))
            .bind(Uuid::from(self.product.id_typed()))
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("delete_movement", e))?;
        row.map(|r| decode_movement(&r)).transpose()
    }

    #[instrument(skip_all, err)]
    async fn commit(self) -> Result<(), StoreError> {
        let PostgresTransaction { mut tx, product } = self;
        sqlx::query("UPDATE products SET current_qty = $2 WHERE id = $1")
            .bind(Uuid::from(product.id_typed()))
            .bind(to_i64("current_qty", product.current_qty())?)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_current_qty", e))?;
        tx.commit().await.map_err(|e| map_sqlx_error("commit", e))
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    type Tx = PostgresTransaction;

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn begin(&self, product_id: ProductId) -> Result<Option<Self::Tx>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin", e))?;
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(Uuid::from(product_id))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("lock_product", e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(PostgresTransaction {
            tx,
            product: decode_product(&row)?,
        }))
    }

    #[instrument(skip(self, product), fields(product_id = %product.id_typed()), err)]
    async fn insert_product(&self, product: &Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, category, unit_price, min_stock, pallet_size, current_qty, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::from(product.id_typed()))
        .bind(product.name())
        .bind(product.description())
        .bind(product.category().label())
        .bind(product.unit_price())
        .bind(to_i64("min_stock", product.min_stock())?)
        .bind(to_i32("pallet_size", product.pallet_size())?)
        .bind(to_i64("current_qty", product.current_qty())?)
        .bind(product.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_product", e))?;
        Ok(())
    }

    #[instrument(skip(self, product), fields(product_id = %product.id_typed()), err)]
    async fn update_product_details(&self, product: &Product) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = $2, description = $3, category = $4, unit_price = $5, min_stock = $6, pallet_size = $7
            WHERE id = $1
            "#,
        )
        .bind(Uuid::from(product.id_typed()))
        .bind(product.name())
        .bind(product.description())
        .bind(product.category().label())
        .bind(product.unit_price())
        .bind(to_i64("min_stock", product.min_stock())?)
        .bind(to_i32("pallet_size", product.pallet_size())?)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_product_details", e))?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn delete_product(&self, id: ProductId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_product", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_product", e))?;
        row.map(|r| decode_product(&r)).transpose()
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Vec<Product>, StoreError> {
        let sql = format!(
            r#"
            SELECT {PRODUCT_COLUMNS} FROM products
            WHERE ($1::text IS NULL OR category = $1)
                AND ($2::text IS NULL OR translate(name, 'İIı', 'iii') ILIKE $2)
            ORDER BY name ASC, id ASC
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(query.category.map(Category::label))
            .bind(query.search.as_deref().map(like_pattern))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_products", e))?;
        rows.iter().map(decode_product).collect()
    }

    async fn get_movement(&self, id: MovementId) -> Result<Option<StockMovement>, StoreError> {
        let sql = format!("SELECT {MOVEMENT_COLUMNS} FROM stock_movements m WHERE m.id = $1");
        let row = sqlx::query(&sql)
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_movement", e))?;
        row.map(|r| decode_movement(&r)).transpose()
    }

    async fn list_movements(&self, filter: &MovementFilter, limit: usize) -> Result<Vec<StockMovement>, StoreError> {
        let sql = format!("SELECT {MOVEMENT_COLUMNS} {MOVEMENT_FROM} ORDER BY m.created_at DESC, m.id DESC LIMIT $8");
        let rows = bind_filter(sqlx::query(&sql), filter)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_movements", e))?;
        rows.iter().map(decode_movement).collect()
    }

    async fn aggregate(
        &self,
        filter: &MovementFilter,
        group_by: GroupBy,
        signed: bool,
    ) -> Result<Vec<AggregateRow>, StoreError> {
        let dims = [
            (group_by.product, "m.product_id", "NULL::uuid", "product_id"),
            (group_by.move_type, "m.move_type", "NULL::text", "move_type"),
            (group_by.reason, "m.reason", "NULL::text", "reason"),
        ];
        let select: Vec<String> = dims
            .iter()
            .map(|(on, col, null, alias)| format!("{} AS {alias}", if *on { col } else { null }))
            .collect();
        let grouped: Vec<&str> = dims.iter().filter(|d| d.0).map(|d| d.1).collect();
        let group_clause = if grouped.is_empty() {
            String::new()
        } else {
            format!("GROUP BY {}", grouped.join(", "))
        };
        let amount = if signed {
            "CASE WHEN m.move_type = 'IN' THEN m.quantity ELSE -m.quantity END"
        } else {
            "m.quantity"
        };
        let sql = format!(
            "SELECT {}, COALESCE(SUM({amount}), 0)::BIGINT AS total {MOVEMENT_FROM} {group_clause}",
            select.join(", ")
        );

        let rows = bind_filter(sqlx::query(&sql), filter)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("aggregate", e))?;

        let mut out = rows.iter().map(decode_aggregate).collect::<Result<Vec<_>, _>>()?;
        out.sort_by_key(|r| r.key);
        Ok(out)
    }

    #[instrument(skip(self, note), fields(movement_id = %id), err)]
    async fn update_movement_note(&self, id: MovementId, note: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE stock_movements SET note = $2 WHERE id = $1")
            .bind(Uuid::from(id))
            .bind(note)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_movement_note", e))?;
        Ok(result.rows_affected() > 0)
    }
}

fn bind_filter<'q>(query: PgQuery<'q>, filter: &MovementFilter) -> PgQuery<'q> {
    query
        .bind(filter.product_id.map(Uuid::from))
        .bind(filter.move_type.map(MoveType::as_str))
        .bind(filter.reason.map(Reason::label))
        .bind(filter.since)
        .bind(filter.after)
        .bind(filter.until)
        .bind(filter.search.as_deref().map(like_pattern))
}

/// `%text%` over the case-folded text, with LIKE metacharacters escaped.
///
/// Columns are matched through `translate(.., 'İIı', 'iii')` so both sides
/// fold the Turkish I the way [`fold_case`] does.
fn like_pattern(text: &str) -> String {
    let escaped = fold_case(text).replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn to_i64(field: &str, value: u64) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::Conflict(format!("{field} out of range: {value}")))
}

fn to_i32(field: &str, value: u32) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Conflict(format!("{field} out of range: {value}")))
}

fn from_i64<T: TryFrom<i64>>(field: &str, value: i64) -> Result<T, StoreError> {
    T::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} out of range: {value}")))
}

fn parse_label<T: FromStr>(field: &str, raw: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("unknown {field} '{raw}'")))
}

// SQLx row types

#[derive(Debug)]
struct ProductRow {
    id: Uuid,
    name: String,
    description: String,
    category: String,
    unit_price: Decimal,
    min_stock: i64,
    pallet_size: i32,
    current_qty: i64,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category: row.try_get("category")?,
            unit_price: row.try_get("unit_price")?,
            min_stock: row.try_get("min_stock")?,
            pallet_size: row.try_get("pallet_size")?,
            current_qty: row.try_get("current_qty")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<ProductRow> for Product {
    type Error = StoreError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product::from(ProductRecord {
            id: ProductId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            category: parse_label("category", &row.category)?,
            unit_price: row.unit_price,
            min_stock: from_i64("min_stock", row.min_stock)?,
            pallet_size: u32::try_from(row.pallet_size)
                .map_err(|_| StoreError::Corrupt(format!("pallet_size out of range: {}", row.pallet_size)))?,
            current_qty: from_i64("current_qty", row.current_qty)?,
            created_at: row.created_at,
        }))
    }
}

#[derive(Debug)]
struct MovementRow {
    id: Uuid,
    product_id: Uuid,
    move_type: String,
    reason: String,
    quantity: i64,
    unit: String,
    note: String,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for MovementRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(MovementRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            move_type: row.try_get("move_type")?,
            reason: row.try_get("reason")?,
            quantity: row.try_get("quantity")?,
            unit: row.try_get("unit")?,
            note: row.try_get("note")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = StoreError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            id: MovementId::from_uuid(row.id),
            product_id: ProductId::from_uuid(row.product_id),
            move_type: parse_label("move_type", &row.move_type)?,
            reason: parse_label("reason", &row.reason)?,
            quantity: from_i64("quantity", row.quantity)?,
            unit: parse_label::<Unit>("unit", &row.unit)?,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

fn decode_product(row: &PgRow) -> Result<Product, StoreError> {
    let row = ProductRow::from_row(row)
        .map_err(|e| StoreError::Corrupt(format!("failed to deserialize product row: {e}")))?;
    Product::try_from(row)
}

fn decode_movement(row: &PgRow) -> Result<StockMovement, StoreError> {
    let row = MovementRow::from_row(row)
        .map_err(|e| StoreError::Corrupt(format!("failed to deserialize movement row: {e}")))?;
    StockMovement::try_from(row)
}

fn decode_aggregate(row: &PgRow) -> Result<AggregateRow, StoreError> {
    let read = |e: sqlx::Error| StoreError::Corrupt(format!("failed to read aggregate row: {e}"));
    let product_id: Option<Uuid> = row.try_get("product_id").map_err(read)?;
    let move_type: Option<String> = row.try_get("move_type").map_err(read)?;
    let reason: Option<String> = row.try_get("reason").map_err(read)?;
    let total: i64 = row.try_get("total").map_err(read)?;

    Ok(AggregateRow {
        key: GroupKey {
            product_id: product_id.map(ProductId::from_uuid),
            move_type: move_type.as_deref().map(|s| parse_label("move_type", s)).transpose()?,
            reason: reason.as_deref().map(|s| parse_label("reason", s)).transpose()?,
        },
        total,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") | Some("23514") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::Backend(format!("connection pool closed in {operation}")),
        _ => StoreError::Backend(format!("sqlx error in {operation}: {err}")),
    }
}
