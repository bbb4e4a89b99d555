//! Purchase records and the compound restock write

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

use super::db::StoreError;

/// Purchase joined with its product and supplier names.
///
/// Cascade delete removes purchases together with their product or supplier,
/// so the join never has to tolerate a dangling reference.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PurchaseRow {
    pub purchase_id: i64,
    pub product: String,
    pub supplier: String,
    pub quantity: i64,
    pub date: NaiveDate,
}

const JOINED_SELECT: &str = "SELECT p.purchase_id, pr.name AS product, s.name AS supplier, p.quantity, p.date
     FROM purchases p
     JOIN products pr ON p.prod_id = pr.prod_id
     JOIN suppliers s ON p.supplier_id = s.supplier_id
     ORDER BY p.date DESC, p.purchase_id DESC";

/// Purchase store operations
#[derive(Clone)]
pub struct PurchaseStore {
    pool: SqlitePool,
}

impl PurchaseStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a purchase and restock the product, atomically.
    ///
    /// Inserts the purchase row and increments the product's stock_qty inside
    /// one transaction; either both writes land or neither does. A prod_id or
    /// supplier_id that references no existing row fails the insert with
    /// [`StoreError::ForeignKey`] and the transaction rolls back, leaving
    /// stock untouched. The increment is expressed in SQL rather than
    /// read-modify-write, so concurrent records cannot lose an update.
    pub async fn record(
        &self,
        prod_id: i64,
        supplier_id: i64,
        quantity: i64,
        date: NaiveDate,
    ) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let inserted =
            sqlx::query("INSERT INTO purchases (prod_id, supplier_id, quantity, date) VALUES (?, ?, ?, ?)")
                .bind(prod_id)
                .bind(supplier_id)
                .bind(quantity)
                .bind(date)
                .execute(&mut *tx)
                .await?;

        sqlx::query("UPDATE products SET stock_qty = stock_qty + ? WHERE prod_id = ?")
            .bind(quantity)
            .bind(prod_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(inserted.last_insert_rowid())
    }

    /// All purchases joined with product and supplier names, most recent date
    /// first, ties broken by most-recently-created first
    pub async fn list(&self) -> Result<Vec<PurchaseRow>, StoreError> {
        let purchases = sqlx::query_as(JOINED_SELECT).fetch_all(&self.pool).await?;
        Ok(purchases)
    }

    /// Most recent purchases, same ordering as [`list`](Self::list)
    pub async fn recent(&self, limit: i64) -> Result<Vec<PurchaseRow>, StoreError> {
        let query = format!("{} LIMIT ?", JOINED_SELECT);
        let purchases = sqlx::query_as(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(purchases)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM purchases")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
