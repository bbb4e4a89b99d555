//! Product catalog store

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

use super::db::StoreError;

/// Stock level below which a product counts as low stock (strictly less than)
pub const LOW_STOCK_THRESHOLD: i64 = 10;

/// Product row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub prod_id: i64,
    pub name: String,
    pub category: Option<String>,
    pub price: Option<String>,
    pub stock_qty: i64,
}

/// New product for insertion
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    /// Free-form text, stored as given (no numeric interpretation)
    pub price: String,
    pub stock_qty: i64,
}

/// Product store operations
#[derive(Clone)]
pub struct ProductStore {
    pool: SqlitePool,
}

impl ProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a product and return it with its fresh identifier.
    /// Names are not unique; duplicates are allowed.
    pub async fn add(&self, new: NewProduct) -> Result<Product, StoreError> {
        let result = sqlx::query(
            "INSERT INTO products (name, category, price, stock_qty) VALUES (?, ?, ?, ?)",
        )
        .bind(&new.name)
        .bind(&new.category)
        .bind(&new.price)
        .bind(new.stock_qty)
        .execute(&self.pool)
        .await?;

        Ok(Product {
            prod_id: result.last_insert_rowid(),
            name: new.name,
            category: Some(new.category),
            price: Some(new.price),
            stock_qty: new.stock_qty,
        })
    }

    /// Overwrite all mutable fields of a product.
    /// Unknown ids are a silent no-op.
    pub async fn update(&self, prod_id: i64, new: NewProduct) -> Result<(), StoreError> {
        sqlx::query("UPDATE products SET name = ?, category = ?, price = ?, stock_qty = ? WHERE prod_id = ?")
            .bind(&new.name)
            .bind(&new.category)
            .bind(&new.price)
            .bind(new.stock_qty)
            .bind(prod_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Ensure a product is absent. Cascades to its purchases; deleting an
    /// unknown id succeeds without effect.
    pub async fn delete(&self, prod_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM products WHERE prod_id = ?")
            .bind(prod_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All products, newest identifier first
    pub async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let products = sqlx::query_as("SELECT * FROM products ORDER BY prod_id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Fetch a single product by id
    pub async fn get(&self, prod_id: i64) -> Result<Option<Product>, StoreError> {
        let product = sqlx::query_as("SELECT * FROM products WHERE prod_id = ?")
            .bind(prod_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Count of products with stock strictly below the low-stock threshold
    pub async fn low_stock_count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE stock_qty < ?")
            .bind(LOW_STOCK_THRESHOLD)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
