//! Supplier directory store

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

use super::db::StoreError;

/// Supplier row
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Supplier {
    pub supplier_id: i64,
    pub name: String,
    pub contact: Option<String>,
}

/// Supplier store operations
#[derive(Clone)]
pub struct SupplierStore {
    pool: SqlitePool,
}

impl SupplierStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a supplier and return it with its fresh identifier
    pub async fn add(&self, name: &str, contact: &str) -> Result<Supplier, StoreError> {
        let result = sqlx::query("INSERT INTO suppliers (name, contact) VALUES (?, ?)")
            .bind(name)
            .bind(contact)
            .execute(&self.pool)
            .await?;

        Ok(Supplier {
            supplier_id: result.last_insert_rowid(),
            name: name.to_string(),
            contact: Some(contact.to_string()),
        })
    }

    /// Ensure a supplier is absent. Cascades to its purchases; deleting an
    /// unknown id succeeds without effect.
    pub async fn delete(&self, supplier_id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM suppliers WHERE supplier_id = ?")
            .bind(supplier_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// All suppliers, newest identifier first
    pub async fn list(&self) -> Result<Vec<Supplier>, StoreError> {
        let suppliers = sqlx::query_as("SELECT * FROM suppliers ORDER BY supplier_id DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(suppliers)
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM suppliers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
