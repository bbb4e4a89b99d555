//! SQLite pool setup, schema bootstrap, and store error type

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::info;

/// Store error types
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Insert referenced a product or supplier row that does not exist
    #[error("referenced row does not exist")]
    ForeignKey,

    #[error(transparent)]
    Sqlx(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if matches!(db_err.kind(), sqlx::error::ErrorKind::ForeignKeyViolation) {
                return StoreError::ForeignKey;
            }
        }
        StoreError::Sqlx(err)
    }
}

/// Open the SQLite pool.
///
/// Foreign-key enforcement is per-connection in SQLite; setting it in the
/// connect options applies the pragma to every pooled connection, which the
/// ON DELETE CASCADE rules depend on.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(StoreError::Sqlx)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Create tables if absent and seed the bootstrap admin credential.
///
/// The admin seed uses INSERT OR IGNORE: inserted on first initialization,
/// never overwritten on later startups.
pub async fn init_schema(
    pool: &SqlitePool,
    admin_username: &str,
    admin_password: &str,
) -> Result<(), StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS admin (
            username TEXT PRIMARY KEY,
            password TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS products (
            prod_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            category TEXT,
            price TEXT,
            stock_qty INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS suppliers (
            supplier_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            contact TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS purchases (
            purchase_id INTEGER PRIMARY KEY AUTOINCREMENT,
            prod_id INTEGER,
            supplier_id INTEGER,
            quantity INTEGER NOT NULL,
            date TEXT NOT NULL,
            FOREIGN KEY(prod_id) REFERENCES products(prod_id) ON DELETE CASCADE,
            FOREIGN KEY(supplier_id) REFERENCES suppliers(supplier_id) ON DELETE CASCADE
        )",
    )
    .execute(pool)
    .await?;

    let seeded = sqlx::query("INSERT OR IGNORE INTO admin (username, password) VALUES (?, ?)")
        .bind(admin_username)
        .bind(admin_password)
        .execute(pool)
        .await?;

    if seeded.rows_affected() > 0 {
        info!("Seeded bootstrap admin credential for '{}'", admin_username);
    }

    Ok(())
}

#[cfg(test)]
pub(crate) async fn memory_pool() -> SqlitePool {
    // Single connection so every test statement sees the same in-memory
    // database; foreign_keys is set through the same path as production.
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();

    init_schema(&pool, "admin", "1234").await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_init_is_idempotent_and_seed_is_insert_if_absent() {
        let pool = memory_pool().await;

        // Second init must not error or clobber the seeded credential
        sqlx::query("UPDATE admin SET password = 'changed' WHERE username = 'admin'")
            .execute(&pool)
            .await
            .unwrap();
        init_schema(&pool, "admin", "1234").await.unwrap();

        let (password,): (String,) =
            sqlx::query_as("SELECT password FROM admin WHERE username = 'admin'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(password, "changed");
    }
}
