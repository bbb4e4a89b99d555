//! Admin credential store

use sqlx::sqlite::SqlitePool;

use super::db::StoreError;

/// Admin credential operations
#[derive(Clone)]
pub struct AdminStore {
    pool: SqlitePool,
}

impl AdminStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Compare a submitted credential pair against the stored record.
    /// Plain comparison; credential hardening is out of scope.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<bool, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT username FROM admin WHERE username = ? AND password = ?")
                .bind(username)
                .bind(password)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }
}
