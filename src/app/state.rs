//! Application state shared across routes

use std::sync::Arc;

use sqlx::sqlite::SqlitePool;

use crate::config::Config;
use crate::store::{AdminStore, ProductStore, PurchaseStore, SupplierStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub admin_store: AdminStore,
    pub product_store: ProductStore,
    pub supplier_store: SupplierStore,
    pub purchase_store: PurchaseStore,
}

impl AppState {
    pub fn new(config: Config, pool: SqlitePool) -> Self {
        let config = Arc::new(config);

        // Initialize stores over the shared pool
        let admin_store = AdminStore::new(pool.clone());
        let product_store = ProductStore::new(pool.clone());
        let supplier_store = SupplierStore::new(pool.clone());
        let purchase_store = PurchaseStore::new(pool);

        Self {
            config,
            admin_store,
            product_store,
            supplier_store,
            purchase_store,
        }
    }
}
