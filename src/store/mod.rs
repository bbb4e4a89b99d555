//! Data store modules backed by SQLite

pub mod admin;
pub mod db;
pub mod products;
pub mod purchases;
pub mod suppliers;

pub use admin::AdminStore;
pub use db::{connect, init_schema, StoreError};
pub use products::ProductStore;
pub use purchases::PurchaseStore;
pub use suppliers::SupplierStore;
