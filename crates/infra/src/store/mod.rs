//! Persistent store boundary.
//!
//! The warehouse service talks to storage only through the small capability
//! traits in [`r#trait`]; the in-memory store doubles for Postgres in tests.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryWarehouseStore;
pub use postgres::PostgresWarehouseStore;
pub use r#trait::{
    ArticleStore, ProductStore, SaleStore, SaleTransaction, StoreError, WarehouseStore,
};
