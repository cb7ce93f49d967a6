//! Infrastructure layer: stores, configuration, and the warehouse service that
//! coordinates them.

pub mod config;
pub mod context;
pub mod service;
pub mod store;


pub use config::{ConfigError, Credentials, HttpConfig, PostgresConfig, WarehouseConfig};
pub use context::{Interrupted, OperationContext};
pub use service::{ErrorKind, WarehouseError, WarehouseService};
pub use store::{
    ArticleStore, InMemoryWarehouseStore, PostgresWarehouseStore, ProductStore, SaleStore,
    SaleTransaction, StoreError, WarehouseStore,
};
