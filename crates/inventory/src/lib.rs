//! Inventory domain module.
//!
//! This crate contains business rules for articles, products and their bills of
//! materials, implemented purely as deterministic domain logic (no IO, no HTTP,
//! no storage).

pub mod article;
pub mod product;
pub mod sale;
pub mod stock;

pub use article::Article;
pub use product::{consolidate, BomLine, Product, ProductWithStock};
pub use sale::Sale;
pub use stock::available_units;
