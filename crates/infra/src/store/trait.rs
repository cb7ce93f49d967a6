use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use warehouse_core::{ArticleId, ProductId};
use warehouse_inventory::{Article, BomLine, Product, ProductWithStock};

/// Store operation error.
///
/// These are **infrastructure errors** as opposed to domain errors (validation).
/// `ArticleNotFound` is kept apart from generic database failures so callers can
/// report a dangling bill-of-materials reference as a not-found condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("article not found: {0}")]
    ArticleNotFound(ArticleId),

    #[error("database error in {operation}: {message}")]
    Database {
        operation: &'static str,
        message: String,
    },
}

impl StoreError {
    pub fn database(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Database {
            operation,
            message: message.into(),
        }
    }
}

/// Raw article records.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Upsert every article by id; name and stock are overwritten.
    ///
    /// The batch is all-or-nothing.
    async fn create_or_update_articles(&self, articles: &[Article]) -> Result<(), StoreError>;

    async fn get_article(&self, id: &ArticleId) -> Result<Option<Article>, StoreError>;

    /// All articles, ordered by id.
    async fn list_articles(&self) -> Result<Vec<Article>, StoreError>;
}

/// Product records and their bills of materials.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Upsert every product by id, replacing its bill of materials.
    ///
    /// Fails with [`StoreError::ArticleNotFound`] if any line references an
    /// unknown article; in that case nothing from the batch is persisted.
    async fn create_or_update_products(&self, products: &[Product]) -> Result<(), StoreError>;

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;

    /// Every product with its available units, computed from one consistent
    /// view of article stock. Ordered by product id.
    async fn get_all_products(&self) -> Result<Vec<ProductWithStock>, StoreError>;
}

/// One atomic sale unit.
///
/// Decrements are invisible to other readers until `commit`. Dropping the
/// transaction without committing discards them.
#[async_trait]
pub trait SaleTransaction: Send {
    /// Bill of materials of a product, or `None` if the product is unknown.
    async fn bill_of_materials(
        &mut self,
        product_id: &ProductId,
    ) -> Result<Option<Vec<BomLine>>, StoreError>;

    /// Decrement `article_id` by `amount` only if its stock is at least `amount`.
    ///
    /// Returns `false` (and changes nothing) when stock is insufficient or the
    /// article does not exist. Check and decrement are one atomic step.
    async fn decrement_stock_if_available(
        &mut self,
        article_id: &ArticleId,
        amount: i64,
    ) -> Result<bool, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;

    async fn rollback(&mut self) -> Result<(), StoreError>;
}

/// Entry point for sale transactions.
#[async_trait]
pub trait SaleStore: Send + Sync {
    async fn begin_sale(&self) -> Result<Box<dyn SaleTransaction>, StoreError>;
}

/// The full capability set plus connection lifecycle.
#[async_trait]
pub trait WarehouseStore: ArticleStore + ProductStore + SaleStore {
    /// Check the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Release connections. Later calls fail.
    async fn close(&self);
}

#[async_trait]
impl<S> ArticleStore for Arc<S>
where
    S: ArticleStore + ?Sized,
{
    async fn create_or_update_articles(&self, articles: &[Article]) -> Result<(), StoreError> {
        (**self).create_or_update_articles(articles).await
    }

    async fn get_article(&self, id: &ArticleId) -> Result<Option<Article>, StoreError> {
        (**self).get_article(id).await
    }

    async fn list_articles(&self) -> Result<Vec<Article>, StoreError> {
        (**self).list_articles().await
    }
}

#[async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn create_or_update_products(&self, products: &[Product]) -> Result<(), StoreError> {
        (**self).create_or_update_products(products).await
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        (**self).get_product(id).await
    }

    async fn get_all_products(&self) -> Result<Vec<ProductWithStock>, StoreError> {
        (**self).get_all_products().await
    }
}

#[async_trait]
impl<S> SaleStore for Arc<S>
where
    S: SaleStore + ?Sized,
{
    async fn begin_sale(&self) -> Result<Box<dyn SaleTransaction>, StoreError> {
        (**self).begin_sale().await
    }
}

#[async_trait]
impl<S> WarehouseStore for Arc<S>
where
    S: WarehouseStore + ?Sized,
{
    async fn ping(&self) -> Result<(), StoreError> {
        (**self).ping().await
    }

    async fn close(&self) {
        (**self).close().await
    }
}
