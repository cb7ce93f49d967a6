//! Warehouse service: validation, store calls, and the sale pipeline.
//!
//! ## Sale Flow
//!
//! ```text
//! sell_product(product_id)
//!   ↓
//! 1. Begin a sale transaction
//!   ↓
//! 2. Resolve the bill of materials (unknown product -> ProductNotFound)
//!   ↓
//! 3. Consolidate duplicate lines, ascending article id
//!   ↓
//! 4. Conditionally decrement every line (first shortfall -> ProductStockFinished)
//!   ↓
//! 5. Commit, or roll back on any failure
//! ```
//!
//! Every operation runs under an [`OperationContext`]. An interrupted operation
//! drops its in-flight future, which discards any open transaction. Steps 1-4 of
//! a sale are interruptible; the commit in step 5 always runs to completion.

use chrono::Utc;
use thiserror::Error;
use tracing::instrument;

use warehouse_core::{ArticleId, DomainError, ProductId};
use warehouse_inventory::{consolidate, Article, BomLine, Product, ProductWithStock, Sale};

use crate::context::{Interrupted, OperationContext};
use crate::store::{SaleTransaction, StoreError, WarehouseStore};

/// Coarse classification used by adapters to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PreconditionFailed,
    ValidationFailure,
    WriteFailure,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarehouseError {
    #[error("article not found: {0}")]
    ArticleNotFound(ArticleId),

    #[error("product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("product {0} is out of stock")]
    ProductStockFinished(ProductId),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(StoreError),

    #[error("operation {0} was cancelled")]
    Cancelled(&'static str),

    #[error("operation {0} exceeded its deadline")]
    DeadlineExceeded(&'static str),
}

impl WarehouseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ArticleNotFound(_) | Self::ProductNotFound(_) => ErrorKind::NotFound,
            Self::ProductStockFinished(_) => ErrorKind::PreconditionFailed,
            Self::Validation(_) => ErrorKind::ValidationFailure,
            Self::Store(_) => ErrorKind::WriteFailure,
            Self::Cancelled(_) | Self::DeadlineExceeded(_) => ErrorKind::Cancelled,
        }
    }
}

impl From<DomainError> for WarehouseError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg)
            | DomainError::InvariantViolation(msg)
            | DomainError::InvalidId(msg) => Self::Validation(msg),
        }
    }
}

impl From<StoreError> for WarehouseError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::ArticleNotFound(id) => Self::ArticleNotFound(id),
            other => Self::Store(other),
        }
    }
}

impl From<Interrupted> for WarehouseError {
    fn from(value: Interrupted) -> Self {
        match value {
            Interrupted::Cancelled(op) => Self::Cancelled(op),
            Interrupted::DeadlineExceeded(op) => Self::DeadlineExceeded(op),
        }
    }
}

/// Application façade over a [`WarehouseStore`].
#[derive(Debug, Clone)]
pub struct WarehouseService<S> {
    store: S,
}

impl<S> WarehouseService<S>
where
    S: WarehouseStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create or overwrite articles by id. All-or-nothing.
    #[instrument(skip(self, ctx, articles), fields(article_count = articles.len()), err)]
    pub async fn upsert_articles(
        &self,
        ctx: &OperationContext,
        articles: &[Article],
    ) -> Result<(), WarehouseError> {
        for article in articles {
            article.validate()?;
        }
        ctx.run(
            "upsert_articles",
            self.store.create_or_update_articles(articles),
        )
        .await??;
        Ok(())
    }

    /// Create or overwrite products, replacing each bill of materials.
    ///
    /// Any unknown article in the batch fails the whole batch with
    /// [`WarehouseError::ArticleNotFound`].
    #[instrument(skip(self, ctx, products), fields(product_count = products.len()), err)]
    pub async fn upsert_products(
        &self,
        ctx: &OperationContext,
        products: &[Product],
    ) -> Result<(), WarehouseError> {
        for product in products {
            product.validate()?;
        }
        ctx.run(
            "upsert_products",
            self.store.create_or_update_products(products),
        )
        .await??;
        Ok(())
    }

    /// Every product with the units currently assemblable from stock.
    #[instrument(skip(self, ctx), err)]
    pub async fn list_products_with_stock(
        &self,
        ctx: &OperationContext,
    ) -> Result<Vec<ProductWithStock>, WarehouseError> {
        Ok(ctx
            .run("list_products_with_stock", self.store.get_all_products())
            .await??)
    }

    #[instrument(skip(self, ctx), fields(article_id = %id), err)]
    pub async fn get_article(
        &self,
        ctx: &OperationContext,
        id: &ArticleId,
    ) -> Result<Article, WarehouseError> {
        ctx.run("get_article", self.store.get_article(id))
            .await??
            .ok_or_else(|| WarehouseError::ArticleNotFound(id.clone()))
    }

    #[instrument(skip(self, ctx), err)]
    pub async fn list_articles(
        &self,
        ctx: &OperationContext,
    ) -> Result<Vec<Article>, WarehouseError> {
        Ok(ctx.run("list_articles", self.store.list_articles()).await??)
    }

    /// Sell one unit of `product_id`.
    ///
    /// Either every article of the bill of materials is decremented or none is.
    /// Concurrent sales never drive any article below zero.
    #[instrument(skip(self, ctx), fields(product_id = %product_id), err)]
    pub async fn sell_product(
        &self,
        ctx: &OperationContext,
        product_id: &ProductId,
    ) -> Result<Sale, WarehouseError> {
        if product_id.as_str().trim().is_empty() {
            return Err(WarehouseError::Validation(
                "product id cannot be empty".to_string(),
            ));
        }
        let (mut tx, consumed) = ctx
            .run("sell_product", self.stage_sale(product_id))
            .await??;

        // Not raced against `ctx`: a COMMIT already sent may have applied.
        tx.commit().await?;
        tracing::info!(product_id = %product_id, lines = consumed.len(), "product sold");
        Ok(Sale {
            product_id: product_id.clone(),
            consumed,
            sold_at: Utc::now(),
        })
    }

    /// Begin a sale and decrement every line, leaving the transaction uncommitted.
    ///
    /// Rolls back before returning an error.
    async fn stage_sale(
        &self,
        product_id: &ProductId,
    ) -> Result<(Box<dyn SaleTransaction>, Vec<BomLine>), WarehouseError> {
        let mut tx = self.store.begin_sale().await?;

        match consume_bill_of_materials(tx.as_mut(), product_id).await {
            Ok(consumed) => Ok((tx, consumed)),
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        product_id = %product_id,
                        error = %rollback_err,
                        "rollback after failed sale did not complete"
                    );
                }
                Err(err)
            }
        }
    }

    /// Readiness probe.
    pub async fn ping(&self, ctx: &OperationContext) -> Result<(), WarehouseError> {
        Ok(ctx.run("ping", self.store.ping()).await??)
    }

    pub async fn close(&self) {
        self.store.close().await;
    }
}

async fn consume_bill_of_materials(
    tx: &mut dyn SaleTransaction,
    product_id: &ProductId,
) -> Result<Vec<BomLine>, WarehouseError> {
    let bom = tx
        .bill_of_materials(product_id)
        .await?
        .ok_or_else(|| WarehouseError::ProductNotFound(product_id.clone()))?;

    let lines = consolidate(&bom)?;
    if lines.is_empty() {
        return Err(WarehouseError::ProductStockFinished(product_id.clone()));
    }

    for line in &lines {
        if !tx
            .decrement_stock_if_available(&line.article_id, line.amount)
            .await?
        {
            tracing::debug!(
                product_id = %product_id,
                article_id = %line.article_id,
                amount = line.amount,
                "insufficient stock"
            );
            return Err(WarehouseError::ProductStockFinished(product_id.clone()));
        }
    }

    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_article_not_found_maps_to_not_found() {
        let err: WarehouseError = StoreError::ArticleNotFound("9".into()).into();
        assert_eq!(err, WarehouseError::ArticleNotFound("9".into()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn database_failure_is_a_write_failure() {
        let err: WarehouseError = StoreError::database("upsert_article", "boom").into();
        assert_eq!(err.kind(), ErrorKind::WriteFailure);
    }

    #[test]
    fn domain_errors_are_validation_failures() {
        let err: WarehouseError = DomainError::invalid_id("empty").into();
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    }

    #[test]
    fn interruptions_keep_their_operation() {
        let err: WarehouseError = Interrupted::DeadlineExceeded("sell_product").into();
        assert_eq!(err, WarehouseError::DeadlineExceeded("sell_product"));
        assert_eq!(err.kind(), ErrorKind::Cancelled);
    }

    #[test]
    fn stock_finished_is_a_precondition_failure() {
        let err = WarehouseError::ProductStockFinished("p".into());
        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    }
}
