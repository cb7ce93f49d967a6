use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use warehouse_core::{ArticleId, Entity, ProductId};
use warehouse_inventory::{available_units, Article, BomLine, Product, ProductWithStock};

use super::r#trait::{
    ArticleStore, ProductStore, SaleStore, SaleTransaction, StoreError, WarehouseStore,
};

#[derive(Debug, Default)]
struct State {
    articles: BTreeMap<ArticleId, Article>,
    products: BTreeMap<ProductId, Product>,
}

impl State {
    fn stock_of(&self, id: &ArticleId) -> Option<i64> {
        self.articles.get(id).map(|a| a.stock)
    }
}

/// In-memory warehouse store.
///
/// Intended for tests/dev. All state sits behind one async `RwLock`: readers see
/// a consistent snapshot, and an open sale transaction holds the write guard
/// until it commits or is dropped, so sales are serialized.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWarehouseStore {
    state: Arc<RwLock<State>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryWarehouseStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::database(operation, "store is closed"));
        }
        Ok(())
    }
}

fn upsert_all<E>(rows: &mut BTreeMap<E::Id, E>, batch: &[E])
where
    E: Entity + Clone,
{
    for row in batch {
        rows.insert(row.id().clone(), row.clone());
    }
}

#[async_trait]
impl ArticleStore for InMemoryWarehouseStore {
    async fn create_or_update_articles(&self, articles: &[Article]) -> Result<(), StoreError> {
        self.ensure_open("create_or_update_articles")?;
        let mut state = self.state.write().await;
        upsert_all(&mut state.articles, articles);
        Ok(())
    }

    async fn get_article(&self, id: &ArticleId) -> Result<Option<Article>, StoreError> {
        self.ensure_open("get_article")?;
        Ok(self.state.read().await.articles.get(id).cloned())
    }

    async fn list_articles(&self) -> Result<Vec<Article>, StoreError> {
        self.ensure_open("list_articles")?;
        Ok(self.state.read().await.articles.values().cloned().collect())
    }
}

#[async_trait]
impl ProductStore for InMemoryWarehouseStore {
    async fn create_or_update_products(&self, products: &[Product]) -> Result<(), StoreError> {
        self.ensure_open("create_or_update_products")?;
        let mut state = self.state.write().await;

        // Check the whole batch before touching any row.
        for product in products {
            if let Some(missing) = product
                .referenced_articles()
                .into_iter()
                .find(|id| !state.articles.contains_key(*id))
            {
                return Err(StoreError::ArticleNotFound(missing.clone()));
            }
        }

        // Replacing the whole product replaces its bill of materials.
        upsert_all(&mut state.products, products);
        Ok(())
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        self.ensure_open("get_product")?;
        Ok(self.state.read().await.products.get(id).cloned())
    }

    async fn get_all_products(&self) -> Result<Vec<ProductWithStock>, StoreError> {
        self.ensure_open("get_all_products")?;
        let state = self.state.read().await;
        Ok(state
            .products
            .values()
            .map(|product| ProductWithStock {
                available_units: available_units(&product.bom, |id| state.stock_of(id)),
                product: product.clone(),
            })
            .collect())
    }
}

/// Sale unit over the in-memory state.
///
/// Decrements are staged against the guarded state and applied on commit.
struct InMemorySaleTransaction {
    guard: Option<OwnedRwLockWriteGuard<State>>,
    staged: BTreeMap<ArticleId, i64>,
}

impl InMemorySaleTransaction {
    fn state(&self, operation: &'static str) -> Result<&State, StoreError> {
        self.guard
            .as_deref()
            .ok_or_else(|| StoreError::database(operation, "transaction already finished"))
    }
}

#[async_trait]
impl SaleTransaction for InMemorySaleTransaction {
    async fn bill_of_materials(
        &mut self,
        product_id: &ProductId,
    ) -> Result<Option<Vec<BomLine>>, StoreError> {
        let state = self.state("bill_of_materials")?;
        Ok(state.products.get(product_id).map(|p| p.bom.clone()))
    }

    async fn decrement_stock_if_available(
        &mut self,
        article_id: &ArticleId,
        amount: i64,
    ) -> Result<bool, StoreError> {
        let state = self.state("decrement_stock")?;
        if amount <= 0 {
            return Ok(false);
        }
        let Some(stock) = state.stock_of(article_id) else {
            return Ok(false);
        };
        let pending = self.staged.get(article_id).copied().unwrap_or(0);
        let Some(staged) = pending.checked_add(amount).filter(|total| *total <= stock) else {
            return Ok(false);
        };
        self.staged.insert(article_id.clone(), staged);
        Ok(true)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| StoreError::database("commit", "transaction already finished"))?;
        let staged = std::mem::take(&mut self.staged);
        // Check every line before applying any, so a failed commit changes nothing.
        for (article_id, amount) in &staged {
            let remaining = guard
                .stock_of(article_id)
                .and_then(|stock| stock.checked_sub(*amount))
                .filter(|remaining| *remaining >= 0);
            if remaining.is_none() {
                return Err(StoreError::database(
                    "commit",
                    format!("staged decrement of {amount} exceeds stock of article {article_id}"),
                ));
            }
        }
        for (article_id, amount) in staged {
            if let Some(article) = guard.articles.get_mut(&article_id) {
                article.stock -= amount;
            }
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.staged.clear();
        self.guard.take();
        Ok(())
    }
}

#[async_trait]
impl SaleStore for InMemoryWarehouseStore {
    async fn begin_sale(&self) -> Result<Box<dyn SaleTransaction>, StoreError> {
        self.ensure_open("begin_sale")?;
        let guard = self.state.clone().write_owned().await;
        Ok(Box::new(InMemorySaleTransaction {
            guard: Some(guard),
            staged: BTreeMap::new(),
        }))
    }
}

#[async_trait]
impl WarehouseStore for InMemoryWarehouseStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open("ping")
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
