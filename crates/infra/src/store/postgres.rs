//! Postgres-backed warehouse store.
//!
//! ## Atomicity
//!
//! Every write batch runs in one transaction. A sale decrements each article with a
//! conditional update (`... WHERE stock >= $amount`), so the availability check and
//! the decrement are a single statement; zero rows affected means the stock ran out
//! (or the amount was not positive).
//! The row lock taken by that update is held until the sale commits or rolls back,
//! which linearizes concurrent sales that share an article.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (foreign key violation) on a BOM row | `23503` | `ArticleNotFound` |
//! | Database (other) | any | `Database` |
//! | PoolClosed / network / other | N/A | `Database` |

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};

use warehouse_core::{ArticleId, ProductId};
use warehouse_inventory::{available_units, Article, BomLine, Product, ProductWithStock};

use crate::config::{Credentials, PostgresConfig};

use super::r#trait::{
    ArticleStore, ProductStore, SaleStore, SaleTransaction, StoreError, WarehouseStore,
};

const SCHEMA: &str = include_str!("schema.sql");

/// Postgres-backed warehouse store.
///
/// ## Thread Safety
///
/// Uses SQLx connection pool which is thread-safe (Arc + Send + Sync).
#[derive(Debug, Clone)]
pub struct PostgresWarehouseStore {
    pool: Arc<PgPool>,
}

impl PostgresWarehouseStore {
    /// Wrap an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a connection pool for `config`.
    #[instrument(
        skip(config, credentials),
        fields(host = %config.host, port = config.port, database = %config.database),
        err
    )]
    pub async fn connect(
        config: &PostgresConfig,
        credentials: &Credentials,
    ) -> Result<Self, StoreError> {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&credentials.username)
            .password(&credentials.password);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        Ok(Self::new(pool))
    }

    /// Create tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ArticleStore for PostgresWarehouseStore {
    #[instrument(skip(self, articles), fields(article_count = articles.len()), err)]
    async fn create_or_update_articles(&self, articles: &[Article]) -> Result<(), StoreError> {
        if articles.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for article in articles {
            sqlx::query(
                r#"
                INSERT INTO article (article_id, article_name, stock)
                VALUES ($1, $2, $3)
                ON CONFLICT (article_id)
                DO UPDATE SET
                    article_name = EXCLUDED.article_name,
                    stock = EXCLUDED.stock,
                    updated_at = NOW()
                "#,
            )
            .bind(article.id.as_str())
            .bind(&article.name)
            .bind(article.stock)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_article", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(article_id = %id), err)]
    async fn get_article(&self, id: &ArticleId) -> Result<Option<Article>, StoreError> {
        let row = sqlx::query(
            "SELECT article_id, article_name, stock FROM article WHERE article_id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_article", e))?;

        row.as_ref().map(article_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_articles(&self) -> Result<Vec<Article>, StoreError> {
        let rows = sqlx::query(
            "SELECT article_id, article_name, stock FROM article ORDER BY article_id ASC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_articles", e))?;

        rows.iter().map(article_from_row).collect()
    }
}

#[async_trait]
impl ProductStore for PostgresWarehouseStore {
    #[instrument(skip(self, products), fields(product_count = products.len()), err)]
    async fn create_or_update_products(&self, products: &[Product]) -> Result<(), StoreError> {
        if products.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        for product in products {
            ensure_articles_exist(&mut tx, product).await?;

            sqlx::query(
                r#"
                INSERT INTO product (product_id, product_name)
                VALUES ($1, $2)
                ON CONFLICT (product_id)
                DO UPDATE SET
                    product_name = EXCLUDED.product_name,
                    updated_at = NOW()
                "#,
            )
            .bind(product.id.as_str())
            .bind(&product.name)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("upsert_product", e))?;

            sqlx::query("DELETE FROM product_article WHERE product_id = $1")
                .bind(product.id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("delete_product_articles", e))?;

            for (position, line) in product.bom.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO product_article (product_id, position, article_id, article_amount)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(product.id.as_str())
                .bind(position as i32)
                .bind(line.article_id.as_str())
                .bind(line.amount)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_foreign_key_violation(&e) {
                        StoreError::ArticleNotFound(line.article_id.clone())
                    } else {
                        map_sqlx_error("insert_product_article", e)
                    }
                })?;
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT
                p.product_id,
                p.product_name,
                pa.article_id,
                pa.article_amount,
                NULL::BIGINT AS stock
            FROM product p
            LEFT JOIN product_article pa ON pa.product_id = p.product_id
            WHERE p.product_id = $1
            ORDER BY pa.position ASC
            "#,
        )
        .bind(id.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        let (mut products, _) = group_product_rows(&rows)?;
        Ok(products.pop())
    }

    /// One statement, so every product is derived from the same snapshot of stock.
    #[instrument(skip(self), fields(product_count = tracing::field::Empty), err)]
    async fn get_all_products(&self) -> Result<Vec<ProductWithStock>, StoreError> {
        let span = Span::current();

        let rows = sqlx::query(
            r#"
            SELECT
                p.product_id,
                p.product_name,
                pa.article_id,
                pa.article_amount,
                a.stock
            FROM product p
            LEFT JOIN product_article pa ON pa.product_id = p.product_id
            LEFT JOIN article a ON a.article_id = pa.article_id
            ORDER BY p.product_id ASC, pa.position ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_all_products", e))?;

        let (products, stock) = group_product_rows(&rows)?;
        span.record("product_count", products.len());

        Ok(products
            .into_iter()
            .map(|product| ProductWithStock {
                available_units: available_units(&product.bom, |id| stock.get(id).copied()),
                product,
            })
            .collect())
    }
}

/// Sale unit over one Postgres transaction.
struct PostgresSaleTransaction {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PostgresSaleTransaction {
    fn tx(
        &mut self,
        operation: &'static str,
    ) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx
            .as_mut()
            .ok_or_else(|| StoreError::database(operation, "transaction already finished"))
    }
}

#[async_trait]
impl SaleTransaction for PostgresSaleTransaction {
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn bill_of_materials(
        &mut self,
        product_id: &ProductId,
    ) -> Result<Option<Vec<BomLine>>, StoreError> {
        let tx = self.tx("bill_of_materials")?;
        let rows = sqlx::query(
            r#"
            SELECT
                p.product_id,
                p.product_name,
                pa.article_id,
                pa.article_amount,
                NULL::BIGINT AS stock
            FROM product p
            LEFT JOIN product_article pa ON pa.product_id = p.product_id
            WHERE p.product_id = $1
            ORDER BY pa.position ASC
            "#,
        )
        .bind(product_id.as_str())
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("bill_of_materials", e))?;

        let (mut products, _) = group_product_rows(&rows)?;
        Ok(products.pop().map(|p| p.bom))
    }

    #[instrument(skip(self), fields(article_id = %article_id), err)]
    async fn decrement_stock_if_available(
        &mut self,
        article_id: &ArticleId,
        amount: i64,
    ) -> Result<bool, StoreError> {
        let tx = self.tx("decrement_stock")?;
        let result = sqlx::query(
            r#"
            UPDATE article
            SET stock = stock - $1, updated_at = NOW()
            WHERE article_id = $2 AND $1 > 0 AND stock >= $1
            "#,
        )
        .bind(amount)
        .bind(article_id.as_str())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("decrement_stock", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::database("commit", "transaction already finished"))?;
        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(|e| map_sqlx_error("rollback", e)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SaleStore for PostgresWarehouseStore {
    async fn begin_sale(&self) -> Result<Box<dyn SaleTransaction>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresSaleTransaction { tx: Some(tx) }))
    }
}

#[async_trait]
impl WarehouseStore for PostgresWarehouseStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Fail with `ArticleNotFound` if any article of `product` is missing.
async fn ensure_articles_exist(
    tx: &mut Transaction<'_, Postgres>,
    product: &Product,
) -> Result<(), StoreError> {
    let wanted: Vec<String> = product
        .referenced_articles()
        .into_iter()
        .map(|id| id.as_str().to_string())
        .collect();
    if wanted.is_empty() {
        return Ok(());
    }

    let rows = sqlx::query("SELECT article_id FROM article WHERE article_id = ANY($1)")
        .bind(&wanted)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("check_articles", e))?;

    let mut found = Vec::with_capacity(rows.len());
    for row in &rows {
        let id: String = row
            .try_get("article_id")
            .map_err(|e| map_sqlx_error("check_articles", e))?;
        found.push(id);
    }

    match wanted.into_iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(StoreError::ArticleNotFound(ArticleId::new(missing))),
        None => Ok(()),
    }
}

fn article_from_row(row: &PgRow) -> Result<Article, StoreError> {
    let read = |e: sqlx::Error| map_sqlx_error("read_article_row", e);
    Ok(Article {
        id: ArticleId::new(row.try_get::<String, _>("article_id").map_err(read)?),
        name: row.try_get("article_name").map_err(read)?,
        stock: row.try_get("stock").map_err(read)?,
    })
}

/// Fold `(product, bom line, stock)` rows into products, keeping row order.
///
/// Also returns the stock of every article seen, so availability is computed
/// against the same rows.
fn group_product_rows(
    rows: &[PgRow],
) -> Result<(Vec<Product>, HashMap<ArticleId, i64>), StoreError> {
    let read = |e: sqlx::Error| map_sqlx_error("read_product_row", e);
    let mut products: Vec<Product> = Vec::new();
    let mut index: BTreeMap<String, usize> = BTreeMap::new();
    let mut stock = HashMap::new();

    for row in rows {
        let product_id: String = row.try_get("product_id").map_err(read)?;
        let slot = match index.get(&product_id) {
            Some(slot) => *slot,
            None => {
                products.push(Product {
                    id: ProductId::new(product_id.clone()),
                    name: row.try_get("product_name").map_err(read)?,
                    bom: Vec::new(),
                });
                index.insert(product_id, products.len() - 1);
                products.len() - 1
            }
        };

        let article_id: Option<String> = row.try_get("article_id").map_err(read)?;
        let amount: Option<i64> = row.try_get("article_amount").map_err(read)?;
        if let (Some(article_id), Some(amount)) = (article_id, amount) {
            let article_id = ArticleId::new(article_id);
            if let Some(s) = row.try_get::<Option<i64>, _>("stock").map_err(read)? {
                stock.insert(article_id.clone(), s);
            }
            products[slot].bom.push(BomLine { article_id, amount });
        }
    }

    Ok((products, stock))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &'static str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            StoreError::database(
                operation,
                format!("{} (code {})", db_err.message(), code),
            )
        }
        sqlx::Error::PoolClosed => StoreError::database(operation, "connection pool closed"),
        sqlx::Error::PoolTimedOut => {
            StoreError::database(operation, "timed out acquiring a connection")
        }
        other => StoreError::database(operation, other.to_string()),
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23503";
        }
    }
    false
}
