use serde::{Deserialize, Serialize};

use warehouse_core::{ArticleId, ProductId};
use warehouse_inventory::{Article, BomLine, Product, ProductWithStock};

/// A count that arrives either as a JSON number or as a numeric string
/// (inventory exports carry `"stock": "12"`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Quantity {
    Number(i64),
    Text(String),
}

impl Quantity {
    pub fn parse(&self, field: &str) -> Result<i64, String> {
        match self {
            Quantity::Number(n) => Ok(*n),
            Quantity::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("{field} must be an integer (got {s:?})")),
        }
    }
}

fn parse_id<T>(raw: &str, field: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| format!("{field}: {e}"))
}

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct UpsertArticlesRequest {
    pub inventory: Vec<ArticleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ArticleEntry {
    pub art_id: String,
    pub name: String,
    pub stock: Quantity,
}

impl UpsertArticlesRequest {
    pub fn into_articles(self) -> Result<Vec<Article>, String> {
        self.inventory
            .into_iter()
            .map(|entry| -> Result<Article, String> {
                Ok(Article {
                    id: parse_id::<ArticleId>(&entry.art_id, "art_id")?,
                    stock: entry.stock.parse("stock")?,
                    name: entry.name,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertProductsRequest {
    pub products: Vec<ProductEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProductEntry {
    /// Generated when absent.
    #[serde(rename = "productId", default)]
    pub product_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub contain_articles: Vec<BomLineEntry>,
}

#[derive(Debug, Deserialize)]
pub struct BomLineEntry {
    pub art_id: String,
    pub amount_of: Quantity,
}

impl UpsertProductsRequest {
    pub fn into_products(self) -> Result<Vec<Product>, String> {
        self.products
            .into_iter()
            .map(|entry| -> Result<Product, String> {
                let id = match entry.product_id.as_deref() {
                    Some(raw) => parse_id::<ProductId>(raw, "productId")?,
                    None => ProductId::generate(),
                };
                let bom = entry
                    .contain_articles
                    .iter()
                    .map(|line| -> Result<BomLine, String> {
                        Ok(BomLine {
                            article_id: parse_id::<ArticleId>(&line.art_id, "art_id")?,
                            amount: line.amount_of.parse("amount_of")?,
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Product {
                    id,
                    name: entry.name,
                    bom,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct SellProductRequest {
    #[serde(rename = "productId")]
    pub product_id: String,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ArticleView {
    pub art_id: String,
    pub name: String,
    pub stock: i64,
}

impl From<Article> for ArticleView {
    fn from(a: Article) -> Self {
        Self {
            art_id: a.id.into_inner(),
            name: a.name,
            stock: a.stock,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ArticlesResponse {
    pub inventory: Vec<ArticleView>,
}

#[derive(Debug, Serialize)]
pub struct BomLineView {
    pub art_id: String,
    pub amount_of: i64,
}

#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(rename = "productId")]
    pub product_id: String,
    pub name: String,
    pub contain_articles: Vec<BomLineView>,
    pub stock: i64,
}

impl From<ProductWithStock> for ProductView {
    fn from(p: ProductWithStock) -> Self {
        Self {
            product_id: p.product.id.into_inner(),
            name: p.product.name,
            contain_articles: p
                .product
                .bom
                .into_iter()
                .map(|l| BomLineView {
                    art_id: l.article_id.into_inner(),
                    amount_of: l.amount,
                })
                .collect(),
            stock: p.available_units,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductsResponse {
    pub products: Vec<ProductView>,
}
