use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use warehouse_core::{ArticleId, DomainError, DomainResult, Entity, ProductId};

/// One bill-of-materials line: `amount` units of an article per product unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BomLine {
    pub article_id: ArticleId,
    pub amount: i64,
}

impl BomLine {
    pub fn new(article_id: impl Into<ArticleId>, amount: i64) -> Self {
        Self {
            article_id: article_id.into(),
            amount,
        }
    }
}

/// A product assembled from articles according to its bill of materials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Lines in the order the caller supplied them.
    pub bom: Vec<BomLine>,
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, bom: Vec<BomLine>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            bom,
        }
    }

    /// Reject malformed products before any store mutation.
    ///
    /// An empty bill of materials is accepted; such a product is never available.
    pub fn validate(&self) -> DomainResult<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(DomainError::invalid_id("product id cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "product {}: name cannot be empty",
                self.id
            )));
        }
        for (idx, line) in self.bom.iter().enumerate() {
            if line.article_id.as_str().trim().is_empty() {
                return Err(DomainError::invalid_id(format!(
                    "product {}: empty article id (line {idx})",
                    self.id
                )));
            }
            if line.amount <= 0 {
                return Err(DomainError::validation(format!(
                    "product {}: amount for article {} must be positive (got {})",
                    self.id, line.article_id, line.amount
                )));
            }
        }
        self.consolidated_bom().map_err(|e| match e {
            DomainError::InvariantViolation(msg) => {
                DomainError::invariant(format!("product {}: {msg}", self.id))
            }
            other => other,
        })?;
        Ok(())
    }

    /// The bill of materials with duplicate articles summed into one line.
    ///
    /// Lines come back in ascending article id order.
    pub fn consolidated_bom(&self) -> DomainResult<Vec<BomLine>> {
        consolidate(&self.bom)
    }

    /// Distinct article ids referenced by the bill of materials.
    pub fn referenced_articles(&self) -> BTreeSet<&ArticleId> {
        self.bom.iter().map(|l| &l.article_id).collect()
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Sum duplicate article lines; output is sorted by article id.
///
/// Fails if any per-article total overflows `i64`.
pub fn consolidate(bom: &[BomLine]) -> DomainResult<Vec<BomLine>> {
    let mut totals: BTreeMap<&ArticleId, i64> = BTreeMap::new();
    for line in bom {
        let total = totals.entry(&line.article_id).or_insert(0);
        *total = total.checked_add(line.amount).ok_or_else(|| {
            DomainError::invariant(format!(
                "total amount for article {} overflows",
                line.article_id
            ))
        })?;
    }
    Ok(totals
        .into_iter()
        .map(|(article_id, amount)| BomLine {
            article_id: article_id.clone(),
            amount,
        })
        .collect())
}

/// A product paired with the units currently assemblable from stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductWithStock {
    pub product: Product,
    pub available_units: i64,
}
