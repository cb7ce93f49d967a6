use serde::{Deserialize, Serialize};

use warehouse_core::{ArticleId, DomainError, DomainResult, Entity};

/// A raw stocked part with an on-hand count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub name: String,
    pub stock: i64,
}

impl Article {
    pub fn new(id: impl Into<ArticleId>, name: impl Into<String>, stock: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            stock,
        }
    }

    /// Check the article before it is written.
    ///
    /// Stock is an absolute value on upsert, so it must already be non-negative.
    pub fn validate(&self) -> DomainResult<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(DomainError::invalid_id("article id cannot be empty"));
        }
        if self.name.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "article {}: name cannot be empty",
                self.id
            )));
        }
        if self.stock < 0 {
            return Err(DomainError::validation(format!(
                "article {}: stock cannot be negative (got {})",
                self.id, self.stock
            )));
        }
        Ok(())
    }
}

impl Entity for Article {
    type Id = ArticleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
