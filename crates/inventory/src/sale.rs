use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use warehouse_core::ProductId;

use crate::product::BomLine;

/// Receipt of one committed sale: the article stock it consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub product_id: ProductId,
    /// Consolidated lines, one per article, in ascending article id order.
    pub consumed: Vec<BomLine>,
    pub sold_at: DateTime<Utc>,
}
