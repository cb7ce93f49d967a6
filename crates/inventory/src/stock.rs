//! Stock calculator: how many product units the current article stock can build.
//!
//! Pure derivation, no IO. Callers supply article stock through a lookup so the
//! same function serves an in-memory map or a row set read in one statement.

use warehouse_core::ArticleId;

use crate::product::{consolidate, BomLine};

/// Number of complete units assemblable from `stock_of`.
///
/// `min(stock / amount)` over the consolidated bill of materials, with integer
/// division truncating toward zero. Edge cases:
/// - an empty bill of materials yields `0`
/// - an article unknown to `stock_of` counts as zero stock
/// - negative stock or a non-positive amount yields `0` for that line
/// - a per-article total that overflows `i64` yields `0`
pub fn available_units<F>(bom: &[BomLine], stock_of: F) -> i64
where
    F: Fn(&ArticleId) -> Option<i64>,
{
    let Ok(lines) = consolidate(bom) else {
        return 0;
    };
    lines
        .iter()
        .map(|line| {
            let stock = stock_of(&line.article_id).unwrap_or(0);
            if stock <= 0 || line.amount <= 0 {
                0
            } else {
                stock / line.amount
            }
        })
        .min()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    fn stocks(pairs: &[(&str, i64)]) -> HashMap<ArticleId, i64> {
        pairs.iter().map(|(id, s)| (ArticleId::from(*id), *s)).collect()
    }

    #[test]
    fn bottleneck_article_limits_units() {
        let bom = vec![BomLine::new("a1", 2), BomLine::new("a2", 3)];
        let s = stocks(&[("a1", 10), ("a2", 9)]);
        assert_eq!(available_units(&bom, |id| s.get(id).copied()), 3);
    }

    #[test]
    fn empty_bom_has_no_units() {
        let s = stocks(&[("a1", 10)]);
        assert_eq!(available_units(&[], |id| s.get(id).copied()), 0);
    }

    #[test]
    fn missing_article_counts_as_zero() {
        let bom = vec![BomLine::new("a1", 1), BomLine::new("ghost", 1)];
        let s = stocks(&[("a1", 10)]);
        assert_eq!(available_units(&bom, |id| s.get(id).copied()), 0);
    }

    #[test]
    fn duplicate_lines_are_additive() {
        // 2 + 3 = 5 per unit, 10 in stock.
        let bom = vec![BomLine::new("a1", 2), BomLine::new("a1", 3)];
        let s = stocks(&[("a1", 10)]);
        assert_eq!(available_units(&bom, |id| s.get(id).copied()), 2);
    }

    #[test]
    fn overflowing_duplicate_lines_have_no_units() {
        let bom = vec![BomLine::new("a1", i64::MAX), BomLine::new("a1", 3)];
        let s = stocks(&[("a1", i64::MAX)]);
        assert_eq!(available_units(&bom, |id| s.get(id).copied()), 0);
    }

    #[test]
    fn division_truncates() {
        let bom = vec![BomLine::new("a1", 4)];
        let s = stocks(&[("a1", 7)]);
        assert_eq!(available_units(&bom, |id| s.get(id).copied()), 1);
    }

    proptest! {
        #[test]
        fn units_fit_in_stock_and_one_more_does_not(
            lines in proptest::collection::vec((0usize..4, 1i64..20), 1..6),
            stock in proptest::collection::vec(0i64..500, 4),
        ) {
            let bom: Vec<BomLine> = lines
                .iter()
                .map(|(a, amount)| BomLine::new(format!("a{a}").as_str(), *amount))
                .collect();
            let lookup = |id: &ArticleId| {
                id.as_str()[1..].parse::<usize>().ok().map(|i| stock[i])
            };

            let units = available_units(&bom, lookup);
            prop_assert!(units >= 0);

            let consolidated = consolidate(&bom).unwrap();
            for line in &consolidated {
                prop_assert!(units * line.amount <= lookup(&line.article_id).unwrap());
            }
            let one_more_fits = consolidated
                .iter()
                .all(|line| (units + 1) * line.amount <= lookup(&line.article_id).unwrap());
            prop_assert!(!one_more_fits);
        }
    }
}
