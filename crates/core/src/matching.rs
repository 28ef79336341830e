//! Resolving which pending order a sale fulfilled.
//!
//! When the register does not say which order it loaded, the most plausible
//! recent order is picked by product overlap.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::types::{OrderId, ProductId};

/// Minimum share of an order's distinct products that must appear in the sale.
pub const MATCH_THRESHOLD_PERCENT: usize = 70;

/// A recent open order considered for the heuristic match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCandidate {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub product_ids: Vec<ProductId>,
}

impl OrderCandidate {
    /// `(matched, distinct)` product counts against the sale.
    fn overlap(&self, sale: &BTreeSet<ProductId>) -> (usize, usize) {
        let distinct: BTreeSet<ProductId> = self.product_ids.iter().copied().collect();
        let matched = distinct.intersection(sale).count();
        (matched, distinct.len())
    }
}

/// Pick the order a sale most likely fulfilled.
///
/// An order qualifies when at least [`MATCH_THRESHOLD_PERCENT`] of its distinct
/// products are in the sale. Highest ratio wins, ties go to the newest order.
/// Orders without items never match.
#[must_use]
pub fn find_matching_order(
    sale_products: &[ProductId],
    candidates: &[OrderCandidate],
) -> Option<OrderId> {
    let sale: BTreeSet<ProductId> = sale_products.iter().copied().collect();
    if sale.is_empty() {
        return None;
    }

    let mut best: Option<(&OrderCandidate, usize, usize)> = None;
    for candidate in candidates {
        let (matched, distinct) = candidate.overlap(&sale);
        if distinct == 0 || matched * 100 < distinct * MATCH_THRESHOLD_PERCENT {
            continue;
        }
        let better = match best {
            None => true,
            Some((current, m, d)) => {
                // matched/distinct vs m/d without floating point
                let lhs = matched * d;
                let rhs = m * distinct;
                lhs > rhs || (lhs == rhs && candidate.created_at > current.created_at)
            }
        };
        if better {
            best = Some((candidate, matched, distinct));
        }
    }

    best.map(|(candidate, _, _)| candidate.id)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn ids(raw: &[i32]) -> Vec<ProductId> {
        raw.iter().copied().map(ProductId::new).collect()
    }

    fn order(id: i32, minutes_ago: i64, products: &[i32]) -> OrderCandidate {
        OrderCandidate {
            id: OrderId::new(id),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            product_ids: ids(products),
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // 7 of 10 products = exactly 70%
        let o = order(1, 5, &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let sale = ids(&[1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(find_matching_order(&sale, &[o]), Some(OrderId::new(1)));
    }

    #[test]
    fn test_below_threshold_is_ignored() {
        let o = order(1, 5, &[1, 2, 3]);
        assert_eq!(find_matching_order(&ids(&[1, 2]), &[o]), None);
    }

    #[test]
    fn test_duplicate_items_count_once() {
        let o = order(1, 5, &[1, 1, 1, 2]);
        assert_eq!(find_matching_order(&ids(&[1, 2]), &[o]), Some(OrderId::new(1)));
    }

    #[test]
    fn test_best_ratio_wins() {
        let partial = order(1, 1, &[1, 2, 3, 4]);
        let full = order(2, 30, &[1, 2]);
        assert_eq!(
            find_matching_order(&ids(&[1, 2, 3]), &[partial, full]),
            Some(OrderId::new(2))
        );
    }

    #[test]
    fn test_tie_goes_to_newest() {
        let older = order(1, 60, &[1, 2]);
        let newer = order(2, 10, &[1, 2]);
        assert_eq!(
            find_matching_order(&ids(&[1, 2]), &[older, newer]),
            Some(OrderId::new(2))
        );
    }

    #[test]
    fn test_empty_order_never_matches() {
        let empty = order(1, 1, &[]);
        assert_eq!(find_matching_order(&ids(&[1]), &[empty]), None);
    }
}
