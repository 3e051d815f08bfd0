//! Bounded storage with value-based eviction.

use crate::chamber::{AccountId, ItemStack};
use crate::host::PriceOracle;
use crate::simulation::accumulator::saturating_mul;
use rust_decimal::Decimal;

/// Value of a whole stored line at current prices.
pub fn line_value(stack: &ItemStack, prices: &dyn PriceOracle, owner: AccountId) -> Decimal {
    saturating_mul(prices.sell_price(&stack.id, owner), Decimal::from(stack.count))
}

fn data_key(stack: &ItemStack) -> String {
    stack
        .data
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_default()
}

/// Shrink `storage` to `max_storage` lines by evicting the cheapest first.
///
/// Ties are broken by identity, then by serialized data, so the retained set
/// does not depend on insertion order. Surviving lines keep their relative
/// order. Returns the evicted lines, cheapest first.
pub fn enforce_cap(
    storage: &mut Vec<ItemStack>,
    max_storage: usize,
    prices: &dyn PriceOracle,
    owner: AccountId,
) -> Vec<ItemStack> {
    if storage.len() <= max_storage {
        return Vec::new();
    }

    let keyed: Vec<(Decimal, String)> = storage
        .iter()
        .map(|s| (line_value(s, prices, owner), data_key(s)))
        .collect();

    let mut order: Vec<usize> = (0..storage.len()).collect();
    order.sort_by(|&a, &b| {
        keyed[a]
            .0
            .cmp(&keyed[b].0)
            .then_with(|| storage[a].id.cmp(&storage[b].id))
            .then_with(|| keyed[a].1.cmp(&keyed[b].1))
    });

    let excess = storage.len() - max_storage;
    let mut doomed = vec![false; storage.len()];
    for &i in &order[..excess] {
        doomed[i] = true;
    }

    let mut evicted: Vec<(usize, ItemStack)> = Vec::with_capacity(excess);
    let mut kept = Vec::with_capacity(max_storage);
    for (i, stack) in storage.drain(..).enumerate() {
        if doomed[i] {
            evicted.push((i, stack));
        } else {
            kept.push(stack);
        }
    }
    *storage = kept;

    let rank: Vec<usize> = {
        let mut rank = vec![0; doomed.len()];
        for (pos, &i) in order.iter().enumerate() {
            rank[i] = pos;
        }
        rank
    };
    evicted.sort_by_key(|(i, _)| rank[*i]);
    evicted.into_iter().map(|(_, s)| s).collect()
}

/// Order storage by identity, then serialized data, for stable display.
pub fn sort_by_identity(storage: &mut [ItemStack]) {
    storage.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| data_key(a).cmp(&data_key(b))));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::PriceTable;
    use serde_json::json;

    #[test]
    fn test_under_cap_is_untouched() {
        let mut storage = vec![ItemStack::new("a", 1), ItemStack::new("b", 1)];
        let evicted = enforce_cap(&mut storage, 2, &PriceTable::new(Decimal::ONE), AccountId::new_random());
        assert!(evicted.is_empty());
        assert_eq!(storage.len(), 2);
    }

    #[test]
    fn test_cheapest_evicted_and_order_kept() {
        let prices = PriceTable::new(Decimal::ONE)
            .with("diamond", Decimal::new(100, 0))
            .with("dirt", Decimal::ZERO);
        let mut storage = vec![
            ItemStack::new("diamond", 1),
            ItemStack::new("dirt", 64),
            ItemStack::new("stone", 3),
            ItemStack::new("coal", 2),
        ];
        let evicted = enforce_cap(&mut storage, 2, &prices, AccountId::new_random());
        assert_eq!(evicted, vec![ItemStack::new("dirt", 64), ItemStack::new("coal", 2)]);
        assert_eq!(storage, vec![ItemStack::new("diamond", 1), ItemStack::new("stone", 3)]);
    }

    #[test]
    fn test_ties_break_by_id_then_data() {
        let prices = PriceTable::new(Decimal::ONE);
        let owner = AccountId::new_random();
        let build = || {
            vec![
                ItemStack::new("b", 1),
                ItemStack::new("a", 1).with_data(json!({"n": 2})),
                ItemStack::new("a", 1).with_data(json!({"n": 1})),
            ]
        };
        let mut forward = build();
        let mut backward: Vec<_> = build().into_iter().rev().collect();
        let ev_f = enforce_cap(&mut forward, 1, &prices, owner);
        let ev_b = enforce_cap(&mut backward, 1, &prices, owner);
        assert_eq!(ev_f, ev_b);
        assert_eq!(forward, vec![ItemStack::new("b", 1)]);
        assert_eq!(backward, forward);
    }

    #[test]
    fn test_sort_by_identity() {
        let mut storage = vec![ItemStack::new("c", 1), ItemStack::new("a", 1), ItemStack::new("b", 1)];
        sort_by_identity(&mut storage);
        let ids: Vec<_> = storage.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }
}
