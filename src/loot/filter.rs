//! Per-line loot pipeline: filter rules, liquidation, yield targets and the
//! merge into chamber storage.
//!
//! Storage writes happen immediately; only currency goes through the
//! accumulator, since storage is local to the chamber.

use crate::chamber::{AccountId, Chamber, FilterAction, FilterRule, ItemStack, MatchType};
use crate::host::{PriceOracle, RewardLine};
use crate::simulation::accumulator::{saturating_mul, Accumulator};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;

/// Inputs that stay fixed for a whole flush.
#[derive(Clone, Copy)]
pub struct LootContext<'a> {
    pub owner: AccountId,
    pub prices: &'a dyn PriceOracle,
    /// Chamber flag and ability gate both satisfied
    pub direct_liquidation: bool,
    /// Filter rules are honored; otherwise only the legacy void list applies
    pub advanced_filtering: bool,
}

/// Line counts by fate, for flush reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LootTally {
    pub stored: u32,
    pub voided: u32,
    pub liquidated: u32,
    pub over_target: u32,
}

impl LootTally {
    pub fn merge(&mut self, other: LootTally) {
        self.stored += other.stored;
        self.voided += other.voided;
        self.liquidated += other.liquidated;
        self.over_target += other.over_target;
    }
}

/// Decide what to do with a line. `None` means store it.
///
/// Rules only apply with `advanced_filtering`; without it, or with no rules
/// configured, the legacy void list decides.
pub fn classify(chamber: &Chamber, line: &RewardLine, advanced_filtering: bool) -> Option<FilterAction> {
    if !advanced_filtering || chamber.filter_rules.is_empty() {
        if chamber.legacy_void_list.contains(&line.stack.id) {
            return Some(FilterAction::Void);
        }
        return None;
    }
    chamber
        .filter_rules
        .iter()
        .find(|rule| rule_matches(rule, line))
        .map(|rule| rule.action)
}

pub fn rule_matches(rule: &FilterRule, line: &RewardLine) -> bool {
    match rule.match_type {
        MatchType::Id => line.stack.id.as_str() == rule.match_value,
        MatchType::Tag => line.tags.iter().any(|t| *t == rule.match_value),
        MatchType::TaggedData => {
            if line.stack.id.as_str() != rule.match_value {
                return false;
            }
            // No sample, no match
            let actual = line.stack.data.as_ref().unwrap_or(&Value::Null);
            rule.sample_data.as_ref().is_some_and(|sample| is_subset(sample, actual))
        }
    }
}

/// Structural partial match: every key of a sample object must be present and
/// match; every element of a sample array must match some element of the actual array.
pub fn is_subset(sample: &Value, actual: &Value) -> bool {
    match (sample, actual) {
        (Value::Object(want), Value::Object(have)) => want
            .iter()
            .all(|(k, v)| have.get(k).is_some_and(|h| is_subset(v, h))),
        (Value::Array(want), Value::Array(have)) => want
            .iter()
            .all(|w| have.iter().any(|h| is_subset(w, h))),
        _ => sample == actual,
    }
}

/// Turn a scaled, possibly fractional count into a whole count without bias:
/// the fraction becomes one extra item with matching probability.
pub fn stochastic_round<R: Rng + ?Sized>(scaled: Decimal, rng: &mut R) -> u64 {
    if scaled <= Decimal::ZERO {
        return 0;
    }
    let whole = scaled.floor();
    let fraction = (scaled - whole).to_f64().unwrap_or(0.0);
    let base = whole.to_u64().unwrap_or(u64::MAX);
    if fraction > 0.0 && rng.gen::<f64>() < fraction {
        base.saturating_add(1)
    } else {
        base
    }
}

fn over_target(chamber: &Chamber, stack: &ItemStack) -> bool {
    chamber
        .yield_targets
        .get(&stack.id)
        .is_some_and(|&target| chamber.stored_count(&stack.id) >= target)
}

fn liquidate(ctx: &LootContext<'_>, stack: &ItemStack, scaled: Decimal, acc: &mut Accumulator) {
    let price = ctx.prices.sell_price(&stack.id, ctx.owner);
    acc.add_currency(saturating_mul(price, scaled));
}

/// Route one occurrence's lines, each multiplied by `scale`.
pub fn process_lines<R: Rng + ?Sized>(
    chamber: &mut Chamber,
    lines: Vec<RewardLine>,
    scale: Decimal,
    ctx: &LootContext<'_>,
    acc: &mut Accumulator,
    rng: &mut R,
) -> LootTally {
    let mut tally = LootTally::default();

    for line in lines {
        if line.stack.is_empty() {
            continue;
        }
        let scaled = saturating_mul(Decimal::from(line.stack.count), scale);
        if scaled <= Decimal::ZERO {
            continue;
        }

        // Targets are checked first: an identity at its target is neither stored nor sold
        if over_target(chamber, &line.stack) {
            tally.over_target += 1;
            continue;
        }

        if ctx.direct_liquidation {
            liquidate(ctx, &line.stack, scaled, acc);
            tally.liquidated += 1;
            continue;
        }

        match classify(chamber, &line, ctx.advanced_filtering) {
            Some(FilterAction::Void) => {
                tally.voided += 1;
                continue;
            }
            Some(FilterAction::Liquidate) => {
                liquidate(ctx, &line.stack, scaled, acc);
                tally.liquidated += 1;
                continue;
            }
            Some(FilterAction::Keep) | None => {}
        }

        let count = stochastic_round(scaled, rng);
        if count == 0 {
            continue;
        }
        let mut stack = line.stack;
        stack.count = count;
        chamber.store(stack);
        tally.stored += 1;
    }

    tally
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chamber::SourceIdentity;
    use crate::host::memory::PriceTable;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    fn chamber() -> Chamber {
        Chamber::new(SourceIdentity::Creature("piglin".into()), 0, 0)
    }

    fn line(id: &str, count: u64) -> RewardLine {
        RewardLine::new(ItemStack::new(id, count))
    }

    fn prices() -> PriceTable {
        PriceTable::new(Decimal::ONE).with("gold_nugget", Decimal::new(5, 0))
    }

    fn run(chamber: &mut Chamber, lines: Vec<RewardLine>, direct: bool) -> (LootTally, Accumulator) {
        run_gated(chamber, lines, direct, true)
    }

    fn run_gated(
        chamber: &mut Chamber,
        lines: Vec<RewardLine>,
        direct: bool,
        advanced: bool,
    ) -> (LootTally, Accumulator) {
        let prices = prices();
        let ctx = LootContext {
            owner: AccountId::new_random(),
            prices: &prices,
            direct_liquidation: direct,
            advanced_filtering: advanced,
        };
        let mut acc = Accumulator::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let tally = process_lines(chamber, lines, Decimal::ONE, &ctx, &mut acc, &mut rng);
        (tally, acc)
    }

    #[test]
    fn test_void_rule_drops_line() {
        let mut c = chamber();
        c.filter_rules.push(FilterRule::by_id("gold_nugget", FilterAction::Void));
        let (tally, acc) = run(&mut c, vec![line("gold_nugget", 3)], false);
        assert!(c.storage.is_empty());
        assert_eq!(tally.voided, 1);
        assert_eq!(acc.currency, Decimal::ZERO);
    }

    #[test]
    fn test_liquidate_rule_sells_at_oracle_price() {
        let mut c = chamber();
        c.filter_rules.push(FilterRule::by_id("gold_nugget", FilterAction::Liquidate));
        let (_, acc) = run(&mut c, vec![line("gold_nugget", 3), line("leather", 2)], false);
        assert_eq!(acc.currency, Decimal::new(15, 0));
        assert_eq!(c.storage, vec![ItemStack::new("leather", 2)]);
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let mut c = chamber();
        c.filter_rules.push(FilterRule::by_id("gold_nugget", FilterAction::Keep));
        c.filter_rules.push(FilterRule::by_tag("forge:nuggets", FilterAction::Void));
        let lines = vec![
            line("gold_nugget", 1).with_tags(&["forge:nuggets"]),
            line("iron_nugget", 1).with_tags(&["forge:nuggets"]),
        ];
        run(&mut c, lines, false);
        assert_eq!(c.storage, vec![ItemStack::new("gold_nugget", 1)]);
    }

    #[test]
    fn test_legacy_void_list_only_without_rules() {
        let mut c = chamber();
        c.legacy_void_list.push("rotten_flesh".into());
        run(&mut c, vec![line("rotten_flesh", 4)], false);
        assert!(c.storage.is_empty());

        let mut c = chamber();
        c.legacy_void_list.push("rotten_flesh".into());
        c.filter_rules.push(FilterRule::by_id("bone", FilterAction::Void));
        run(&mut c, vec![line("rotten_flesh", 4)], false);
        assert_eq!(c.stored_count(&"rotten_flesh".into()), 4);
    }

    #[test]
    fn test_direct_liquidation_ignores_filters() {
        let mut c = chamber();
        c.filter_rules.push(FilterRule::by_id("gold_nugget", FilterAction::Void));
        let (tally, acc) = run(&mut c, vec![line("gold_nugget", 2)], true);
        assert_eq!(tally.liquidated, 1);
        assert_eq!(acc.currency, Decimal::new(10, 0));
        assert!(c.storage.is_empty());
    }

    #[test]
    fn test_tagged_data_partial_match() {
        let mut c = chamber();
        c.filter_rules.push(FilterRule::by_data(
            "golden_sword",
            json!({"enchantments": [{"id": "fire_aspect"}]}),
            FilterAction::Void,
        ));
        let enchanted = RewardLine::new(ItemStack::new("golden_sword", 1).with_data(json!({
            "damage": 12,
            "enchantments": [{"id": "looting", "lvl": 1}, {"id": "fire_aspect", "lvl": 2}]
        })));
        let plain = RewardLine::new(ItemStack::new("golden_sword", 1).with_data(json!({"damage": 3})));
        run(&mut c, vec![enchanted, plain], false);
        assert_eq!(c.storage.len(), 1);
        assert_eq!(c.storage[0].data, Some(json!({"damage": 3})));
    }

    #[test]
    fn test_tagged_data_rule_without_sample_matches_nothing() {
        let mut c = chamber();
        c.filter_rules.push(FilterRule {
            match_type: MatchType::TaggedData,
            match_value: "iron_sword".into(),
            sample_data: None,
            action: FilterAction::Void,
        });
        let damaged = RewardLine::new(ItemStack::new("iron_sword", 1).with_data(json!({"dmg": 1})));
        let plain = line("iron_sword", 1);
        assert_eq!(classify(&c, &damaged, true), None);
        assert_eq!(classify(&c, &plain, true), None);

        run(&mut c, vec![damaged, plain], false);
        assert_eq!(c.stored_count(&"iron_sword".into()), 2);
    }

    #[test]
    fn test_rules_ignored_without_advanced_filtering() {
        let mut c = chamber();
        c.filter_rules.push(FilterRule::by_id("gold_nugget", FilterAction::Liquidate));
        c.legacy_void_list.push("rotten_flesh".into());
        let (tally, acc) = run_gated(
            &mut c,
            vec![line("gold_nugget", 3), line("rotten_flesh", 2)],
            false,
            false,
        );
        assert_eq!(acc.currency, Decimal::ZERO);
        assert_eq!(tally.voided, 1);
        assert_eq!(c.storage, vec![ItemStack::new("gold_nugget", 3)]);
    }

    #[test]
    fn test_yield_target_blocks_direct_liquidation() {
        let mut c = chamber();
        c.yield_targets.insert("gold_nugget".into(), 0);
        let (tally, acc) = run(&mut c, vec![line("gold_nugget", 4)], true);
        assert_eq!(acc.currency, Decimal::ZERO);
        assert_eq!(tally.over_target, 1);
        assert_eq!(tally.liquidated, 0);
        assert!(c.storage.is_empty());
    }

    #[test]
    fn test_yield_target_stops_storing() {
        let mut c = chamber();
        c.yield_targets.insert("bone".into(), 5);
        c.store(ItemStack::new("bone", 5));
        let (tally, _) = run(&mut c, vec![line("bone", 2)], false);
        assert_eq!(tally.over_target, 1);
        assert_eq!(c.stored_count(&"bone".into()), 5);
    }

    #[test]
    fn test_stochastic_round_whole_values_are_exact() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        assert_eq!(stochastic_round(Decimal::new(7, 0), &mut rng), 7);
        assert_eq!(stochastic_round(Decimal::ZERO, &mut rng), 0);
        assert_eq!(stochastic_round(Decimal::new(-3, 0), &mut rng), 0);
    }

    #[test]
    fn test_stochastic_round_is_unbiased() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let scaled = Decimal::new(25, 1); // 2.5
        let total: u64 = (0..10_000).map(|_| stochastic_round(scaled, &mut rng)).sum();
        let mean = total as f64 / 10_000.0;
        assert!((mean - 2.5).abs() < 0.05, "mean was {mean}");
    }
}
