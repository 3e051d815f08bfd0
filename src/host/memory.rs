//! In-memory host collaborators: weighted loot tables, a price table, fixed
//! ranks, a recording ledger and a recipe book. Used by the simulator binary
//! and by tests; a real host supplies its own.

use super::{
    Ability, AccountLedger, InverseRecipe, Occurrence, PriceOracle, RankProvider, RecipeCatalog,
    ResolveRequest, RewardLine, RewardResolver, UniformRecipe,
};
use crate::chamber::{AccountId, ItemId, ItemStack, SourceIdentity};
use rand::{Rng, RngCore};
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

/// One independent roll in a loot table.
#[derive(Debug, Clone)]
pub struct LootEntry {
    pub item: ItemId,
    /// Drop chance in [0, 1] before luck
    pub chance: f64,
    pub min: u64,
    pub max: u64,
    pub tags: Vec<String>,
    pub data: Option<Value>,
}

impl LootEntry {
    pub fn new(item: &str, chance: f64, min: u64, max: u64) -> Self {
        Self {
            item: ItemId::from(item),
            chance,
            min,
            max: max.max(min),
            tags: Vec::new(),
            data: None,
        }
    }

    pub fn tagged(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Luck adds one percent of drop chance per point, capped at certainty.
    pub fn effective_chance(&self, luck: f32) -> f64 {
        (self.chance * (1.0 + luck.max(0.0) as f64 / 100.0)).min(1.0)
    }

    /// Looting widens the count range upward by one per level.
    pub fn max_count(&self, looting: u32) -> u64 {
        self.max.saturating_add(looting as u64)
    }

    /// Mean items per occurrence.
    pub fn expected_count(&self, luck: f32, looting: u32) -> f64 {
        self.effective_chance(luck) * (self.min + self.max_count(looting)) as f64 / 2.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct LootTable {
    pub entries: Vec<LootEntry>,
    pub experience: u64,
}

impl LootTable {
    pub fn new(experience: u64) -> Self {
        Self {
            entries: Vec::new(),
            experience,
        }
    }

    pub fn with(mut self, entry: LootEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn roll(&self, luck: f32, looting: u32, rng: &mut dyn RngCore) -> Occurrence {
        let mut lines = Vec::new();
        for entry in &self.entries {
            if rng.gen::<f64>() >= entry.effective_chance(luck) {
                continue;
            }
            let count = rng.gen_range(entry.min..=entry.max_count(looting));
            if count == 0 {
                continue;
            }
            let mut stack = ItemStack::new(entry.item.clone(), count);
            stack.data = entry.data.clone();
            lines.push(RewardLine {
                stack,
                tags: entry.tags.clone(),
            });
        }
        Occurrence {
            lines,
            experience: self.experience,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TableResolver {
    tables: HashMap<SourceIdentity, LootTable>,
    barter_tables: HashMap<SourceIdentity, LootTable>,
}

impl TableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source: SourceIdentity, table: LootTable) {
        self.tables.insert(source, table);
    }

    pub fn with(mut self, source: SourceIdentity, table: LootTable) -> Self {
        self.insert(source, table);
        self
    }

    /// Rewards for one bartering trade with `source`.
    pub fn with_barter(mut self, source: SourceIdentity, table: LootTable) -> Self {
        self.barter_tables.insert(source, table);
        self
    }

    pub fn table(&self, source: &SourceIdentity) -> Option<&LootTable> {
        self.tables.get(source)
    }
}

impl RewardResolver for TableResolver {
    fn can_resolve(&self, source: &SourceIdentity) -> bool {
        self.tables.contains_key(source)
    }

    fn resolve(&self, request: &ResolveRequest<'_>, rng: &mut dyn RngCore) -> Occurrence {
        let tables = if request.bartering {
            &self.barter_tables
        } else {
            &self.tables
        };
        match tables.get(request.source) {
            Some(table) => table.roll(request.luck, request.looting, rng),
            None => Occurrence::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<ItemId, Decimal>,
    fallback: Decimal,
}

impl PriceTable {
    pub fn new(fallback: Decimal) -> Self {
        Self {
            prices: HashMap::new(),
            fallback,
        }
    }

    pub fn with(mut self, item: &str, price: Decimal) -> Self {
        self.prices.insert(ItemId::from(item), price);
        self
    }

    pub fn set(&mut self, item: ItemId, price: Decimal) {
        self.prices.insert(item, price);
    }
}

impl PriceOracle for PriceTable {
    fn sell_price(&self, item: &ItemId, _owner: AccountId) -> Decimal {
        self.prices.get(item).copied().unwrap_or(self.fallback)
    }
}

/// The same ranks for every account.
#[derive(Debug, Clone, Default)]
pub struct StaticRanks {
    ranks: HashMap<Ability, u32>,
}

impl StaticRanks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, ability: Ability, rank: u32) -> Self {
        self.ranks.insert(ability, rank);
        self
    }

    pub fn set(&mut self, ability: Ability, rank: u32) {
        self.ranks.insert(ability, rank);
    }
}

impl RankProvider for StaticRanks {
    fn active_rank(&self, _owner: AccountId, ability: Ability) -> u32 {
        self.ranks.get(&ability).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountTotals {
    pub currency: Decimal,
    pub secondary_currency: Decimal,
    pub permanent_stats: BTreeMap<String, Decimal>,
    pub lifetime_occurrences: Decimal,
    /// Keyed by the source's display form
    pub satiety: BTreeMap<String, Decimal>,
    /// Number of ledger writes of any kind
    pub credits: u32,
}

/// Ledger that keeps running totals per account.
#[derive(Debug, Clone, Default)]
pub struct RecordingLedger {
    accounts: HashMap<AccountId, AccountTotals>,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self, owner: AccountId) -> AccountTotals {
        self.accounts.get(&owner).cloned().unwrap_or_default()
    }

    fn entry(&mut self, owner: AccountId) -> &mut AccountTotals {
        let totals = self.accounts.entry(owner).or_default();
        totals.credits += 1;
        totals
    }
}

impl AccountLedger for RecordingLedger {
    fn credit_currency(&mut self, owner: AccountId, amount: Decimal) {
        let totals = self.entry(owner);
        totals.currency += amount;
    }

    fn credit_secondary_currency(&mut self, owner: AccountId, amount: Decimal) {
        let totals = self.entry(owner);
        totals.secondary_currency += amount;
    }

    fn credit_permanent_stat(&mut self, owner: AccountId, stat: &str, delta: Decimal) {
        let totals = self.entry(owner);
        *totals
            .permanent_stats
            .entry(stat.to_string())
            .or_insert(Decimal::ZERO) += delta;
    }

    fn credit_lifetime_occurrences(&mut self, owner: AccountId, amount: Decimal) {
        let totals = self.entry(owner);
        totals.lifetime_occurrences += amount;
    }

    fn satiety(&self, owner: AccountId, source: &SourceIdentity) -> Decimal {
        self.accounts
            .get(&owner)
            .and_then(|t| t.satiety.get(&source.to_string()))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    fn set_satiety(&mut self, owner: AccountId, source: &SourceIdentity, value: Decimal) {
        let totals = self.entry(owner);
        totals.satiety.insert(source.to_string(), value);
    }
}

/// Recipe catalog backed by two maps. Counts lookups so cache behavior is observable.
#[derive(Debug, Default)]
pub struct RecipeBook {
    uniform: HashMap<ItemId, UniformRecipe>,
    inverse: HashMap<ItemId, InverseRecipe>,
    lookups: AtomicUsize,
}

impl RecipeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// `input_count` of `input` craft into `output_count` of `result`.
    pub fn with_uniform(mut self, input: &str, input_count: u32, result: &str, output_count: u32) -> Self {
        self.uniform.insert(
            ItemId::from(input),
            UniformRecipe {
                result: ItemId::from(result),
                input_count,
                output_count,
            },
        );
        self
    }

    /// One `input` crafts back into `count` of `result`.
    pub fn with_inverse(mut self, input: &str, result: &str, count: u32) -> Self {
        self.inverse.insert(
            ItemId::from(input),
            InverseRecipe {
                result: ItemId::from(result),
                count,
            },
        );
        self
    }

    /// Compression pair: `count` of `small` make one `big`, and one `big` splits back.
    pub fn with_pair(self, small: &str, big: &str, count: u32) -> Self {
        self.with_uniform(small, count, big, 1)
            .with_inverse(big, small, count)
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }
}

impl RecipeCatalog for RecipeBook {
    fn find_uniform_recipe(&self, input: &ItemId) -> Option<UniformRecipe> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.uniform.get(input).cloned()
    }

    fn find_inverse(&self, input: &ItemId) -> Option<InverseRecipe> {
        self.inverse.get(input).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_certain_entry_always_drops_within_range() {
        let table = LootTable::new(5).with(LootEntry::new("bone", 1.0, 1, 3));
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        for _ in 0..100 {
            let occ = table.roll(0.0, 0, &mut rng);
            assert_eq!(occ.experience, 5);
            assert_eq!(occ.lines.len(), 1);
            assert!((1..=3).contains(&occ.lines[0].stack.count));
        }
    }

    #[test]
    fn test_luck_raises_chance_but_caps_at_one() {
        let entry = LootEntry::new("gem", 0.5, 1, 1);
        assert!((entry.effective_chance(0.0) - 0.5).abs() < 1e-12);
        assert!((entry.effective_chance(50.0) - 0.75).abs() < 1e-12);
        assert_eq!(entry.effective_chance(1_000.0), 1.0);
    }

    #[test]
    fn test_unknown_source_resolves_empty() {
        let resolver = TableResolver::new();
        let source = SourceIdentity::Creature("ghost".into());
        assert!(!resolver.can_resolve(&source));
        let request = ResolveRequest {
            source: &source,
            tool: None,
            source_snapshot: None,
            luck: 0.0,
            looting: 0,
            bartering: false,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(resolver.resolve(&request, &mut rng), Occurrence::default());
    }

    #[test]
    fn test_looting_raises_max_count_only() {
        let table = LootTable::new(0).with(LootEntry::new("bone", 1.0, 0, 2));
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let mut seen_above = false;
        for _ in 0..200 {
            for line in table.roll(0.0, 3, &mut rng).lines {
                assert!(line.stack.count <= 5);
                seen_above |= line.stack.count > 2;
            }
        }
        assert!(seen_above);
        assert!((table.entries[0].expected_count(0.0, 3) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_bartering_request_uses_barter_table() {
        let piglin = SourceIdentity::Creature("piglin".into());
        let resolver = TableResolver::new()
            .with(piglin.clone(), LootTable::new(0).with(LootEntry::new("gold_sword", 1.0, 1, 1)))
            .with_barter(piglin.clone(), LootTable::new(0).with(LootEntry::new("ender_pearl", 1.0, 1, 1)));
        let request = ResolveRequest {
            source: &piglin,
            tool: None,
            source_snapshot: None,
            luck: 0.0,
            looting: 0,
            bartering: true,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let occ = resolver.resolve(&request, &mut rng);
        assert_eq!(occ.lines[0].stack.id, ItemId::from("ender_pearl"));
    }

    #[test]
    fn test_satiety_is_per_source() {
        let mut ledger = RecordingLedger::new();
        let owner = AccountId::new_random();
        let cow = SourceIdentity::Creature("cow".into());
        let pig = SourceIdentity::Creature("pig".into());
        ledger.set_satiety(owner, &cow, Decimal::new(42, 1));
        assert_eq!(ledger.satiety(owner, &cow), Decimal::new(42, 1));
        assert_eq!(ledger.satiety(owner, &pig), Decimal::ZERO);
    }

    #[test]
    fn test_ledger_accumulates_per_account() {
        let mut ledger = RecordingLedger::new();
        let a = AccountId::new_random();
        let b = AccountId::new_random();
        ledger.credit_currency(a, Decimal::new(10, 0));
        ledger.credit_currency(a, Decimal::new(5, 0));
        ledger.credit_permanent_stat(b, "max_health", Decimal::new(1, 1));
        assert_eq!(ledger.totals(a).currency, Decimal::new(15, 0));
        assert_eq!(ledger.totals(a).credits, 2);
        assert_eq!(
            ledger.totals(b).permanent_stats.get("max_health"),
            Some(&Decimal::new(1, 1))
        );
    }

    #[test]
    fn test_recipe_book_pair_and_lookup_count() {
        let book = RecipeBook::new().with_pair("iron_nugget", "iron_ingot", 9);
        let recipe = book.find_uniform_recipe(&ItemId::from("iron_nugget")).unwrap();
        assert_eq!(recipe.input_count, 9);
        let inverse = book.find_inverse(&ItemId::from("iron_ingot")).unwrap();
        assert_eq!(inverse.count, 9);
        assert_eq!(book.lookups(), 1);
    }
}
