//! Contracts the engine needs from the host game.
//!
//! Reward resolution, pricing, rank lookups, account ledgers and the recipe
//! catalog all live outside the engine. Anything host-specific (loot hooks,
//! compatibility shims for third-party drop modifiers) belongs inside a
//! `RewardResolver` implementation, never in the engine.

pub mod memory;

use crate::chamber::{AccountId, ItemId, ItemStack, SourceIdentity};
use rand::RngCore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rank-gated abilities the engine consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    /// Cap for per-chamber speed dials
    ClockSpeed,
    /// Cap for per-chamber thread dials
    MultiThread,
    /// Global interval divisor
    SystemOverclock,
    /// Enables offline catch-up
    OfflinePersistence,
    /// Enables a chamber's direct-liquidation flag
    DirectLiquidation,
    LootCondensation,
    /// Energy -> secondary currency exchange; higher rank is cheaper
    EnergyConversion,
    LuckInjection,
    /// Permanent stat growth per simulated kill
    SoulReap,
    /// Lets creature chambers in bartering mode trade buffered input for rewards
    BarteringProtocol,
    /// Looting level added to every creature resolution
    RecursiveLooting,
    /// Simulated kills no longer raise per-source satiety
    IsolatedSandbox,
    /// Enables per-chamber filter rules; without it only the legacy void list applies
    AdvancedFiltering,
}

/// One raw reward line from a single occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardLine {
    pub stack: ItemStack,
    /// Host category tags of the item (e.g. "forge:ores"), used by tag filters
    pub tags: Vec<String>,
}

impl RewardLine {
    pub fn new(stack: ItemStack) -> Self {
        Self {
            stack,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Result of resolving one occurrence. Empty when the source is unresolvable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Occurrence {
    pub lines: Vec<RewardLine>,
    pub experience: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub source: &'a SourceIdentity,
    pub tool: Option<&'a Value>,
    pub source_snapshot: Option<&'a Value>,
    pub luck: f32,
    /// Extra looting level on top of whatever the tool carries
    pub looting: u32,
    /// Resolve the source's barter rewards instead of its death loot
    pub bartering: bool,
}

pub trait RewardResolver: Send + Sync {
    /// Whether `source` still maps to a valid reward table.
    fn can_resolve(&self, source: &SourceIdentity) -> bool;

    /// Roll one occurrence. Must have no side effects beyond the returned value.
    fn resolve(&self, request: &ResolveRequest<'_>, rng: &mut dyn RngCore) -> Occurrence;
}

pub trait PriceOracle: Send + Sync {
    fn sell_price(&self, item: &ItemId, owner: AccountId) -> Decimal;
}

pub trait RankProvider: Send + Sync {
    fn active_rank(&self, owner: AccountId, ability: Ability) -> u32;
}

pub trait AccountLedger {
    fn credit_currency(&mut self, owner: AccountId, amount: Decimal);
    fn credit_secondary_currency(&mut self, owner: AccountId, amount: Decimal);
    fn credit_permanent_stat(&mut self, owner: AccountId, stat: &str, delta: Decimal);
    fn credit_lifetime_occurrences(&mut self, owner: AccountId, amount: Decimal);

    /// Current satiety of `source` for `owner`; zero when never recorded.
    fn satiety(&self, owner: AccountId, source: &SourceIdentity) -> Decimal;
    fn set_satiety(&mut self, owner: AccountId, source: &SourceIdentity, value: Decimal);
}

/// A recipe whose inputs are all the same identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformRecipe {
    pub result: ItemId,
    pub input_count: u32,
    pub output_count: u32,
}

/// A single-input recipe, used to check whether a condensation can be undone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InverseRecipe {
    pub result: ItemId,
    pub count: u32,
}

pub trait RecipeCatalog: Send + Sync {
    fn find_uniform_recipe(&self, input: &ItemId) -> Option<UniformRecipe>;
    fn find_inverse(&self, input: &ItemId) -> Option<InverseRecipe>;
}

/// Read-only collaborators for one scheduling pass.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub resolver: &'a dyn RewardResolver,
    pub prices: &'a dyn PriceOracle,
    pub ranks: &'a dyn RankProvider,
    pub recipes: &'a dyn RecipeCatalog,
}

impl<'a> Host<'a> {
    pub fn rank(&self, owner: AccountId, ability: Ability) -> u32 {
        self.ranks.active_rank(owner, ability)
    }

    pub fn unlocked(&self, owner: AccountId, ability: Ability) -> bool {
        self.rank(owner, ability) > 0
    }
}
