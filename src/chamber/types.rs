//! Chamber data structures: the persistent unit of simulation and its stored loot.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Registry identity of a reward item (e.g. "minecraft:gold_nugget").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What a chamber simulates. Fixed at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceIdentity {
    /// A captured creature type; rewards come from its death loot.
    Creature(String),
    /// A reward table id (resource veins, excavation sites).
    RewardTable(String),
}

impl SourceIdentity {
    pub fn id(&self) -> &str {
        match self {
            SourceIdentity::Creature(id) | SourceIdentity::RewardTable(id) => id,
        }
    }

    pub fn is_creature(&self) -> bool {
        matches!(self, SourceIdentity::Creature(_))
    }
}

impl fmt::Display for SourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceIdentity::Creature(id) => write!(f, "creature:{id}"),
            SourceIdentity::RewardTable(id) => write!(f, "table:{id}"),
        }
    }
}

/// A stored stack of reward items. Stacks with the same id and data merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub id: ItemId,
    pub count: u64,
    /// Optional structured tag data (enchantments, custom names, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ItemStack {
    pub fn new(id: impl Into<ItemId>, count: u64) -> Self {
        Self {
            id: id.into(),
            count,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Same identity and same tag data.
    pub fn stacks_with(&self, other: &ItemStack) -> bool {
        self.id == other.id && self.data == other.data
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// How a filter rule selects reward lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchType {
    /// Exact item identity
    Id,
    /// Host category tag carried on the reward line (e.g. "forge:ores")
    Tag,
    /// Identity plus a structural subset match against the line's data
    TaggedData,
}

/// What happens to a reward line matched by a filter rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterAction {
    /// Store it normally; shields the line from later rules
    Keep,
    /// Drop it
    Void,
    /// Sell it immediately at the oracle price
    Liquidate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    pub match_type: MatchType,
    pub match_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_data: Option<Value>,
    pub action: FilterAction,
}

impl FilterRule {
    pub fn by_id(id: impl Into<String>, action: FilterAction) -> Self {
        Self {
            match_type: MatchType::Id,
            match_value: id.into(),
            sample_data: None,
            action,
        }
    }

    pub fn by_tag(tag: impl Into<String>, action: FilterAction) -> Self {
        Self {
            match_type: MatchType::Tag,
            match_value: tag.into(),
            sample_data: None,
            action,
        }
    }

    pub fn by_data(id: impl Into<String>, sample: Value, action: FilterAction) -> Self {
        Self {
            match_type: MatchType::TaggedData,
            match_value: id.into(),
            sample_data: Some(sample),
            action,
        }
    }
}

/// Opt-in recipe compaction of stored loot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CondensationMode {
    #[default]
    Off,
    /// Only recipes that can be crafted back into their inputs
    Safe,
    All,
}

/// A contained reward source and everything it has produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chamber {
    pub source: SourceIdentity,
    #[serde(default)]
    pub custom_name: Option<String>,
    /// Exact serialized state of the captured source, when resolution depends on it
    #[serde(default)]
    pub source_snapshot: Option<Value>,
    /// Instrument used for reward resolution (tool/weapon and its enchantments)
    #[serde(default)]
    pub tool_snapshot: Option<Value>,

    pub speed_rank: u32,
    pub thread_rank: u32,
    pub paused: bool,

    /// Online marker; only ever advanced by whole interval multiples
    pub last_scheduled_tick: u64,
    /// Offline marker; `None` until the chamber has been seen by an online pass
    #[serde(default)]
    pub last_wall_clock_millis: Option<i64>,

    /// Experience-equivalent energy not yet converted to secondary currency
    pub pending_energy: Decimal,

    pub storage: Vec<ItemStack>,
    #[serde(default)]
    pub filter_rules: Vec<FilterRule>,
    #[serde(default)]
    pub legacy_void_list: Vec<ItemId>,
    #[serde(default)]
    pub direct_liquidation: bool,
    #[serde(default)]
    pub condensation: CondensationMode,
    /// Stop storing an identity once this many are held
    #[serde(default)]
    pub yield_targets: BTreeMap<ItemId, u64>,

    /// Trade buffered input for barter rewards instead of simulating kills
    #[serde(default)]
    pub bartering_mode: bool,
    /// Items deposited by the owner, consumed by bartering
    #[serde(default)]
    pub input_buffer: Vec<ItemStack>,

    /// Bumped exactly once per completed flush
    pub update_version: u64,
}

impl Chamber {
    /// Create a freshly captured chamber. Both markers start at the capture moment.
    pub fn new(source: SourceIdentity, current_tick: u64, now_millis: i64) -> Self {
        Self {
            source,
            custom_name: None,
            source_snapshot: None,
            tool_snapshot: None,
            speed_rank: 0,
            thread_rank: 0,
            paused: false,
            last_scheduled_tick: current_tick,
            last_wall_clock_millis: Some(now_millis),
            pending_energy: Decimal::ZERO,
            storage: Vec::new(),
            filter_rules: Vec::new(),
            legacy_void_list: Vec::new(),
            direct_liquidation: false,
            condensation: CondensationMode::Off,
            yield_targets: BTreeMap::new(),
            bartering_mode: false,
            input_buffer: Vec::new(),
            update_version: 0,
        }
    }

    pub fn set_speed_rank(&mut self, rank: u32, cap: u32) {
        self.speed_rank = rank.min(cap);
    }

    pub fn set_thread_rank(&mut self, rank: u32, cap: u32) {
        self.thread_rank = rank.min(cap);
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resume scheduling. Markers are re-based so paused time never produces occurrences.
    pub fn resume(&mut self, current_tick: u64, now_millis: i64) {
        self.paused = false;
        self.last_scheduled_tick = current_tick;
        self.last_wall_clock_millis = Some(now_millis);
    }

    /// Total stored count of an identity across all its stacks.
    pub fn stored_count(&self, id: &ItemId) -> u64 {
        self.storage
            .iter()
            .filter(|s| &s.id == id)
            .fold(0u64, |acc, s| acc.saturating_add(s.count))
    }

    pub fn deposit_input(&mut self, stack: ItemStack) {
        if stack.is_empty() {
            return;
        }
        merge_into(&mut self.input_buffer, stack);
    }

    /// Remove up to `max` of `id` from the input buffer, oldest stacks first.
    /// Returns how many were taken.
    pub fn take_input(&mut self, id: &ItemId, max: u64) -> u64 {
        let mut taken = 0u64;
        for stack in self.input_buffer.iter_mut().filter(|s| &s.id == id) {
            let want = max - taken;
            if want == 0 {
                break;
            }
            let take = stack.count.min(want);
            stack.count -= take;
            taken += take;
        }
        self.input_buffer.retain(|s| !s.is_empty());
        taken
    }

    /// Merge a stack into storage: same id and data sum counts, otherwise append.
    pub fn store(&mut self, stack: ItemStack) {
        if stack.is_empty() {
            return;
        }
        merge_into(&mut self.storage, stack);
    }
}

/// Merge `stack` into `storage`, saturating at `u64::MAX`.
pub fn merge_into(storage: &mut Vec<ItemStack>, stack: ItemStack) {
    match storage.iter_mut().find(|s| s.stacks_with(&stack)) {
        Some(existing) => existing.count = existing.count.saturating_add(stack.count),
        None => storage.push(stack),
    }
}
