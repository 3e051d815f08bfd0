//! Engine configuration.
//!
//! Defaults come from `core::constants`. A host can override any subset from a
//! JSON file; missing fields keep their defaults.

use super::constants::*;
use crate::chamber::ItemId;
use super::error::Result;
use super::rate::DampingCurve;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Permanent stat growth granted per occurrence of a creature source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatGrowth {
    pub stat: String,
    /// Multiplied by the SoulReap rank and the sample scale
    pub per_rank: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Interval at speed rank 0, in ticks
    pub base_interval_ticks: u64,
    /// Per-speed-rank interval multiplier (< 1.0 speeds up)
    pub interval_decay: f64,
    /// Speed rank at which the interval collapses to one tick
    pub max_speed_rank: u32,
    /// Wall-clock length of one tick, used to convert offline time
    pub millis_per_tick: i64,
    pub damping: DampingCurve,

    /// Most occurrences a single online pass will process for one chamber
    pub online_occurrence_ceiling: u64,
    pub online_sample_cap: u32,
    pub offline_sample_cap: u32,
    /// Longest offline gap that is backfilled
    pub max_backfill_millis: i64,

    pub max_storage: usize,
    /// Order storage by identity after each flush
    pub sort_storage_after_flush: bool,

    pub energy_exchange_base: u64,
    pub luck_per_rank: f32,
    pub on_kill_growth: Vec<StatGrowth>,

    /// Satiety gained per simulated kill of a source
    pub satiety_per_occurrence: Decimal,
    pub max_satiety: Decimal,
    /// Input item a bartering chamber spends per trade
    pub bartering_currency: ItemId,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_interval_ticks: BASE_INTERVAL_TICKS,
            interval_decay: INTERVAL_DECAY,
            max_speed_rank: MAX_SPEED_RANK,
            millis_per_tick: MILLIS_PER_TICK,
            damping: DampingCurve::default(),

            online_occurrence_ceiling: ONLINE_OCCURRENCE_CEILING,
            online_sample_cap: ONLINE_SAMPLE_CAP,
            offline_sample_cap: OFFLINE_SAMPLE_CAP,
            max_backfill_millis: MAX_BACKFILL_MILLIS,

            max_storage: MAX_STORAGE,
            sort_storage_after_flush: true,

            energy_exchange_base: ENERGY_EXCHANGE_BASE,
            luck_per_rank: LUCK_PER_RANK,
            satiety_per_occurrence: Decimal::new(SATIETY_PER_OCCURRENCE_TENTHS, 1),
            max_satiety: Decimal::from(MAX_SATIETY),
            bartering_currency: ItemId::from(BARTERING_CURRENCY),
            on_kill_growth: vec![
                StatGrowth {
                    stat: STAT_MAX_HEALTH.to_string(),
                    per_rank: Decimal::new(MAX_HEALTH_GROWTH_MILLI, 3),
                },
                StatGrowth {
                    stat: STAT_ATTACK_DAMAGE.to_string(),
                    per_rank: Decimal::new(ATTACK_DAMAGE_GROWTH_MILLI, 3),
                },
            ],
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Load from `path`, falling back to defaults if the file is missing or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default engine config ({}): {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Wall-clock length of one interval, never below one tick.
    pub fn interval_millis(&self, interval_ticks: u64) -> i64 {
        i64::try_from(interval_ticks.max(1))
            .unwrap_or(i64::MAX)
            .saturating_mul(self.millis_per_tick.max(1))
    }
}
